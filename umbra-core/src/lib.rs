// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Core data structures shared by every crate of the renderer.

pub mod color;
pub mod log;
pub mod sstorage;

pub use nalgebra as algebra;
pub use num_traits;
pub use parking_lot;
pub use rand;
pub use sstorage::ImmutableString;
pub use umbra_math as math;

/// Reinterprets a slice of POD values as raw bytes, used when uploading vertex and index data.
#[inline]
pub fn array_as_u8_slice<T: bytemuck::Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Returns a value that is unique for every call site, it is used as an id for `*_once`
/// logging functions.
#[macro_export]
macro_rules! log_once_id {
    () => {{
        static ID: u8 = 0;
        &ID as *const u8 as usize
    }};
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_array_as_u8_slice() {
        let data = [1u32, 2];
        assert_eq!(array_as_u8_slice(&data).len(), 8);
    }

    #[test]
    fn test_log_once_id_is_unique_per_call_site() {
        let a = log_once_id!();
        let b = log_once_id!();
        assert_ne!(a, b);
    }
}
