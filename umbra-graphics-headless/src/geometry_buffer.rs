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

use std::any::Any;
use umbra_graphics::{
    error::FrameworkError,
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    ElementKind,
};

pub struct HeadlessGeometryBuffer {
    name: String,
    vertex_count: usize,
    element_count: usize,
    element_kind: ElementKind,
}

impl HeadlessGeometryBuffer {
    pub fn new(desc: GeometryBufferDescriptor) -> Result<Self, FrameworkError> {
        desc.validate()?;

        Ok(Self {
            name: desc.name.to_owned(),
            vertex_count: desc
                .buffers
                .first()
                .map(|buffer| buffer.vertex_count())
                .unwrap_or_default(),
            element_count: desc.elements.element_count(),
            element_kind: desc.elements.element_kind(),
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

impl GeometryBuffer for HeadlessGeometryBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn element_kind(&self) -> ElementKind {
        self.element_kind
    }
}
