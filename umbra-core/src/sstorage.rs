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

//! Immutable string with a precomputed hash. Cloning is a reference count increment, which
//! makes it a cheap key for registries that are queried every frame (render targets, uniform
//! names, material properties).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Borrow,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::Arc,
};

#[derive(Clone)]
pub struct ImmutableString {
    string: Arc<str>,
    hash: u64,
}

impl ImmutableString {
    #[inline]
    pub fn new<S: AsRef<str>>(string: S) -> Self {
        let string: Arc<str> = Arc::from(string.as_ref());
        let hash = fxhash::hash64(string.as_bytes());
        Self { string, hash }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// Precomputed hash of the content.
    #[inline]
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn to_mutable(&self) -> String {
        self.string.to_string()
    }
}

impl Default for ImmutableString {
    fn default() -> Self {
        Self::new("")
    }
}

impl PartialEq for ImmutableString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.string == other.string
    }
}

impl Eq for ImmutableString {}

impl Hash for ImmutableString {
    // Must agree with `str`'s hash because of the `Borrow<str>` impl below.
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl Borrow<str> for ImmutableString {
    #[inline]
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Deref for ImmutableString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for ImmutableString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for ImmutableString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Debug for ImmutableString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.as_str(), f)
    }
}

impl From<&str> for ImmutableString {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImmutableString {
    #[inline]
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for ImmutableString {
    #[inline]
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for ImmutableString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ImmutableString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for ImmutableString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImmutableString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::new(String::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fxhash::FxHashMap;

    #[test]
    fn test_immutable_string_equality_and_lookup() {
        let a = ImmutableString::new("SceneColor");
        let b = ImmutableString::from("SceneColor".to_string());
        assert_eq!(a, b);
        assert_eq!(a.cached_hash(), b.cached_hash());
        assert_ne!(a, ImmutableString::new("SceneDepth"));
        assert_eq!(a, "SceneColor");

        let mut map = FxHashMap::default();
        map.insert(a.clone(), 1);
        // Lookup by plain `&str` must work through `Borrow<str>`.
        assert_eq!(map.get("SceneColor"), Some(&1));
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_immutable_string_clone_shares_storage() {
        let a = ImmutableString::new("GBufferAlbedo");
        let b = a.clone();
        assert!(std::ptr::eq(a.as_str().as_ptr(), b.as_str().as_ptr()));
        assert_eq!(b.to_mutable(), "GBufferAlbedo");
        assert_eq!(format!("{a}"), "GBufferAlbedo");
        assert_eq!(format!("{a:?}"), "\"GBufferAlbedo\"");
    }
}
