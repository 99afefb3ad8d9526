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

//! Reference counted pool of render targets keyed by a logical name.
//!
//! Every pass acquires the targets it writes and the targets it reads from other passes by name,
//! so passes never hold direct references to each other. Acquiring a name that already exists
//! returns the existing texture and increments its reference count, the texture leaves the
//! registry when the count drops to zero.

use fxhash::FxHashMap;
use std::{cell::RefCell, rc::Rc};
use umbra_core::{log::Log, warn, ImmutableString};
use umbra_graphics::{
    error::FrameworkError,
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter,
        PixelKind, WrapMode,
    },
    server::GraphicsServer,
};

/// Everything needed to (re)create a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub kind: GpuTextureKind,
    pub pixel_kind: PixelKind,
    pub min_filter: MinificationFilter,
    pub mag_filter: MagnificationFilter,
    pub wrap_mode: WrapMode,
}

impl RenderTargetDescriptor {
    pub fn rectangle(pixel_kind: PixelKind, width: usize, height: usize) -> Self {
        Self {
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            min_filter: MinificationFilter::Nearest,
            mag_filter: MagnificationFilter::Nearest,
            wrap_mode: WrapMode::ClampToEdge,
        }
    }

    pub fn cube(pixel_kind: PixelKind, size: usize) -> Self {
        Self {
            kind: GpuTextureKind::Cube {
                width: size,
                height: size,
            },
            ..Self::rectangle(pixel_kind, size, size)
        }
    }

    #[must_use]
    pub fn with_linear_filtering(mut self) -> Self {
        self.min_filter = MinificationFilter::Linear;
        self.mag_filter = MagnificationFilter::Linear;
        self
    }

    #[must_use]
    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    pub fn create(
        &self,
        server: &dyn GraphicsServer,
        name: &str,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        server.create_texture(GpuTextureDescriptor {
            name,
            kind: self.kind,
            pixel_kind: self.pixel_kind,
            min_filter: self.min_filter,
            mag_filter: self.mag_filter,
            mip_count: 1,
            s_wrap_mode: self.wrap_mode,
            t_wrap_mode: self.wrap_mode,
            r_wrap_mode: self.wrap_mode,
            data: None,
        })
    }
}

struct Entry {
    texture: Rc<RefCell<dyn GpuTexture>>,
    descriptor: RenderTargetDescriptor,
    ref_count: usize,
}

#[derive(Default)]
pub struct TextureRegistry {
    entries: FxHashMap<ImmutableString, Entry>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target with the given name, creating it if it does not exist yet. The
    /// reference count is incremented in both cases, every successful call must be paired with a
    /// [`Self::release`].
    pub fn acquire(
        &mut self,
        server: &dyn GraphicsServer,
        name: &str,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        if let Some(entry) = self.entries.get_mut(name) {
            if entry.descriptor != descriptor {
                warn!(
                    "Render target {name} was requested with {:?}, but it already exists as {:?}. \
                    Existing target will be used.",
                    descriptor, entry.descriptor
                );
            }
            entry.ref_count += 1;
            return Ok(entry.texture.clone());
        }

        let texture = descriptor.create(server, name)?;
        self.entries.insert(
            ImmutableString::new(name),
            Entry {
                texture: texture.clone(),
                descriptor,
                ref_count: 1,
            },
        );
        Ok(texture)
    }

    /// Decrements the reference count and returns the remaining amount of references. The target
    /// leaves the registry when no references left.
    pub fn release(&mut self, name: &str) -> Result<usize, FrameworkError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| FrameworkError::resource_not_found(name))?;

        entry.ref_count -= 1;
        let remaining = entry.ref_count;
        if remaining == 0 {
            self.entries.remove(name);
        }
        Ok(remaining)
    }

    pub fn get(&self, name: &str) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        self.entries
            .get(name)
            .map(|entry| entry.texture.clone())
            .ok_or_else(|| FrameworkError::resource_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn ref_count(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|entry| entry.ref_count)
    }

    pub fn descriptor(&self, name: &str) -> Option<&RenderTargetDescriptor> {
        self.entries.get(name).map(|entry| &entry.descriptor)
    }

    /// Reallocates the storage of an existing target. Every holder of the texture sees the new
    /// size, contents are undefined afterwards.
    pub fn resize(
        &mut self,
        name: &str,
        width: usize,
        height: usize,
    ) -> Result<(), FrameworkError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| FrameworkError::resource_not_found(name))?;

        let kind = match entry.descriptor.kind {
            GpuTextureKind::Cube { .. } => GpuTextureKind::Cube { width, height },
            _ => GpuTextureKind::Rectangle { width, height },
        };
        entry
            .texture
            .borrow_mut()
            .set_data(kind, entry.descriptor.pixel_kind, None)?;
        entry.descriptor.kind = kind;
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &ImmutableString> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acquires every target of the list or none of them: targets acquired before a failure are
    /// released again.
    pub fn acquire_all(
        &mut self,
        server: &dyn GraphicsServer,
        targets: &[(&str, RenderTargetDescriptor)],
    ) -> Result<Vec<Rc<RefCell<dyn GpuTexture>>>, FrameworkError> {
        let mut acquired = Vec::with_capacity(targets.len());
        for (name, descriptor) in targets {
            match self.acquire(server, name, *descriptor) {
                Ok(texture) => acquired.push(texture),
                Err(error) => {
                    let rolled_back = targets.iter().take(acquired.len());
                    self.release_all(rolled_back.map(|(name, _)| *name));
                    return Err(error);
                }
            }
        }
        Ok(acquired)
    }

    /// Releases every name of the list, names that are not registered are logged and skipped.
    pub fn release_all<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            Log::verify(self.release(name));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_acquire_existing_name_reuses_texture() {
        let server = HeadlessServer::new(4, 4);
        let mut registry = TextureRegistry::new();
        let descriptor = RenderTargetDescriptor::rectangle(PixelKind::D24S8, 4, 4);

        let a = registry.acquire(&*server, "SceneDepth", descriptor).unwrap();
        let b = registry.acquire(&*server, "SceneDepth", descriptor).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(server.live_texture_count(), 1);
        assert_eq!(registry.ref_count("SceneDepth"), Some(2));
        drop((a, b));

        assert_eq!(registry.release("SceneDepth").unwrap(), 1);
        assert_eq!(server.live_texture_count(), 1);
        assert_eq!(registry.release("SceneDepth").unwrap(), 0);
        assert_eq!(server.live_texture_count(), 0);
        assert!(!registry.contains("SceneDepth"));

        // Releasing more times than acquired never frees anything twice.
        assert!(matches!(
            registry.release("SceneDepth"),
            Err(FrameworkError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_name() {
        let registry = TextureRegistry::new();
        match registry.get("Bloom") {
            Err(FrameworkError::ResourceNotFound { name }) => assert_eq!(name, "Bloom"),
            _ => panic!("lookup must fail"),
        }
    }

    #[test]
    fn test_allocation_failure_is_not_registered() {
        let server = HeadlessServer::new(4, 4);
        server.set_max_texture_size(Some(16));
        let mut registry = TextureRegistry::new();

        let result = registry.acquire(
            &*server,
            "Huge",
            RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 32, 32),
        );
        assert!(matches!(
            result,
            Err(FrameworkError::TextureAllocationFailed { ref name, .. }) if name == "Huge"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_acquire_all_rolls_back_and_keeps_error() {
        let server = HeadlessServer::new(4, 4);
        server.set_max_texture_size(Some(16));
        let mut registry = TextureRegistry::new();
        let small = RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 4, 4);
        let _shared = registry.acquire(&*server, "Shared", small).unwrap();

        let result = registry.acquire_all(
            &*server,
            &[
                ("Small", small),
                ("Shared", small),
                (
                    "Huge",
                    RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 32, 32),
                ),
            ],
        );
        assert!(matches!(
            result,
            Err(FrameworkError::TextureAllocationFailed { ref name, .. }) if name == "Huge"
        ));
        assert!(!registry.contains("Small"));
        assert_eq!(registry.ref_count("Shared"), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resize() {
        let server = HeadlessServer::new(4, 4);
        let mut registry = TextureRegistry::new();
        let texture = registry
            .acquire(
                &*server,
                "SceneColor",
                RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 4, 4),
            )
            .unwrap();

        registry.resize("SceneColor", 8, 2).unwrap();
        assert_eq!(texture.borrow().kind().rectangle_size(), (8, 2));
        assert_eq!(
            registry.descriptor("SceneColor").unwrap().kind,
            GpuTextureKind::Rectangle {
                width: 8,
                height: 2
            }
        );
        assert!(registry.resize("Missing", 1, 1).is_err());
    }
}
