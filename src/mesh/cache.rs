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

use crate::mesh::{surface::SurfaceData, MeshHandle, MeshManager};
use fxhash::FxHashMap;
use umbra_core::err;
use umbra_graphics::{error::FrameworkError, geometry_buffer::GeometryBuffer, server::GraphicsServer};

struct SurfaceRenderData {
    buffer: Box<dyn GeometryBuffer>,
    revision: u64,
}

/// GPU copies of mesh surfaces. A buffer is uploaded on first use and re-uploaded whenever the
/// revision of the mesh changes.
#[derive(Default)]
pub struct GeometryCache {
    buffers: FxHashMap<MeshHandle, SurfaceRenderData>,
}

impl GeometryCache {
    pub fn get(
        &mut self,
        server: &dyn GraphicsServer,
        handle: MeshHandle,
        revision: u64,
        data: &SurfaceData,
    ) -> Result<&dyn GeometryBuffer, FrameworkError> {
        let stale = self
            .buffers
            .get(&handle)
            .map_or(true, |entry| entry.revision != revision);

        if stale {
            let buffer = match data.upload(server, &format!("Mesh{handle:?}")) {
                Ok(buffer) => buffer,
                Err(error) => {
                    err!("Unable to upload geometry of mesh {handle:?}. Reason: {error}");
                    self.buffers.remove(&handle);
                    return Err(error);
                }
            };
            self.buffers
                .insert(handle, SurfaceRenderData { buffer, revision });
        }

        self.buffers
            .get(&handle)
            .map(|entry| &*entry.buffer)
            .ok_or_else(|| FrameworkError::resource_not_found(format!("{handle:?}")))
    }

    /// Drops buffers of meshes that no longer exist.
    pub fn retain_alive(&mut self, meshes: &MeshManager) {
        self.buffers.retain(|handle, _| meshes.contains(*handle));
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.buffers.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::material::Material;
    use umbra_core::algebra::Matrix4;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_reupload_on_revision_change() {
        let server = HeadlessServer::new(1, 1);
        let meshes = MeshManager::new();
        let handle = meshes.add_mesh(SurfaceData::make_cube(Matrix4::identity()), Material::standard());
        let mut cache = GeometryCache::default();

        let cube = SurfaceData::make_cube(Matrix4::identity());
        assert_eq!(cache.get(&*server, handle, 0, &cube).unwrap().element_count(), 12);

        let quad = SurfaceData::make_unit_xy_quad();
        // Same revision, stale buffer is kept.
        assert_eq!(cache.get(&*server, handle, 0, &quad).unwrap().element_count(), 12);
        assert_eq!(cache.get(&*server, handle, 1, &quad).unwrap().element_count(), 2);

        meshes.remove_mesh(handle);
        cache.retain_alive(&meshes);
        assert!(cache.is_empty());
    }
}
