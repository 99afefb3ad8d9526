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

//! Registry of every mesh the renderer knows about.
//!
//! Meshes can be added, updated and removed from any thread. Geometry updates are queued and
//! applied by the render thread between passes, so a pass never sees a half replaced surface.
//! Removal is synchronized with traversals: a thread that removes a mesh while the render thread
//! is drawing blocks until the traversal ends, and a removal issued from inside a traversal is
//! deferred until the outermost traversal finishes.
//!
//! Lock order is traversal guard first, registry second.

pub mod cache;
pub mod guard;
pub mod surface;

use crate::{
    material::{FallbackTextures, Material},
    mesh::{
        cache::GeometryCache,
        guard::{TraversalGuard, WaitOutcome},
        surface::SurfaceData,
    },
    shader::{PassBindings, RenderProgram, ShaderLibrary},
    stats::RenderPassStatistics,
    texture_registry::TextureRegistry,
    transform::SharedTransform,
};
use bitflags::bitflags;
use fxhash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use std::{rc::Rc, sync::Arc};
use umbra_core::{
    algebra::{Matrix4, Vector3},
    err,
    math::{aabb::AxisAlignedBoundingBox, frustum::Frustum, Rect},
    parking_lot::Mutex,
};
use umbra_graphics::{
    error::FrameworkError, framebuffer::FrameBuffer, server::GraphicsServer, BlendParameters,
    DrawParameters, ElementRange,
};

new_key_type! {
    pub struct MeshHandle;
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct MeshFlags: u32 {
        /// Editor helpers and debug geometry, skipped unless a pass asks for them.
        const DEV_ONLY = 1;
        const SHOULD_DRAW = 2;
    }
}

impl Default for MeshFlags {
    fn default() -> Self {
        Self::SHOULD_DRAW
    }
}

pub struct Mesh {
    surface: Arc<SurfaceData>,
    revision: u64,
    local_bounds: AxisAlignedBoundingBox,
    material: Arc<Material>,
    transform: Arc<SharedTransform>,
    flags: MeshFlags,
}

impl Mesh {
    pub fn surface(&self) -> &Arc<SurfaceData> {
        &self.surface
    }

    /// Incremented every time the surface is replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn local_bounds(&self) -> AxisAlignedBoundingBox {
        self.local_bounds
    }

    pub fn world_bounds(&self) -> AxisAlignedBoundingBox {
        self.local_bounds.transform(&self.transform.matrix())
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn transform(&self) -> &Arc<SharedTransform> {
        &self.transform
    }

    pub fn flags(&self) -> MeshFlags {
        self.flags
    }
}

#[derive(Default)]
struct Registry {
    meshes: SlotMap<MeshHandle, Mesh>,
    pending_updates: FxHashMap<MeshHandle, SurfaceData>,
    deferred_removals: Vec<MeshHandle>,
}

impl Registry {
    fn apply_deferred_removals(&mut self) {
        for handle in std::mem::take(&mut self.deferred_removals) {
            self.meshes.remove(handle);
            self.pending_updates.remove(&handle);
        }
    }
}

/// Which meshes a pass draws.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MeshFilter {
    #[default]
    All,
    OpaqueOnly,
}

/// Everything a pass provides to [`MeshManager::draw`].
pub struct MeshDrawContext<'a> {
    /// Used in error messages.
    pub pass_name: &'a str,
    pub server: &'a dyn GraphicsServer,
    pub frame_buffer: &'a mut dyn FrameBuffer,
    pub viewport: Rect<i32>,
    pub frustum: Frustum,
    pub view_projection: Matrix4<f32>,
    /// Transparent meshes are sorted by distance to this point.
    pub observer_position: Vector3<f32>,
    pub params: DrawParameters,
    pub filter: MeshFilter,
    pub include_dev_only: bool,
    /// Draws every mesh with this program instead of the program of its material.
    pub shader_override: Option<Rc<RenderProgram>>,
    /// Whether material properties are bound. Depth-only passes skip them.
    pub bind_material: bool,
    pub shaders: &'a mut ShaderLibrary,
    pub geometry_cache: &'a mut GeometryCache,
    pub textures: &'a TextureRegistry,
    pub fallbacks: &'a FallbackTextures,
    /// Pass-wide uniforms, applied to every program.
    pub pass: &'a PassBindings,
}

struct DrawItem {
    handle: MeshHandle,
    surface: Arc<SurfaceData>,
    revision: u64,
    world: Matrix4<f32>,
    world_bounds: AxisAlignedBoundingBox,
    material: Arc<Material>,
}

/// Ends the traversal when dropped.
#[must_use]
pub struct TraversalScope<'a> {
    manager: &'a MeshManager,
}

impl Drop for TraversalScope<'_> {
    fn drop(&mut self) {
        let registry = &self.manager.registry;
        self.manager
            .guard
            .end(|| registry.lock().apply_deferred_removals());
    }
}

#[derive(Default)]
pub struct MeshManager {
    registry: Mutex<Registry>,
    guard: TraversalGuard,
}

impl MeshManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&self, surface: SurfaceData, material: Material) -> MeshHandle {
        self.add_mesh_with_transform(surface, material, Default::default())
    }

    /// Adds a mesh that reads its world transform from `transform`. The same transform can be
    /// shared with the thread that simulates the object.
    pub fn add_mesh_with_transform(
        &self,
        surface: SurfaceData,
        material: Material,
        transform: Arc<SharedTransform>,
    ) -> MeshHandle {
        let local_bounds = surface.local_bounds();
        self.registry.lock().meshes.insert(Mesh {
            surface: Arc::new(surface),
            revision: 0,
            local_bounds,
            material: Arc::new(material),
            transform,
            flags: MeshFlags::default(),
        })
    }

    /// Removes a mesh, returns `false` if there is no such mesh. Blocks while another thread
    /// traverses the registry. When called during a traversal on the same thread, the mesh stays
    /// until the traversal ends.
    pub fn remove_mesh(&self, handle: MeshHandle) -> bool {
        self.guard.exclusive(|outcome| {
            let mut registry = self.registry.lock();
            if !registry.meshes.contains_key(handle) {
                return false;
            }
            match outcome {
                WaitOutcome::Idle => {
                    registry.meshes.remove(handle);
                    registry.pending_updates.remove(&handle);
                }
                WaitOutcome::OwnedByCaller => {
                    if !registry.deferred_removals.contains(&handle) {
                        registry.deferred_removals.push(handle);
                    }
                }
            }
            true
        })
    }

    /// Queues new geometry for a mesh. Several updates of the same mesh before the next
    /// [`Self::apply_pending_updates`] collapse into the last one.
    pub fn update_mesh(&self, handle: MeshHandle, surface: SurfaceData) -> bool {
        let mut registry = self.registry.lock();
        if !registry.meshes.contains_key(handle) {
            return false;
        }
        registry.pending_updates.insert(handle, surface);
        true
    }

    /// Applies queued geometry updates and returns how many meshes were changed. Does nothing
    /// while a traversal is in flight.
    pub fn apply_pending_updates(&self) -> usize {
        let registry = &self.registry;
        self.guard
            .when_idle(|| {
                let mut registry = registry.lock();
                let Registry {
                    meshes,
                    pending_updates,
                    ..
                } = &mut *registry;

                let mut applied = 0;
                for (handle, surface) in pending_updates.drain() {
                    if let Some(mesh) = meshes.get_mut(handle) {
                        mesh.local_bounds = surface.local_bounds();
                        mesh.surface = Arc::new(surface);
                        mesh.revision += 1;
                        applied += 1;
                    }
                }
                applied
            })
            .unwrap_or(0)
    }

    pub fn pending_update_count(&self) -> usize {
        self.registry.lock().pending_updates.len()
    }

    pub fn set_flags(&self, handle: MeshHandle, flags: MeshFlags) -> bool {
        self.modify(handle, |mesh| mesh.flags = flags)
    }

    pub fn set_material(&self, handle: MeshHandle, material: Material) -> bool {
        self.modify(handle, |mesh| mesh.material = Arc::new(material))
    }

    pub fn set_transform_source(&self, handle: MeshHandle, transform: Arc<SharedTransform>) -> bool {
        self.modify(handle, |mesh| mesh.transform = transform)
    }

    pub fn transform_source(&self, handle: MeshHandle) -> Option<Arc<SharedTransform>> {
        self.with_mesh(handle, |mesh| mesh.transform.clone())
    }

    fn modify(&self, handle: MeshHandle, func: impl FnOnce(&mut Mesh)) -> bool {
        match self.registry.lock().meshes.get_mut(handle) {
            Some(mesh) => {
                func(mesh);
                true
            }
            None => false,
        }
    }

    pub fn with_mesh<R>(&self, handle: MeshHandle, func: impl FnOnce(&Mesh) -> R) -> Option<R> {
        self.registry.lock().meshes.get(handle).map(func)
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.registry.lock().meshes.contains_key(handle)
    }

    pub fn mesh_count(&self) -> usize {
        self.registry.lock().meshes.len()
    }

    pub fn handles(&self) -> Vec<MeshHandle> {
        self.registry.lock().meshes.keys().collect()
    }

    pub fn is_traversing(&self) -> bool {
        self.guard.is_in_flight()
    }

    /// Marks the registry as being traversed until the returned scope is dropped.
    pub fn traverse(&self) -> TraversalScope<'_> {
        self.guard.begin();
        TraversalScope { manager: self }
    }

    fn collect_visible(&self, ctx: &MeshDrawContext) -> (Vec<DrawItem>, Vec<DrawItem>) {
        let registry = self.registry.lock();
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();

        for (handle, mesh) in registry.meshes.iter() {
            if !mesh.flags.contains(MeshFlags::SHOULD_DRAW)
                || (mesh.flags.contains(MeshFlags::DEV_ONLY) && !ctx.include_dev_only)
                || !mesh.local_bounds.is_valid()
            {
                continue;
            }

            let is_transparent = mesh.material.is_transparent();
            if is_transparent && ctx.filter == MeshFilter::OpaqueOnly {
                continue;
            }

            let world = mesh.transform.matrix();
            let world_bounds = mesh.local_bounds.transform(&world);
            if !ctx
                .frustum
                .is_intersects_sphere(world_bounds.center(), world_bounds.bounding_radius())
                || !ctx.frustum.is_intersects_aabb(&world_bounds)
            {
                continue;
            }

            let item = DrawItem {
                handle,
                surface: mesh.surface.clone(),
                revision: mesh.revision,
                world,
                world_bounds,
                material: mesh.material.clone(),
            };
            if is_transparent {
                transparent.push(item);
            } else {
                opaque.push(item);
            }
        }

        (opaque, transparent)
    }

    /// Draws every visible mesh: opaque ones first, then transparent ones back to front. A mesh
    /// that fails to draw is logged and skipped.
    pub fn draw(
        &self,
        ctx: &mut MeshDrawContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let _scope = self.traverse();

        let (opaque, mut transparent) = self.collect_visible(ctx);
        let observer = ctx.observer_position;
        transparent.sort_by(|a, b| {
            let da = (a.world_bounds.center() - observer).norm_squared();
            let db = (b.world_bounds.center() - observer).norm_squared();
            db.total_cmp(&da)
        });

        let mut statistics = RenderPassStatistics::default();
        for (item, is_transparent) in opaque
            .iter()
            .map(|item| (item, false))
            .chain(transparent.iter().map(|item| (item, true)))
        {
            match draw_item(ctx, item, is_transparent) {
                Ok(stats) => statistics += stats,
                Err(error) => err!(
                    "{}: unable to draw mesh {:?}. Reason: {error}",
                    ctx.pass_name,
                    item.handle
                ),
            }
        }
        Ok(statistics)
    }

    /// Same as [`Self::draw`], restricted to opaque meshes.
    pub fn draw_gbuffer(
        &self,
        ctx: &mut MeshDrawContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        ctx.filter = MeshFilter::OpaqueOnly;
        self.draw(ctx)
    }
}

fn draw_item(
    ctx: &mut MeshDrawContext,
    item: &DrawItem,
    is_transparent: bool,
) -> Result<RenderPassStatistics, FrameworkError> {
    let program = match ctx.shader_override.as_ref() {
        Some(program) => program.clone(),
        None => ctx.shaders.get(ctx.server, item.material.shader())?,
    };

    let mut bindings = Vec::new();
    program.bind_uniform(&mut bindings, "worldMatrix", item.world);
    program.bind_uniform(
        &mut bindings,
        "worldViewProjection",
        ctx.view_projection * item.world,
    );
    ctx.pass.apply(&program, &mut bindings);
    if ctx.bind_material {
        item.material
            .bind(&program, ctx.textures, ctx.fallbacks, &mut bindings)?;
    }

    let mut params = ctx.params.clone();
    if is_transparent {
        params.blend = Some(BlendParameters::alpha_blend());
        params.depth_write = false;
    }

    let geometry = ctx
        .geometry_cache
        .get(ctx.server, item.handle, item.revision, &item.surface)?;
    let stats = ctx.frame_buffer.draw(
        geometry,
        ctx.viewport,
        program.gpu_program(),
        &params,
        &bindings,
        ElementRange::Full,
    )?;

    let mut statistics = RenderPassStatistics::default();
    statistics += stats;
    Ok(statistics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        material::{MaterialProperty, ALPHA_TEST, DIFFUSE},
        transform::TransformSnapshot,
        viewport::{PerspectiveProjection, Viewport},
    };
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };
    use umbra_core::algebra::Vector2;
    use umbra_graphics::gpu_program::UniformValue;
    use umbra_graphics_headless::{DrawCallRecord, HeadlessServer};

    fn cube() -> SurfaceData {
        SurfaceData::make_cube(Matrix4::identity())
    }

    fn place(meshes: &MeshManager, handle: MeshHandle, position: Vector3<f32>) {
        meshes
            .transform_source(handle)
            .unwrap()
            .store(TransformSnapshot::from_position(position));
    }

    struct Fixture {
        server: Rc<HeadlessServer>,
        shaders: ShaderLibrary,
        cache: GeometryCache,
        textures: TextureRegistry,
        fallbacks: FallbackTextures,
        frame_buffer: Box<dyn FrameBuffer>,
        viewport: Viewport,
    }

    impl Fixture {
        fn new() -> Self {
            let server = HeadlessServer::new(64, 64);
            let mut viewport = Viewport::new(Vector2::new(64.0, 64.0));
            viewport.set_projection(PerspectiveProjection::default().with_z_far(100.0));
            Self {
                fallbacks: FallbackTextures::new(&*server).unwrap(),
                frame_buffer: server.back_buffer(),
                server,
                shaders: Default::default(),
                cache: Default::default(),
                textures: Default::default(),
                viewport,
            }
        }

        fn draw(&mut self, meshes: &MeshManager, include_dev_only: bool) -> Vec<DrawCallRecord> {
            let pass = PassBindings::default();
            let mut ctx = MeshDrawContext {
                pass_name: "Test",
                server: &*self.server,
                frame_buffer: &mut *self.frame_buffer,
                viewport: Rect::new(0, 0, 64, 64),
                frustum: self.viewport.frustum(),
                view_projection: self.viewport.view_projection_matrix(),
                observer_position: self.viewport.position(),
                params: DrawParameters::default(),
                filter: MeshFilter::All,
                include_dev_only,
                shader_override: None,
                bind_material: true,
                shaders: &mut self.shaders,
                geometry_cache: &mut self.cache,
                textures: &self.textures,
                fallbacks: &self.fallbacks,
                pass: &pass,
            };
            meshes.draw(&mut ctx).unwrap();
            self.server.take_draw_calls()
        }
    }

    fn world_z(record: &DrawCallRecord) -> f32 {
        match record.uniform("worldMatrix") {
            Some(UniformValue::Matrix4(m)) => m[(2, 3)],
            _ => panic!("world matrix must be bound"),
        }
    }

    #[test]
    fn test_frustum_culling() {
        let mut fixture = Fixture::new();
        let meshes = MeshManager::new();
        let near = meshes.add_mesh(cube(), Material::standard());
        let far = meshes.add_mesh(cube(), Material::standard());
        place(&meshes, near, Vector3::new(0.0, 0.0, -5.0));
        place(&meshes, far, Vector3::new(0.0, 0.0, -500.0));

        let calls = fixture.draw(&meshes, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(world_z(&calls[0]), -5.0);
        assert_eq!(calls[0].element_count, 12);
    }

    #[test]
    fn test_transparent_meshes_are_drawn_last_back_to_front() {
        let mut fixture = Fixture::new();
        let meshes = MeshManager::new();
        let glass = Material::standard().with_property(ALPHA_TEST, true);

        for (z, material) in [
            (-3.0, glass.clone()),
            (-6.0, Material::standard()),
            (-10.0, glass),
        ] {
            let handle = meshes.add_mesh(cube(), material);
            place(&meshes, handle, Vector3::new(0.0, 0.0, z));
        }

        let calls = fixture.draw(&meshes, false);
        assert_eq!(calls.iter().map(world_z).collect::<Vec<_>>(), [-6.0, -10.0, -3.0]);
        assert!(calls[0].params.blend.is_none());
        assert!(calls[1].params.blend.is_some());
        assert!(!calls[2].params.depth_write);
    }

    #[test]
    fn test_flags() {
        let mut fixture = Fixture::new();
        let meshes = MeshManager::new();
        let gizmo = meshes.add_mesh(cube(), Material::standard());
        let hidden = meshes.add_mesh(cube(), Material::standard());
        for handle in [gizmo, hidden] {
            place(&meshes, handle, Vector3::new(0.0, 0.0, -5.0));
        }
        meshes.set_flags(gizmo, MeshFlags::DEV_ONLY | MeshFlags::SHOULD_DRAW);
        meshes.set_flags(hidden, MeshFlags::empty());

        assert!(fixture.draw(&meshes, false).is_empty());
        assert_eq!(fixture.draw(&meshes, true).len(), 1);
    }

    #[test]
    fn test_failing_mesh_is_skipped() {
        let mut fixture = Fixture::new();
        let meshes = MeshManager::new();
        let broken = Material::standard().with_property(DIFFUSE, MaterialProperty::texture("Nope"));
        for material in [broken, Material::standard()] {
            let handle = meshes.add_mesh(cube(), material);
            place(&meshes, handle, Vector3::new(0.0, 0.0, -5.0));
        }

        assert_eq!(fixture.draw(&meshes, false).len(), 1);
    }

    #[test]
    fn test_updates_are_coalesced() {
        let meshes = MeshManager::new();
        let handle = meshes.add_mesh(cube(), Material::standard());

        assert!(meshes.update_mesh(handle, SurfaceData::make_unit_xy_quad()));
        assert!(meshes.update_mesh(handle, SurfaceData::make_cube(Matrix4::new_scaling(4.0))));
        assert_eq!(meshes.pending_update_count(), 1);
        assert_eq!(meshes.with_mesh(handle, |m| m.revision()), Some(0));

        assert_eq!(meshes.apply_pending_updates(), 1);
        assert_eq!(meshes.apply_pending_updates(), 0);
        let (revision, bounds) = meshes
            .with_mesh(handle, |m| (m.revision(), m.local_bounds()))
            .unwrap();
        assert_eq!(revision, 1);
        assert_eq!(bounds.max, Vector3::repeat(2.0));

        meshes.remove_mesh(handle);
        assert!(!meshes.update_mesh(handle, cube()));
    }

    #[test]
    fn test_updates_wait_for_traversal() {
        let meshes = MeshManager::new();
        let handle = meshes.add_mesh(cube(), Material::standard());
        meshes.update_mesh(handle, SurfaceData::make_unit_xy_quad());

        let scope = meshes.traverse();
        assert_eq!(meshes.apply_pending_updates(), 0);
        drop(scope);
        assert_eq!(meshes.apply_pending_updates(), 1);
    }

    #[test]
    fn test_removal_inside_traversal_is_deferred() {
        let meshes = MeshManager::new();
        let handle = meshes.add_mesh(cube(), Material::standard());

        {
            let _outer = meshes.traverse();
            {
                let _inner = meshes.traverse();
                assert!(meshes.remove_mesh(handle));
            }
            assert!(meshes.contains(handle));
        }
        assert!(!meshes.contains(handle));
        assert!(!meshes.remove_mesh(handle));
    }

    #[test]
    fn test_removal_from_other_thread_waits_for_traversal() {
        let meshes = Arc::new(MeshManager::new());
        let handle = meshes.add_mesh(cube(), Material::standard());
        let traversal_finished = Arc::new(AtomicBool::new(false));

        let scope = meshes.traverse();
        let remover = {
            let meshes = meshes.clone();
            let traversal_finished = traversal_finished.clone();
            thread::spawn(move || {
                assert!(meshes.remove_mesh(handle));
                assert!(traversal_finished.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(meshes.contains(handle));
        traversal_finished.store(true, Ordering::SeqCst);
        drop(scope);

        remover.join().unwrap();
        assert!(!meshes.contains(handle));
    }
}
