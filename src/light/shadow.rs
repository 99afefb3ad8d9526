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

//! Shadow maps of individual lights.
//!
//! Every shadow casting light owns its own targets, they are not shared through the texture
//! registry because nothing but the forward pass reads them. Casters are drawn with front faces
//! culled to reduce acne.

use crate::{
    light::csm::{Cascade, CSM_NUM_CASCADES},
    material::FallbackTextures,
    mesh::{cache::GeometryCache, MeshDrawContext, MeshFilter, MeshManager},
    shader::{PassBindings, RenderProgram, ShaderKey, ShaderLibrary},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use std::{cell::RefCell, rc::Rc};
use umbra_core::{
    algebra::{Matrix4, Point3, Vector3},
    color::Color,
    math::{frustum::Frustum, Rect},
};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::{CubeMapFace, GpuTexture, PixelKind},
    server::GraphicsServer,
    ColorMask, CompareFunc, CullFace, DrawParameters,
};

pub const SHADOW_PASS_NAME: &str = "Shadows";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadowMapKind {
    /// Square depth atlas, one quadrant per cascade.
    CascadeAtlas,
    /// Single perspective depth map.
    Projected,
    /// Cube map of normalized distances to the light.
    Cube,
}

pub struct ShadowResources {
    kind: ShadowMapKind,
    size: usize,
    frame_buffer: Box<dyn FrameBuffer>,
}

fn depth_map(
    server: &dyn GraphicsServer,
    name: &str,
    size: usize,
) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
    RenderTargetDescriptor::rectangle(PixelKind::D32F, size, size).create(server, name)
}

impl ShadowResources {
    pub fn cascade_atlas(
        server: &dyn GraphicsServer,
        name: &str,
        size: usize,
    ) -> Result<Self, FrameworkError> {
        let depth = depth_map(server, name, size)?;
        Ok(Self {
            kind: ShadowMapKind::CascadeAtlas,
            size,
            frame_buffer: server.create_frame_buffer(name, Some(Attachment::depth(depth)), vec![])?,
        })
    }

    pub fn projected(
        server: &dyn GraphicsServer,
        name: &str,
        size: usize,
    ) -> Result<Self, FrameworkError> {
        let depth = depth_map(server, name, size)?;
        Ok(Self {
            kind: ShadowMapKind::Projected,
            size,
            frame_buffer: server.create_frame_buffer(name, Some(Attachment::depth(depth)), vec![])?,
        })
    }

    pub fn cube(server: &dyn GraphicsServer, name: &str, size: usize) -> Result<Self, FrameworkError> {
        let depth = depth_map(server, &format!("{name}Depth"), size)?;
        let distance = RenderTargetDescriptor::cube(PixelKind::R16F, size)
            .with_linear_filtering()
            .create(server, name)?;
        Ok(Self {
            kind: ShadowMapKind::Cube,
            size,
            frame_buffer: server.create_frame_buffer(
                name,
                Some(Attachment::depth(depth)),
                vec![Attachment::color(distance)],
            )?,
        })
    }

    pub fn kind(&self) -> ShadowMapKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Texture sampled by the forward pass.
    pub fn texture(&self) -> Option<Rc<RefCell<dyn GpuTexture>>> {
        match self.kind {
            ShadowMapKind::Cube => self.frame_buffer.color_texture(0),
            ShadowMapKind::CascadeAtlas | ShadowMapKind::Projected => self
                .frame_buffer
                .depth_attachment()
                .map(|attachment| attachment.texture.clone()),
        }
    }

    /// Viewport of a cascade inside of the atlas.
    pub fn cascade_viewport(&self, index: usize) -> Rect<i32> {
        let half = (self.size / 2) as i32;
        Rect::new((index % 2) as i32 * half, (index / 2) as i32 * half, half, half)
    }
}

/// Everything shadow rendering borrows from the render context.
pub struct ShadowRenderContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub meshes: &'a MeshManager,
    pub shaders: &'a mut ShaderLibrary,
    pub geometry_cache: &'a mut GeometryCache,
    pub textures: &'a TextureRegistry,
    pub fallbacks: &'a FallbackTextures,
}

fn caster_params(write_color: bool) -> DrawParameters {
    DrawParameters {
        cull_face: Some(CullFace::Back.flipped()),
        color_write: ColorMask::all(write_color),
        depth_write: true,
        depth_test: Some(CompareFunc::Less),
        ..DrawParameters::default()
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_casters(
    ctx: &mut ShadowRenderContext,
    frame_buffer: &mut dyn FrameBuffer,
    viewport: Rect<i32>,
    view_projection: Matrix4<f32>,
    observer_position: Vector3<f32>,
    program: Rc<RenderProgram>,
    pass: &PassBindings,
    write_color: bool,
) -> Result<RenderPassStatistics, FrameworkError> {
    let frustum = Frustum::from_view_projection_matrix(view_projection).ok_or_else(|| {
        FrameworkError::Custom("Degenerate light view projection matrix".to_string())
    })?;

    ctx.meshes.draw(&mut MeshDrawContext {
        pass_name: SHADOW_PASS_NAME,
        server: ctx.server,
        frame_buffer,
        viewport,
        frustum,
        view_projection,
        observer_position,
        params: caster_params(write_color),
        filter: MeshFilter::OpaqueOnly,
        include_dev_only: false,
        shader_override: Some(program),
        bind_material: false,
        shaders: &mut *ctx.shaders,
        geometry_cache: &mut *ctx.geometry_cache,
        textures: ctx.textures,
        fallbacks: ctx.fallbacks,
        pass,
    })
}

/// Renders every cascade into its quadrant of the atlas.
pub fn render_cascades(
    resources: &mut ShadowResources,
    ctx: &mut ShadowRenderContext,
    cascades: &[Cascade; CSM_NUM_CASCADES],
    observer_position: Vector3<f32>,
) -> Result<RenderPassStatistics, FrameworkError> {
    let program = ctx.shaders.get(ctx.server, &ShaderKey::shadow())?;
    let size = resources.size as i32;
    resources
        .frame_buffer
        .clear(Rect::new(0, 0, size, size), None, Some(1.0), None);

    let mut statistics = RenderPassStatistics::default();
    for (index, cascade) in cascades.iter().enumerate() {
        let viewport = resources.cascade_viewport(index);
        statistics += draw_casters(
            ctx,
            &mut *resources.frame_buffer,
            viewport,
            cascade.view_projection,
            observer_position,
            program.clone(),
            &PassBindings::default(),
            false,
        )?;
    }
    Ok(statistics)
}

pub fn render_projected(
    resources: &mut ShadowResources,
    ctx: &mut ShadowRenderContext,
    view_projection: Matrix4<f32>,
    light_position: Vector3<f32>,
) -> Result<RenderPassStatistics, FrameworkError> {
    let program = ctx.shaders.get(ctx.server, &ShaderKey::shadow())?;
    let size = resources.size as i32;
    let viewport = Rect::new(0, 0, size, size);
    resources.frame_buffer.clear(viewport, None, Some(1.0), None);

    draw_casters(
        ctx,
        &mut *resources.frame_buffer,
        viewport,
        view_projection,
        light_position,
        program,
        &PassBindings::default(),
        false,
    )
}

/// Look and up vectors of every cube map face, in [`CubeMapFace::ALL`] order.
pub const CUBE_FACE_BASES: [(Vector3<f32>, Vector3<f32>); 6] = [
    (Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, -1.0, 0.0)),
    (Vector3::new(-1.0, 0.0, 0.0), Vector3::new(0.0, -1.0, 0.0)),
    (Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0)),
    (Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, 0.0, -1.0)),
    (Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, -1.0, 0.0)),
    (Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, -1.0, 0.0)),
];

pub fn cube_face_view(position: Vector3<f32>, face: usize) -> Matrix4<f32> {
    let (look, up) = CUBE_FACE_BASES[face];
    let eye = Point3::from(position);
    Matrix4::look_at_rh(&eye, &(eye + look), &up)
}

pub fn cube_face_projection(z_near: f32, z_far: f32) -> Matrix4<f32> {
    Matrix4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, z_near, z_far)
}

/// Renders distances to the light into all six faces of the cube map.
pub fn render_cube(
    resources: &mut ShadowResources,
    ctx: &mut ShadowRenderContext,
    light_position: Vector3<f32>,
    z_near: f32,
    z_far: f32,
) -> Result<RenderPassStatistics, FrameworkError> {
    let program = ctx.shaders.get(ctx.server, &ShaderKey::point_shadow())?;
    let size = resources.size as i32;
    let viewport = Rect::new(0, 0, size, size);
    let projection = cube_face_projection(z_near, z_far);

    let mut pass = PassBindings::default();
    pass.set_uniform("lightPosition", light_position)
        .set_uniform("lightZFar", z_far);

    let mut statistics = RenderPassStatistics::default();
    for (index, face) in CubeMapFace::ALL.into_iter().enumerate() {
        resources.frame_buffer.set_cubemap_face(0, face);
        // Cleared to the largest normalized distance, so empty directions are lit.
        resources
            .frame_buffer
            .clear(viewport, Some(Color::WHITE), Some(1.0), None);

        statistics += draw_casters(
            ctx,
            &mut *resources.frame_buffer,
            viewport,
            projection * cube_face_view(light_position, index),
            light_position,
            program.clone(),
            &pass,
            true,
        )?;
    }
    Ok(statistics)
}
