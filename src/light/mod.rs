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

//! Light sources and their shadows.
//!
//! The forward pass is lit by at most [`MAX_LIGHTS`] point and spot lights plus one sun. Every
//! shadow casting light owns its shadow map, the sun renders [`CSM_NUM_CASCADES`] cascades into
//! the quadrants of a single atlas.

pub mod constructor;
pub mod csm;
pub mod shadow;

use crate::{
    light::{
        constructor::{LightConstructorContainer, TypeNameProvider},
        csm::{compute_cascades, Cascade, FrustumSplitOptions, CSM_NUM_CASCADES},
        shadow::{ShadowMapKind, ShadowRenderContext, ShadowResources, SHADOW_PASS_NAME},
    },
    material::FallbackTextures,
    settings::ShadowSettings,
    shader::PassBindings,
    stats::{LightingStatistics, RenderPassStatistics},
    viewport::Viewport,
};
use slotmap::{new_key_type, SlotMap};
use umbra_core::{
    algebra::{Matrix4, Point3, Vector3, Vector4},
    color::Color,
    err, warn,
};
use umbra_graphics::{error::FrameworkError, server::GraphicsServer};

/// Maximum amount of point and spot lights, the sun is not counted.
pub const MAX_LIGHTS: usize = 4;

/// Kind values of `lightParameters.w` in the forward shader.
const POINT_LIGHT_KIND: f32 = 0.0;
const SPOT_LIGHT_KIND: f32 = 1.0;

new_key_type! {
    pub struct LightHandle;
}

/// Properties every light has.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseLight {
    pub color: Color,
    pub ambient_color: Color,
    pub brightness: f32,
    pub enabled: bool,
    pub cast_shadows: bool,
    pub z_near: f32,
    /// Upper bound of the shadow projection depth.
    pub z_far: f32,
    /// Overrides the shadow map size of the quality settings.
    pub shadow_map_size: Option<usize>,
}

impl Default for BaseLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            ambient_color: Color::opaque(20, 20, 20),
            brightness: 1.0,
            enabled: true,
            cast_shadows: true,
            z_near: 0.01,
            z_far: 1024.0,
            shadow_map_size: None,
        }
    }
}

impl BaseLight {
    /// Linear color premultiplied by brightness.
    pub fn intensity(&self) -> Vector4<f32> {
        let color = self.color.as_frgb() * self.brightness;
        Vector4::new(color.x, color.y, color.z, 1.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub base: BaseLight,
    pub position: Vector3<f32>,
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            base: Default::default(),
            position: Default::default(),
            radius: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpotLight {
    pub base: BaseLight,
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    /// Full angle of the fully lit cone in radians.
    pub hotspot_cone_angle: f32,
    /// Angle added to the hotspot over which light fades out.
    pub falloff_angle_delta: f32,
    pub distance: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            base: Default::default(),
            position: Default::default(),
            direction: -Vector3::y(),
            hotspot_cone_angle: 90.0f32.to_radians(),
            falloff_angle_delta: 5.0f32.to_radians(),
            distance: 10.0,
        }
    }
}

impl SpotLight {
    pub fn full_cone_angle(&self) -> f32 {
        (self.hotspot_cone_angle + self.falloff_angle_delta).min(179.0f32.to_radians())
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        let direction = self
            .direction
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| -Vector3::y());
        let eye = Point3::from(self.position);
        let view = Matrix4::look_at_rh(&eye, &(eye + direction), &up_for(direction));
        let projection = Matrix4::new_perspective(
            1.0,
            self.full_cone_angle(),
            self.base.z_near,
            self.distance.min(self.base.z_far),
        );
        projection * view
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SunLight {
    pub base: BaseLight,
    /// Direction the light travels in.
    pub direction: Vector3<f32>,
    /// Uses the split of the quality settings when `None`.
    pub split_options: Option<FrustumSplitOptions>,
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            base: Default::default(),
            direction: Vector3::new(0.3, -1.0, 0.2),
            split_options: None,
        }
    }
}

impl TypeNameProvider for PointLight {
    fn type_name() -> &'static str {
        "PointLight"
    }
}

impl TypeNameProvider for SpotLight {
    fn type_name() -> &'static str {
        "SpotLight"
    }
}

impl TypeNameProvider for SunLight {
    fn type_name() -> &'static str {
        "SunLight"
    }
}

fn up_for(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.y.abs() > 0.99 {
        Vector3::z()
    } else {
        Vector3::y()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Point(PointLight),
    Spot(SpotLight),
    Sun(SunLight),
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Self::Point(light)
    }
}

impl From<SpotLight> for Light {
    fn from(light: SpotLight) -> Self {
        Self::Spot(light)
    }
}

impl From<SunLight> for Light {
    fn from(light: SunLight) -> Self {
        Self::Sun(light)
    }
}

impl Light {
    pub fn base(&self) -> &BaseLight {
        match self {
            Light::Point(light) => &light.base,
            Light::Spot(light) => &light.base,
            Light::Sun(light) => &light.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseLight {
        match self {
            Light::Point(light) => &mut light.base,
            Light::Spot(light) => &mut light.base,
            Light::Sun(light) => &mut light.base,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Light::Point(_) => PointLight::type_name(),
            Light::Spot(_) => SpotLight::type_name(),
            Light::Sun(_) => SunLight::type_name(),
        }
    }

    pub fn is_sun(&self) -> bool {
        matches!(self, Light::Sun(_))
    }

    /// Light space view-projection matrices: one per cascade for the sun, the spot cone for
    /// spot lights. Point lights expose the 90 degree projection shared by all cube faces.
    pub fn projection_matrices(
        &self,
        camera: &Viewport,
        default_split: &FrustumSplitOptions,
    ) -> Vec<Matrix4<f32>> {
        match self {
            Light::Point(light) => vec![shadow::cube_face_projection(
                light.base.z_near,
                light.radius.min(light.base.z_far),
            )],
            Light::Spot(light) => vec![light.view_projection()],
            Light::Sun(light) => compute_cascades(
                camera,
                light.direction,
                light.split_options.as_ref().unwrap_or(default_split),
            )
            .iter()
            .map(|cascade| cascade.view_projection)
            .collect(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddLightResult {
    Added(LightHandle),
    /// Every slot is taken, the light was not added.
    DroppedAtCapacity,
}

struct LightEntry {
    light: Light,
    shadow: Option<ShadowResources>,
}

impl LightEntry {
    fn shadow_name(&self, handle: LightHandle) -> String {
        format!("{}Shadow{:?}", self.light.type_name(), handle)
    }

    fn shadow_map_size(&self, settings: &ShadowSettings) -> usize {
        self.light.base().shadow_map_size.unwrap_or(if self.light.is_sun() {
            settings.sun_map_size
        } else {
            settings.light_map_size
        })
    }

    /// Creates (or recreates, when the size has changed) the shadow map of the light.
    fn ensure_shadow(
        &mut self,
        handle: LightHandle,
        server: &dyn GraphicsServer,
        settings: &ShadowSettings,
    ) -> Result<&mut ShadowResources, FrameworkError> {
        let size = self.shadow_map_size(settings);
        let name = self.shadow_name(handle);
        if self.shadow.as_ref().map_or(true, |shadow| shadow.size() != size) {
            self.shadow = None;
            self.shadow = Some(match self.light {
                Light::Point(_) => ShadowResources::cube(server, &name, size)?,
                Light::Spot(_) => ShadowResources::projected(server, &name, size)?,
                Light::Sun(_) => ShadowResources::cascade_atlas(server, &name, size)?,
            });
        }
        self.shadow
            .as_mut()
            .ok_or_else(move || FrameworkError::resource_not_found(name))
    }
}

pub struct LightManager {
    entries: SlotMap<LightHandle, LightEntry>,
    sun: Option<LightHandle>,
    cascades: Option<[Cascade; CSM_NUM_CASCADES]>,
    constructors: LightConstructorContainer,
}

impl Default for LightManager {
    fn default() -> Self {
        Self {
            entries: Default::default(),
            sun: None,
            cascades: None,
            constructors: LightConstructorContainer::new(),
        }
    }
}

impl LightManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light. A sun replaces the current one and gets its shadow map right away, point
    /// and spot lights are dropped once [`MAX_LIGHTS`] of them exist.
    pub fn add_light(
        &mut self,
        light: Light,
        server: &dyn GraphicsServer,
        settings: &ShadowSettings,
    ) -> Result<AddLightResult, FrameworkError> {
        if light.is_sun() {
            let casts_shadows = light.base().cast_shadows;
            let handle = self.entries.insert(LightEntry {
                light,
                shadow: None,
            });
            if casts_shadows {
                if let Err(error) = self.entries[handle].ensure_shadow(handle, server, settings) {
                    self.entries.remove(handle);
                    return Err(error);
                }
            }
            if let Some(previous) = self.sun.replace(handle) {
                self.entries.remove(previous);
            }
            self.cascades = None;
            return Ok(AddLightResult::Added(handle));
        }

        if self.local_light_count() >= MAX_LIGHTS {
            warn!(
                "Unable to add {}: light limit of {MAX_LIGHTS} is reached.",
                light.type_name()
            );
            return Ok(AddLightResult::DroppedAtCapacity);
        }

        Ok(AddLightResult::Added(self.entries.insert(LightEntry {
            light,
            shadow: None,
        })))
    }

    /// Removes a light together with its shadow map.
    pub fn remove_light(&mut self, handle: LightHandle) -> bool {
        if self.sun == Some(handle) {
            self.sun = None;
            self.cascades = None;
        }
        self.entries.remove(handle).is_some()
    }

    pub fn light(&self, handle: LightHandle) -> Option<&Light> {
        self.entries.get(handle).map(|entry| &entry.light)
    }

    /// Parameters shared by every kind of light. The kind itself is fixed once a light is added,
    /// a light of another kind must be added instead.
    pub fn base_mut(&mut self, handle: LightHandle) -> Option<&mut BaseLight> {
        self.entries
            .get_mut(handle)
            .map(|entry| entry.light.base_mut())
    }

    pub fn point_mut(&mut self, handle: LightHandle) -> Option<&mut PointLight> {
        match self.entries.get_mut(handle).map(|entry| &mut entry.light) {
            Some(Light::Point(point)) => Some(point),
            _ => None,
        }
    }

    pub fn spot_mut(&mut self, handle: LightHandle) -> Option<&mut SpotLight> {
        match self.entries.get_mut(handle).map(|entry| &mut entry.light) {
            Some(Light::Spot(spot)) => Some(spot),
            _ => None,
        }
    }

    pub fn sun_mut(&mut self) -> Option<&mut SunLight> {
        let handle = self.sun?;
        match self.entries.get_mut(handle).map(|entry| &mut entry.light) {
            Some(Light::Sun(sun)) => Some(sun),
            _ => None,
        }
    }

    pub fn sun(&self) -> Option<&SunLight> {
        self.sun
            .and_then(|handle| match self.light(handle) {
                Some(Light::Sun(sun)) => Some(sun),
                _ => None,
            })
    }

    pub fn sun_handle(&self) -> Option<LightHandle> {
        self.sun
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightHandle, &Light)> {
        self.entries.iter().map(|(handle, entry)| (handle, &entry.light))
    }

    pub fn shadow_resources(&self, handle: LightHandle) -> Option<&ShadowResources> {
        self.entries.get(handle).and_then(|entry| entry.shadow.as_ref())
    }

    /// Total amount of lights, the sun included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Amount of point and spot lights.
    pub fn local_light_count(&self) -> usize {
        self.entries.len() - usize::from(self.sun.is_some())
    }

    pub fn constructors(&self) -> &LightConstructorContainer {
        &self.constructors
    }

    /// Creates a light of a registered type, see [`LightConstructorContainer`].
    pub fn create_light(&self, type_name: &str) -> Option<Light> {
        self.constructors.try_create(type_name)
    }

    /// Cascades rendered by the last [`Self::draw_shadows`], if the sun casts shadows.
    pub fn cascades(&self) -> Option<&[Cascade; CSM_NUM_CASCADES]> {
        self.cascades.as_ref()
    }

    /// Renders shadow maps of every enabled shadow casting light. A light whose shadow map fails
    /// is logged and left without shadows for the frame, other lights are not affected.
    pub fn draw_shadows(
        &mut self,
        ctx: &mut ShadowRenderContext,
        camera: &Viewport,
        settings: &ShadowSettings,
    ) -> (RenderPassStatistics, LightingStatistics) {
        let mut pass_statistics = RenderPassStatistics::default();
        let mut statistics = LightingStatistics::default();
        self.cascades = None;

        for (handle, entry) in self.entries.iter_mut() {
            let base = entry.light.base();
            if !base.enabled {
                continue;
            }
            match entry.light {
                Light::Point(_) => statistics.point_lights_rendered += 1,
                Light::Spot(_) => statistics.spot_lights_rendered += 1,
                Light::Sun(_) => statistics.sun_lights_rendered += 1,
            }
            if !base.cast_shadows || !settings.enabled {
                continue;
            }

            let light = entry.light.clone();
            let result = entry
                .ensure_shadow(handle, ctx.server, settings)
                .and_then(|resources| match &light {
                    Light::Point(point) => shadow::render_cube(
                        resources,
                        ctx,
                        point.position,
                        point.base.z_near,
                        point.radius.min(point.base.z_far),
                    ),
                    Light::Spot(spot) => shadow::render_projected(
                        resources,
                        ctx,
                        spot.view_projection(),
                        spot.position,
                    ),
                    Light::Sun(sun) => {
                        let cascades = compute_cascades(
                            camera,
                            sun.direction,
                            sun.split_options.as_ref().unwrap_or(&settings.split_options),
                        );
                        let stats =
                            shadow::render_cascades(resources, ctx, &cascades, camera.position())?;
                        self.cascades = Some(cascades);
                        Ok(stats)
                    }
                });

            match result {
                Ok(stats) => {
                    pass_statistics += stats;
                    match light {
                        Light::Point(_) => statistics.point_shadow_maps_rendered += 1,
                        Light::Spot(_) => statistics.spot_shadow_maps_rendered += 1,
                        Light::Sun(_) => statistics.cascades_rendered += CSM_NUM_CASCADES,
                    }
                }
                Err(error) => {
                    statistics.shadow_failures += 1;
                    err!(
                        "{SHADOW_PASS_NAME}: unable to render shadows of {}. Reason: {error}",
                        entry.shadow_name(handle)
                    );
                }
            }
        }

        (pass_statistics, statistics)
    }

    /// Uniforms and samplers of the forward shader. Unused shadow slots are bound to fallback
    /// textures that mean "fully lit".
    pub fn bind_uniforms(&self, camera: &Viewport, fallbacks: &FallbackTextures) -> PassBindings {
        let mut bindings = PassBindings::new();
        bindings.set_uniform("cameraPosition", camera.position());

        let mut ambient = Vector3::<f32>::zeros();
        let mut positions = vec![Vector3::zeros(); MAX_LIGHTS];
        let mut directions = vec![Vector3::zeros(); MAX_LIGHTS];
        let mut colors = vec![Vector4::zeros(); MAX_LIGHTS];
        let mut parameters = vec![Vector4::zeros(); MAX_LIGHTS];
        let mut shadows = vec![0.0f32; MAX_LIGHTS];
        let mut shadow_far = vec![1.0f32; MAX_LIGHTS];
        let mut view_projections = vec![Matrix4::identity(); MAX_LIGHTS];
        let mut shadow_maps = vec![fallbacks.white.clone(); MAX_LIGHTS];
        let mut point_shadow_maps = vec![fallbacks.white_cube.clone(); MAX_LIGHTS];

        let mut count = 0;
        for (_, entry) in self.entries.iter() {
            let base = entry.light.base();
            if !base.enabled {
                continue;
            }
            ambient += base.ambient_color.as_frgb();

            let slot = count;
            let shadow = entry.shadow.as_ref().and_then(|shadow| shadow.texture());
            match &entry.light {
                Light::Point(point) => {
                    positions[slot] = point.position;
                    parameters[slot] = Vector4::new(point.radius, 0.0, 0.0, POINT_LIGHT_KIND);
                    shadow_far[slot] = point.radius.min(base.z_far);
                    if let Some(texture) = shadow {
                        shadows[slot] = 1.0;
                        point_shadow_maps[slot] = texture;
                    }
                }
                Light::Spot(spot) => {
                    positions[slot] = spot.position;
                    directions[slot] = spot
                        .direction
                        .try_normalize(f32::EPSILON)
                        .unwrap_or_else(|| -Vector3::y());
                    parameters[slot] = Vector4::new(
                        spot.distance,
                        (spot.hotspot_cone_angle * 0.5).cos(),
                        (spot.full_cone_angle() * 0.5).cos(),
                        SPOT_LIGHT_KIND,
                    );
                    view_projections[slot] = spot.view_projection();
                    if let Some(texture) = shadow {
                        shadows[slot] = 1.0;
                        shadow_maps[slot] = texture;
                    }
                }
                Light::Sun(_) => continue,
            }
            colors[slot] = base.intensity();
            count += 1;
        }

        bindings
            .set_uniform("ambientColor", Vector4::new(ambient.x, ambient.y, ambient.z, 1.0))
            .set_uniform("lightCount", count as i32)
            .set_uniform("lightPositions", positions)
            .set_uniform("lightDirections", directions)
            .set_uniform("lightColors", colors)
            .set_uniform("lightParameters", parameters)
            .set_uniform("lightShadows", shadows)
            .set_uniform("lightShadowFar", shadow_far)
            .set_uniform("lightViewProjections", view_projections);
        for (i, (map, point_map)) in shadow_maps.into_iter().zip(point_shadow_maps).enumerate() {
            bindings
                .set_texture(&format!("shadowMap{i}"), map)
                .set_texture(&format!("pointShadowMap{i}"), point_map);
        }

        let sun = self
            .sun
            .and_then(|handle| self.entries.get(handle))
            .filter(|entry| entry.light.base().enabled);
        let sun_shadow = sun
            .and_then(|entry| entry.shadow.as_ref())
            .filter(|shadow| shadow.kind() == ShadowMapKind::CascadeAtlas)
            .and_then(|shadow| shadow.texture())
            .zip(self.cascades.as_ref());

        match sun.map(|entry| &entry.light) {
            Some(Light::Sun(light)) => {
                bindings
                    .set_uniform("sunEnabled", true)
                    .set_uniform(
                        "sunDirection",
                        light
                            .direction
                            .try_normalize(f32::EPSILON)
                            .unwrap_or_else(|| -Vector3::y()),
                    )
                    .set_uniform("sunColor", light.base.intensity());
            }
            _ => {
                bindings.set_uniform("sunEnabled", false);
            }
        }

        match sun_shadow {
            Some((texture, cascades)) => {
                bindings
                    .set_uniform("sunShadowsEnabled", true)
                    .set_uniform(
                        "sunCascadeMatrices",
                        cascades.iter().map(|c| c.view_projection).collect::<Vec<_>>(),
                    )
                    .set_uniform(
                        "sunCascadeDistances",
                        cascades.iter().map(|c| c.z_far).collect::<Vec<_>>(),
                    )
                    .set_texture("sunShadowMap", texture);
            }
            None => {
                bindings
                    .set_uniform("sunShadowsEnabled", false)
                    .set_texture("sunShadowMap", fallbacks.white.clone());
            }
        }

        bindings
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        material::Material,
        mesh::{cache::GeometryCache, surface::SurfaceData, MeshManager},
        settings::QualitySettings,
        shader::ShaderLibrary,
        texture_registry::TextureRegistry,
        transform::TransformSnapshot,
        viewport::PerspectiveProjection,
    };
    use umbra_core::algebra::Vector2;
    use umbra_graphics::gpu_program::UniformValue;
    use umbra_graphics_headless::HeadlessServer;

    fn small_shadows() -> ShadowSettings {
        ShadowSettings {
            sun_map_size: 64,
            light_map_size: 16,
            ..QualitySettings::high().shadows
        }
    }

    #[test]
    fn test_capacity() {
        let server = HeadlessServer::new(1, 1);
        let mut lights = LightManager::new();
        let settings = small_shadows();

        for _ in 0..MAX_LIGHTS {
            let result = lights
                .add_light(PointLight::default().into(), &*server, &settings)
                .unwrap();
            assert!(matches!(result, AddLightResult::Added(_)));
        }
        assert_eq!(
            lights
                .add_light(SpotLight::default().into(), &*server, &settings)
                .unwrap(),
            AddLightResult::DroppedAtCapacity
        );

        // The sun has its own slot.
        assert!(matches!(
            lights
                .add_light(SunLight::default().into(), &*server, &settings)
                .unwrap(),
            AddLightResult::Added(_)
        ));
        assert_eq!(lights.len(), MAX_LIGHTS + 1);
        assert_eq!(lights.local_light_count(), MAX_LIGHTS);
    }

    #[test]
    fn test_mutable_access_keeps_light_kind() {
        let server = HeadlessServer::new(1, 1);
        let mut lights = LightManager::new();
        let settings = small_shadows();

        let AddLightResult::Added(sun) = lights
            .add_light(SunLight::default().into(), &*server, &settings)
            .unwrap()
        else {
            panic!("sun must be added");
        };
        let AddLightResult::Added(point) = lights
            .add_light(PointLight::default().into(), &*server, &settings)
            .unwrap()
        else {
            panic!("point light must be added");
        };

        // Kind-specific access only succeeds for the matching kind.
        assert!(lights.point_mut(sun).is_none());
        assert!(lights.spot_mut(point).is_none());
        lights.point_mut(point).unwrap().radius = 3.0;
        lights.sun_mut().unwrap().direction = Vector3::new(0.0, -1.0, 0.0);
        lights.base_mut(sun).unwrap().brightness = 2.0;

        assert!(matches!(lights.light(point), Some(Light::Point(p)) if p.radius == 3.0));
        assert_eq!(lights.sun().unwrap().base.brightness, 2.0);
        assert_eq!(lights.sun_handle(), Some(sun));

        for _ in 0..10 {
            lights
                .add_light(PointLight::default().into(), &*server, &settings)
                .unwrap();
        }
        assert_eq!(lights.local_light_count(), MAX_LIGHTS);
        assert!(lights.sun().is_some());
    }

    #[test]
    fn test_sun_replacement() {
        let server = HeadlessServer::new(1, 1);
        let mut lights = LightManager::new();
        let settings = small_shadows();

        let AddLightResult::Added(first) = lights
            .add_light(SunLight::default().into(), &*server, &settings)
            .unwrap()
        else {
            panic!("sun must be added");
        };
        assert_eq!(
            lights.shadow_resources(first).unwrap().kind(),
            ShadowMapKind::CascadeAtlas
        );

        let mut red = SunLight::default();
        red.base.color = Color::RED;
        let AddLightResult::Added(second) =
            lights.add_light(red.into(), &*server, &settings).unwrap()
        else {
            panic!("sun must be added");
        };

        assert!(lights.light(first).is_none());
        assert_eq!(lights.sun_handle(), Some(second));
        assert_eq!(lights.sun().unwrap().base.color, Color::RED);
        assert_eq!(lights.len(), 1);
        // Atlas of the replaced sun is released.
        assert_eq!(server.live_texture_count(), 1);

        assert!(lights.remove_light(second));
        assert!(lights.sun().is_none());
        assert_eq!(server.live_texture_count(), 0);
    }

    #[test]
    fn test_failed_sun_is_not_added() {
        let server = HeadlessServer::new(1, 1);
        server.set_max_texture_size(Some(32));
        let mut lights = LightManager::new();
        assert!(lights
            .add_light(SunLight::default().into(), &*server, &small_shadows())
            .is_err());
        assert!(lights.is_empty());
        assert!(lights.sun_handle().is_none());
    }

    #[test]
    fn test_projection_matrix_count() {
        let camera = Viewport::new(Vector2::new(1.0, 1.0));
        let split = FrustumSplitOptions::default();
        for (light, count) in [
            (Light::from(SunLight::default()), CSM_NUM_CASCADES),
            (Light::from(SpotLight::default()), 1),
            (Light::from(PointLight::default()), 1),
        ] {
            assert_eq!(light.projection_matrices(&camera, &split).len(), count);
        }
    }

    #[test]
    fn test_light_constructors_are_reachable() {
        let lights = LightManager::new();
        assert!(lights.create_light("SpotLight").is_some());
        assert!(lights.create_light("Unknown").is_none());
    }

    #[test]
    fn test_draw_shadows() {
        let server = HeadlessServer::new(16, 16);
        let settings = small_shadows();
        let mut lights = LightManager::new();
        let point = PointLight {
            position: Vector3::new(0.0, 3.0, 0.0),
            ..Default::default()
        };
        let AddLightResult::Added(point) = lights.add_light(point.into(), &*server, &settings).unwrap()
        else {
            panic!()
        };
        let mut unlit = SpotLight::default();
        unlit.base.cast_shadows = false;
        lights.add_light(unlit.into(), &*server, &settings).unwrap();
        lights
            .add_light(SunLight::default().into(), &*server, &settings)
            .unwrap();

        let meshes = MeshManager::new();
        let cube = meshes.add_mesh(SurfaceData::make_cube(Matrix4::identity()), Material::standard());
        meshes
            .transform_source(cube)
            .unwrap()
            .store(TransformSnapshot::from_position(Vector3::new(0.0, 0.0, -3.0)));

        let mut camera = Viewport::new(Vector2::new(16.0, 16.0));
        camera.set_projection(PerspectiveProjection::default().with_z_near(0.1));
        let fallbacks = FallbackTextures::new(&*server).unwrap();
        let mut shaders = ShaderLibrary::default();
        let mut geometry_cache = GeometryCache::default();
        let textures = TextureRegistry::new();
        let mut ctx = ShadowRenderContext {
            server: &*server,
            meshes: &meshes,
            shaders: &mut shaders,
            geometry_cache: &mut geometry_cache,
            textures: &textures,
            fallbacks: &fallbacks,
        };

        let (pass, statistics) = lights.draw_shadows(&mut ctx, &camera, &settings);
        assert_eq!(statistics.point_lights_rendered, 1);
        assert_eq!(statistics.point_shadow_maps_rendered, 1);
        assert_eq!(statistics.spot_lights_rendered, 1);
        assert_eq!(statistics.spot_shadow_maps_rendered, 0);
        assert_eq!(statistics.cascades_rendered, CSM_NUM_CASCADES);
        assert_eq!(statistics.shadow_failures, 0);
        assert!(lights.cascades().is_some());
        assert_eq!(pass.draw_calls, server.draw_call_count());

        let calls = server.take_draw_calls();
        // Only cube faces write distances into color.
        let cube_faces = calls
            .iter()
            .filter(|call| call.params.color_write.red)
            .count();
        assert!((1..=6).contains(&cube_faces));
        for call in calls.iter() {
            assert_eq!(call.params.cull_face, Some(umbra_graphics::CullFace::Front));
        }

        let bindings = lights.bind_uniforms(&camera, &fallbacks);
        assert_eq!(bindings.uniform("lightCount"), Some(&UniformValue::Int(2)));
        assert_eq!(
            bindings.uniform("sunShadowsEnabled"),
            Some(&UniformValue::Bool(true))
        );
        // The point light was added first and takes the first slot.
        let point_map = lights.shadow_resources(point).unwrap().texture().unwrap();
        assert!(std::rc::Rc::ptr_eq(
            bindings.texture("pointShadowMap0").unwrap(),
            &point_map
        ));
        assert!(std::rc::Rc::ptr_eq(
            bindings.texture("shadowMap1").unwrap(),
            &fallbacks.white
        ));
    }

    #[test]
    fn test_disabled_shadows_bind_fallbacks() {
        let server = HeadlessServer::new(1, 1);
        let mut lights = LightManager::new();
        let mut settings = small_shadows();
        settings.enabled = false;
        let mut sun = SunLight::default();
        sun.base.cast_shadows = false;
        lights.add_light(sun.into(), &*server, &settings).unwrap();

        let fallbacks = FallbackTextures::new(&*server).unwrap();
        let bindings = lights.bind_uniforms(&Viewport::default(), &fallbacks);
        assert_eq!(bindings.uniform("sunEnabled"), Some(&UniformValue::Bool(true)));
        assert_eq!(bindings.uniform("sunShadowsEnabled"), Some(&UniformValue::Bool(false)));
        assert_eq!(bindings.uniform("lightCount"), Some(&UniformValue::Int(0)));
        let map = bindings.texture("sunShadowMap").unwrap();
        assert!(std::rc::Rc::ptr_eq(map, &fallbacks.white));
    }
}
