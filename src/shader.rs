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

//! Shader sources and compiled programs.
//!
//! Sources are registered by id in a [`ShaderSourceRegistry`], programs are identified by the
//! (vertex, geometry, fragment) triple of source ids ([`ShaderKey`]) and compiled on first use by
//! the [`ShaderLibrary`].

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, cell::RefCell, fmt::Display, rc::Rc};
use umbra_core::{err, ImmutableString};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::ResourceBinding,
    gpu_program::{GpuProgram, UniformLocation, UniformValue},
    gpu_texture::GpuTexture,
    server::GraphicsServer,
};

/// Ids of the sources every renderer has.
pub mod builtin {
    pub const FULL_SCREEN_VERTEX: &str = "FullScreen.vert";
    pub const GBUFFER_VERTEX: &str = "GBuffer.vert";
    pub const GBUFFER_FRAGMENT: &str = "GBuffer.frag";
    pub const FORWARD_VERTEX: &str = "Forward.vert";
    pub const FORWARD_FRAGMENT: &str = "Forward.frag";
    pub const SHADOW_VERTEX: &str = "Shadow.vert";
    pub const SHADOW_FRAGMENT: &str = "Shadow.frag";
    pub const POINT_SHADOW_FRAGMENT: &str = "PointShadow.frag";
    pub const SSAO_FRAGMENT: &str = "Ssao.frag";
    pub const BLUR_FRAGMENT: &str = "Blur.frag";
    pub const BLOOM_FRAGMENT: &str = "Bloom.frag";
    pub const REFLECTIONS_FRAGMENT: &str = "Reflections.frag";
    pub const DOWNSAMPLE_FRAGMENT: &str = "Downsample.frag";
    pub const COMPOSITE_FRAGMENT: &str = "Composite.frag";

    pub(super) const SOURCES: &[(&str, &str)] = &[
        (FULL_SCREEN_VERTEX, include_str!("shaders/full_screen_vs.glsl")),
        (GBUFFER_VERTEX, include_str!("shaders/gbuffer_vs.glsl")),
        (GBUFFER_FRAGMENT, include_str!("shaders/gbuffer_fs.glsl")),
        (FORWARD_VERTEX, include_str!("shaders/forward_vs.glsl")),
        (FORWARD_FRAGMENT, include_str!("shaders/forward_fs.glsl")),
        (SHADOW_VERTEX, include_str!("shaders/shadow_vs.glsl")),
        (SHADOW_FRAGMENT, include_str!("shaders/shadow_fs.glsl")),
        (POINT_SHADOW_FRAGMENT, include_str!("shaders/point_shadow_fs.glsl")),
        (SSAO_FRAGMENT, include_str!("shaders/ssao_fs.glsl")),
        (BLUR_FRAGMENT, include_str!("shaders/blur_fs.glsl")),
        (BLOOM_FRAGMENT, include_str!("shaders/bloom_fs.glsl")),
        (REFLECTIONS_FRAGMENT, include_str!("shaders/reflections_fs.glsl")),
        (DOWNSAMPLE_FRAGMENT, include_str!("shaders/downsample_fs.glsl")),
        (COMPOSITE_FRAGMENT, include_str!("shaders/composite_fs.glsl")),
    ];
}

/// Identifies a program by the ids of its stage sources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderKey {
    pub vertex: ImmutableString,
    pub geometry: Option<ImmutableString>,
    pub fragment: ImmutableString,
}

impl ShaderKey {
    pub fn new(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: ImmutableString::new(vertex),
            geometry: None,
            fragment: ImmutableString::new(fragment),
        }
    }

    pub fn with_geometry(vertex: &str, geometry: &str, fragment: &str) -> Self {
        Self {
            geometry: Some(ImmutableString::new(geometry)),
            ..Self::new(vertex, fragment)
        }
    }

    /// Full-screen pass with the given fragment shader.
    pub fn full_screen(fragment: &str) -> Self {
        Self::new(builtin::FULL_SCREEN_VERTEX, fragment)
    }

    /// Default program of materials, lit by the forward pass.
    pub fn forward() -> Self {
        Self::new(builtin::FORWARD_VERTEX, builtin::FORWARD_FRAGMENT)
    }

    pub fn gbuffer() -> Self {
        Self::new(builtin::GBUFFER_VERTEX, builtin::GBUFFER_FRAGMENT)
    }

    pub fn shadow() -> Self {
        Self::new(builtin::SHADOW_VERTEX, builtin::SHADOW_FRAGMENT)
    }

    pub fn point_shadow() -> Self {
        Self::new(builtin::SHADOW_VERTEX, builtin::POINT_SHADOW_FRAGMENT)
    }
}

impl Default for ShaderKey {
    fn default() -> Self {
        Self::forward()
    }
}

impl Display for ShaderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.geometry.as_ref() {
            Some(geometry) => write!(f, "{}+{}+{}", self.vertex, geometry, self.fragment),
            None => write!(f, "{}+{}", self.vertex, self.fragment),
        }
    }
}

/// Registration table of GLSL sources. Sources are stored without a `#version` directive.
pub struct ShaderSourceRegistry {
    sources: FxHashMap<ImmutableString, Cow<'static, str>>,
}

impl Default for ShaderSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderSourceRegistry {
    /// Creates a registry with every built-in source registered.
    pub fn new() -> Self {
        Self {
            sources: builtin::SOURCES
                .iter()
                .map(|(id, source)| (ImmutableString::new(id), Cow::Borrowed(*source)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            sources: Default::default(),
        }
    }

    /// Registers a source, returns the previous source with the same id.
    pub fn register<S>(&mut self, id: &str, source: S) -> Option<Cow<'static, str>>
    where
        S: Into<Cow<'static, str>>,
    {
        self.sources.insert(ImmutableString::new(id), source.into())
    }

    pub fn remove(&mut self, id: &str) -> Option<Cow<'static, str>> {
        self.sources.remove(id)
    }

    pub fn get(&self, id: &str) -> Result<&str, FrameworkError> {
        self.sources
            .get(id)
            .map(|source| source.as_ref())
            .ok_or_else(|| FrameworkError::UnknownShaderSource(id.to_owned()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A compiled program with a per-name cache of uniform locations. Uniforms the program does not
/// have (or the driver optimized out) are silently skipped when binding.
pub struct RenderProgram {
    key: ShaderKey,
    program: Box<dyn GpuProgram>,
    locations: RefCell<FxHashMap<ImmutableString, Option<UniformLocation>>>,
}

impl RenderProgram {
    pub fn new(key: ShaderKey, program: Box<dyn GpuProgram>) -> Self {
        Self {
            key,
            program,
            locations: Default::default(),
        }
    }

    pub fn key(&self) -> &ShaderKey {
        &self.key
    }

    pub fn gpu_program(&self) -> &dyn GpuProgram {
        &*self.program
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        if let Some(location) = self.locations.borrow().get(name) {
            return location.clone();
        }

        let name = ImmutableString::new(name);
        let location = self.program.uniform_location(&name).ok();
        self.locations.borrow_mut().insert(name, location.clone());
        location
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniform(name).is_some()
    }

    pub fn bind_uniform(
        &self,
        bindings: &mut Vec<ResourceBinding>,
        name: &str,
        value: impl Into<UniformValue>,
    ) {
        if let Some(location) = self.uniform(name) {
            bindings.push(ResourceBinding::uniform(&location, value));
        }
    }

    pub fn bind_texture(
        &self,
        bindings: &mut Vec<ResourceBinding>,
        name: &str,
        texture: &Rc<RefCell<dyn GpuTexture>>,
    ) {
        if let Some(location) = self.uniform(name) {
            bindings.push(ResourceBinding::texture(texture, &location));
        }
    }
}

/// Named uniforms and samplers prepared once per pass and applied to every program drawn in it.
#[derive(Default, Clone)]
pub struct PassBindings {
    uniforms: Vec<(ImmutableString, UniformValue)>,
    textures: Vec<(ImmutableString, Rc<RefCell<dyn GpuTexture>>)>,
}

impl PassBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> &mut Self {
        self.uniforms.push((ImmutableString::new(name), value.into()));
        self
    }

    pub fn set_texture(&mut self, name: &str, texture: Rc<RefCell<dyn GpuTexture>>) -> &mut Self {
        self.textures.push((ImmutableString::new(name), texture));
        self
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find_map(|(n, value)| (n.as_str() == name).then_some(value))
    }

    pub fn texture(&self, name: &str) -> Option<&Rc<RefCell<dyn GpuTexture>>> {
        self.textures
            .iter()
            .find_map(|(n, texture)| (n.as_str() == name).then_some(texture))
    }

    pub fn apply(&self, program: &RenderProgram, bindings: &mut Vec<ResourceBinding>) {
        for (name, value) in self.uniforms.iter() {
            program.bind_uniform(bindings, name, value.clone());
        }
        for (name, texture) in self.textures.iter() {
            program.bind_texture(bindings, name, texture);
        }
    }
}

/// Compiles programs on first use and caches them per [`ShaderKey`]. A failed compilation is
/// cached too, so a broken shader is reported once instead of every frame.
#[derive(Default)]
pub struct ShaderLibrary {
    sources: ShaderSourceRegistry,
    programs: FxHashMap<ShaderKey, Result<Rc<RenderProgram>, String>>,
}

impl ShaderLibrary {
    pub fn new(sources: ShaderSourceRegistry) -> Self {
        Self {
            sources,
            programs: Default::default(),
        }
    }

    pub fn sources(&self) -> &ShaderSourceRegistry {
        &self.sources
    }

    /// Gives access to the sources. Programs compiled before the change are kept, call
    /// [`Self::clear`] to recompile them.
    pub fn sources_mut(&mut self) -> &mut ShaderSourceRegistry {
        &mut self.sources
    }

    pub fn get(
        &mut self,
        server: &dyn GraphicsServer,
        key: &ShaderKey,
    ) -> Result<Rc<RenderProgram>, FrameworkError> {
        if let Some(cached) = self.programs.get(key) {
            return cached.clone().map_err(FrameworkError::Custom);
        }

        let result = self.compile(server, key);
        if let Err(error) = result.as_ref() {
            err!("Failed to create {key} program. Reason: {error}");
        }

        let cached = result.map_err(|error| error.to_string());
        self.programs.insert(key.clone(), cached.clone());
        cached.map_err(FrameworkError::Custom)
    }

    fn compile(
        &self,
        server: &dyn GraphicsServer,
        key: &ShaderKey,
    ) -> Result<Rc<RenderProgram>, FrameworkError> {
        let name = key.to_string();
        let vertex = self.sources.get(&key.vertex)?;
        let fragment = self.sources.get(&key.fragment)?;
        let program = match key.geometry.as_ref() {
            Some(geometry) => {
                let geometry = self.sources.get(geometry)?;
                server.create_program_with_geometry(&name, vertex, geometry, fragment)?
            }
            None => server.create_program(&name, vertex, fragment)?,
        };
        Ok(Rc::new(RenderProgram::new(key.clone(), program)))
    }

    /// Amount of cached programs, failed ones included.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_builtin_sources_registered() {
        let sources = ShaderSourceRegistry::new();
        for (id, _) in builtin::SOURCES {
            assert!(sources.get(id).unwrap().contains("void main"));
        }
        assert!(matches!(
            sources.get("Missing.frag"),
            Err(FrameworkError::UnknownShaderSource(_))
        ));
    }

    #[test]
    fn test_programs_are_cached() {
        let server = HeadlessServer::new(1, 1);
        let mut library = ShaderLibrary::default();

        let a = library.get(&*server, &ShaderKey::gbuffer()).unwrap();
        let b = library.get(&*server, &ShaderKey::gbuffer()).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(library.len(), 1);
        assert!(a.has_uniform("worldViewProjection"));
        assert!(!a.has_uniform("missing"));
    }

    #[test]
    fn test_geometry_stage() {
        let server = HeadlessServer::new(1, 1);
        let mut library = ShaderLibrary::default();
        library.sources_mut().register(
            "Layered.geom",
            "layout(triangles) in;\nuniform mat4 faceMatrices[6];\nvoid main() {}",
        );

        let key = ShaderKey::with_geometry(builtin::SHADOW_VERTEX, "Layered.geom", builtin::SHADOW_FRAGMENT);
        let program = library.get(&*server, &key).unwrap();
        assert!(program.has_uniform("faceMatrices"));
        assert_eq!(program.gpu_program().name(), "Shadow.vert+Layered.geom+Shadow.frag");
    }

    #[test]
    fn test_failures_are_cached() {
        let server = HeadlessServer::new(1, 1);
        let mut library = ShaderLibrary::default();
        library.sources_mut().register("Broken.frag", "out vec4 color;");

        let key = ShaderKey::full_screen("Broken.frag");
        assert!(library.get(&*server, &key).is_err());
        assert!(library.get(&*server, &key).is_err());
        assert_eq!(library.len(), 1);

        library.sources_mut().register("Broken.frag", "void main() {}");
        assert!(library.get(&*server, &key).is_err());
        library.clear();
        assert!(library.get(&*server, &key).is_ok());
    }

    #[test]
    fn test_pass_bindings_skip_missing_uniforms() {
        let server = HeadlessServer::new(1, 1);
        let mut library = ShaderLibrary::default();
        let program = library.get(&*server, &ShaderKey::shadow()).unwrap();

        let mut pass = PassBindings::new();
        pass.set_uniform("worldViewProjection", 1.0f32)
            .set_uniform("notInShader", 2.0f32);

        let mut bindings = Vec::new();
        pass.apply(&program, &mut bindings);
        assert_eq!(bindings.len(), 1);
        assert_eq!(pass.uniform("notInShader"), Some(&UniformValue::Float(2.0)));
    }
}
