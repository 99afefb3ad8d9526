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

//! Materials: a program plus a set of named properties bound to it for each draw.
//!
//! A property named `X` is bound to the uniform `uX` if the program has one. Texture properties
//! name a render target in the [`TextureRegistry`], well-known samplers that a material does not
//! set are bound to a fallback texture instead.

use crate::{shader::RenderProgram, shader::ShaderKey, texture_registry::TextureRegistry};
use fxhash::FxHashMap;
use std::{cell::RefCell, rc::Rc};
use umbra_core::{
    algebra::{Matrix4, Vector2, Vector3, Vector4},
    color::Color,
    ImmutableString,
};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::ResourceBinding,
    gpu_program::{SamplerFallback, UniformValue},
    gpu_texture::{GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind},
    server::GraphicsServer,
};

pub const DIFFUSE: &str = "Diffuse";
pub const NORMAL: &str = "Normal";
pub const DIFFUSE_COLOR: &str = "DiffuseColor";
pub const ALPHA_TEST: &str = "AlphaTest";

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    Float(f32),
    FloatArray(Vec<f32>),
    Int(i32),
    Bool(bool),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix4(Matrix4<f32>),
    Color(Color),
    /// Name of a render target in the texture registry, `None` binds the fallback.
    Texture {
        name: Option<ImmutableString>,
        fallback: SamplerFallback,
    },
}

macro_rules! impl_from {
    ($variant:ident => $value_type:ty) => {
        impl From<$value_type> for MaterialProperty {
            fn from(value: $value_type) -> Self {
                Self::$variant(value)
            }
        }
    };
}

impl_from!(Float => f32);
impl_from!(FloatArray => Vec<f32>);
impl_from!(Int => i32);
impl_from!(Bool => bool);
impl_from!(Vector2 => Vector2<f32>);
impl_from!(Vector3 => Vector3<f32>);
impl_from!(Vector4 => Vector4<f32>);
impl_from!(Matrix4 => Matrix4<f32>);
impl_from!(Color => Color);

macro_rules! define_as {
    ($name:ident = $variant:ident -> $ty:ty) => {
        pub fn $name(&self) -> Option<$ty> {
            if let MaterialProperty::$variant(v) = self {
                Some(*v)
            } else {
                None
            }
        }
    };
}

impl MaterialProperty {
    define_as!(as_float = Float -> f32);
    define_as!(as_int = Int -> i32);
    define_as!(as_bool = Bool -> bool);
    define_as!(as_vector2 = Vector2 -> Vector2<f32>);
    define_as!(as_vector3 = Vector3 -> Vector3<f32>);
    define_as!(as_vector4 = Vector4 -> Vector4<f32>);
    define_as!(as_matrix4 = Matrix4 -> Matrix4<f32>);
    define_as!(as_color = Color -> Color);

    pub fn texture(name: &str) -> Self {
        Self::Texture {
            name: Some(ImmutableString::new(name)),
            fallback: SamplerFallback::White,
        }
    }

    pub fn as_texture(&self) -> Option<&ImmutableString> {
        if let MaterialProperty::Texture { name, .. } = self {
            name.as_ref()
        } else {
            None
        }
    }

    fn uniform_value(&self) -> Option<UniformValue> {
        Some(match self {
            MaterialProperty::Float(v) => UniformValue::Float(*v),
            MaterialProperty::FloatArray(v) => UniformValue::FloatArray(v.clone()),
            MaterialProperty::Int(v) => UniformValue::Int(*v),
            MaterialProperty::Bool(v) => UniformValue::Bool(*v),
            MaterialProperty::Vector2(v) => UniformValue::Vector2(*v),
            MaterialProperty::Vector3(v) => UniformValue::Vector3(*v),
            MaterialProperty::Vector4(v) => UniformValue::Vector4(*v),
            MaterialProperty::Matrix4(v) => UniformValue::Matrix4(*v),
            MaterialProperty::Color(v) => UniformValue::Color(*v),
            MaterialProperty::Texture { .. } => return None,
        })
    }
}

/// 1x1 textures bound to samplers that have nothing else to sample.
pub struct FallbackTextures {
    pub white: Rc<RefCell<dyn GpuTexture>>,
    pub black: Rc<RefCell<dyn GpuTexture>>,
    pub normal: Rc<RefCell<dyn GpuTexture>>,
    /// White cube map, used for point shadow slots without a shadow map.
    pub white_cube: Rc<RefCell<dyn GpuTexture>>,
}

impl FallbackTextures {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let make = |name: &str, kind: GpuTextureKind, data: &[u8]| {
            server.create_texture(GpuTextureDescriptor {
                name,
                kind,
                pixel_kind: PixelKind::RGBA8,
                data: Some(data),
                ..Default::default()
            })
        };
        let rectangle = GpuTextureKind::Rectangle {
            width: 1,
            height: 1,
        };

        Ok(Self {
            white: make("WhiteFallback", rectangle, &[255, 255, 255, 255])?,
            black: make("BlackFallback", rectangle, &[0, 0, 0, 255])?,
            normal: make("NormalFallback", rectangle, &[128, 128, 255, 255])?,
            white_cube: make(
                "WhiteCubeFallback",
                GpuTextureKind::Cube {
                    width: 1,
                    height: 1,
                },
                &[255; 24],
            )?,
        })
    }

    pub fn get(&self, fallback: SamplerFallback) -> &Rc<RefCell<dyn GpuTexture>> {
        match fallback {
            SamplerFallback::White => &self.white,
            SamplerFallback::Normal => &self.normal,
            SamplerFallback::Black => &self.black,
        }
    }
}

/// Values bound for well-known properties a material does not set.
fn standard_properties() -> [(&'static str, MaterialProperty); 4] {
    [
        (
            DIFFUSE,
            MaterialProperty::Texture {
                name: None,
                fallback: SamplerFallback::White,
            },
        ),
        (
            NORMAL,
            MaterialProperty::Texture {
                name: None,
                fallback: SamplerFallback::Normal,
            },
        ),
        (DIFFUSE_COLOR, MaterialProperty::Color(Color::WHITE)),
        (ALPHA_TEST, MaterialProperty::Bool(false)),
    ]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    shader: ShaderKey,
    properties: FxHashMap<ImmutableString, MaterialProperty>,
}

impl Material {
    pub fn new(shader: ShaderKey) -> Self {
        Self {
            shader,
            properties: Default::default(),
        }
    }

    /// Forward lit material with the default program.
    pub fn standard() -> Self {
        Self::new(ShaderKey::forward())
    }

    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<MaterialProperty>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn shader(&self) -> &ShaderKey {
        &self.shader
    }

    pub fn set_shader(&mut self, shader: ShaderKey) {
        self.shader = shader;
    }

    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<MaterialProperty>,
    ) -> Option<MaterialProperty> {
        self.properties
            .insert(ImmutableString::new(name), value.into())
    }

    pub fn unset_property(&mut self, name: &str) -> Option<MaterialProperty> {
        self.properties.remove(name)
    }

    pub fn property(&self, name: &str) -> Option<&MaterialProperty> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &FxHashMap<ImmutableString, MaterialProperty> {
        &self.properties
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.property(name).and_then(|p| p.as_float())
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(|p| p.as_bool())
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        self.property(name).and_then(|p| p.as_color())
    }

    pub fn texture(&self, name: &str) -> Option<&ImmutableString> {
        self.property(name).and_then(|p| p.as_texture())
    }

    /// Alpha tested materials are drawn after opaque ones, with blending.
    pub fn is_transparent(&self) -> bool {
        match self.property(ALPHA_TEST) {
            Some(MaterialProperty::Bool(v)) => *v,
            Some(MaterialProperty::Float(v)) => *v > 0.0,
            _ => false,
        }
    }

    /// Appends bindings of every property the program has a uniform for. Fails if a texture
    /// property names a render target that does not exist.
    pub fn bind(
        &self,
        program: &RenderProgram,
        textures: &TextureRegistry,
        fallbacks: &FallbackTextures,
        bindings: &mut Vec<ResourceBinding>,
    ) -> Result<(), FrameworkError> {
        let standard = standard_properties();
        let missing_standard = standard
            .iter()
            .filter(|(name, _)| !self.properties.contains_key(*name))
            .map(|(name, value)| (*name, value));
        let own = self
            .properties
            .iter()
            .map(|(name, value)| (name.as_str(), value));

        for (name, property) in own.chain(missing_standard) {
            let Some(location) = program.uniform(&format!("u{name}")) else {
                continue;
            };

            match property {
                MaterialProperty::Texture {
                    name: Some(texture),
                    ..
                } => {
                    let texture = textures.get(texture)?;
                    bindings.push(ResourceBinding::texture(&texture, &location));
                }
                MaterialProperty::Texture {
                    name: None,
                    fallback,
                } => {
                    bindings.push(ResourceBinding::texture(fallbacks.get(*fallback), &location));
                }
                _ => {
                    if let Some(value) = property.uniform_value() {
                        bindings.push(ResourceBinding::uniform(&location, value));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{shader::ShaderLibrary, texture_registry::RenderTargetDescriptor};
    use umbra_graphics_headless::HeadlessServer;

    fn texture_name(binding: &ResourceBinding) -> Option<String> {
        match binding {
            ResourceBinding::Texture { texture, .. } => Some(texture.borrow().name().to_owned()),
            _ => None,
        }
    }

    #[test]
    fn test_typed_queries() {
        let material = Material::standard()
            .with_property("Roughness", 0.5f32)
            .with_property(DIFFUSE_COLOR, Color::RED)
            .with_property(DIFFUSE, MaterialProperty::texture("Bricks"));
        assert_eq!(material.float("Roughness"), Some(0.5));
        assert_eq!(material.color(DIFFUSE_COLOR), Some(Color::RED));
        assert_eq!(material.texture(DIFFUSE).unwrap().as_str(), "Bricks");
        assert_eq!(material.bool("Roughness"), None);
        assert!(!material.is_transparent());
        assert!(material.clone().with_property(ALPHA_TEST, true).is_transparent());
    }

    #[test]
    fn test_bind_uses_fallbacks_and_registry() {
        let server = HeadlessServer::new(1, 1);
        let fallbacks = FallbackTextures::new(&*server).unwrap();
        let mut shaders = ShaderLibrary::default();
        let program = shaders.get(&*server, &ShaderKey::gbuffer()).unwrap();
        let mut textures = TextureRegistry::new();

        // No properties at all: white diffuse fallback and white color.
        let mut bindings = Vec::new();
        Material::standard()
            .bind(&program, &textures, &fallbacks, &mut bindings)
            .unwrap();
        assert_eq!(bindings.len(), 2);
        assert!(bindings
            .iter()
            .filter_map(texture_name)
            .eq(["WhiteFallback".to_string()]));

        // Missing named texture is an error, not a silent default.
        let material = Material::standard().with_property(DIFFUSE, MaterialProperty::texture("Bricks"));
        let result = material.bind(&program, &textures, &fallbacks, &mut Vec::new());
        assert!(matches!(result, Err(FrameworkError::ResourceNotFound { ref name }) if name == "Bricks"));

        textures
            .acquire(
                &*server,
                "Bricks",
                RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 2, 2),
            )
            .unwrap();
        let mut bindings = Vec::new();
        material
            .bind(&program, &textures, &fallbacks, &mut bindings)
            .unwrap();
        assert!(bindings
            .iter()
            .filter_map(texture_name)
            .eq(["Bricks".to_string()]));
    }

    #[test]
    fn test_fallback_contents() {
        let server = HeadlessServer::new(1, 1);
        let fallbacks = FallbackTextures::new(&*server).unwrap();
        assert_eq!(fallbacks.white.borrow().read_pixels(), [255, 255, 255, 255]);
        assert_eq!(
            fallbacks.get(SamplerFallback::Normal).borrow().read_pixels(),
            [128, 128, 255, 255]
        );
        assert!(matches!(
            fallbacks.white_cube.borrow().kind(),
            GpuTextureKind::Cube { width: 1, height: 1 }
        ));
    }
}
