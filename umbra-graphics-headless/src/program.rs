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

use fxhash::FxHashMap;
use regex::Regex;
use std::{any::Any, sync::LazyLock};
use umbra_core::{
    log::{Log, MessageKind},
    ImmutableString,
};
use umbra_graphics::{
    error::FrameworkError,
    gpu_program::{GpuProgram, UniformLocation},
};

static UNIFORM_DECLARATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"uniform\s+\w+\s+(\w+)").ok());

/// Program that does not execute anything, it only knows which uniforms its sources declare so
/// uniform lookups behave like on a real driver.
pub struct HeadlessProgram {
    name: String,
    uniforms: Vec<ImmutableString>,
    lookup: FxHashMap<ImmutableString, usize>,
}

fn check_stage(program_name: &str, stage: &str, source: &str) -> Result<(), FrameworkError> {
    if source.contains("void main") {
        Ok(())
    } else {
        let shader_name = format!("{program_name}_{stage}");
        let error_message = "entry point `void main()` is missing".to_string();
        Log::writeln(
            MessageKind::Error,
            format!("Failed to compile {shader_name} shader: {error_message}"),
        );
        Err(FrameworkError::ShaderCompilationFailed {
            shader_name,
            error_message,
        })
    }
}

impl HeadlessProgram {
    pub fn from_source(
        name: &str,
        vertex_source: &str,
        geometry_source: Option<&str>,
        fragment_source: &str,
    ) -> Result<Self, FrameworkError> {
        check_stage(name, "VertexShader", vertex_source)?;
        if let Some(geometry_source) = geometry_source {
            check_stage(name, "GeometryShader", geometry_source)?;
        }
        check_stage(name, "FragmentShader", fragment_source)?;

        let mut program = Self {
            name: name.to_owned(),
            uniforms: Default::default(),
            lookup: Default::default(),
        };

        if let Some(regex) = UNIFORM_DECLARATION.as_ref() {
            let sources = [Some(vertex_source), geometry_source, Some(fragment_source)];
            for source in sources.into_iter().flatten() {
                for captures in regex.captures_iter(source) {
                    if let Some(uniform) = captures.get(1) {
                        let uniform = ImmutableString::new(uniform.as_str());
                        if !program.lookup.contains_key(&uniform) {
                            program.lookup.insert(uniform.clone(), program.uniforms.len());
                            program.uniforms.push(uniform);
                        }
                    }
                }
            }
        }

        Ok(program)
    }

    /// Name of the uniform the location was issued for.
    pub fn uniform_name(&self, location: &UniformLocation) -> Option<&ImmutableString> {
        self.uniforms.get(location.id)
    }

    pub fn uniforms(&self) -> &[ImmutableString] {
        &self.uniforms
    }
}

impl GpuProgram for HeadlessProgram {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uniform_location(&self, name: &ImmutableString) -> Result<UniformLocation, FrameworkError> {
        self.lookup
            .get(name)
            .map(|index| UniformLocation::new(*index))
            .ok_or_else(|| FrameworkError::UnableToFindShaderUniform(name.to_mutable()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const VS: &str = r#"
        layout(location = 0) in vec3 vertexPosition;
        uniform mat4 worldViewProjection;
        void main() { gl_Position = worldViewProjection * vec4(vertexPosition, 1.0); }
    "#;

    const FS: &str = r#"
        uniform sampler2D diffuseTexture;
        uniform mat4 worldViewProjection;
        uniform vec4 lightColors[4];
        out vec4 FragColor;
        void main() { FragColor = texture(diffuseTexture, vec2(0.0)); }
    "#;

    #[test]
    fn test_uniform_lookup() {
        let program = HeadlessProgram::from_source("Test", VS, None, FS).unwrap();
        assert_eq!(program.uniforms().len(), 3);

        let location = program
            .uniform_location(&ImmutableString::new("lightColors"))
            .unwrap();
        assert_eq!(program.uniform_name(&location).unwrap(), "lightColors");
        assert!(program.has_uniform(&ImmutableString::new("diffuseTexture")));
        assert!(matches!(
            program.uniform_location(&ImmutableString::new("missing")),
            Err(FrameworkError::UnableToFindShaderUniform(_))
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let result = HeadlessProgram::from_source("Broken", VS, None, "out vec4 c;");
        match result {
            Err(FrameworkError::ShaderCompilationFailed { shader_name, .. }) => {
                assert_eq!(shader_name, "Broken_FragmentShader")
            }
            _ => panic!("compilation must fail"),
        }
    }
}
