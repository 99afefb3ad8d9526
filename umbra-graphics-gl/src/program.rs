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

use crate::server::GlGraphicsServer;
use fxhash::FxHashMap;
use glow::HasContext;
use std::{
    any::Any,
    cell::RefCell,
    marker::PhantomData,
    rc::{Rc, Weak},
};
use umbra_core::{
    log::{Log, MessageKind},
    ImmutableString,
};
use umbra_graphics::{
    error::FrameworkError,
    gpu_program::{GpuProgram, UniformLocation, UniformValue},
};

unsafe fn create_shader(
    server: &GlGraphicsServer,
    name: String,
    actual_type: u32,
    source: &str,
) -> Result<glow::Shader, FrameworkError> {
    let merged_source = prepare_source_code(source);

    let shader = server.gl.create_shader(actual_type)?;
    server.gl.shader_source(shader, &merged_source);
    server.gl.compile_shader(shader);

    let status = server.gl.get_shader_compile_status(shader);
    let compilation_message = server.gl.get_shader_info_log(shader);

    if !status {
        Log::writeln(
            MessageKind::Error,
            format!("Failed to compile {name} shader: {compilation_message}"),
        );
        server.gl.delete_shader(shader);
        Err(FrameworkError::ShaderCompilationFailed {
            shader_name: name,
            error_message: compilation_message,
        })
    } else {
        let msg = if compilation_message.trim().is_empty() {
            format!("Shader {name} compiled successfully!")
        } else {
            format!("Shader {name} compiled successfully!\nAdditional info: {compilation_message}")
        };

        Log::writeln(MessageKind::Information, msg);

        Ok(shader)
    }
}

/// Sources are stored without a version directive, the backend decides which one to use.
fn prepare_source_code(code: &str) -> String {
    let mut full_source_code = "#version 330 core\n".to_owned();
    full_source_code += code;
    full_source_code
}

pub struct GlProgram {
    state: Weak<GlGraphicsServer>,
    pub id: glow::Program,
    name: String,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
    lookup: RefCell<FxHashMap<ImmutableString, Option<usize>>>,
    locations: RefCell<Vec<glow::UniformLocation>>,
}

impl GlProgram {
    pub fn from_source(
        server: &GlGraphicsServer,
        name: &str,
        vertex_source: &str,
        geometry_source: Option<&str>,
        fragment_source: &str,
    ) -> Result<GlProgram, FrameworkError> {
        unsafe {
            let mut shaders = vec![create_shader(
                server,
                format!("{name}_VertexShader"),
                glow::VERTEX_SHADER,
                vertex_source,
            )?];
            if let Some(geometry_source) = geometry_source {
                shaders.push(create_shader(
                    server,
                    format!("{name}_GeometryShader"),
                    glow::GEOMETRY_SHADER,
                    geometry_source,
                )?);
            }
            shaders.push(create_shader(
                server,
                format!("{name}_FragmentShader"),
                glow::FRAGMENT_SHADER,
                fragment_source,
            )?);

            let program = server.gl.create_program()?;
            for shader in shaders {
                server.gl.attach_shader(program, shader);
                server.gl.delete_shader(shader);
            }
            server.gl.link_program(program);
            let status = server.gl.get_program_link_status(program);
            let link_message = server.gl.get_program_info_log(program);

            if !status {
                Log::writeln(
                    MessageKind::Error,
                    format!("Failed to link {name} shader: {link_message}"),
                );
                server.gl.delete_program(program);
                Err(FrameworkError::ShaderLinkingFailed {
                    shader_name: name.to_owned(),
                    error_message: link_message,
                })
            } else {
                let msg = if link_message.trim().is_empty() {
                    format!("Shader {name} linked successfully!")
                } else {
                    format!("Shader {name} linked successfully!\nAdditional info: {link_message}")
                };

                Log::writeln(MessageKind::Information, msg);

                Ok(Self {
                    state: server.weak(),
                    id: program,
                    name: name.to_owned(),
                    thread_mark: PhantomData,
                    lookup: Default::default(),
                    locations: Default::default(),
                })
            }
        }
    }

    fn server(&self) -> Option<Rc<GlGraphicsServer>> {
        self.state.upgrade()
    }

    /// Resolves a backend-agnostic location into a GL one.
    pub fn gl_location(&self, location: &UniformLocation) -> Option<glow::UniformLocation> {
        self.locations.borrow().get(location.id).cloned()
    }

    /// Uploads a uniform value, the program must be bound.
    pub(crate) fn set_uniform(
        &self,
        server: &GlGraphicsServer,
        location: &UniformLocation,
        value: &UniformValue,
    ) {
        let Some(location) = self.gl_location(location) else {
            return;
        };
        let location = Some(&location);
        let gl = &server.gl;
        unsafe {
            match value {
                UniformValue::Bool(value) => gl.uniform_1_i32(location, i32::from(*value)),
                UniformValue::Int(value) => gl.uniform_1_i32(location, *value),
                UniformValue::Float(value) => gl.uniform_1_f32(location, *value),
                UniformValue::FloatArray(value) => gl.uniform_1_f32_slice(location, value),
                UniformValue::Vector2(value) => gl.uniform_2_f32(location, value.x, value.y),
                UniformValue::Vector3(value) => {
                    gl.uniform_3_f32(location, value.x, value.y, value.z)
                }
                UniformValue::Vector4(value) => {
                    gl.uniform_4_f32(location, value.x, value.y, value.z, value.w)
                }
                UniformValue::Vector3Array(value) => {
                    let data = value.iter().flat_map(|v| v.iter().copied());
                    gl.uniform_3_f32_slice(location, &data.collect::<Vec<_>>())
                }
                UniformValue::Vector4Array(value) => {
                    let data = value.iter().flat_map(|v| v.iter().copied());
                    gl.uniform_4_f32_slice(location, &data.collect::<Vec<_>>())
                }
                UniformValue::Matrix4(value) => {
                    gl.uniform_matrix_4_f32_slice(location, false, value.as_slice())
                }
                UniformValue::Matrix4Array(value) => {
                    let data = value.iter().flat_map(|m| m.iter().copied());
                    gl.uniform_matrix_4_f32_slice(location, false, &data.collect::<Vec<_>>())
                }
                UniformValue::Color(color) => {
                    let rgba = color.as_frgba();
                    gl.uniform_4_f32(location, rgba.x, rgba.y, rgba.z, rgba.w)
                }
            }
        }
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        if let Some(state) = self.server() {
            unsafe {
                state.gl.delete_program(self.id);
            }
        }
    }
}

impl GpuProgram for GlProgram {
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
        let not_found = || FrameworkError::UnableToFindShaderUniform(name.to_mutable());

        if let Some(cached) = self.lookup.borrow().get(name) {
            return cached.map(UniformLocation::new).ok_or_else(not_found);
        }

        let server = self.server().ok_or_else(not_found)?;
        let location = unsafe { server.gl.get_uniform_location(self.id, name.as_str()) };
        let index = location.map(|location| {
            let mut locations = self.locations.borrow_mut();
            locations.push(location);
            locations.len() - 1
        });
        self.lookup.borrow_mut().insert(name.clone(), index);

        index.map(UniformLocation::new).ok_or_else(not_found)
    }
}
