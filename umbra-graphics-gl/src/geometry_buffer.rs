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

use crate::{server::GlGraphicsServer, ToGlConstant};
use glow::HasContext;
use std::{any::Any, marker::PhantomData, mem::size_of, rc::Weak};
use umbra_graphics::{
    error::FrameworkError,
    geometry_buffer::{
        AttributeKind, BufferUsage, DrawCallStatistics, GeometryBuffer, GeometryBufferDescriptor,
    },
    ElementKind, ElementRange,
};

fn attribute_type(kind: AttributeKind) -> u32 {
    match kind {
        AttributeKind::Float
        | AttributeKind::Float2
        | AttributeKind::Float3
        | AttributeKind::Float4 => glow::FLOAT,

        AttributeKind::UnsignedByte
        | AttributeKind::UnsignedByte2
        | AttributeKind::UnsignedByte3
        | AttributeKind::UnsignedByte4 => glow::UNSIGNED_BYTE,

        AttributeKind::UnsignedShort
        | AttributeKind::UnsignedShort2
        | AttributeKind::UnsignedShort3
        | AttributeKind::UnsignedShort4 => glow::UNSIGNED_SHORT,

        AttributeKind::UnsignedInt
        | AttributeKind::UnsignedInt2
        | AttributeKind::UnsignedInt3
        | AttributeKind::UnsignedInt4 => glow::UNSIGNED_INT,
    }
}

impl ToGlConstant for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
            BufferUsage::StreamDraw => glow::STREAM_DRAW,
        }
    }
}

pub struct GlGeometryBuffer {
    state: Weak<GlGraphicsServer>,
    name: String,
    vertex_array_object: glow::VertexArray,
    buffers: Vec<glow::Buffer>,
    element_buffer: glow::Buffer,
    element_count: usize,
    element_kind: ElementKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GlGeometryBuffer {
    pub fn new(
        server: &GlGraphicsServer,
        desc: GeometryBufferDescriptor,
    ) -> Result<Self, FrameworkError> {
        desc.validate()?;

        unsafe {
            let vao = server.gl.create_vertex_array()?;
            server.set_vertex_array_object(Some(vao));

            let mut buffers = Vec::with_capacity(desc.buffers.len());
            for buffer_desc in desc.buffers {
                let buffer = server.gl.create_buffer()?;
                server.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
                server.count_vbo_binding_change();
                server.gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    buffer_desc.data,
                    buffer_desc.usage.into_gl(),
                );

                let mut offset = 0usize;
                for definition in buffer_desc.attributes {
                    server.gl.vertex_attrib_pointer_f32(
                        definition.location,
                        definition.kind.length() as i32,
                        attribute_type(definition.kind),
                        definition.normalized,
                        buffer_desc.element_size as i32,
                        offset as i32,
                    );
                    server
                        .gl
                        .vertex_attrib_divisor(definition.location, definition.divisor);
                    server.gl.enable_vertex_attrib_array(definition.location);

                    offset += definition.kind.size_bytes();
                }

                buffers.push(buffer);
            }

            // Element buffer binding is part of the VAO state.
            let element_buffer = server.gl.create_buffer()?;
            server
                .gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(element_buffer));
            server.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                desc.elements.as_bytes(),
                glow::STATIC_DRAW,
            );

            server.set_vertex_array_object(None);

            Ok(Self {
                state: server.weak(),
                name: desc.name.to_owned(),
                vertex_array_object: vao,
                buffers,
                element_buffer,
                element_count: desc.elements.element_count(),
                element_kind: desc.elements.element_kind(),
                thread_mark: PhantomData,
            })
        }
    }

    pub(crate) fn draw(
        &self,
        server: &GlGraphicsServer,
        element_range: ElementRange,
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let (offset, count) = element_range.resolve(self.element_count)?;

        server.set_vertex_array_object(Some(self.vertex_array_object));

        let index_per_element = self.element_kind.index_per_element();
        let start_index = offset * index_per_element;
        let index_count = count * index_per_element;

        if index_count > 0 {
            unsafe {
                server.gl.draw_elements(
                    self.element_kind.into_gl(),
                    index_count as i32,
                    glow::UNSIGNED_INT,
                    (start_index * size_of::<u32>()) as i32,
                );
            }
        }

        Ok(DrawCallStatistics { triangles: count })
    }
}

impl Drop for GlGeometryBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.set_vertex_array_object(None);
            unsafe {
                for buffer in self.buffers.drain(..) {
                    state.gl.delete_buffer(buffer);
                }
                state.gl.delete_buffer(self.element_buffer);
                state.gl.delete_vertex_array(self.vertex_array_object);
            }
        }
    }
}

impl GeometryBuffer for GlGeometryBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn element_kind(&self) -> ElementKind {
        self.element_kind
    }
}
