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

use crate::{error::FrameworkError, ElementKind};
use bytemuck::{Pod, Zeroable};
use std::{any::Any, mem::size_of};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    Float,
    Float2,
    Float3,
    Float4,

    UnsignedByte,
    UnsignedByte2,
    UnsignedByte3,
    UnsignedByte4,

    UnsignedShort,
    UnsignedShort2,
    UnsignedShort3,
    UnsignedShort4,

    UnsignedInt,
    UnsignedInt2,
    UnsignedInt3,
    UnsignedInt4,
}

impl AttributeKind {
    pub fn size_bytes(self) -> usize {
        match self {
            AttributeKind::Float => size_of::<f32>(),
            AttributeKind::Float2 => size_of::<f32>() * 2,
            AttributeKind::Float3 => size_of::<f32>() * 3,
            AttributeKind::Float4 => size_of::<f32>() * 4,

            AttributeKind::UnsignedByte => size_of::<u8>(),
            AttributeKind::UnsignedByte2 => size_of::<u8>() * 2,
            AttributeKind::UnsignedByte3 => size_of::<u8>() * 3,
            AttributeKind::UnsignedByte4 => size_of::<u8>() * 4,

            AttributeKind::UnsignedShort => size_of::<u16>(),
            AttributeKind::UnsignedShort2 => size_of::<u16>() * 2,
            AttributeKind::UnsignedShort3 => size_of::<u16>() * 3,
            AttributeKind::UnsignedShort4 => size_of::<u16>() * 4,

            AttributeKind::UnsignedInt => size_of::<u32>(),
            AttributeKind::UnsignedInt2 => size_of::<u32>() * 2,
            AttributeKind::UnsignedInt3 => size_of::<u32>() * 3,
            AttributeKind::UnsignedInt4 => size_of::<u32>() * 4,
        }
    }

    /// Amount of components of the attribute.
    pub fn length(self) -> usize {
        match self {
            AttributeKind::Float
            | AttributeKind::UnsignedByte
            | AttributeKind::UnsignedShort
            | AttributeKind::UnsignedInt => 1,

            AttributeKind::Float2
            | AttributeKind::UnsignedByte2
            | AttributeKind::UnsignedShort2
            | AttributeKind::UnsignedInt2 => 2,

            AttributeKind::Float3
            | AttributeKind::UnsignedByte3
            | AttributeKind::UnsignedShort3
            | AttributeKind::UnsignedInt3 => 3,

            AttributeKind::Float4
            | AttributeKind::UnsignedByte4
            | AttributeKind::UnsignedShort4
            | AttributeKind::UnsignedInt4 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub location: u32,
    pub kind: AttributeKind,
    pub normalized: bool,
    pub divisor: u32,
}

impl AttributeDefinition {
    pub const fn new(location: u32, kind: AttributeKind) -> Self {
        Self {
            location,
            kind,
            normalized: false,
            divisor: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

/// Three vertex indices of a triangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct TriangleDefinition(pub [u32; 3]);

impl TriangleDefinition {
    pub fn indices(&self) -> &[u32] {
        &self.0
    }
}

pub struct VertexBufferDescriptor<'a> {
    pub usage: BufferUsage,
    /// Size of a single vertex in bytes.
    pub element_size: usize,
    pub attributes: &'a [AttributeDefinition],
    pub data: &'a [u8],
}

impl<'a> VertexBufferDescriptor<'a> {
    pub fn new<T: Pod>(
        usage: BufferUsage,
        attributes: &'a [AttributeDefinition],
        vertices: &'a [T],
    ) -> Self {
        Self {
            usage,
            element_size: size_of::<T>(),
            attributes,
            data: bytemuck::cast_slice(vertices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        if self.element_size == 0 {
            0
        } else {
            self.data.len() / self.element_size
        }
    }
}

pub enum ElementsDescriptor<'a> {
    Triangles(&'a [TriangleDefinition]),
    Lines(&'a [[u32; 2]]),
    Points(&'a [u32]),
}

impl ElementsDescriptor<'_> {
    pub fn element_kind(&self) -> ElementKind {
        match self {
            ElementsDescriptor::Triangles(_) => ElementKind::Triangle,
            ElementsDescriptor::Lines(_) => ElementKind::Line,
            ElementsDescriptor::Points(_) => ElementKind::Point,
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            ElementsDescriptor::Triangles(triangles) => triangles.len(),
            ElementsDescriptor::Lines(lines) => lines.len(),
            ElementsDescriptor::Points(points) => points.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ElementsDescriptor::Triangles(triangles) => bytemuck::cast_slice(triangles),
            ElementsDescriptor::Lines(lines) => bytemuck::cast_slice(lines),
            ElementsDescriptor::Points(points) => bytemuck::cast_slice(points),
        }
    }
}

pub struct GeometryBufferDescriptor<'a> {
    pub name: &'a str,
    pub buffers: &'a [VertexBufferDescriptor<'a>],
    pub elements: ElementsDescriptor<'a>,
}

impl GeometryBufferDescriptor<'_> {
    /// Checks that every attribute fits into its vertex and that every index refers to an
    /// existing vertex.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        for buffer in self.buffers {
            let mut offset = 0;
            for attribute in buffer.attributes {
                offset += attribute.kind.size_bytes();
                if offset > buffer.element_size {
                    return Err(FrameworkError::InvalidAttributeDescriptor);
                }
            }
        }

        if let Some(vertex_count) = self.buffers.first().map(|b| b.vertex_count()) {
            let indices: &[u32] = bytemuck::cast_slice(self.elements.as_bytes());
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(FrameworkError::Custom(format!(
                    "Geometry buffer \"{}\" references vertex {index}, but there are only \
                    {vertex_count} vertices",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DrawCallStatistics {
    pub triangles: usize,
}

/// Vertex and index storage on the GPU. Contents are immutable, changed geometry is uploaded
/// into a new buffer.
pub trait GeometryBuffer: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn name(&self) -> &str;
    fn element_count(&self) -> usize;
    fn element_kind(&self) -> ElementKind;
}

#[cfg(test)]
mod test {
    use super::*;

    #[repr(C)]
    #[derive(Copy, Clone, Pod, Zeroable)]
    struct Vertex {
        position: [f32; 3],
        tex_coord: [f32; 2],
    }

    const ATTRIBUTES: [AttributeDefinition; 2] = [
        AttributeDefinition::new(0, AttributeKind::Float3),
        AttributeDefinition::new(1, AttributeKind::Float2),
    ];

    fn vertices() -> [Vertex; 3] {
        [
            Vertex {
                position: [0.0; 3],
                tex_coord: [0.0; 2],
            },
            Vertex {
                position: [1.0, 0.0, 0.0],
                tex_coord: [1.0, 0.0],
            },
            Vertex {
                position: [0.0, 1.0, 0.0],
                tex_coord: [0.0, 1.0],
            },
        ]
    }

    #[test]
    fn test_descriptor_validation() {
        let vertices = vertices();
        let buffers = [VertexBufferDescriptor::new(
            BufferUsage::StaticDraw,
            &ATTRIBUTES,
            &vertices,
        )];
        let triangles = [TriangleDefinition([0, 1, 2])];
        let desc = GeometryBufferDescriptor {
            name: "Triangle",
            buffers: &buffers,
            elements: ElementsDescriptor::Triangles(&triangles),
        };
        assert!(desc.validate().is_ok());
        assert_eq!(desc.elements.element_count(), 1);
        assert_eq!(buffers[0].vertex_count(), 3);

        let bad_triangles = [TriangleDefinition([0, 1, 3])];
        let desc = GeometryBufferDescriptor {
            name: "Triangle",
            buffers: &buffers,
            elements: ElementsDescriptor::Triangles(&bad_triangles),
        };
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_attribute_overflow_is_rejected() {
        let vertices = vertices();
        let attributes = [
            AttributeDefinition::new(0, AttributeKind::Float4),
            AttributeDefinition::new(1, AttributeKind::Float2),
        ];
        let buffers = [VertexBufferDescriptor::new(
            BufferUsage::StaticDraw,
            &attributes,
            &vertices,
        )];
        let desc = GeometryBufferDescriptor {
            name: "Broken",
            buffers: &buffers,
            elements: ElementsDescriptor::Points(&[0]),
        };
        assert!(matches!(
            desc.validate(),
            Err(FrameworkError::InvalidAttributeDescriptor)
        ));
    }
}
