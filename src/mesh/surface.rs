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

//! CPU-side geometry of a mesh.

use bytemuck::{Pod, Zeroable};
use umbra_core::{
    algebra::{Matrix4, Point3, Vector2, Vector3},
    math::aabb::AxisAlignedBoundingBox,
};
use umbra_graphics::{
    error::FrameworkError,
    geometry_buffer::{
        AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor, GeometryBuffer,
        GeometryBufferDescriptor, TriangleDefinition, VertexBufferDescriptor,
    },
    server::GraphicsServer,
};

/// Vertex layout shared by every mesh. Attribute locations match the `layout(location = N)`
/// declarations of the built-in vertex shaders.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct StaticVertex {
    pub position: Vector3<f32>,
    pub tex_coord: Vector2<f32>,
    pub normal: Vector3<f32>,
}

impl StaticVertex {
    pub const ATTRIBUTES: [AttributeDefinition; 3] = [
        AttributeDefinition::new(0, AttributeKind::Float3),
        AttributeDefinition::new(1, AttributeKind::Float2),
        AttributeDefinition::new(2, AttributeKind::Float3),
    ];

    pub fn new(position: Vector3<f32>, tex_coord: Vector2<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position,
            tex_coord,
            normal,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceData {
    pub vertices: Vec<StaticVertex>,
    pub triangles: Vec<TriangleDefinition>,
}

impl SurfaceData {
    pub fn new(vertices: Vec<StaticVertex>, triangles: Vec<TriangleDefinition>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// Quad in XY plane with corners at (0, 0) and (1, 1), facing +Z. Full-screen passes scale
    /// it onto the viewport.
    pub fn make_unit_xy_quad() -> Self {
        let normal = Vector3::z();
        let vertices = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .into_iter()
            .map(|(x, y)| StaticVertex::new(Vector3::new(x, y, 0.0), Vector2::new(x, y), normal))
            .collect();

        Self::new(
            vertices,
            vec![TriangleDefinition([0, 1, 2]), TriangleDefinition([0, 2, 3])],
        )
    }

    /// Unit cube centered at origin, four vertices per face so every face has its own normal.
    pub fn make_cube(transform: Matrix4<f32>) -> Self {
        let faces: [(Vector3<f32>, Vector3<f32>, Vector3<f32>); 6] = [
            (Vector3::x(), Vector3::y(), -Vector3::z()),
            (-Vector3::x(), Vector3::y(), Vector3::z()),
            (Vector3::y(), -Vector3::z(), Vector3::x()),
            (-Vector3::y(), Vector3::z(), Vector3::x()),
            (Vector3::z(), Vector3::y(), Vector3::x()),
            (-Vector3::z(), Vector3::y(), -Vector3::x()),
        ];

        let linear = transform.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(linear);

        let mut vertices = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);
        for (normal, up, right) in faces {
            let base = vertices.len() as u32;
            let center = normal * 0.5;
            for (u, v) in [(0.0f32, 0.0f32), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let local = center + right * (u - 0.5) + up * (v - 0.5);
                vertices.push(StaticVertex::new(
                    transform.transform_point(&Point3::from(local)).coords,
                    Vector2::new(u, v),
                    (normal_matrix * normal)
                        .try_normalize(f32::EPSILON)
                        .unwrap_or(normal),
                ));
            }
            triangles.push(TriangleDefinition([base, base + 1, base + 2]));
            triangles.push(TriangleDefinition([base, base + 2, base + 3]));
        }

        Self::new(vertices, triangles)
    }

    pub fn local_bounds(&self) -> AxisAlignedBoundingBox {
        let mut bounds = AxisAlignedBoundingBox::default();
        for vertex in self.vertices.iter() {
            bounds.add_point(vertex.position);
        }
        bounds
    }

    pub fn upload(
        &self,
        server: &dyn GraphicsServer,
        name: &str,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        server.create_geometry_buffer(GeometryBufferDescriptor {
            name,
            buffers: &[VertexBufferDescriptor::new(
                BufferUsage::StaticDraw,
                &StaticVertex::ATTRIBUTES,
                &self.vertices,
            )],
            elements: ElementsDescriptor::Triangles(&self.triangles),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cube() {
        let cube = SurfaceData::make_cube(Matrix4::new_scaling(2.0));
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangles.len(), 12);

        let bounds = cube.local_bounds();
        assert!((bounds.min - Vector3::repeat(-1.0)).norm() < 1e-5);
        assert!((bounds.max - Vector3::repeat(1.0)).norm() < 1e-5);

        // Counter-clockwise winding when looking at a face from outside.
        for triangle in cube.triangles.iter() {
            let [a, b, c] = triangle.0.map(|i| cube.vertices[i as usize]);
            let face_normal = (b.position - a.position).cross(&(c.position - a.position));
            assert!(face_normal.dot(&a.normal) > 0.0);
        }
    }

    #[test]
    fn test_quad() {
        let quad = SurfaceData::make_unit_xy_quad();
        let bounds = quad.local_bounds();
        assert_eq!(bounds.min, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(quad.vertices[2].tex_coord, Vector2::new(1.0, 1.0));
    }

    #[test]
    fn test_empty_bounds_are_invalid() {
        assert!(!SurfaceData::default().local_bounds().is_valid());
    }
}
