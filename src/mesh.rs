//! CPU-side geometry handed to the renderer as vertex/index buffers.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

/// Interleaved vertex layout shared by every program.
///
/// Locations: 0 position, 1 normal, 2 color, 3 uv.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
            uv: [0.0; 2],
        }
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.uv = [u, v];
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

// positions        // normals
const CUBE_VERTICES: &[[f32; 6]] = &[
    [-0.5, -0.5, 0.5, 0.0, 0.0, 1.0],
    [0.5, -0.5, 0.5, 0.0, 0.0, 1.0],
    [0.5, 0.5, 0.5, 0.0, 0.0, 1.0],
    [-0.5, 0.5, 0.5, 0.0, 0.0, 1.0],
    [-0.5, -0.5, -0.5, 0.0, 0.0, -1.0],
    [0.5, -0.5, -0.5, 0.0, 0.0, -1.0],
    [0.5, 0.5, -0.5, 0.0, 0.0, -1.0],
    [-0.5, 0.5, -0.5, 0.0, 0.0, -1.0],
    [-0.5, -0.5, -0.5, -1.0, 0.0, 0.0],
    [-0.5, -0.5, 0.5, -1.0, 0.0, 0.0],
    [-0.5, 0.5, 0.5, -1.0, 0.0, 0.0],
    [-0.5, 0.5, -0.5, -1.0, 0.0, 0.0],
    [0.5, -0.5, -0.5, 1.0, 0.0, 0.0],
    [0.5, -0.5, 0.5, 1.0, 0.0, 0.0],
    [0.5, 0.5, 0.5, 1.0, 0.0, 0.0],
    [0.5, 0.5, -0.5, 1.0, 0.0, 0.0],
    [-0.5, -0.5, -0.5, 0.0, -1.0, 0.0],
    [0.5, -0.5, -0.5, 0.0, -1.0, 0.0],
    [0.5, -0.5, 0.5, 0.0, -1.0, 0.0],
    [-0.5, -0.5, 0.5, 0.0, -1.0, 0.0],
    [-0.5, 0.5, -0.5, 0.0, 1.0, 0.0],
    [0.5, 0.5, -0.5, 0.0, 1.0, 0.0],
    [0.5, 0.5, 0.5, 0.0, 1.0, 0.0],
    [-0.5, 0.5, 0.5, 0.0, 1.0, 0.0],
];

const CUBE_INDICES: &[u32] = &[
    0, 1, 2, 0, 2, 3, // front
    4, 6, 5, 4, 7, 6, // back
    8, 9, 10, 8, 10, 11, // left
    12, 14, 13, 12, 15, 14, // right
    16, 17, 18, 16, 18, 19, // bottom
    20, 22, 21, 20, 23, 22, // top
];

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> Self {
        Self {
            vertices,
            indices,
            topology,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Unit cube centred on the origin.
    pub fn cube(color: Vec3) -> Self {
        let vertices = CUBE_VERTICES
            .iter()
            .map(|v| {
                Vertex::new(
                    Vec3::new(v[0], v[1], v[2]),
                    Vec3::new(v[3], v[4], v[5]),
                    color,
                )
            })
            .collect();
        Self::new(vertices, CUBE_INDICES.to_vec(), Topology::Triangles)
    }

    /// UV sphere centred on the origin.
    pub fn sphere(radius: f32, segments: u32, rings: u32, color: Vec3) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let polar = v * std::f32::consts::PI;
            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let azimuth = u * std::f32::consts::TAU;
                let normal = Vec3::new(
                    polar.sin() * azimuth.cos(),
                    polar.sin() * azimuth.sin(),
                    polar.cos(),
                );
                vertices.push(Vertex::new(normal * radius, normal, color).with_uv(u, v));
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        Self::new(vertices, indices, Topology::Triangles)
    }

    /// Two-triangle quad through four corners given counter-clockwise around
    /// `normal`. UVs run from (0, 1) at the first corner to (1, 0) at the
    /// third, so textures read upright.
    pub fn quad(corners: [Vec3; 4], normal: Vec3, color: Vec3) -> Self {
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let vertices = corners
            .iter()
            .zip(uvs)
            .map(|(corner, [u, v])| Vertex::new(*corner, normal, color).with_uv(u, v))
            .collect();
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3], Topology::Triangles)
    }

    /// Square on the `z = 0` plane facing +Z.
    pub fn floor(half_size: f32, color: Vec3) -> Self {
        let s = half_size;
        Self::quad(
            [
                Vec3::new(-s, -s, 0.0),
                Vec3::new(s, -s, 0.0),
                Vec3::new(s, s, 0.0),
                Vec3::new(-s, s, 0.0),
            ],
            Vec3::Z,
            color,
        )
    }

    /// Line list from `(start, end, color)` segments.
    pub fn lines(segments: &[(Vec3, Vec3, Vec3)]) -> Self {
        let mut vertices = Vec::with_capacity(segments.len() * 2);
        for (start, end, color) in segments {
            vertices.push(Vertex::new(*start, Vec3::Z, *color));
            vertices.push(Vertex::new(*end, Vec3::Z, *color));
        }
        let indices = (0..vertices.len() as u32).collect();
        Self::new(vertices, indices, Topology::Lines)
    }

    /// World axes in red, green and blue.
    pub fn axes(length: f32) -> Self {
        Self::lines(&[
            (Vec3::ZERO, Vec3::X * length, Vec3::X),
            (Vec3::ZERO, Vec3::Y * length, Vec3::Y),
            (Vec3::ZERO, Vec3::Z * length, Vec3::Z),
        ])
    }

    /// Square grid on the `z = height` plane with `2 * half_cells` cells per side.
    pub fn grid(half_cells: u32, cell: f32, height: f32, color: Vec3) -> Self {
        let extent = cell * half_cells as f32;
        let half_cells = half_cells as i32;
        let segments: Vec<_> = (-half_cells..=half_cells)
            .flat_map(|i| {
                let offset = cell * i as f32;
                [
                    (
                        Vec3::new(-extent, offset, height),
                        Vec3::new(extent, offset, height),
                        color,
                    ),
                    (
                        Vec3::new(offset, -extent, height),
                        Vec3::new(offset, extent, height),
                        color,
                    ),
                ]
            })
            .collect();
        Self::lines(&segments)
    }

    /// Axis aligned cross of three segments centred on `center`.
    pub fn cross_segments(center: Vec3, size: f32, color: Vec3) -> [(Vec3, Vec3, Vec3); 3] {
        let half = size * 0.5;
        [
            (center - Vec3::X * half, center + Vec3::X * half, color),
            (center - Vec3::Y * half, center + Vec3::Y * half, color),
            (center - Vec3::Z * half, center + Vec3::Z * half, color),
        ]
    }

    /// Applies `transform` to positions and the matching normal matrix to
    /// normals.
    pub fn transformed(mut self, transform: Mat4) -> Self {
        let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
        for vertex in &mut self.vertices {
            let position = transform.transform_point3(Vec3::from_array(vertex.position));
            let normal = (normal_matrix * Vec3::from_array(vertex.normal)).normalize_or_zero();
            vertex.position = position.to_array();
            vertex.normal = normal.to_array();
        }
        self
    }
}
