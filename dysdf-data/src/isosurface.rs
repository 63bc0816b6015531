//! Isosurface extraction from signed distance fields.
//!
//! Uses marching tetrahedra on a regular grid: every cell is split into six
//! tetrahedra sharing the cell's main diagonal, which needs no case tables
//! and produces a crack-free surface. Negative values are inside.

use crate::types::TriangleMesh;
use glam::{UVec3, Vec3};
use tracing::debug;

const CUBE_CORNERS: [UVec3; 8] = [
    UVec3::new(0, 0, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(1, 1, 0),
    UVec3::new(0, 1, 0),
    UVec3::new(0, 0, 1),
    UVec3::new(1, 0, 1),
    UVec3::new(1, 1, 1),
    UVec3::new(0, 1, 1),
];

// Six tetrahedra around the 0-6 diagonal.
const CELL_TETS: [[usize; 4]; 6] = [
    [0, 6, 1, 2],
    [0, 6, 2, 3],
    [0, 6, 3, 7],
    [0, 6, 7, 4],
    [0, 6, 4, 5],
    [0, 6, 5, 1],
];

/// Point on edge `p0 -> p1` where the field crosses zero.
#[inline]
fn interpolate_vertex(p0: Vec3, p1: Vec3, v0: f32, v1: f32) -> Vec3 {
    let denom = v1 - v0;
    if denom.abs() < 1e-10 {
        return p0.lerp(p1, 0.5);
    }
    p0.lerp(p1, (-v0 / denom).clamp(0.0, 1.0))
}

/// Emit a triangle whose normal points from `inside` towards `outside`.
fn push_oriented(mesh: &mut TriangleMesh, tri: [Vec3; 3], outward: Vec3) {
    let [a, b, c] = tri;
    if (b - a).cross(c - a).dot(outward) < 0.0 {
        mesh.push_triangle(a, c, b);
    } else {
        mesh.push_triangle(a, b, c);
    }
}

fn polygonize_tet(mesh: &mut TriangleMesh, p: [Vec3; 4], v: [f32; 4]) {
    let (inside, outside): (Vec<usize>, Vec<usize>) = (0..4).partition(|&i| v[i] < 0.0);
    if inside.is_empty() || outside.is_empty() {
        return;
    }

    let centroid = |ids: &[usize]| ids.iter().map(|&i| p[i]).sum::<Vec3>() / ids.len() as f32;
    let outward = centroid(&outside) - centroid(&inside);
    let cross = |i: usize, o: usize| interpolate_vertex(p[i], p[o], v[i], v[o]);

    match (inside.as_slice(), outside.as_slice()) {
        (&[i], &[a, b, c]) => push_oriented(mesh, [cross(i, a), cross(i, b), cross(i, c)], outward),
        (&[a, b, c], &[o]) => push_oriented(mesh, [cross(a, o), cross(b, o), cross(c, o)], outward),
        (&[a, b], &[c, d]) => {
            let (ac, ad, bd, bc) = (cross(a, c), cross(a, d), cross(b, d), cross(b, c));
            push_oriented(mesh, [ac, ad, bd], outward);
            push_oriented(mesh, [ac, bd, bc], outward);
        }
        _ => unreachable!("a tetrahedron has four corners"),
    }
}

/// Flat index of grid point `c` on an `n^3` lattice, computed in `usize`.
fn grid_index(c: UVec3, n: usize) -> usize {
    (c.z as usize * n + c.y as usize) * n + c.x as usize
}

/// Extract the zero level set of `sdf` inside the box `[min, max]`.
///
/// `resolution` is the number of cells per axis; the field is sampled on
/// `(resolution + 1)^3` grid points.
pub fn extract_isosurface<F>(sdf: F, min: Vec3, max: Vec3, resolution: u32) -> TriangleMesh
where
    F: Fn(Vec3) -> f32,
{
    let mut mesh = TriangleMesh::new();
    if resolution == 0 {
        return mesh;
    }

    let n = resolution + 1;
    let step = (max - min) / resolution as f32;
    let grid_point = |c: UVec3| min + c.as_vec3() * step;
    let flat = |c: UVec3| grid_index(c, n as usize);

    let mut values = vec![0.0f32; (n as usize).pow(3)];
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let c = UVec3::new(x, y, z);
                values[flat(c)] = sdf(grid_point(c));
            }
        }
    }

    for z in 0..resolution {
        for y in 0..resolution {
            for x in 0..resolution {
                let cell = UVec3::new(x, y, z);
                let corners = CUBE_CORNERS.map(|o| cell + o);
                let corner_values = corners.map(|c| values[flat(c)]);
                if corner_values.iter().all(|&v| v < 0.0) || corner_values.iter().all(|&v| v >= 0.0) {
                    continue;
                }
                for tet in CELL_TETS {
                    polygonize_tet(
                        &mut mesh,
                        tet.map(|i| grid_point(corners[i])),
                        tet.map(|i| corner_values[i]),
                    );
                }
            }
        }
    }

    debug!(
        "Isosurface at resolution {}: {} faces",
        resolution,
        mesh.face_count()
    );
    mesh
}
