//! Discrete curvature on triangle faces.
//!
//! Per-vertex Gaussian, mean and principal curvatures after Meyer et al.:
//!
//! - **Gaussian curvature K**: angle defect over the mixed Voronoi area
//! - **Mean curvature H**: half the norm of the cotangent Laplacian, signed by the vertex normal
//! - **Principal curvatures k1, k2**: `H ± sqrt(H² − K)`
//!
//! The sizing field of [`Dcel::sizing_value_vertex`](crate::mesh::Dcel::sizing_value_vertex)
//! is driven by [`VertexCurvature::max_abs_principal`].
//!
//! # Example
//!
//! ```
//! use dcel_kernel::prelude::*;
//! use dcel_kernel::algo::curvature::vertex_curvature;
//! use nalgebra::Point3;
//!
//! let mesh = TriangleMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.5, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
//! let k = vertex_curvature(&dcel, VertexId::new(0)).unwrap();
//! assert!(k.mean.abs() < 1e-9);
//! ```
//!
//! # References
//!
//! - Meyer, M., et al. (2003). "Discrete Differential-Geometry Operators for
//!   Triangulated 2-Manifolds." Visualization and Mathematics III.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{DcelError, Result};
use crate::mesh::{Dcel, HalfEdgeId, MeshIndex, VertexId};

const AREA_EPS: f64 = 1e-10;

/// Curvature values at one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexCurvature {
    /// Gaussian curvature K.
    pub gaussian: f64,
    /// Signed mean curvature H.
    pub mean: f64,
    /// Maximum principal curvature k1.
    pub principal_max: f64,
    /// Minimum principal curvature k2.
    pub principal_min: f64,
}

impl VertexCurvature {
    /// The larger of `|k1|` and `|k2|`.
    #[inline]
    pub fn max_abs_principal(&self) -> f64 {
        self.principal_max.abs().max(self.principal_min.abs())
    }

    /// Shape index `(2/π) atan((k1+k2)/(k1-k2))`, in `[-1, 1]`.
    pub fn shape_index(&self) -> f64 {
        let diff = self.principal_max - self.principal_min;
        if diff.abs() < AREA_EPS {
            // Umbilical point
            0.0
        } else {
            (2.0 / PI) * ((self.principal_max + self.principal_min) / diff).atan()
        }
    }
}

/// Compute the angle at vertex `a` in triangle (a, b, c).
fn triangle_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = (b - a).normalize();
    let ac = (c - a).normalize();
    ab.dot(&ac).clamp(-1.0, 1.0).acos()
}

/// Compute the cotangent of the angle at vertex `a` in triangle (a, b, c).
fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross_norm = ab.cross(&ac).norm();
    if cross_norm < AREA_EPS {
        0.0
    } else {
        ab.dot(&ac) / cross_norm
    }
}

/// Voronoi area of `p` inside a non-obtuse triangle (p, q, r).
fn voronoi_area_contribution(p: &Point3<f64>, q: &Point3<f64>, r: &Point3<f64>) -> f64 {
    let cot_q = cotangent_angle(q, p, r);
    let cot_r = cotangent_angle(r, p, q);
    0.125 * ((r - p).norm_squared() * cot_q + (q - p).norm_squared() * cot_r)
}

/// A triangle corner: the vertex, the next corner, and the previous corner.
struct Corner {
    at: Point3<f64>,
    next: Point3<f64>,
    prev: Point3<f64>,
}

impl Corner {
    fn area(&self) -> f64 {
        0.5 * (self.next - self.at).cross(&(self.prev - self.at)).norm()
    }

    fn angle(&self) -> f64 {
        triangle_angle(&self.at, &self.next, &self.prev)
    }

    /// Mixed-area share of this corner's vertex.
    fn mixed_area(&self) -> f64 {
        let half_pi = PI / 2.0;
        let at = self.angle();
        let at_next = triangle_angle(&self.next, &self.prev, &self.at);
        let at_prev = triangle_angle(&self.prev, &self.at, &self.next);

        if at > half_pi {
            self.area() / 2.0
        } else if at_next > half_pi || at_prev > half_pi {
            self.area() / 4.0
        } else {
            voronoi_area_contribution(&self.at, &self.prev, &self.next)
        }
    }
}

/// Check that `he` bounds a triangle and return the corner at its origin.
fn corner<I: MeshIndex>(dcel: &Dcel<I>, he: HalfEdgeId<I>) -> Result<Corner> {
    let prev = dcel.prev(he);
    if dcel.next(dcel.next(he)) != prev {
        return Err(DcelError::NotImplemented("curvature on non-triangular faces"));
    }
    Ok(Corner {
        at: *dcel.position(dcel.origin(he))?,
        next: *dcel.position(dcel.target(he))?,
        prev: *dcel.position(dcel.origin(prev))?,
    })
}

/// Corners of every face incident to `v`.
fn corners<I: MeshIndex>(dcel: &Dcel<I>, v: VertexId<I>) -> Result<Vec<Corner>> {
    let mut out = Vec::new();
    for he in dcel.vertex_halfedges(v) {
        let he = he?;
        if dcel.face_of(he).is_valid() {
            out.push(corner(dcel, he)?);
        }
    }
    Ok(out)
}

/// Mixed Voronoi area of a vertex, falling back to a third of the incident
/// area for degenerate boundary fans.
pub fn mixed_area<I: MeshIndex>(dcel: &Dcel<I>, v: VertexId<I>) -> Result<f64> {
    let corners = corners(dcel, v)?;
    let area: f64 = corners.iter().map(Corner::mixed_area).sum();
    if area < AREA_EPS {
        let fallback: f64 = corners.iter().map(|c| c.area() / 3.0).sum();
        if fallback > AREA_EPS {
            return Ok(fallback);
        }
    }
    Ok(area)
}

/// Unnormalised Laplace-Beltrami of the position: magnitude `2H·A`, along the normal.
fn mean_curvature_normal<I: MeshIndex>(dcel: &Dcel<I>, v: VertexId<I>) -> Result<Vector3<f64>> {
    let p_v = *dcel.position(v)?;
    let mut laplacian = Vector3::zeros();

    for he in dcel.vertex_halfedges(v) {
        let he = he?;
        let p_j = *dcel.position(dcel.target(he))?;

        let mut cot_sum = 0.0;
        for side in [he, dcel.twin(he)] {
            if dcel.face_of(side).is_valid() {
                let p_opp = dcel.position(dcel.origin(dcel.prev(side)))?;
                cot_sum += cotangent_angle(p_opp, &p_v, &p_j);
            }
        }

        // Clamp to avoid negative weights from degenerate triangles
        laplacian += cot_sum.max(0.0) * (p_j - p_v);
    }

    Ok(0.5 * laplacian)
}

/// Compute all curvatures at one vertex.
///
/// # Errors
/// Lookup or topology errors from the one-ring walk;
/// [`DcelError::NotImplemented`] when an incident face is not a triangle.
pub fn vertex_curvature<I: MeshIndex>(dcel: &Dcel<I>, v: VertexId<I>) -> Result<VertexCurvature> {
    let area = mixed_area(dcel, v)?;
    if area <= AREA_EPS {
        return Ok(VertexCurvature {
            gaussian: 0.0,
            mean: 0.0,
            principal_max: 0.0,
            principal_min: 0.0,
        });
    }

    let border = dcel.is_border_vertex(v);
    let angle_sum: f64 = corners(dcel, v)?.iter().map(Corner::angle).sum();
    // Boundary vertices have a flat angle of π rather than 2π
    let full_angle = if border { PI } else { 2.0 * PI };
    let k = (full_angle - angle_sum) / area;

    let laplacian = mean_curvature_normal(dcel, v)? / area;
    let normal = dcel.vertex_normal(v)?;
    let h = if border {
        // The in-plane part of an open fan's Laplacian is not curvature
        laplacian.dot(&normal) / 2.0
    } else {
        let sign = if laplacian.dot(&normal) >= 0.0 { 1.0 } else { -1.0 };
        sign * laplacian.norm() / 2.0
    };

    let discriminant = h * h - k;
    let (principal_max, principal_min) = if discriminant >= 0.0 {
        let sqrt_disc = discriminant.sqrt();
        (h + sqrt_disc, h - sqrt_disc)
    } else {
        // Numerical issues: fall back to H for both
        (h, h)
    };

    Ok(VertexCurvature {
        gaussian: k,
        mean: h,
        principal_max,
        principal_min,
    })
}

/// Compute curvatures for every live vertex, in index order.
pub fn compute_curvature<I: MeshIndex>(
    dcel: &Dcel<I>,
    parallel: bool,
) -> Result<Vec<(VertexId<I>, VertexCurvature)>> {
    let ids: Vec<VertexId<I>> = dcel.vertex_ids().collect();
    let compute = |&v: &VertexId<I>| vertex_curvature(dcel, v).map(|k| (v, k));

    if parallel {
        ids.par_iter().map(compute).collect()
    } else {
        ids.iter().map(compute).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use std::collections::HashMap;

    pub(crate) fn flat_grid(n: usize) -> Dcel {
        let mut positions = Vec::new();
        let mut triangles = Vec::new();

        for j in 0..=n {
            for i in 0..=n {
                positions.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }

        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = j * (n + 1) + i + 1;
                let v01 = (j + 1) * (n + 1) + i;
                let v11 = (j + 1) * (n + 1) + i + 1;

                triangles.push([v00, v10, v11]);
                triangles.push([v00, v11, v01]);
            }
        }

        Dcel::from_triangle_mesh(&TriangleMesh::new(positions, triangles)).unwrap()
    }

    pub(crate) fn icosphere(subdivisions: usize) -> Dcel {
        let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let scale = 1.0 / (1.0 + phi * phi).sqrt();

        let mut positions = vec![
            Point3::new(-1.0, phi, 0.0) * scale,
            Point3::new(1.0, phi, 0.0) * scale,
            Point3::new(-1.0, -phi, 0.0) * scale,
            Point3::new(1.0, -phi, 0.0) * scale,
            Point3::new(0.0, -1.0, phi) * scale,
            Point3::new(0.0, 1.0, phi) * scale,
            Point3::new(0.0, -1.0, -phi) * scale,
            Point3::new(0.0, 1.0, -phi) * scale,
            Point3::new(phi, 0.0, -1.0) * scale,
            Point3::new(phi, 0.0, 1.0) * scale,
            Point3::new(-phi, 0.0, -1.0) * scale,
            Point3::new(-phi, 0.0, 1.0) * scale,
        ];

        let mut triangles = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut next = Vec::new();
            let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();

            for tri in &triangles {
                let mut mids = [0usize; 3];
                for i in 0..3 {
                    let v0 = tri[i];
                    let v1 = tri[(i + 1) % 3];
                    let key = if v0 < v1 { (v0, v1) } else { (v1, v0) };
                    mids[i] = *midpoints.entry(key).or_insert_with(|| {
                        let mid = (positions[v0].coords + positions[v1].coords) / 2.0;
                        positions.push(Point3::from(mid.normalize()));
                        positions.len() - 1
                    });
                }
                next.push([tri[0], mids[0], mids[2]]);
                next.push([tri[1], mids[1], mids[0]]);
                next.push([tri[2], mids[2], mids[1]]);
                next.push([mids[0], mids[1], mids[2]]);
            }
            triangles = next;
        }

        Dcel::from_triangle_mesh(&TriangleMesh::new(positions, triangles)).unwrap()
    }

    #[test]
    fn test_curvature_flat_plane() {
        let dcel = flat_grid(3);
        // Vertex (1,1) is interior
        let k = vertex_curvature(&dcel, VertexId::new(5)).unwrap();
        assert!(k.gaussian.abs() < 0.1, "K should be ~0, got {}", k.gaussian);
        assert!(k.mean.abs() < 0.1, "H should be ~0, got {}", k.mean);
        assert!(k.max_abs_principal() < 0.1);
    }

    #[test]
    fn test_gauss_bonnet_on_sphere() {
        let dcel = icosphere(2);
        let mut total = 0.0;
        for (v, k) in compute_curvature(&dcel, true).unwrap() {
            total += k.gaussian * mixed_area(&dcel, v).unwrap();
        }
        assert!((total - 4.0 * PI).abs() < 0.5, "expected ~4π, got {}", total);
    }

    #[test]
    fn test_principal_curvatures_relation() {
        let dcel = icosphere(1);
        for (_, k) in compute_curvature(&dcel, false).unwrap() {
            assert!((k.principal_max * k.principal_min - k.gaussian).abs() < 0.1);
            assert!(((k.principal_max + k.principal_min) / 2.0 - k.mean).abs() < 0.1);
            assert!(k.principal_max >= k.principal_min - 1e-10);
            let si = k.shape_index();
            assert!((-1.0 - 1e-10..=1.0 + 1e-10).contains(&si));
        }
    }

    #[test]
    fn test_sphere_curvature_is_near_one() {
        let dcel = icosphere(3);
        let k = vertex_curvature(&dcel, VertexId::new(0)).unwrap();
        assert!((k.max_abs_principal() - 1.0).abs() < 0.35, "got {}", k.max_abs_principal());
    }

    #[test]
    fn test_boundary_values_are_finite() {
        let dcel = flat_grid(2);
        for (_, k) in compute_curvature(&dcel, false).unwrap() {
            assert!(k.gaussian.is_finite());
            assert!(k.mean.is_finite());
        }
    }

    #[test]
    fn test_quad_faces_not_implemented() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let dcel: Dcel = Dcel::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        assert!(matches!(
            vertex_curvature(&dcel, VertexId::new(0)),
            Err(DcelError::NotImplemented(_))
        ));
    }
}
