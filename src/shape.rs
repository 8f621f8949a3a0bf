//! Shape analysis: turns a product mesh into a compact `ProductShape`.
//!
//! The oriented bounding box comes from a PCA of the vertex cloud. Because PCA
//! does not always give the tightest box (symmetric products have no preferred
//! axes), the world-aligned box is used instead whenever it is at least as tight.

use std::collections::HashMap;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::GeometryError;
use crate::model::{ContactKind, ContactPoint, FragilityClass, ProductShape};
use crate::types::Vec3;

/// Smallest usable principal extent in mm.
const MIN_EXTENT: f64 = 1e-3;
/// Base band thickness as a fraction of the product height.
const BASE_BAND_RATIO: f64 = 0.02;
/// Minimum base band thickness in mm.
const BASE_BAND_MIN: f64 = 1.0;
/// Extreme points this close (fraction of extent) to two other faces are corners.
const CORNER_BAND_RATIO: f64 = 0.1;

/// Finished product geometry as delivered by the reconstruction stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "vertices": [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0], [0.0, 0.0, 100.0]],
        "triangles": [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]]
    })
)]
pub struct MeshInput {
    /// World-space vertex positions in mm, z pointing up.
    pub vertices: Vec<[f64; 3]>,
    /// Optional triangle list. Absent for point clouds.
    #[serde(default)]
    pub triangles: Option<Vec<[usize; 3]>>,
}

impl MeshInput {
    pub fn point_cloud(vertices: Vec<[f64; 3]>) -> Self {
        Self {
            vertices,
            triangles: None,
        }
    }

    pub fn with_triangles(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles: Some(triangles),
        }
    }

    /// Closed, consistently manifold triangle list: every edge shared by exactly two triangles.
    pub fn is_closed(&self) -> bool {
        let Some(triangles) = self.triangles.as_ref() else {
            return false;
        };
        if triangles.is_empty() {
            return false;
        }
        let mut edges: HashMap<(usize, usize), u32> = HashMap::new();
        for tri in triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        edges.values().all(|&count| count == 2)
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if self.vertices.len() < 4 {
            return Err(GeometryError::TooFewVertices {
                found: self.vertices.len(),
                required: 4,
            });
        }
        if let Some(index) = self
            .vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(GeometryError::NonFiniteVertex { index });
        }
        if let Some(triangles) = &self.triangles {
            for (index, tri) in triangles.iter().enumerate() {
                if let Some(&vertex) = tri.iter().find(|&&v| v >= self.vertices.len()) {
                    return Err(GeometryError::InvalidTriangle { index, vertex });
                }
            }
        }
        Ok(())
    }
}

/// Optional caller knowledge about the product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShapeHints {
    #[serde(default)]
    #[schema(nullable = true)]
    pub fragility: Option<FragilityClass>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub category: Option<String>,
}

/// Local frame candidate: columns are the local axes in world space.
struct Frame {
    axes: Matrix3<f64>,
    min: Vector3<f64>,
    max: Vector3<f64>,
}

impl Frame {
    fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    fn volume(&self) -> f64 {
        let e = self.extents();
        e.x * e.y * e.z
    }
}

/// Analyzes a mesh and produces the immutable product summary.
///
/// # Errors
/// Returns a `GeometryError` for too few vertices, non-finite coordinates,
/// dangling triangle indices or a (near) flat product.
pub fn analyze(mesh: &MeshInput, hints: &ShapeHints) -> Result<ProductShape, GeometryError> {
    mesh.validate()?;

    let points: Vec<Vector3<f64>> = mesh
        .vertices
        .iter()
        .map(|v| Vector3::new(v[0], v[1], v[2]))
        .collect();
    let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;

    let pca = build_frame(principal_axes(&points, &centroid), &points, &centroid);
    let aligned = build_frame(Matrix3::identity(), &points, &centroid);
    let frame = if aligned.volume() <= pca.volume() * (1.0 + 1e-9) {
        aligned
    } else {
        pca
    };

    let extents = frame.extents();
    if extents.iter().any(|&e| e < MIN_EXTENT) || frame.volume() < MIN_EXTENT.powi(3) {
        return Err(GeometryError::DegenerateExtent {
            length: extents.x,
            width: extents.y,
            height: extents.z,
        });
    }

    let local_center = (frame.min + frame.max) / 2.0;
    let center = centroid + frame.axes * local_center;
    let extents_vec = Vec3::new(extents.x, extents.y, extents.z);

    let obb_volume = frame.volume();
    let volume = if mesh.is_closed() {
        let mesh_volume = signed_volume(mesh).abs();
        if mesh_volume > MIN_EXTENT.powi(3) {
            mesh_volume
        } else {
            obb_volume
        }
    } else {
        obb_volume
    };
    let surface_area = match mesh.triangles.as_ref() {
        Some(triangles) if !triangles.is_empty() => triangle_area(mesh, triangles),
        _ => extents_vec.box_surface_area(),
    };

    let local: Vec<Vec3> = points
        .iter()
        .map(|p| {
            let l = frame.axes.transpose() * (p - centroid) - frame.min;
            Vec3::new(l.x, l.y, l.z)
        })
        .collect();
    let contact_points = contact_points(&local, extents_vec);

    let fragility = hints.fragility.unwrap_or_else(|| {
        hints
            .category
            .as_deref()
            .map(FragilityClass::from_category)
            .unwrap_or_default()
    });

    let mut rotation = [[0.0; 3]; 3];
    for (r, row) in rotation.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = frame.axes[(r, c)];
        }
    }

    debug!(
        length = extents.x,
        width = extents.y,
        height = extents.z,
        volume,
        contacts = contact_points.len(),
        fragility = fragility.code(),
        "analyzed product shape"
    );

    Ok(ProductShape::new(
        Vec3::new(center.x, center.y, center.z),
        extents_vec,
        rotation,
        volume,
        surface_area,
        fragility,
        hints.category.clone(),
        contact_points,
    ))
}

fn principal_axes(points: &[Vector3<f64>], centroid: &Vector3<f64>) -> Matrix3<f64> {
    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= points.len() as f64;
    cov.symmetric_eigen().eigenvectors
}

/// Orders candidate axes into (length, width, height) with height along gravity.
fn build_frame(
    candidates: Matrix3<f64>,
    points: &[Vector3<f64>],
    centroid: &Vector3<f64>,
) -> Frame {
    let columns: Vec<Vector3<f64>> = (0..3).map(|i| candidates.column(i).into_owned()).collect();

    let up = Vector3::z();
    let gravity_idx = (0..3)
        .max_by(|&a, &b| {
            columns[a]
                .dot(&up)
                .abs()
                .total_cmp(&columns[b].dot(&up).abs())
        })
        .unwrap_or(2);
    let mut z_axis = columns[gravity_idx];
    if z_axis.dot(&up) < 0.0 {
        z_axis = -z_axis;
    }

    let mut horizontal: Vec<Vector3<f64>> = (0..3)
        .filter(|&i| i != gravity_idx)
        .map(|i| columns[i])
        .collect();
    horizontal.sort_by(|a, b| span(points, centroid, b).total_cmp(&span(points, centroid, a)));
    let x_axis = horizontal[0];
    let y_axis = z_axis.cross(&x_axis);

    let axes = Matrix3::from_columns(&[x_axis, y_axis, z_axis]);
    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for p in points {
        let local = axes.transpose() * (p - centroid);
        min = min.inf(&local);
        max = max.sup(&local);
    }
    Frame { axes, min, max }
}

fn span(points: &[Vector3<f64>], centroid: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let t = (p - centroid).dot(axis);
        (lo.min(t), hi.max(t))
    });
    hi - lo
}

fn signed_volume(mesh: &MeshInput) -> f64 {
    let Some(triangles) = mesh.triangles.as_ref() else {
        return 0.0;
    };
    triangles
        .iter()
        .map(|tri| {
            let a = Vector3::from(mesh.vertices[tri[0]]);
            let b = Vector3::from(mesh.vertices[tri[1]]);
            let c = Vector3::from(mesh.vertices[tri[2]]);
            a.dot(&b.cross(&c)) / 6.0
        })
        .sum()
}

fn triangle_area(mesh: &MeshInput, triangles: &[[usize; 3]]) -> f64 {
    triangles
        .iter()
        .map(|tri| {
            let a = Vector3::from(mesh.vertices[tri[0]]);
            let b = Vector3::from(mesh.vertices[tri[1]]);
            let c = Vector3::from(mesh.vertices[tri[2]]);
            (b - a).cross(&(c - a)).norm() / 2.0
        })
        .sum()
}

/// Base contacts (up to four quadrant centroids) followed by the six extreme points.
fn contact_points(local: &[Vec3], extents: Vec3) -> Vec<ContactPoint> {
    const QUADRANTS: [&str; 4] = ["min_x_min_y", "max_x_min_y", "min_x_max_y", "max_x_max_y"];

    let mut contacts = Vec::new();
    let band = (extents.z * BASE_BAND_RATIO).max(BASE_BAND_MIN);
    let half = extents.center();

    let mut sums = [(Vec3::zero(), 0usize); 4];
    for p in local.iter().filter(|p| p.z <= band) {
        let quadrant = usize::from(p.x >= half.x) | (usize::from(p.y >= half.y) << 1);
        sums[quadrant].0 = sums[quadrant].0 + *p;
        sums[quadrant].1 += 1;
    }
    for (quadrant, (sum, count)) in sums.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        contacts.push(ContactPoint {
            name: format!("base_{}", QUADRANTS[quadrant]),
            kind: ContactKind::Base,
            position: *sum * (1.0 / *count as f64),
            load_direction: Vec3::new(0.0, 0.0, -1.0),
        });
    }

    const AXES: [&str; 3] = ["x", "y", "z"];
    for axis in 0..3 {
        for positive in [false, true] {
            let extreme = local.iter().copied().reduce(|best, p| {
                let (b, v) = (best.axis(axis), p.axis(axis));
                if (positive && v > b) || (!positive && v < b) { p } else { best }
            });
            let Some(position) = extreme else { continue };

            let near_faces = (0..3).filter(|&other| other != axis).all(|other| {
                let c = position.axis(other);
                let e = extents.axis(other);
                c <= CORNER_BAND_RATIO * e || c >= (1.0 - CORNER_BAND_RATIO) * e
            });
            let sign = if positive { 1.0 } else { -1.0 };
            contacts.push(ContactPoint {
                name: format!("{}_{}", if positive { "max" } else { "min" }, AXES[axis]),
                kind: if near_faces {
                    ContactKind::Corner
                } else {
                    ContactKind::Edge
                },
                position,
                load_direction: Vec3::zero().with_axis(axis, sign),
            });
        }
    }
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuboid(l: f64, w: f64, h: f64) -> MeshInput {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [l, 0.0, 0.0],
            [l, w, 0.0],
            [0.0, w, 0.0],
            [0.0, 0.0, h],
            [l, 0.0, h],
            [l, w, h],
            [0.0, w, h],
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        MeshInput::with_triangles(vertices, triangles)
    }

    fn rotated_about_z(mesh: &MeshInput, degrees: f64) -> MeshInput {
        let (s, c) = degrees.to_radians().sin_cos();
        MeshInput {
            vertices: mesh
                .vertices
                .iter()
                .map(|v| [c * v[0] - s * v[1], s * v[0] + c * v[1], v[2]])
                .collect(),
            triangles: mesh.triangles.clone(),
        }
    }

    #[test]
    fn cube_has_exact_extents_and_volume() {
        let shape = analyze(&cuboid(100.0, 100.0, 100.0), &ShapeHints::default()).unwrap();
        let e = shape.extents();
        assert!((e.x - 100.0).abs() < 1e-6);
        assert!((e.y - 100.0).abs() < 1e-6);
        assert!((e.z - 100.0).abs() < 1e-6);
        assert!((shape.volume() - 1_000_000.0).abs() < 1e-3);
        assert!((shape.surface_area() - 60_000.0).abs() < 1e-3);
        assert_eq!(shape.fragility(), FragilityClass::Medium);
    }

    #[test]
    fn orders_horizontal_extents_longest_first() {
        let shape = analyze(&cuboid(80.0, 200.0, 50.0), &ShapeHints::default()).unwrap();
        let e = shape.extents();
        assert!((e.x - 200.0).abs() < 1e-6);
        assert!((e.y - 80.0).abs() < 1e-6);
        assert!((e.z - 50.0).abs() < 1e-6);
    }

    #[test]
    fn recovers_rotated_cuboid_with_pca() {
        let mesh = rotated_about_z(&cuboid(300.0, 200.0, 100.0), 30.0);
        let shape = analyze(&mesh, &ShapeHints::default()).unwrap();
        let e = shape.extents();
        assert!((e.x - 300.0).abs() < 1e-3, "length was {}", e.x);
        assert!((e.y - 200.0).abs() < 1e-3, "width was {}", e.y);
        assert!((e.z - 100.0).abs() < 1e-3, "height was {}", e.z);
        assert!((shape.volume() - 6_000_000.0).abs() < 1.0);
    }

    #[test]
    fn point_cloud_falls_back_to_box_volume() {
        let mesh = MeshInput::point_cloud(cuboid(10.0, 20.0, 30.0).vertices);
        let shape = analyze(&mesh, &ShapeHints::default()).unwrap();
        assert!((shape.volume() - 6000.0).abs() < 1e-6);
        assert!((shape.surface_area() - 2200.0).abs() < 1e-6);
    }

    #[test]
    fn open_mesh_uses_box_volume() {
        let mut mesh = cuboid(10.0, 10.0, 10.0);
        if let Some(triangles) = mesh.triangles.as_mut() {
            triangles.truncate(10);
        }
        assert!(!mesh.is_closed());
        let shape = analyze(&mesh, &ShapeHints::default()).unwrap();
        assert!((shape.volume() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn cube_contacts_cover_base_quadrants_and_corners() {
        let shape = analyze(&cuboid(100.0, 100.0, 100.0), &ShapeHints::default()).unwrap();
        let base: Vec<_> = shape.contacts_of(ContactKind::Base).collect();
        assert_eq!(base.len(), 4);
        assert!(base.iter().all(|c| c.position.z.abs() < 1e-6));
        assert!(base.iter().all(|c| c.load_direction == Vec3::new(0.0, 0.0, -1.0)));

        let corners = shape.contacts_of(ContactKind::Corner).count();
        assert_eq!(corners, 6);
        let top = shape
            .contact_points()
            .iter()
            .find(|c| c.name == "max_z")
            .unwrap();
        assert_eq!(top.load_axis(), 2);
        assert!(top.loads_positive());
    }

    #[test]
    fn mid_face_extreme_is_an_edge_contact() {
        // Square pyramid: the apex sits in the middle of the top face.
        let mesh = MeshInput::point_cloud(vec![
            [0.0, 0.0, 0.0],
            [100.0, 0.0, 0.0],
            [100.0, 100.0, 0.0],
            [0.0, 100.0, 0.0],
            [50.0, 50.0, 80.0],
        ]);
        let shape = analyze(&mesh, &ShapeHints::default()).unwrap();
        let apex = shape
            .contact_points()
            .iter()
            .find(|c| c.name == "max_z")
            .unwrap();
        assert_eq!(apex.kind, ContactKind::Edge);
    }

    #[test]
    fn fragility_hint_beats_category() {
        let hints = ShapeHints {
            fragility: Some(FragilityClass::Low),
            category: Some("glass".to_string()),
        };
        let shape = analyze(&cuboid(10.0, 10.0, 10.0), &hints).unwrap();
        assert_eq!(shape.fragility(), FragilityClass::Low);

        let hints = ShapeHints {
            fragility: None,
            category: Some("glass".to_string()),
        };
        let shape = analyze(&cuboid(10.0, 10.0, 10.0), &hints).unwrap();
        assert_eq!(shape.fragility(), FragilityClass::High);
        assert_eq!(shape.category(), Some("glass"));
    }

    #[test]
    fn rejects_bad_geometry() {
        let few = MeshInput::point_cloud(vec![[0.0; 3]; 3]);
        assert!(matches!(
            analyze(&few, &ShapeHints::default()),
            Err(GeometryError::TooFewVertices { found: 3, .. })
        ));

        let mut nan = cuboid(10.0, 10.0, 10.0);
        nan.vertices[5][1] = f64::NAN;
        assert!(matches!(
            analyze(&nan, &ShapeHints::default()),
            Err(GeometryError::NonFiniteVertex { index: 5 })
        ));

        let mut dangling = cuboid(10.0, 10.0, 10.0);
        if let Some(triangles) = dangling.triangles.as_mut() {
            triangles[3] = [0, 1, 42];
        }
        assert!(matches!(
            analyze(&dangling, &ShapeHints::default()),
            Err(GeometryError::InvalidTriangle {
                index: 3,
                vertex: 42
            })
        ));

        let flat = MeshInput::point_cloud(vec![
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [10.0, 10.0, 0.0],
            [0.0, 10.0, 0.0],
        ]);
        assert!(matches!(
            analyze(&flat, &ShapeHints::default()),
            Err(GeometryError::DegenerateExtent { .. })
        ));
    }
}
