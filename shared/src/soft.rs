/*!
Backend-agnostic soft-shape stand-in.

Neither wrapped engine exposes a native soft body, so soft-mesh descriptors
always land here: a vertex cloud that satisfies the full shape contract
(transform queries, vertex-level access, ray tests) without simulating.
Backends with native support would replace this per shape, not per world.

A soft mesh has no rigid-body pose, so the transform accessor reports a
synthetic one: the rotation last assigned plus the centroid of the pinned
(attachment) vertices, or of all vertices when nothing is pinned.
*/

use crate::constants::SOFT_RAY_VERTEX_RADIUS_M;
use crate::descriptor::ShapeDescriptor;
use crate::math::{Transform, Vec3};

/// One ray intersection, in the convention shared by every shape variant.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Fraction (0..1) of the tested segment where the hit occurred.
    pub fraction: f32,
    /// World-space surface normal at the hit. Synthetic for soft shapes.
    pub normal: Vec3,
    /// World-space hit position.
    pub position: Vec3,
}

#[derive(Clone, Debug)]
pub struct SoftShape {
    /// Object-local vertices, in descriptor order.
    vertices: Vec<Vec3>,
    /// Indices of pinned (attachment) vertices.
    pinned: Vec<u32>,
    /// Local centroid backing the synthetic center-of-mass transform.
    center_local: Vec3,
    /// Placement such that `transform()` reproduces the last set value.
    placement: Transform,
}

impl SoftShape {
    pub fn from_descriptor(desc: &ShapeDescriptor) -> Self {
        let center_local = centroid(&desc.vertices, &desc.pinned);
        let mut shape = Self {
            vertices: desc.vertices.clone(),
            pinned: desc.pinned.clone(),
            center_local,
            placement: Transform::identity(),
        };
        shape.set_transform(&desc.transform);
        shape
    }

    /// Synthetic center-of-mass transform.
    pub fn transform(&self) -> Transform {
        Transform::new(
            self.placement.to_world(self.center_local),
            self.placement.rotation,
        )
    }

    /// Place the cloud so that `transform()` returns `t` exactly.
    pub fn set_transform(&mut self, t: &Transform) {
        self.placement = t.mul(&Transform::from_translation(-self.center_local));
    }

    pub fn nodes_num(&self) -> usize {
        self.vertices.len()
    }

    /// World-space position of vertex `index`.
    ///
    /// Out-of-range indices are a caller bug: fatal in debug builds, zero in
    /// release.
    pub fn node_pos(&self, index: usize) -> Vec3 {
        debug_assert!(
            index < self.vertices.len(),
            "soft shape node index {index} out of range ({})",
            self.vertices.len()
        );
        match self.vertices.get(index) {
            Some(v) => self.placement.to_world(*v),
            None => Vec3::zeros(),
        }
    }

    pub fn pinned(&self) -> &[u32] {
        &self.pinned
    }

    /// Nearest-vertex ray test.
    ///
    /// Soft meshes carry no analytic surface, so the test selects the vertex
    /// nearest the segment (within [`SOFT_RAY_VERTEX_RADIUS_M`]) with the
    /// smallest ray fraction, and reports a synthetic normal opposing the ray
    /// direction.
    pub fn cast_ray(&self, start: Vec3, end: Vec3) -> Option<RayHit> {
        let dir = end - start;
        let len_sq = dir.norm_squared();
        if len_sq <= f32::EPSILON {
            return None;
        }

        let mut best: Option<f32> = None;
        for local in &self.vertices {
            let v = self.placement.to_world(*local);
            let fraction = (v - start).dot(&dir) / len_sq;
            if !(0.0..=1.0).contains(&fraction) {
                continue;
            }
            let closest = start + dir * fraction;
            if (v - closest).norm() > SOFT_RAY_VERTEX_RADIUS_M {
                continue;
            }
            if best.map_or(true, |b| fraction < b) {
                best = Some(fraction);
            }
        }

        best.map(|fraction| RayHit {
            fraction,
            normal: -dir.normalize(),
            position: start + dir * fraction,
        })
    }
}

fn centroid(vertices: &[Vec3], pinned: &[u32]) -> Vec3 {
    let picked: Vec<Vec3> = if pinned.is_empty() {
        vertices.to_vec()
    } else {
        pinned
            .iter()
            .filter_map(|&i| vertices.get(i as usize).copied())
            .collect()
    };
    if picked.is_empty() {
        return Vec3::zeros();
    }
    picked.iter().sum::<Vec3>() / picked.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ShapeKind;

    fn quad_descriptor() -> ShapeDescriptor {
        let mut desc = ShapeDescriptor::new(ShapeKind::SoftMesh, Vec3::zeros(), 1.0, 1);
        desc.vertices = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        desc
    }

    #[test]
    fn transform_round_trips_exactly() {
        let mut shape = SoftShape::from_descriptor(&quad_descriptor());
        let t = Transform::new(
            Vec3::new(3.0, -1.0, 2.0),
            crate::math::Quat::from_euler_angles(0.2, 0.0, 1.0),
        );
        shape.set_transform(&t);
        assert!(shape.transform().approx_eq(&t, 1.0e-5));
    }

    #[test]
    fn unpinned_center_is_vertex_centroid() {
        let shape = SoftShape::from_descriptor(&quad_descriptor());
        // Symmetric quad: centroid at the origin.
        assert!(shape.transform().translation.norm() < 1.0e-6);
    }

    #[test]
    fn pinned_vertices_take_over_the_centroid() {
        let mut desc = quad_descriptor();
        desc.pinned = vec![0, 1]; // the z = -1 edge
        let shape = SoftShape::from_descriptor(&desc);
        assert!((shape.transform().translation - Vec3::new(0.0, 0.0, -1.0)).norm() < 1.0e-6);
    }

    #[test]
    fn node_pos_follows_the_placement() {
        let mut shape = SoftShape::from_descriptor(&quad_descriptor());
        shape.set_transform(&Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let p = shape.node_pos(1);
        assert!((p - Vec3::new(11.0, 0.0, -1.0)).norm() < 1.0e-5);
    }

    #[test]
    fn ray_through_a_vertex_reports_its_fraction() {
        let shape = SoftShape::from_descriptor(&quad_descriptor());
        let start = Vec3::new(1.0, -2.0, -1.0);
        let end = Vec3::new(1.0, 2.0, -1.0);

        let hit = shape.cast_ray(start, end).expect("vertex on the ray");
        assert!((hit.fraction - 0.5).abs() < 1.0e-4);
        // Synthetic normal opposes the ray direction.
        assert!((hit.normal - Vec3::new(0.0, -1.0, 0.0)).norm() < 1.0e-5);
    }

    #[test]
    fn ray_missing_every_vertex_returns_none() {
        let shape = SoftShape::from_descriptor(&quad_descriptor());
        let hit = shape.cast_ray(Vec3::new(5.0, -2.0, 5.0), Vec3::new(5.0, 2.0, 5.0));
        assert!(hit.is_none());
    }
}
