/*!
Minimal animated-skeleton model.

The animation system proper is an external collaborator; this type carries
just enough state for the ragdoll binding to read the animated pose and to
write a physics-driven pose back: a node hierarchy, the bind pose, and the
current local transform per node.

# Model
- Nodes are stored parents-first: a node's parent index is always smaller
  than its own index. Iterating `0..len()` therefore visits the hierarchy
  root-to-leaf, which is the order shapes and joints must be built in.
- `local` transforms are relative to the parent node; the root's local
  transform is its world transform.
*/

use crate::math::Transform;

#[derive(Clone, Debug)]
pub struct SkeletonNode {
    pub name: String,
    /// Parent node index; `None` for the root. Always less than this node's
    /// own index.
    pub parent: Option<usize>,
    /// Local transform in the bind pose.
    pub bind_local: Transform,
    /// Current animated local transform.
    pub local: Transform,
}

#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    nodes: Vec<SkeletonNode>,
}

impl Skeleton {
    /// Build a skeleton from `(name, parent, bind_local)` triples.
    ///
    /// # Panics
    /// Panics if a parent index does not precede its child; that ordering is
    /// the construction contract of the asset pipeline, not a runtime input.
    pub fn new(nodes: Vec<(String, Option<usize>, Transform)>) -> Self {
        for (i, (_, parent, _)) in nodes.iter().enumerate() {
            if let Some(p) = parent {
                assert!(*p < i, "skeleton nodes must be stored parents-first");
            }
        }
        Self {
            nodes: nodes
                .into_iter()
                .map(|(name, parent, bind_local)| SkeletonNode {
                    name,
                    parent,
                    bind_local,
                    local: bind_local,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &SkeletonNode {
        &self.nodes[index]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    pub fn local(&self, index: usize) -> Transform {
        self.nodes[index].local
    }

    pub fn set_local(&mut self, index: usize, local: Transform) {
        self.nodes[index].local = local;
    }

    /// Current world transform of a node, composed up the parent chain.
    pub fn world_transform(&self, index: usize) -> Transform {
        let node = &self.nodes[index];
        match node.parent {
            Some(p) => self.world_transform(p).mul(&node.local),
            None => node.local,
        }
    }

    /// World transform of a node in the bind pose.
    pub fn bind_world_transform(&self, index: usize) -> Transform {
        let node = &self.nodes[index];
        match node.parent {
            Some(p) => self.bind_world_transform(p).mul(&node.bind_local),
            None => node.bind_local,
        }
    }

    /// Reset every node's current pose to the bind pose.
    pub fn reset_to_bind(&mut self) {
        for node in &mut self.nodes {
            node.local = node.bind_local;
        }
    }

    /// Indices of the direct children of `index`.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(index))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quat, Vec3};
    use nalgebra as na;

    fn three_bone_chain() -> Skeleton {
        Skeleton::new(vec![
            (
                "root".into(),
                None,
                Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            ),
            (
                "a".into(),
                Some(0),
                Transform::from_translation(Vec3::new(0.0, 0.0, 0.5)),
            ),
            (
                "b".into(),
                Some(1),
                Transform::from_translation(Vec3::new(0.0, 0.0, 0.5)),
            ),
        ])
    }

    #[test]
    fn world_transform_composes_up_the_chain() {
        let skel = three_bone_chain();
        let world_b = skel.world_transform(2);
        assert!((world_b.translation - Vec3::new(0.0, 0.0, 2.0)).norm() < 1.0e-6);
    }

    #[test]
    fn rotating_the_root_moves_descendant_world_transforms() {
        let mut skel = three_bone_chain();
        // Quarter turn about X: child offsets along +Z swing to -Y.
        skel.set_local(
            0,
            Transform::new(
                Vec3::new(0.0, 0.0, 1.0),
                Quat::from_axis_angle(&na::Vector3::x_axis(), std::f32::consts::FRAC_PI_2),
            ),
        );
        let world_b = skel.world_transform(2);
        assert!((world_b.translation - Vec3::new(0.0, -1.0, 1.0)).norm() < 1.0e-5);
    }

    #[test]
    fn reset_to_bind_restores_locals() {
        let mut skel = three_bone_chain();
        skel.set_local(1, Transform::from_translation(Vec3::new(5.0, 5.0, 5.0)));
        skel.reset_to_bind();
        assert!(
            skel.local(1)
                .approx_eq(&Transform::from_translation(Vec3::new(0.0, 0.0, 0.5)), 1.0e-6)
        );
    }

    #[test]
    fn find_and_children() {
        let skel = three_bone_chain();
        assert_eq!(skel.find("a"), Some(1));
        assert_eq!(skel.find("missing"), None);
        assert_eq!(skel.children(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    #[should_panic(expected = "parents-first")]
    fn out_of_order_parent_panics() {
        let _ = Skeleton::new(vec![
            ("child".into(), Some(1), Transform::identity()),
            ("root".into(), None, Transform::identity()),
        ]);
    }
}
