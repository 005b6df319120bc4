/*!
Contact router: filters raw backend contacts into per-object notifications.

Exactly one router is installed per backend activation (it is constructed
with the world). Each step the backend reports every *touching* shape pair;
the router:

1. drops pairs already touching on the previous step (only new contacts
   notify; a resting or sliding contact re-reported every tick is noise),
2. drops new contacts whose relative speed is below the configured floor,
3. resolves each side's owning game object through the packed user-data
   handle and emits one event per involved body, with the contact normal
   sign-flipped for the second one.

The router observes; it never alters collision resolution.
*/

use std::collections::HashSet;

use crate::descriptor::{ObjectId, ShapeId};
use crate::math::Vec3;

/// One touching shape pair as reported by a backend scan, in packed
/// user-data terms (see `arena::SlotHandle::pack`).
#[derive(Clone, Copy, Debug)]
pub struct RawContact {
    pub a: u64,
    pub b: u64,
    /// World-space contact position.
    pub position: Vec3,
    /// World-space contact normal, pointing from `a` toward `b`.
    pub normal: Vec3,
    /// Relative velocity of `a` with respect to `b` at the contact point.
    pub relative_velocity: Vec3,
}

/// A filtered contact notification addressed to one body binding.
#[derive(Clone, Copy, Debug)]
pub struct ContactEvent {
    pub owner: ObjectId,
    /// The other side's owner, when it resolves to a live shape.
    pub other: Option<ObjectId>,
    pub shape: ShapeId,
    pub position: Vec3,
    pub normal: Vec3,
    pub relative_velocity: Vec3,
}

pub struct ContactRouter {
    min_speed: f32,
    /// Pairs touching on the previous step, in normalized key order.
    persisting: HashSet<(u64, u64)>,
}

impl ContactRouter {
    pub fn new(min_speed: f32) -> Self {
        Self {
            min_speed,
            persisting: HashSet::new(),
        }
    }

    /// Process one step's touching pairs.
    ///
    /// `resolve` maps a packed user-data value back to a live shape and its
    /// owner; stale handles (shape destroyed during the same step) resolve to
    /// `None` and that side is skipped.
    pub fn route<F>(&mut self, touching: &[RawContact], resolve: F) -> Vec<ContactEvent>
    where
        F: Fn(u64) -> Option<(ShapeId, ObjectId)>,
    {
        let mut current = HashSet::with_capacity(touching.len());
        let mut events = Vec::new();

        for contact in touching {
            let key = pair_key(contact.a, contact.b);
            current.insert(key);

            if self.persisting.contains(&key) {
                continue;
            }
            if contact.relative_velocity.norm() < self.min_speed {
                continue;
            }

            let side_a = resolve(contact.a);
            let side_b = resolve(contact.b);

            if let Some((shape, owner)) = side_a {
                events.push(ContactEvent {
                    owner,
                    other: side_b.map(|(_, o)| o),
                    shape,
                    position: contact.position,
                    normal: contact.normal,
                    relative_velocity: contact.relative_velocity,
                });
            }
            if let Some((shape, owner)) = side_b {
                events.push(ContactEvent {
                    owner,
                    other: side_a.map(|(_, o)| o),
                    shape,
                    position: contact.position,
                    normal: -contact.normal,
                    relative_velocity: contact.relative_velocity,
                });
            }
        }

        self.persisting = current;
        events
    }

    /// Forget all persisting pairs (used when the world is cleared).
    pub fn reset(&mut self) {
        self.persisting.clear();
    }
}

#[inline]
fn pair_key(a: u64, b: u64) -> (u64, u64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::SlotHandle;

    fn contact(a: u64, b: u64, speed: f32) -> RawContact {
        RawContact {
            a,
            b,
            position: Vec3::new(0.0, 0.0, 1.0),
            normal: Vec3::z(),
            relative_velocity: Vec3::new(0.0, 0.0, -speed),
        }
    }

    fn resolve_all(raw: u64) -> Option<(ShapeId, ObjectId)> {
        Some((ShapeId(SlotHandle::unpack(raw)), raw + 100))
    }

    #[test]
    fn below_threshold_contact_is_discarded() {
        let mut router = ContactRouter::new(0.5);
        let events = router.route(&[contact(1, 2, 0.1)], resolve_all);
        assert!(events.is_empty());
    }

    #[test]
    fn new_contact_notifies_both_bodies_once() {
        let mut router = ContactRouter::new(0.5);
        let events = router.route(&[contact(1, 2, 3.0)], resolve_all);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].owner, 101);
        assert_eq!(events[0].other, Some(102));
        assert_eq!(events[1].owner, 102);
        assert_eq!(events[1].other, Some(101));
        // Normal is sign-flipped for the second body.
        assert!((events[0].normal + events[1].normal).norm() < 1.0e-6);
    }

    #[test]
    fn persisting_pair_does_not_refire() {
        let mut router = ContactRouter::new(0.5);
        assert_eq!(router.route(&[contact(1, 2, 3.0)], resolve_all).len(), 2);
        // Same pair still touching next step: no new notifications.
        assert!(router.route(&[contact(1, 2, 3.0)], resolve_all).is_empty());
        // Reversed report order is still the same pair.
        assert!(router.route(&[contact(2, 1, 3.0)], resolve_all).is_empty());
    }

    #[test]
    fn separating_then_touching_again_refires() {
        let mut router = ContactRouter::new(0.5);
        assert_eq!(router.route(&[contact(1, 2, 3.0)], resolve_all).len(), 2);
        assert!(router.route(&[], resolve_all).is_empty());
        assert_eq!(router.route(&[contact(1, 2, 3.0)], resolve_all).len(), 2);
    }

    #[test]
    fn unresolvable_side_is_skipped() {
        let mut router = ContactRouter::new(0.5);
        let events = router.route(&[contact(1, 2, 3.0)], |raw| {
            (raw == 1).then(|| (ShapeId(SlotHandle::unpack(raw)), 101))
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner, 101);
        assert_eq!(events[0].other, None);
    }

    #[test]
    fn slow_persisting_pair_stays_suppressed_when_it_speeds_up() {
        // The pair was already touching when it sped up, so no new-contact
        // notification fires; only separation and re-contact would.
        let mut router = ContactRouter::new(0.5);
        assert!(router.route(&[contact(1, 2, 0.1)], resolve_all).is_empty());
        assert!(router.route(&[contact(1, 2, 5.0)], resolve_all).is_empty());
    }
}
