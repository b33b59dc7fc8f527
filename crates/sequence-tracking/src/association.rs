//! Hand-to-worker association
//!
//! Assigns each detected hand to the nearest detected person within a
//! proximity threshold. Worker ids are 1-based indices over the persons in
//! the current frame only; they are labels, not stable identities, and
//! nothing downstream may rely on them for correctness.

use scooper_watch_common::Detection;
use tracing::debug;

/// Associate each hand with the closest person within `max_distance` pixels.
///
/// Returns one entry per hand, `None` when no person is close enough.
#[must_use]
pub fn associate_hands_with_workers(
    hands: &[Detection],
    persons: &[Detection],
    max_distance: f32,
) -> Vec<Option<u32>> {
    if persons.is_empty() {
        debug!("no persons detected, hands remain unassigned");
        return vec![None; hands.len()];
    }

    hands
        .iter()
        .enumerate()
        .map(|(hand_idx, hand)| {
            let mut min_distance = f32::INFINITY;
            let mut closest_worker = None;

            for (person_idx, person) in persons.iter().enumerate() {
                let distance = hand.center.distance_to(person.center);
                if distance < min_distance && distance <= max_distance {
                    min_distance = distance;
                    // Worker ids start from 1
                    closest_worker = Some(person_idx as u32 + 1);
                }
            }

            match closest_worker {
                Some(worker) => {
                    debug!(hand_idx, worker, distance = min_distance, "hand associated");
                }
                None => debug!(hand_idx, "hand could not be associated with any worker"),
            }
            closest_worker
        })
        .collect()
}
