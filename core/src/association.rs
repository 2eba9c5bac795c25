//! Nearest-neighbor data association
//!
//! Each map-frame observation is tagged with the id of the closest candidate landmark. Association is a pure
//! function: the input observations are left untouched and a tagged copy is returned. With at most a few
//! dozen landmarks in sensor range a linear scan is used; there is no spatial index.
use crate::distance;
use crate::map::LandmarkObservation;

/// Index and distance of the candidate nearest to `(x, y)`
///
/// Ties resolve to the first candidate in `candidates` order. Returns `None` for an empty candidate list.
pub fn nearest(candidates: &[LandmarkObservation], x: f64, y: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let d = distance(candidate.x, candidate.y, x, y);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best
}

/// Tag every observation with the id of its nearest candidate
///
/// # Arguments
/// * `candidates` - Map-frame landmark positions (typically those within sensor range) with ids set
/// * `observations` - Map-frame observations
///
/// # Returns
/// One observation per input, in the same order, with `id` set to the nearest candidate's id. When
/// `candidates` is empty the returned ids are `None`.
pub fn associate(
    candidates: &[LandmarkObservation],
    observations: &[LandmarkObservation],
) -> Vec<LandmarkObservation> {
    observations
        .iter()
        .map(|obs| LandmarkObservation {
            id: nearest(candidates, obs.x, obs.y).and_then(|(i, _)| candidates[i].id),
            x: obs.x,
            y: obs.y,
        })
        .collect()
}
