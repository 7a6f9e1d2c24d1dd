//! Pure target list transformations: distance, filtering and ordering.
//!
//! None of these functions have side effects; given identical inputs they
//! always produce identical outputs.

use std::collections::HashSet;

use super::types::{Coord, PlayerId, Target, TargetId};

/// Rules applied by [`filter`]. A target is removed if ANY rule matches.
#[derive(Debug, Clone, Default)]
pub struct FilterRules<'a> {
    pub min_distance: f64,
    pub max_distance: f64,
    /// Player running the query; its own villages are never targets.
    pub owner: Option<PlayerId>,
    /// Force-eligible ids (player-owned targets are kept only if included).
    pub included: Option<&'a HashSet<TargetId>>,
    /// Force-excluded ids.
    pub ignored: Option<&'a HashSet<TargetId>>,
}

impl FilterRules<'_> {
    fn rejects(&self, target: &Target) -> bool {
        if target.distance < self.min_distance || target.distance > self.max_distance {
            return true;
        }
        if let Some(owner) = target.owner {
            if Some(owner) == self.owner {
                return true;
            }
            if !self.included.is_some_and(|set| set.contains(&target.id)) {
                return true;
            }
        }
        self.ignored.is_some_and(|set| set.contains(&target.id))
    }
}

/// Attaches the distance from `origin` to every target using `metric`.
pub fn compute_distances<M>(targets: Vec<Target>, origin: Coord, metric: M) -> Vec<Target>
where
    M: Fn(Coord, Coord) -> f64,
{
    targets
        .into_iter()
        .map(|mut target| {
            target.distance = metric(origin, target.coord);
            target
        })
        .collect()
}

/// Removes every target matched by at least one rule.
pub fn filter(targets: Vec<Target>, rules: &FilterRules<'_>) -> Vec<Target> {
    targets.into_iter().filter(|t| !rules.rejects(t)).collect()
}

/// Orders targets by ascending distance, keeping discovery order on ties.
pub fn sort(mut targets: Vec<Target>) -> Vec<Target> {
    // `sort_by` is stable, so equal distances keep their input order.
    targets.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    targets
}

/// Full preparation of a freshly loaded list: distances, filter, sort, cap.
pub fn prepare_targets<M>(
    targets: Vec<Target>,
    origin: Coord,
    metric: M,
    rules: &FilterRules<'_>,
    limit: usize,
) -> Vec<Target>
where
    M: Fn(Coord, Coord) -> f64,
{
    let mut prepared = sort(filter(compute_distances(targets, origin, metric), rules));
    prepared.truncate(limit);
    prepared
}
