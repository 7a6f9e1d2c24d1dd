//! Loadout selection.

use std::cmp::Ordering;
use std::time::Duration;

use crate::gateway::{Loadout, Sufficiency};

/// Result of choosing a loadout for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Send this loadout; it arrives after `travel_time`.
    Selected {
        loadout: Loadout,
        travel_time: Duration,
    },
    /// Some loadout is available but every available one is too slow.
    TimeLimit,
    /// No loadout is available.
    NoUnits,
}

/// Ranks candidates by travel time ascending, then payload descending.
pub fn rank(candidates: &mut [(Loadout, Sufficiency)]) {
    candidates.sort_by(|(a, sa), (b, sb)| match sa.travel_time.cmp(&sb.travel_time) {
        Ordering::Equal => b.payload.cmp(&a.payload),
        other => other,
    });
}

/// Picks the first ranked candidate that is sufficient and whose round trip
/// stays within `max_transit`.
pub fn select(mut candidates: Vec<(Loadout, Sufficiency)>, max_transit: Duration) -> Selection {
    rank(&mut candidates);

    let mut any_sufficient = false;
    for (loadout, sufficiency) in candidates {
        if !sufficiency.sufficient {
            continue;
        }
        any_sufficient = true;
        let round_trip = sufficiency.travel_time.checked_mul(2);
        if round_trip.is_some_and(|round_trip| round_trip <= max_transit) {
            return Selection::Selected {
                loadout,
                travel_time: sufficiency.travel_time,
            };
        }
    }

    if any_sufficient {
        Selection::TimeLimit
    } else {
        Selection::NoUnits
    }
}
