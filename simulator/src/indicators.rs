use serde::Serialize;

use crate::{controller::Progress, geo::haversine_km, models::Waypoint};

/// Driver dashboard: the stop ahead and how far it is from the last one reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStop {
    pub index: usize,
    pub name: String,
    pub distance_km: f64,
}

/// `None` once the bus has reached (or is past) the destination.
pub fn next_stop(route: &[Waypoint], progress: Progress) -> Option<NextStop> {
    let current = route.get(progress.current_index)?;
    let next_index = progress.current_index + 1;
    let next = route.get(next_index)?;
    Some(NextStop {
        index: next_index,
        name: next.name.clone(),
        distance_km: haversine_km(current.coordinate(), next.coordinate()),
    })
}
