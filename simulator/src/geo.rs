use crate::models::{Coordinate, Waypoint};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Sample `steps + 1` evenly spaced points from `from` to `to`, both included.
pub fn segment_samples(from: Coordinate, to: Coordinate, steps: usize) -> Vec<Coordinate> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| from.interpolate(to, i as f64 / steps as f64))
        .collect()
}

pub fn approximate_distance_km(route: &[Waypoint]) -> f64 {
    route
        .windows(2)
        .map(|w| haversine_km(w[0].coordinate(), w[1].coordinate()))
        .sum()
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gasolinera() -> Coordinate {
        Coordinate {
            lat: 14.291,
            lng: -89.918,
        }
    }

    fn colegio() -> Coordinate {
        Coordinate {
            lat: 14.2896,
            lng: -89.92523,
        }
    }

    #[test]
    fn test_haversine_same_point() {
        assert_eq!(haversine_km(gasolinera(), gasolinera()), 0.0);
    }

    #[test]
    fn test_haversine_short_hop() {
        // Gasolinera to Colegio is a bit under a kilometre.
        let d = haversine_km(gasolinera(), colegio());
        assert!(d > 0.7 && d < 0.9, "unexpected distance {d}");
    }

    #[test]
    fn test_approximate_distance_single_point() {
        let route = vec![Waypoint::new("Gasolinera", 14.291, -89.918)];
        assert_eq!(approximate_distance_km(&route), 0.0);
    }

    #[test]
    fn test_segment_samples_include_endpoints() {
        let samples = segment_samples(gasolinera(), colegio(), 25);
        assert_eq!(samples.len(), 26);
        assert_eq!(samples[0], gasolinera());
        assert!((samples[25].lat - colegio().lat).abs() < 1e-12);
        assert!((samples[25].lng - colegio().lng).abs() < 1e-12);
    }

    #[test]
    fn test_segment_samples_zero_steps_still_moves() {
        let samples = segment_samples(gasolinera(), colegio(), 0);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], gasolinera());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lng)| Coordinate { lat, lng })
        }

        proptest! {
            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-10);
            }

            #[test]
            fn prop_haversine_triangle_inequality(
                a in valid_coord(),
                b in valid_coord(),
                c in valid_coord()
            ) {
                prop_assert!(haversine_km(a, c) <= haversine_km(a, b) + haversine_km(b, c) + 1e-6);
            }

            #[test]
            fn prop_samples_stay_on_segment(
                a in valid_coord(),
                b in valid_coord(),
                steps in 1usize..64
            ) {
                let samples = segment_samples(a, b, steps);
                prop_assert_eq!(samples.len(), steps + 1);
                let (lo_lat, hi_lat) = (a.lat.min(b.lat), a.lat.max(b.lat));
                let (lo_lng, hi_lng) = (a.lng.min(b.lng), a.lng.max(b.lng));
                for p in samples {
                    prop_assert!(p.lat >= lo_lat - 1e-9 && p.lat <= hi_lat + 1e-9);
                    prop_assert!(p.lng >= lo_lng - 1e-9 && p.lng <= hi_lng + 1e-9);
                }
            }

            #[test]
            fn prop_route_distance_is_sum_of_legs(
                coords in prop::collection::vec(valid_coord(), 2..8)
            ) {
                let route: Vec<Waypoint> = coords
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Waypoint::new(format!("stop {i}"), c.lat, c.lng))
                    .collect();
                let legs: f64 = coords.windows(2).map(|w| haversine_km(w[0], w[1])).sum();
                prop_assert!((approximate_distance_km(&route) - legs).abs() < 1e-9);
            }
        }
    }
}
