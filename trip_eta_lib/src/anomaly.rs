use crate::{estimator::distance, geo_point::GeoPoint};

/// Removes interior points that jump far away from both neighbours.
///
/// A point is dropped when its larger distance to a neighbour exceeds `factor`
/// times the distance between those neighbours. The first and last points are
/// always kept.
pub fn filter_anomalies(points: &[GeoPoint], factor: f64) -> Vec<GeoPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut filtered = Vec::with_capacity(points.len());
    filtered.push(points[0]);

    for window in points.windows(3) {
        let [prev, curr, next] = window else {
            continue;
        };

        let dist_to_prev = distance(prev, curr);
        let dist_to_next = distance(curr, next);
        let max_dist = dist_to_prev.max(dist_to_next);
        let dist_between_neighbors = distance(prev, next);

        if max_dist > dist_between_neighbors * factor {
            continue;
        }

        filtered.push(*curr);
    }

    filtered.push(points[points.len() - 1]);
    filtered
}

/// Total distance along the track in km.
pub fn track_length_km(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}
