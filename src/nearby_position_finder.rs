use crate::{position::Position, resolution::ImageResolution};

/// The `max_amount` candidates closest to `around`, nearest first. Distances are
/// measured in micrometers. Candidates farther away than `max_distance_um` are never
/// returned; pass `f64::INFINITY` for no limit. A negative or NaN limit matches
/// nothing. Of equally distant candidates, the one seen first wins.
pub fn find_closest_n_positions<'a, I>(
    candidates: I,
    around: &Position,
    max_amount: usize,
    resolution: &ImageResolution,
    max_distance_um: f64,
) -> Vec<Position>
where
    I: IntoIterator<Item = &'a Position>,
{
    if max_amount == 0 || max_distance_um.is_nan() || max_distance_um < 0.0 {
        return vec![];
    }
    let max_distance_squared = max_distance_um * max_distance_um;
    let mut best: Vec<(f64, Position)> = Vec::with_capacity(max_amount + 1);
    for candidate in candidates {
        let distance_squared = candidate.distance_squared_um(around, resolution);
        if distance_squared > max_distance_squared {
            continue;
        }
        if best.len() == max_amount && distance_squared >= best[max_amount - 1].0 {
            continue;
        }
        if best.iter().any(|(_, position)| position == candidate) {
            continue;
        }
        let index = best.partition_point(|(d, _)| *d <= distance_squared);
        best.insert(index, (distance_squared, *candidate));
        best.truncate(max_amount);
    }
    best.into_iter().map(|(_, position)| position).collect()
}

pub fn find_closest_position<'a, I>(
    candidates: I,
    around: &Position,
    resolution: &ImageResolution,
    max_distance_um: f64,
) -> Option<Position>
where
    I: IntoIterator<Item = &'a Position>,
{
    find_closest_n_positions(candidates, around, 1, resolution, max_distance_um)
        .into_iter()
        .next()
}
