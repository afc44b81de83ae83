use crate::{
    links::{EndMarker, Links},
    position::Position,
    score::{Family, Score, ScoreCollection},
};

/// Divisions recorded in the links: positions with exactly two futures, ascending by
/// mother. Mothers with more daughters are left to the error checker.
pub fn find_mothers(links: &Links) -> Vec<Family> {
    links
        .find_all_positions()
        .into_iter()
        .filter_map(|position| {
            let futures = links.find_futures(&position);
            let [daughter1, daughter2] = futures.as_slice() else {
                return None;
            };
            Family::new(position, *daughter1, *daughter2).ok()
        })
        .collect()
}

/// Positions where a cell dies: marked as dead, or ending before the last time point
/// without any other end marker. Ascending.
pub fn find_cell_deaths(links: &Links, last_time_point_number: i32) -> Vec<Position> {
    links
        .find_all_positions()
        .into_iter()
        .filter(|position| links.future_count(position) == 0)
        .filter(|position| match links.get_end_marker(position) {
            Some(EndMarker::Dead) => true,
            Some(_) => false,
            None => position
                .time_point_number()
                .is_some_and(|tp| tp < last_time_point_number),
        })
        .collect()
}

/// Every recorded division with its family score, if one was calculated.
pub fn find_division_families_with_scores(
    links: &Links,
    scores: &ScoreCollection,
) -> Vec<(Family, Option<Score>)> {
    find_mothers(links)
        .into_iter()
        .map(|family| {
            let score = scores.family_score(&family).cloned();
            (family, score)
        })
        .collect()
}
