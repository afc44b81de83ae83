use crate::{links::Links, position::Position};
use serde::Serialize;
use std::collections::BTreeSet;

/// Where the scratch links of a position disagree with the baseline links.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkDifference {
    pub position: Position,
    /// Linked positions in the baseline that the scratch links lack.
    pub missing_in_scratch: Vec<Position>,
    /// Linked positions in the scratch links that the baseline lacks.
    pub extra_in_scratch: Vec<Position>,
}

impl LinkDifference {
    pub fn is_empty(&self) -> bool {
        self.missing_in_scratch.is_empty() && self.extra_in_scratch.is_empty()
    }
}

/// Compares the futures and pasts of every position in either graph. Positions that
/// are linked the same way in both are left out. Ascending by position.
pub fn linking_differences(scratch: &Links, baseline: &Links) -> Vec<LinkDifference> {
    let positions: BTreeSet<Position> = scratch
        .find_all_positions()
        .into_iter()
        .chain(baseline.find_all_positions())
        .collect();

    let linked = |links: &Links, position: &Position| -> BTreeSet<Position> {
        links
            .find_pasts(position)
            .into_iter()
            .chain(links.find_futures(position))
            .collect()
    };

    let differences: Vec<LinkDifference> = positions
        .iter()
        .map(|position| {
            let in_scratch = linked(scratch, position);
            let in_baseline = linked(baseline, position);
            LinkDifference {
                position: *position,
                missing_in_scratch: in_baseline.difference(&in_scratch).copied().collect(),
                extra_in_scratch: in_scratch.difference(&in_baseline).copied().collect(),
            }
        })
        .filter(|difference| !difference.is_empty())
        .collect();

    tracing::debug!(
        positions = positions.len(),
        differences = differences.len(),
        "Compared scratch and baseline links"
    );
    differences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, tp: i32) -> Position {
        Position::new(x, 0.0, 0.0, tp)
    }

    #[test]
    fn test_identical_links_have_no_differences() {
        let mut links = Links::new();
        links.add_link(p(0.0, 1), p(0.0, 2)).unwrap();
        assert!(linking_differences(&links, &links.clone()).is_empty());
    }

    #[test]
    fn test_reports_both_directions() {
        let mut scratch = Links::new();
        scratch.add_link(p(0.0, 1), p(0.0, 2)).unwrap();
        let mut baseline = Links::new();
        baseline.add_link(p(0.0, 1), p(1.0, 2)).unwrap();

        let differences = linking_differences(&scratch, &baseline);
        assert_eq!(differences.len(), 3);
        assert_eq!(
            differences[0],
            LinkDifference {
                position: p(0.0, 1),
                missing_in_scratch: vec![p(1.0, 2)],
                extra_in_scratch: vec![p(0.0, 2)],
            }
        );
        assert_eq!(differences[1].position, p(0.0, 2));
        assert_eq!(differences[1].extra_in_scratch, vec![p(0.0, 1)]);
        assert_eq!(differences[2].missing_in_scratch, vec![p(0.0, 1)]);
    }
}
