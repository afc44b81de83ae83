//! Detection quality of automatically found positions, measured against manually
//! annotated ground truth.

use crate::{
    position::{Position, TimePoint},
    position_collection::PositionCollection,
    resolution::ImageResolution,
};
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

pub const DEFAULT_MAX_DISTANCE_UM: f64 = 5.0;
pub const DEFAULT_REJECTION_DISTANCE_UM: f64 = 1_000_000.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl DetectionCounts {
    /// Fraction of the ground truth that was found. Zero without ground truth.
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Fraction of the detections that are correct. Zero without detections.
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    pub fn f1_score(&self) -> f64 {
        let recall = self.recall();
        let precision = self.precision();
        if recall + precision == 0.0 {
            return 0.0;
        }
        2.0 * recall * precision / (recall + precision)
    }

    fn add(&mut self, other: &DetectionCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ComparisonReport {
    pub totals: DetectionCounts,
    pub per_time_point: BTreeMap<i32, DetectionCounts>,
    /// Keyed by the z layer of the ground truth position, or of the detection for
    /// false positives.
    pub per_z: BTreeMap<i32, DetectionCounts>,
    /// Matched `(ground truth, detection)` pairs.
    pub true_positives: Vec<(Position, Position)>,
    pub false_positives: Vec<Position>,
    pub false_negatives: Vec<Position>,
    /// Detections too far away from any ground truth to be judged.
    pub rejected: Vec<Position>,
}

impl ComparisonReport {
    pub fn recall(&self) -> f64 {
        self.totals.recall()
    }

    pub fn precision(&self) -> f64 {
        self.totals.precision()
    }

    pub fn f1_score(&self) -> f64 {
        self.totals.f1_score()
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "True positives: {}, false positives: {}, false negatives: {}",
            self.totals.true_positives, self.totals.false_positives, self.totals.false_negatives
        )?;
        write!(
            f,
            "Recall: {:.3}, precision: {:.3}, F1 score: {:.3}",
            self.recall(),
            self.precision(),
            self.f1_score()
        )
    }
}

#[derive(Default)]
struct TimePointComparison {
    time_point_number: i32,
    true_positives: Vec<(Position, Position)>,
    false_positives: Vec<Position>,
    false_negatives: Vec<Position>,
    rejected: Vec<Position>,
}

/// Matches ground truth positions one-to-one to detections within `max_distance_um`,
/// closest pairs first. Detections farther than `rejection_distance_um` from every
/// ground truth position are not counted at all.
pub fn compare_positions(
    ground_truth: &PositionCollection,
    automatic: &PositionCollection,
    resolution: &ImageResolution,
    max_distance_um: f64,
    rejection_distance_um: f64,
) -> ComparisonReport {
    let time_points: Vec<TimePoint> = ground_truth
        .time_points()
        .into_iter()
        .chain(automatic.time_points())
        .sorted()
        .dedup()
        .collect();

    let comparisons: Vec<TimePointComparison> = time_points
        .par_iter()
        .map(|time_point| {
            compare_time_point(
                &ground_truth.of_time_point(*time_point),
                &automatic.of_time_point(*time_point),
                resolution,
                max_distance_um,
                rejection_distance_um,
                time_point.time_point_number(),
            )
        })
        .collect();

    let mut report = ComparisonReport::default();
    let z_layer = |position: &Position| position.z.round() as i32;
    for comparison in comparisons {
        let counts = DetectionCounts {
            true_positives: comparison.true_positives.len(),
            false_positives: comparison.false_positives.len(),
            false_negatives: comparison.false_negatives.len(),
        };
        report.totals.add(&counts);
        report
            .per_time_point
            .insert(comparison.time_point_number, counts);

        for (truth, _) in &comparison.true_positives {
            report.per_z.entry(z_layer(truth)).or_default().true_positives += 1;
        }
        for detection in &comparison.false_positives {
            report.per_z.entry(z_layer(detection)).or_default().false_positives += 1;
        }
        for truth in &comparison.false_negatives {
            report.per_z.entry(z_layer(truth)).or_default().false_negatives += 1;
        }
        report.true_positives.extend(comparison.true_positives);
        report.false_positives.extend(comparison.false_positives);
        report.false_negatives.extend(comparison.false_negatives);
        report.rejected.extend(comparison.rejected);
    }

    tracing::debug!(
        time_points = time_points.len(),
        recall = report.recall(),
        precision = report.precision(),
        "Compared positions"
    );
    report
}

fn compare_time_point(
    ground_truth: &[Position],
    automatic: &[Position],
    resolution: &ImageResolution,
    max_distance_um: f64,
    rejection_distance_um: f64,
    time_point_number: i32,
) -> TimePointComparison {
    let mut ret = TimePointComparison {
        time_point_number,
        ..TimePointComparison::default()
    };

    let mut candidates = vec![];
    for detection in automatic {
        let nearest = ground_truth
            .iter()
            .map(|truth| truth.distance_um(detection, resolution))
            .fold(f64::INFINITY, f64::min);
        if nearest > rejection_distance_um {
            ret.rejected.push(*detection);
        } else {
            candidates.push(*detection);
        }
    }

    let mut pairs: Vec<(f64, usize, usize)> = vec![];
    for (truth_index, truth) in ground_truth.iter().enumerate() {
        for (detection_index, detection) in candidates.iter().enumerate() {
            let distance = truth.distance_um(detection, resolution);
            if distance <= max_distance_um {
                pairs.push((distance, truth_index, detection_index));
            }
        }
    }
    // Stable, so equal distances keep position order
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut matched_truths = HashSet::new();
    let mut matched_detections = HashSet::new();
    for (_, truth_index, detection_index) in pairs {
        if matched_truths.contains(&truth_index) || matched_detections.contains(&detection_index) {
            continue;
        }
        matched_truths.insert(truth_index);
        matched_detections.insert(detection_index);
        ret.true_positives
            .push((ground_truth[truth_index], candidates[detection_index]));
    }

    ret.false_negatives = ground_truth
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_truths.contains(index))
        .map(|(_, truth)| *truth)
        .collect();
    ret.false_positives = candidates
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_detections.contains(index))
        .map(|(_, detection)| *detection)
        .collect();
    ret
}
