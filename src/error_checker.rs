//! Rules that flag suspicious or impossible situations in a [`Links`] graph.
//!
//! Every position is checked on its own and gets at most one error: the first rule
//! that fires, in the order of [`ErrorChecker::check_position`]. Errors the user has
//! suppressed for a position are not reported again.

use crate::{
    error::Result,
    linking_errors::{ErrorKind, Severity},
    links::{KEY_ERROR, KEY_SCORES, KEY_SUPPRESSED_ERROR, Links},
    parameters::AnalysisParameters,
    position::Position,
    resolution::ImageResolution,
    score::{Family, Score, ScoreCollection},
    tracks::{TrackId, TrackSet},
};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// Shape measurements of positions, provided by the segmentation that found them.
pub trait ShapeSource: Sync {
    /// Volume in cubic micrometers, if known.
    fn volume(&self, position: &Position) -> Option<f64>;

    /// Whether the shape fit failed for this position.
    fn is_failed(&self, _position: &Position) -> bool {
        false
    }
}

/// The error of each position that has one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorAnnotations {
    errors: BTreeMap<Position, ErrorKind>,
}

impl ErrorAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, position: Position, kind: ErrorKind) {
        self.errors.insert(position, kind);
    }

    pub fn remove(&mut self, position: &Position) -> Option<ErrorKind> {
        self.errors.remove(position)
    }

    pub fn get(&self, position: &Position) -> Option<ErrorKind> {
        self.errors.get(position).copied()
    }

    pub fn severity(&self, position: &Position) -> Option<Severity> {
        self.get(position).map(ErrorKind::severity)
    }

    /// All annotations, ascending by position.
    pub fn iter(&self) -> impl Iterator<Item = (Position, ErrorKind)> + '_ {
        self.errors.iter().map(|(position, kind)| (*position, *kind))
    }

    /// Positions with an annotation of at least the given severity, ascending.
    pub fn find_errored_positions(&self, min_severity: Severity) -> Vec<Position> {
        self.errors
            .iter()
            .filter(|(_, kind)| kind.severity() >= min_severity)
            .map(|(position, _)| *position)
            .collect()
    }

    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.errors.values().filter(|k| **k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ErrorChecker<'a> {
    parameters: &'a AnalysisParameters,
    resolution: ImageResolution,
    time_point_range: Option<(i32, i32)>,
}

impl<'a> ErrorChecker<'a> {
    pub fn new(parameters: &'a AnalysisParameters, resolution: ImageResolution) -> Self {
        Self {
            parameters,
            resolution,
            time_point_range: None,
        }
    }

    /// The first and last time point of the experiment. Cells appearing in the first or
    /// disappearing in the last time point are not suspicious. Defaults to the range of
    /// the checked links.
    pub fn with_time_point_range(mut self, first: i32, last: i32) -> Self {
        self.time_point_range = Some((first, last));
        self
    }

    pub fn find_errors(
        &self,
        links: &Links,
        scores: &ScoreCollection,
        shapes: Option<&dyn ShapeSource>,
    ) -> ErrorAnnotations {
        let Some((first, last)) = self.time_point_range.or_else(|| {
            Some((links.first_time_point_number()?, links.last_time_point_number()?))
        }) else {
            return ErrorAnnotations::new();
        };
        let tracks = links.tracks();
        let context = CheckContext {
            links,
            scores,
            shapes,
            tracks: &tracks,
            first,
            last,
        };

        let errors: BTreeMap<Position, ErrorKind> = links
            .find_all_positions()
            .par_iter()
            .filter_map(|position| {
                let kind = self.check_position(&context, position)?;
                if suppressed_error(links, position) == Some(kind) {
                    return None;
                }
                Some((*position, kind))
            })
            .collect();

        tracing::debug!(
            positions = links.find_all_positions().len(),
            errors = errors.len(),
            "Checked links for errors"
        );
        ErrorAnnotations { errors }
    }

    fn check_position(&self, context: &CheckContext<'_>, position: &Position) -> Option<ErrorKind> {
        let links = context.links;
        let time_point_number = position.time_point_number()?;
        let futures = links.find_futures(position);
        let pasts = links.find_pasts(position);

        if futures.len() > 2 {
            return Some(ErrorKind::TooManyDaughterCells);
        }
        if pasts.len() > 1 {
            return Some(ErrorKind::CellMerge);
        }
        if pasts.is_empty() && time_point_number > context.first {
            return Some(ErrorKind::NoPastPosition);
        }
        if futures.is_empty()
            && time_point_number < context.last
            && links.get_end_marker(position).is_none()
        {
            return Some(ErrorKind::NoFuturePosition);
        }

        if let [daughter1, daughter2] = futures.as_slice() {
            if self.is_young_mother(context.tracks, position) {
                return Some(ErrorKind::YoungMother);
            }
            if let Ok(family) = Family::new(*position, *daughter1, *daughter2) {
                if let Some(score) = context.scores.family_score(&family) {
                    if score.total() < self.parameters.min_mother_score {
                        return Some(ErrorKind::LowMotherScore);
                    }
                }
            }
        } else if context
            .scores
            .of_mother(position)
            .iter()
            .any(|scored| scored.score.total() >= self.parameters.min_mother_score)
        {
            return Some(ErrorKind::PotentiallyShouldBeAMother);
        }

        let [past] = pasts.as_slice() else {
            return self.check_shape(context, position, None);
        };
        if self.moved_too_fast(past, position) {
            return Some(ErrorKind::MovedTooFast);
        }
        if let Some(kind) = self.check_shape(context, position, Some(past)) {
            return Some(kind);
        }
        if self.parameters.min_link_score != 0.0 {
            if let Some(score) = link_score(links, context.scores, past, position) {
                if score.total() < self.parameters.min_link_score {
                    return Some(ErrorKind::LowLinkScore);
                }
            }
        }
        None
    }

    fn is_young_mother(&self, tracks: &TrackSet, position: &Position) -> bool {
        let Some(track) = tracks.get_track(position) else {
            return false;
        };
        if track.find_last_position() != *position {
            return false;
        }
        let Some(time_points) = tracks.time_points_between_divisions(track.id()) else {
            return false;
        };
        let hours = time_points as f64 * self.resolution.time_point_interval_h();
        hours < self.parameters.min_time_between_divisions_h
    }

    fn moved_too_fast(&self, past: &Position, position: &Position) -> bool {
        let (Some(past_tp), Some(tp)) = (past.time_point_number(), position.time_point_number())
        else {
            return false;
        };
        let minutes = (tp - past_tp) as f64 * self.resolution.time_point_interval_m;
        if minutes <= 0.0 {
            return false;
        }
        position.distance_um(past, &self.resolution) / minutes
            > self.parameters.max_distance_moved_um_per_minute
    }

    fn check_shape(
        &self,
        context: &CheckContext<'_>,
        position: &Position,
        past: Option<&Position>,
    ) -> Option<ErrorKind> {
        let shapes = context.shapes?;
        if let Some(past) = past {
            // Daughters are expected to be smaller than their mother
            if context.links.future_count(past) == 1 {
                if let (Some(volume), Some(past_volume)) =
                    (shapes.volume(position), shapes.volume(past))
                {
                    if volume < self.parameters.shrink_fraction * past_volume {
                        return Some(ErrorKind::ShrunkALot);
                    }
                }
            }
        }
        if shapes.is_failed(position) {
            return Some(ErrorKind::FailedShape);
        }
        None
    }
}

struct CheckContext<'a> {
    links: &'a Links,
    scores: &'a ScoreCollection,
    shapes: Option<&'a dyn ShapeSource>,
    tracks: &'a TrackSet,
    first: i32,
    last: i32,
}

/// Score of the link from the score collection, or else from the link metadata.
fn link_score(
    links: &Links,
    scores: &ScoreCollection,
    past: &Position,
    position: &Position,
) -> Option<Score> {
    if let Some(score) = scores.link_score(past, position) {
        return Some(score.clone());
    }
    let value = links.get_link_data(past, position, KEY_SCORES)?;
    serde_json::from_value(value.clone()).ok()
}

fn error_code(value: &Value) -> Option<ErrorKind> {
    value
        .as_u64()
        .and_then(|code| u32::try_from(code).ok())
        .map(ErrorKind::from_code)
}

fn suppressed_error(links: &Links, position: &Position) -> Option<ErrorKind> {
    links
        .get_position_data(position, KEY_SUPPRESSED_ERROR)
        .and_then(error_code)
}

/// Stops reporting the given error for the position. Another error kind found later
/// is still reported.
pub fn suppress_error(links: &mut Links, position: &Position, kind: ErrorKind) -> Result<()> {
    links.set_position_data(position, KEY_SUPPRESSED_ERROR, Some(Value::from(kind.code())))?;
    links.set_position_data(position, KEY_ERROR, None)
}

/// Stores the annotations as `"error"` position metadata, replacing all earlier ones.
pub fn apply_error_annotations(links: &mut Links, annotations: &ErrorAnnotations) -> Result<()> {
    for position in links.find_all_positions() {
        match annotations.get(&position) {
            Some(kind) => {
                links.set_position_data(&position, KEY_ERROR, Some(Value::from(kind.code())))?
            }
            None => links.set_position_data(&position, KEY_ERROR, None)?,
        }
    }
    Ok(())
}

/// Reads back annotations stored by [`apply_error_annotations`]. Codes this version
/// does not know are kept as [`ErrorKind::Unknown`].
pub fn read_error_annotations(links: &Links) -> ErrorAnnotations {
    let mut ret = ErrorAnnotations::new();
    for position in links.find_all_positions() {
        let Some(value) = links.get_position_data(&position, KEY_ERROR) else {
            continue;
        };
        match error_code(value) {
            Some(kind) => ret.set(position, kind),
            None => tracing::warn!(%position, %value, "Ignoring malformed error code"),
        }
    }
    ret
}

/// Tracks containing an annotated position, counting the first positions of their
/// next tracks as part of them. Ascending by id.
pub fn tracks_with_errors(tracks: &TrackSet, annotations: &ErrorAnnotations) -> Vec<TrackId> {
    tracks
        .iter()
        .filter(|track| {
            track
                .positions()
                .iter()
                .chain(
                    track
                        .next_tracks()
                        .iter()
                        .filter_map(|id| tracks.get(*id))
                        .map(|next| &next.positions()[0]),
                )
                .any(|position| annotations.get(position).is_some())
        })
        .map(|track| track.id())
        .collect()
}
