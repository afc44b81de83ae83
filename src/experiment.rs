use crate::{
    connections::Connections,
    error::Result,
    image_offsets::ImageOffsets,
    links::{LinkType, Links},
    path::PathCollection,
    position::{Position, TimePoint},
    position_collection::PositionCollection,
    resolution::ImageResolution,
    score::ScoreCollection,
};
use serde::Serialize;

/// Everything known about one time-lapse recording.
#[derive(Clone, Debug, Default)]
pub struct Experiment {
    pub name: Option<String>,
    pub positions: PositionCollection,
    pub scratch_links: Links,
    pub baseline_links: Links,
    pub connections: Connections,
    pub scores: ScoreCollection,
    pub paths: PathCollection,
    pub image_resolution: Option<ImageResolution>,
    pub image_offsets: ImageOffsets,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub name: Option<String>,
    pub first_time_point_number: Option<i32>,
    pub last_time_point_number: Option<i32>,
    pub positions: usize,
    pub scratch_links: usize,
    pub baseline_links: usize,
    pub connections: usize,
    pub scored_families: usize,
    pub path_time_points: usize,
    pub has_resolution: bool,
}

impl Experiment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self, link_type: LinkType) -> &Links {
        match link_type {
            LinkType::Scratch => &self.scratch_links,
            LinkType::Baseline => &self.baseline_links,
        }
    }

    pub fn links_mut(&mut self, link_type: LinkType) -> &mut Links {
        match link_type {
            LinkType::Scratch => &mut self.scratch_links,
            LinkType::Baseline => &mut self.baseline_links,
        }
    }

    /// The baseline links if there are any, otherwise the scratch links.
    pub fn links_baseline_else_scratch(&self) -> &Links {
        if self.baseline_links.is_empty() {
            &self.scratch_links
        } else {
            &self.baseline_links
        }
    }

    /// Adds all positions and links of the given graph to the links of the given type.
    pub fn merge_links(&mut self, link_type: LinkType, links: &Links) -> Result<()> {
        for position in links.find_all_positions() {
            self.positions.add(position)?;
        }
        self.links_mut(link_type).merge(links)
    }

    /// The resolution of the images, or one micrometer per pixel if it is not known.
    pub fn resolution(&self) -> ImageResolution {
        self.image_resolution.unwrap_or(ImageResolution::PIXELS)
    }

    pub fn add_position(&mut self, position: Position) -> Result<()> {
        self.positions.add(position)
    }

    /// Removes the position from the positions, both link sets, the connections and
    /// the scores.
    pub fn remove_position(&mut self, position: &Position) {
        self.positions.remove(position);
        self.scratch_links.remove_position(position);
        self.baseline_links.remove_position(position);
        self.connections.remove_position(position);
        self.scores.remove_position(position);
    }

    /// Moves the position everywhere it is used. Returns false if it is not a known
    /// position. If the move is refused anywhere, nothing is changed.
    pub fn move_position(&mut self, old: &Position, new: Position) -> Result<bool> {
        if !self.positions.contains(old) {
            return Ok(false);
        }
        let mut positions = self.positions.clone();
        let mut scratch_links = self.scratch_links.clone();
        let mut baseline_links = self.baseline_links.clone();
        let mut connections = self.connections.clone();
        let mut scores = self.scores.clone();
        positions.move_position(old, new)?;
        scratch_links.replace_position(old, new)?;
        baseline_links.replace_position(old, new)?;
        connections.replace_position(old, new)?;
        scores.replace_position(old, new)?;

        self.positions = positions;
        self.scratch_links = scratch_links;
        self.baseline_links = baseline_links;
        self.connections = connections;
        self.scores = scores;
        Ok(true)
    }

    /// First time point with positions or links.
    pub fn first_time_point_number(&self) -> Option<i32> {
        [
            self.positions.first_time_point_number(),
            self.scratch_links.first_time_point_number(),
            self.baseline_links.first_time_point_number(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn last_time_point_number(&self) -> Option<i32> {
        [
            self.positions.last_time_point_number(),
            self.scratch_links.last_time_point_number(),
            self.baseline_links.last_time_point_number(),
        ]
        .into_iter()
        .flatten()
        .max()
    }

    /// Every time point from the first to the last one, including empty ones.
    pub fn time_points(&self) -> Vec<TimePoint> {
        let (Some(first), Some(last)) = (
            self.first_time_point_number(),
            self.last_time_point_number(),
        ) else {
            return vec![];
        };
        (first..=last).map(TimePoint::new).collect()
    }

    pub fn summarize(&self) -> ExperimentSummary {
        ExperimentSummary {
            name: self.name.clone(),
            first_time_point_number: self.first_time_point_number(),
            last_time_point_number: self.last_time_point_number(),
            positions: self.positions.len(),
            scratch_links: self.scratch_links.len(),
            baseline_links: self.baseline_links.len(),
            connections: self.connections.len(),
            scored_families: self.scores.all_scored_families().len(),
            path_time_points: self.paths.time_points().len(),
            has_resolution: self.image_resolution.is_some(),
        }
    }
}
