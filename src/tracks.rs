//! Decomposition of a [`Links`] graph into linear lineage segments.
//!
//! A track runs from a track start (no past, a merge, or a daughter of a
//! division) through single-parent/single-child links until the cell ends,
//! divides or merges. Extraction is a pure read of the graph and is
//! deterministic: starts are discovered in ascending time point order, then in
//! ascending position order, and track ids follow discovery order.

use crate::{
    linking_errors::ErrorKind,
    links::Links,
    position::{Position, TimePoint},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::HashMap, fmt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(usize);

impl TrackId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track #{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkingTrack {
    id: TrackId,
    positions: Vec<Position>,
    previous_tracks: Vec<TrackId>,
    next_tracks: Vec<TrackId>,
}

impl LinkingTrack {
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Positions of the track, ascending in time.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn find_first_position(&self) -> Position {
        self.positions[0]
    }

    pub fn find_last_position(&self) -> Position {
        self.positions[self.positions.len() - 1]
    }

    pub fn min_time_point_number(&self) -> i32 {
        self.find_first_position().time_point_number().unwrap_or_default()
    }

    pub fn max_time_point_number(&self) -> i32 {
        self.find_last_position().time_point_number().unwrap_or_default()
    }

    pub fn position_at(&self, time_point: TimePoint) -> Option<Position> {
        self.positions
            .iter()
            .find(|p| p.time_point() == Some(time_point))
            .copied()
    }

    pub fn previous_tracks(&self) -> &[TrackId] {
        &self.previous_tracks
    }

    pub fn next_tracks(&self) -> &[TrackId] {
        &self.next_tracks
    }

    pub fn will_divide(&self) -> bool {
        self.next_tracks.len() == 2
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct TrackSet {
    tracks: Vec<LinkingTrack>,
    by_position: HashMap<Position, TrackId>,
    roots: Vec<TrackId>,
    violations: Vec<(Position, ErrorKind)>,
}

impl TrackSet {
    pub fn extract(links: &Links) -> Self {
        let mut ret = Self::default();
        let all_positions = links.find_all_positions();

        for position in &all_positions {
            if links.future_count(position) > 2 {
                ret.violations
                    .push((*position, ErrorKind::TooManyDaughterCells));
            }
            if links.past_count(position) > 1 {
                ret.violations.push((*position, ErrorKind::CellMerge));
            }
            if Self::is_track_start(links, position) {
                ret.walk_track(links, *position);
            }
        }

        for index in 0..ret.tracks.len() {
            let last = ret.tracks[index].find_last_position();
            for future in links.find_futures(&last) {
                let Some(next_id) = ret.by_position.get(&future).copied() else {
                    continue;
                };
                ret.tracks[index].next_tracks.push(next_id);
                ret.tracks[next_id.0].previous_tracks.push(TrackId(index));
            }
        }

        ret.roots = ret
            .tracks
            .iter()
            .filter(|track| track.previous_tracks.is_empty())
            .map(|track| track.id)
            .collect();

        tracing::debug!(
            tracks = ret.tracks.len(),
            roots = ret.roots.len(),
            violations = ret.violations.len(),
            "Extracted lineage tracks"
        );
        ret
    }

    fn is_track_start(links: &Links, position: &Position) -> bool {
        let pasts = links.find_pasts(position);
        if pasts.len() != 1 {
            return true;
        }
        links.future_count(&pasts[0]) != 1
    }

    fn walk_track(&mut self, links: &Links, start: Position) {
        let id = TrackId(self.tracks.len());
        let mut positions = vec![start];
        let mut current = start;
        loop {
            let futures = links.find_futures(&current);
            if futures.len() != 1 || links.past_count(&futures[0]) != 1 {
                break;
            }
            current = futures[0];
            positions.push(current);
        }
        for position in &positions {
            self.by_position.insert(*position, id);
        }
        self.tracks.push(LinkingTrack {
            id,
            positions,
            previous_tracks: vec![],
            next_tracks: vec![],
        });
    }

    pub fn get(&self, id: TrackId) -> Option<&LinkingTrack> {
        self.tracks.get(id.0)
    }

    pub fn get_track(&self, position: &Position) -> Option<&LinkingTrack> {
        self.by_position.get(position).and_then(|id| self.get(*id))
    }

    /// All tracks, in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &LinkingTrack> {
        self.tracks.iter()
    }

    /// Tracks without a previous track: the roots of the lineage trees.
    pub fn starting_tracks(&self) -> impl Iterator<Item = &LinkingTrack> {
        self.roots.iter().filter_map(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Positions with more than two futures or more than one past.
    pub fn integrity_violations(&self) -> &[(Position, ErrorKind)] {
        &self.violations
    }

    /// Sorts the lineage roots and every set of next tracks by the given key. Ties
    /// are broken by discovery order, whatever an earlier sort did.
    pub fn sort_tracks<K, F>(&mut self, key: F)
    where
        K: PartialOrd,
        F: Fn(&LinkingTrack) -> K,
    {
        let compare = |a: &TrackId, b: &TrackId, tracks: &[LinkingTrack]| {
            key(&tracks[a.0])
                .partial_cmp(&key(&tracks[b.0]))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        };
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|a, b| compare(a, b, &self.tracks));
        self.roots = roots;

        for index in 0..self.tracks.len() {
            let mut next_tracks = std::mem::take(&mut self.tracks[index].next_tracks);
            next_tracks.sort_by(|a, b| compare(a, b, &self.tracks));
            self.tracks[index].next_tracks = next_tracks;
        }
    }

    /// The given track followed by all its descendants, depth first.
    pub fn lineage_of(&self, id: TrackId) -> Vec<TrackId> {
        let mut ret = vec![];
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(track) = self.get(current) else {
                continue;
            };
            ret.push(current);
            stack.extend(track.next_tracks.iter().rev());
        }
        ret
    }

    /// Time points between the division that started this track and the division
    /// that ends it. `None` if either is not a division.
    pub fn time_points_between_divisions(&self, id: TrackId) -> Option<i32> {
        let track = self.get(id)?;
        if !track.will_divide() {
            return None;
        }
        let [previous_id] = track.previous_tracks.as_slice() else {
            return None;
        };
        let previous = self.get(*previous_id)?;
        if !previous.will_divide() {
            return None;
        }
        Some(track.max_time_point_number() - previous.max_time_point_number())
    }
}
