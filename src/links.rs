use crate::{
    error::{Result, TrackerError},
    position::Position,
    tracks::TrackSet,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, OnceLock},
};

pub type Metadata = Map<String, Value>;

pub const KEY_ENDING: &str = "ending";
pub const KEY_ERROR: &str = "error";
pub const KEY_SUPPRESSED_ERROR: &str = "suppressed_error";
pub const KEY_SCORES: &str = "scores";

/// Why a track stops before the end of the experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndMarker {
    Dead,
    OutOfView,
    Shed,
}

impl EndMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dead => "dead",
            Self::OutOfView => "out_of_view",
            Self::Shed => "shed",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Dead => "Dies",
            Self::OutOfView => "Goes out of view",
            Self::Shed => "Shed from the tissue",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "dead" => Some(Self::Dead),
            "out_of_view" => Some(Self::OutOfView),
            "shed" => Some(Self::Shed),
            _ => None,
        }
    }
}

/// Which of the two link sets of an experiment is meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Automatically produced links, under review.
    Scratch,
    /// Links assumed to be correct.
    Baseline,
}

/// Directed links from a position to its counterpart in a later time point.
///
/// Links always point forward in time. [`Links::add_link`] accepts anything that
/// respects time order, so that graphs with merges or over-full mothers can be
/// loaded and then reported; [`Links::try_add_link`] refuses them instead.
#[derive(Clone, Debug, Default)]
pub struct Links {
    futures: HashMap<Position, BTreeSet<Position>>,
    pasts: HashMap<Position, BTreeSet<Position>>,
    position_data: HashMap<Position, Metadata>,
    link_data: HashMap<(Position, Position), Metadata>,
    tracks: OnceLock<Arc<TrackSet>>,
}

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate_tracks(&mut self) {
        self.tracks.take();
    }

    /// Orders the two positions as (earlier, later).
    fn ordered(a: &Position, b: &Position) -> Result<(Position, Position)> {
        let (Some(tp_a), Some(tp_b)) = (a.time_point(), b.time_point()) else {
            return Err(TrackerError::InvalidLink(format!(
                "{a} and {b} must both have a time point"
            )));
        };
        match tp_a.cmp(&tp_b) {
            std::cmp::Ordering::Less => Ok((*a, *b)),
            std::cmp::Ordering::Greater => Ok((*b, *a)),
            std::cmp::Ordering::Equal => Err(TrackerError::InvalidLink(format!(
                "{a} and {b} are in the same time point"
            ))),
        }
    }

    /// Adds a position without any links. Does nothing if it is already present.
    pub fn add_position(&mut self, position: Position) -> Result<()> {
        position.require_time_point()?;
        if !self.futures.contains_key(&position) {
            self.futures.insert(position, BTreeSet::new());
            self.pasts.insert(position, BTreeSet::new());
            self.invalidate_tracks();
        }
        Ok(())
    }

    pub fn add_link(&mut self, a: Position, b: Position) -> Result<()> {
        let (earlier, later) = Self::ordered(&a, &b)?;
        self.futures.entry(earlier).or_default().insert(later);
        self.pasts.entry(earlier).or_default();
        self.pasts.entry(later).or_default().insert(earlier);
        self.futures.entry(later).or_default();
        self.invalidate_tracks();
        Ok(())
    }

    /// Like [`Links::add_link`], but refuses links that would make a cell merge
    /// or give a mother a third daughter.
    pub fn try_add_link(&mut self, a: Position, b: Position) -> Result<()> {
        let (earlier, later) = Self::ordered(&a, &b)?;
        if self.contains_link(&earlier, &later) {
            return Ok(());
        }
        if self.past_count(&later) >= 1 {
            return Err(TrackerError::LinkRejected(format!(
                "{later} already has a link to the past; linking {earlier} would merge two cells"
            )));
        }
        if self.future_count(&earlier) >= 2 {
            return Err(TrackerError::LinkRejected(format!(
                "{earlier} already has two daughter cells"
            )));
        }
        self.add_link(earlier, later)
    }

    pub fn remove_link(&mut self, a: &Position, b: &Position) -> bool {
        let Ok((earlier, later)) = Self::ordered(a, b) else {
            return false;
        };
        let removed = self
            .futures
            .get_mut(&earlier)
            .map(|futures| futures.remove(&later))
            .unwrap_or(false);
        if removed {
            if let Some(pasts) = self.pasts.get_mut(&later) {
                pasts.remove(&earlier);
            }
            self.link_data.remove(&(earlier, later));
            self.invalidate_tracks();
        }
        removed
    }

    /// Removes all links of the position, but keeps the position itself.
    pub fn remove_links_of_position(&mut self, position: &Position) {
        let others: Vec<Position> = self
            .find_pasts(position)
            .into_iter()
            .chain(self.find_futures(position))
            .collect();
        for other in others {
            self.remove_link(position, &other);
        }
    }

    pub fn remove_position(&mut self, position: &Position) {
        self.remove_links_of_position(position);
        let removed = self.futures.remove(position).is_some();
        self.pasts.remove(position);
        self.position_data.remove(position);
        if removed {
            self.invalidate_tracks();
        }
    }

    /// Moves a position to new coordinates, keeping its links and metadata. The links
    /// must still point forward in time afterwards.
    pub fn replace_position(&mut self, old: &Position, new: Position) -> Result<()> {
        if !self.contains_position(old) {
            return Ok(());
        }
        let pasts = self.find_pasts(old);
        let futures = self.find_futures(old);
        for other in pasts.iter().chain(futures.iter()) {
            if *other == new {
                return Err(TrackerError::InvalidLink(format!(
                    "cannot move {old} onto its own linked position"
                )));
            }
        }
        let new_tp = new.require_time_point()?;
        if pasts.iter().any(|p| p.time_point() >= Some(new_tp))
            || futures.iter().any(|f| f.time_point() <= Some(new_tp))
        {
            return Err(TrackerError::InvalidLink(format!(
                "moving {old} to {new} would reverse the direction of its links"
            )));
        }

        let mut moved_link_data = vec![];
        for past in &pasts {
            if let Some(data) = self.link_data.remove(&(*past, *old)) {
                moved_link_data.push(((*past, new), data));
            }
        }
        for future in &futures {
            if let Some(data) = self.link_data.remove(&(*old, *future)) {
                moved_link_data.push(((new, *future), data));
            }
        }
        let position_data = self.position_data.remove(old);

        self.remove_position(old);
        self.add_position(new)?;
        for past in pasts {
            self.add_link(past, new)?;
        }
        for future in futures {
            self.add_link(new, future)?;
        }
        self.link_data.extend(moved_link_data);
        if let Some(data) = position_data {
            self.position_data.insert(new, data);
        }
        Ok(())
    }

    /// Adds all positions, links and metadata of the other graph to this one.
    pub fn merge(&mut self, other: &Links) -> Result<()> {
        for position in other.find_all_positions() {
            self.add_position(position)?;
        }
        for (earlier, later) in other.iter_links() {
            self.add_link(earlier, later)?;
        }
        for (position, data) in &other.position_data {
            self.position_data
                .entry(*position)
                .or_default()
                .extend(data.clone());
        }
        for (link, data) in &other.link_data {
            self.link_data.entry(*link).or_default().extend(data.clone());
        }
        Ok(())
    }

    /// Linked positions in later time points, ascending.
    pub fn find_futures(&self, position: &Position) -> Vec<Position> {
        self.futures
            .get(position)
            .map(|futures| futures.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Linked positions in earlier time points, ascending.
    pub fn find_pasts(&self, position: &Position) -> Vec<Position> {
        self.pasts
            .get(position)
            .map(|pasts| pasts.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn future_count(&self, position: &Position) -> usize {
        self.futures.get(position).map(|f| f.len()).unwrap_or(0)
    }

    pub fn past_count(&self, position: &Position) -> usize {
        self.pasts.get(position).map(|p| p.len()).unwrap_or(0)
    }

    pub fn contains_link(&self, a: &Position, b: &Position) -> bool {
        let Ok((earlier, later)) = Self::ordered(a, b) else {
            return false;
        };
        self.futures
            .get(&earlier)
            .map(|futures| futures.contains(&later))
            .unwrap_or(false)
    }

    pub fn contains_position(&self, position: &Position) -> bool {
        self.futures.contains_key(position)
    }

    /// All links as (earlier, later) pairs, ascending.
    pub fn iter_links(&self) -> Vec<(Position, Position)> {
        let mut ret: Vec<(Position, Position)> = self
            .futures
            .iter()
            .flat_map(|(earlier, futures)| futures.iter().map(move |later| (*earlier, *later)))
            .collect();
        ret.sort();
        ret
    }

    /// All positions in the graph, linked or not, ascending.
    pub fn find_all_positions(&self) -> Vec<Position> {
        let mut ret: Vec<Position> = self.futures.keys().copied().collect();
        ret.sort();
        ret
    }

    pub fn first_time_point_number(&self) -> Option<i32> {
        self.futures
            .keys()
            .filter_map(|p| p.time_point_number())
            .min()
    }

    pub fn last_time_point_number(&self) -> Option<i32> {
        self.futures
            .keys()
            .filter_map(|p| p.time_point_number())
            .max()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.futures.values().map(|f| f.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    pub fn has_links(&self) -> bool {
        self.futures.values().any(|f| !f.is_empty())
    }

    pub fn position_data(&self, position: &Position) -> Option<&Metadata> {
        self.position_data.get(position)
    }

    pub fn get_position_data(&self, position: &Position, key: &str) -> Option<&Value> {
        self.position_data.get(position)?.get(key)
    }

    /// Sets (or with `None`, removes) a metadata value of a position in this graph.
    pub fn set_position_data(
        &mut self,
        position: &Position,
        key: &str,
        value: Option<Value>,
    ) -> Result<()> {
        match value {
            Some(value) => {
                self.add_position(*position)?;
                self.position_data
                    .entry(*position)
                    .or_default()
                    .insert(key.to_string(), value);
            }
            None => {
                if let Some(data) = self.position_data.get_mut(position) {
                    data.remove(key);
                    if data.is_empty() {
                        self.position_data.remove(position);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn link_data(&self, a: &Position, b: &Position) -> Option<&Metadata> {
        let (earlier, later) = Self::ordered(a, b).ok()?;
        self.link_data.get(&(earlier, later))
    }

    pub fn get_link_data(&self, a: &Position, b: &Position, key: &str) -> Option<&Value> {
        self.link_data(a, b)?.get(key)
    }

    pub fn set_link_data(
        &mut self,
        a: &Position,
        b: &Position,
        key: &str,
        value: Option<Value>,
    ) -> Result<()> {
        let (earlier, later) = Self::ordered(a, b)?;
        if !self.contains_link(&earlier, &later) {
            return Err(TrackerError::InvalidLink(format!(
                "there is no link between {earlier} and {later}"
            )));
        }
        match value {
            Some(value) => {
                self.link_data
                    .entry((earlier, later))
                    .or_default()
                    .insert(key.to_string(), value);
            }
            None => {
                if let Some(data) = self.link_data.get_mut(&(earlier, later)) {
                    data.remove(key);
                    if data.is_empty() {
                        self.link_data.remove(&(earlier, later));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get_end_marker(&self, position: &Position) -> Option<EndMarker> {
        self.get_position_data(position, KEY_ENDING)
            .and_then(|value| value.as_str())
            .and_then(EndMarker::parse)
    }

    pub fn set_end_marker(&mut self, position: &Position, marker: Option<EndMarker>) -> Result<()> {
        self.set_position_data(
            position,
            KEY_ENDING,
            marker.map(|m| Value::String(m.as_str().to_string())),
        )
    }

    /// Lineage tracks of this graph, computed on first use after the last edit.
    pub fn tracks(&self) -> Arc<TrackSet> {
        self.tracks
            .get_or_init(|| Arc::new(TrackSet::extract(self)))
            .clone()
    }
}
