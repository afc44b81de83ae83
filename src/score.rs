use crate::{
    error::{Result, TrackerError},
    position::{Position, TimePoint},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

/// Named sub-scores; the score of the whole is their sum. Keys are not validated,
/// so scoring schemes can add new metrics freely.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(BTreeMap<String, f64>);

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(scores: BTreeMap<String, f64>) -> Self {
        Self(scores)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// The named sub-score, or 0 if it was never set.
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<f64> {
        self.0.remove(key)
    }

    /// Sorted sub-score names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (based on {:?})", self.total(), self.0)
    }
}

/// A mother cell with its two daughter cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Family {
    pub mother: Position,
    daughters: [Position; 2],
}

impl Family {
    /// Daughter order does not matter: `Family::new(m, a, b) == Family::new(m, b, a)`.
    pub fn new(mother: Position, daughter1: Position, daughter2: Position) -> Result<Self> {
        if daughter1 == daughter2 {
            return Err(TrackerError::InvalidFamily(format!(
                "both daughters of {mother} are {daughter1}"
            )));
        }
        if mother == daughter1 || mother == daughter2 {
            return Err(TrackerError::InvalidFamily(format!(
                "{mother} cannot be its own daughter"
            )));
        }
        let daughters = if daughter1 < daughter2 {
            [daughter1, daughter2]
        } else {
            [daughter2, daughter1]
        };
        Ok(Self { mother, daughters })
    }

    pub fn daughters(&self) -> [Position; 2] {
        self.daughters
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ---> {} and {}",
            self.mother, self.daughters[0], self.daughters[1]
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredFamily {
    pub family: Family,
    pub score: Score,
}

/// Division scores per time point and link scores.
#[derive(Clone, Debug, Default)]
pub struct ScoreCollection {
    family_scores: HashMap<TimePoint, HashMap<Family, Score>>,
    link_scores: HashMap<(Position, Position), Score>,
}

impl ScoreCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_family_score(&mut self, family: Family, score: Score) -> Result<()> {
        let time_point = family.mother.require_time_point()?;
        self.family_scores
            .entry(time_point)
            .or_default()
            .insert(family, score);
        Ok(())
    }

    pub fn add_scored_families<I: IntoIterator<Item = ScoredFamily>>(
        &mut self,
        scored_families: I,
    ) -> Result<()> {
        for scored in scored_families {
            self.set_family_score(scored.family, scored.score)?;
        }
        Ok(())
    }

    pub fn family_score(&self, family: &Family) -> Option<&Score> {
        self.family_scores
            .get(&family.mother.time_point()?)?
            .get(family)
    }

    /// Score of a family that must belong to the given time point. Asking for a family
    /// of another time point is a programming error and is reported as such.
    pub fn family_score_at(&self, time_point: TimePoint, family: &Family) -> Result<Option<&Score>> {
        let found = family.mother.require_time_point()?;
        if found != time_point {
            return Err(TrackerError::TimePointMismatch {
                expected: time_point.time_point_number(),
                found: found.time_point_number(),
            });
        }
        Ok(self
            .family_scores
            .get(&time_point)
            .and_then(|scores| scores.get(family)))
    }

    /// All scored families with the given mother, in daughter order.
    pub fn of_mother(&self, mother: &Position) -> Vec<ScoredFamily> {
        let Some(scores) = mother.time_point().and_then(|tp| self.family_scores.get(&tp)) else {
            return vec![];
        };
        let mut ret: Vec<ScoredFamily> = scores
            .iter()
            .filter(|(family, _)| family.mother == *mother)
            .map(|(family, score)| ScoredFamily {
                family: *family,
                score: score.clone(),
            })
            .collect();
        ret.sort_by(|a, b| a.family.cmp(&b.family));
        ret
    }

    /// Every scored family, ordered by mother and then daughters.
    pub fn all_scored_families(&self) -> Vec<ScoredFamily> {
        let mut ret: Vec<ScoredFamily> = self
            .family_scores
            .values()
            .flat_map(|scores| scores.iter())
            .map(|(family, score)| ScoredFamily {
                family: *family,
                score: score.clone(),
            })
            .collect();
        ret.sort_by(|a, b| a.family.cmp(&b.family));
        ret
    }

    pub fn remove_position(&mut self, position: &Position) {
        for scores in self.family_scores.values_mut() {
            scores.retain(|family, _| {
                family.mother != *position && !family.daughters.contains(position)
            });
        }
        self.family_scores.retain(|_, scores| !scores.is_empty());
        self.link_scores
            .retain(|(a, b), _| a != position && b != position);
    }

    /// Moves the scores of every family and link that uses `old` over to `new`.
    pub fn replace_position(&mut self, old: &Position, new: Position) -> Result<()> {
        let swap = |position: Position| if position == *old { new } else { position };
        let mut moved = vec![];
        for scores in self.family_scores.values_mut() {
            let affected: Vec<Family> = scores
                .keys()
                .filter(|family| family.mother == *old || family.daughters.contains(old))
                .copied()
                .collect();
            for family in affected {
                if let Some(score) = scores.remove(&family) {
                    let [daughter1, daughter2] = family.daughters;
                    let family = Family::new(swap(family.mother), swap(daughter1), swap(daughter2))?;
                    moved.push(ScoredFamily { family, score });
                }
            }
        }
        self.family_scores.retain(|_, scores| !scores.is_empty());
        self.add_scored_families(moved)?;

        let affected: Vec<(Position, Position)> = self
            .link_scores
            .keys()
            .filter(|(a, b)| a == old || b == old)
            .copied()
            .collect();
        for (a, b) in affected {
            if let Some(score) = self.link_scores.remove(&(a, b)) {
                self.set_link_score(swap(a), swap(b), score);
            }
        }
        Ok(())
    }

    pub fn set_link_score(&mut self, a: Position, b: Position, score: Score) {
        let key = if a < b { (a, b) } else { (b, a) };
        self.link_scores.insert(key, score);
    }

    pub fn link_score(&self, a: &Position, b: &Position) -> Option<&Score> {
        let key = if a < b { (*a, *b) } else { (*b, *a) };
        self.link_scores.get(&key)
    }

    pub fn link_scores(&self) -> impl Iterator<Item = (&(Position, Position), &Score)> {
        self.link_scores.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.family_scores.is_empty() && self.link_scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> Family {
        Family::new(
            Position::new(0.0, 0.0, 0.0, 1),
            Position::new(-1.0, 0.0, 0.0, 2),
            Position::new(1.0, 0.0, 0.0, 2),
        )
        .unwrap()
    }

    #[test]
    fn test_score_total_and_missing_keys() {
        let mut score = Score::new();
        score.set("foo", 4.0);
        score.set("bar", 3.1);
        assert!((score.total() - 7.1).abs() < 1e-12);
        assert_eq!(score.get("baz"), 0.0);
        assert_eq!(score.keys().collect::<Vec<_>>(), vec!["bar", "foo"]);
        assert_eq!(score.remove("foo"), Some(4.0));
    }

    #[test]
    fn test_family_ignores_daughter_order() {
        let swapped = Family::new(
            Position::new(0.0, 0.0, 0.0, 1),
            Position::new(1.0, 0.0, 0.0, 2),
            Position::new(-1.0, 0.0, 0.0, 2),
        )
        .unwrap();
        assert_eq!(family(), swapped);
        let mother = Position::new(0.0, 0.0, 0.0, 1);
        assert!(Family::new(mother, mother.with_time_point_number(2), mother.with_time_point_number(2)).is_err());
    }

    #[test]
    fn test_family_score_at_checks_time_point() {
        let mut scores = ScoreCollection::new();
        let mut score = Score::new();
        score.set("volume", 2.0);
        scores.set_family_score(family(), score.clone()).unwrap();
        assert_eq!(scores.family_score(&family()), Some(&score));
        assert_eq!(
            scores.family_score_at(TimePoint::new(1), &family()).unwrap(),
            Some(&score)
        );
        assert!(matches!(
            scores.family_score_at(TimePoint::new(2), &family()),
            Err(TrackerError::TimePointMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_of_mother_and_remove_position() {
        let mut scores = ScoreCollection::new();
        scores.set_family_score(family(), Score::new()).unwrap();
        let mother = Position::new(0.0, 0.0, 0.0, 1);
        assert_eq!(scores.of_mother(&mother).len(), 1);
        scores.remove_position(&Position::new(1.0, 0.0, 0.0, 2));
        assert!(scores.of_mother(&mother).is_empty());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_replace_position_moves_family_and_link_scores() {
        let mut scores = ScoreCollection::new();
        let mut score = Score::new();
        score.set("volume", 2.0);
        scores.set_family_score(family(), score.clone()).unwrap();
        let mother = Position::new(0.0, 0.0, 0.0, 1);
        let daughter = Position::new(1.0, 0.0, 0.0, 2);
        scores.set_link_score(mother, daughter, score.clone());

        let moved = Position::new(3.0, 0.0, 0.0, 1);
        scores.replace_position(&mother, moved).unwrap();
        assert!(scores.of_mother(&mother).is_empty());
        let families = scores.all_scored_families();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].family.mother, moved);
        assert_eq!(families[0].score, score);
        assert!(scores.link_score(&mother, &daughter).is_none());
        assert_eq!(scores.link_score(&daughter, &moved), Some(&score));
    }

    #[test]
    fn test_replace_position_rejects_merged_daughters() {
        let mut scores = ScoreCollection::new();
        scores.set_family_score(family(), Score::new()).unwrap();
        let result = scores.replace_position(
            &Position::new(-1.0, 0.0, 0.0, 2),
            Position::new(1.0, 0.0, 0.0, 2),
        );
        assert!(matches!(result, Err(TrackerError::InvalidFamily(_))));
    }

    #[test]
    fn test_link_scores_ignore_direction() {
        let mut scores = ScoreCollection::new();
        let a = Position::new(0.0, 0.0, 0.0, 1);
        let b = Position::new(0.0, 0.0, 0.0, 2);
        let mut score = Score::new();
        score.set("distance", -1.5);
        scores.set_link_score(b, a, score);
        assert_eq!(scores.link_score(&a, &b).unwrap().total(), -1.5);
    }
}
