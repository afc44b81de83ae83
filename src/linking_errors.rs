//! Catalogue of the errors and warnings the linking analysis can attach to a position.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoFuturePosition,
    PotentiallyNotAMother,
    PotentiallyShouldBeAMother,
    TooManyDaughterCells,
    NoPastPosition,
    CellMerge,
    PotentiallyWrongDaughters,
    YoungMother,
    LowMotherScore,
    ShrunkALot,
    MovedTooFast,
    FailedShape,
    UncertainPosition,
    LowLinkScore,
    /// A code written by a newer version of the program.
    Unknown(u32),
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::NoFuturePosition,
        ErrorKind::PotentiallyNotAMother,
        ErrorKind::PotentiallyShouldBeAMother,
        ErrorKind::TooManyDaughterCells,
        ErrorKind::NoPastPosition,
        ErrorKind::CellMerge,
        ErrorKind::PotentiallyWrongDaughters,
        ErrorKind::YoungMother,
        ErrorKind::LowMotherScore,
        ErrorKind::ShrunkALot,
        ErrorKind::MovedTooFast,
        ErrorKind::FailedShape,
        ErrorKind::UncertainPosition,
        ErrorKind::LowLinkScore,
    ];

    pub fn code(self) -> u32 {
        match self {
            Self::NoFuturePosition => 1,
            Self::PotentiallyNotAMother => 2,
            Self::PotentiallyShouldBeAMother => 3,
            Self::TooManyDaughterCells => 4,
            Self::NoPastPosition => 5,
            Self::CellMerge => 6,
            Self::PotentiallyWrongDaughters => 7,
            Self::YoungMother => 8,
            Self::LowMotherScore => 9,
            Self::ShrunkALot => 10,
            Self::MovedTooFast => 11,
            Self::FailedShape => 12,
            Self::UncertainPosition => 13,
            Self::LowLinkScore => 14,
            Self::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .unwrap_or(Self::Unknown(code))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFuturePosition => "NO_FUTURE_POSITION",
            Self::PotentiallyNotAMother => "POTENTIALLY_NOT_A_MOTHER",
            Self::PotentiallyShouldBeAMother => "POTENTIALLY_SHOULD_BE_A_MOTHER",
            Self::TooManyDaughterCells => "TOO_MANY_DAUGHTER_CELLS",
            Self::NoPastPosition => "NO_PAST_POSITION",
            Self::CellMerge => "CELL_MERGE",
            Self::PotentiallyWrongDaughters => "POTENTIALLY_WRONG_DAUGHTERS",
            Self::YoungMother => "YOUNG_MOTHER",
            Self::LowMotherScore => "LOW_MOTHER_SCORE",
            Self::ShrunkALot => "SHRUNK_A_LOT",
            Self::MovedTooFast => "MOVED_TOO_FAST",
            Self::FailedShape => "FAILED_SHAPE",
            Self::UncertainPosition => "UNCERTAIN_POSITION",
            Self::LowLinkScore => "LOW_LINK_SCORE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    fn info(self) -> Option<(Severity, &'static str)> {
        use Severity::*;
        let info = match self {
            Self::NoFuturePosition => (
                Warning,
                "This cell has no links to the future. Please check if this is correct.",
            ),
            Self::PotentiallyNotAMother => (
                Warning,
                "This cell is maybe not a mother; nearby cell has similar likeliness.",
            ),
            Self::PotentiallyShouldBeAMother => (
                Warning,
                "This cell is possibly a mother; its score is high enough.",
            ),
            Self::TooManyDaughterCells => (
                Error,
                "This cell has more than two daughter cells. This is impossible.",
            ),
            Self::NoPastPosition => (Error, "This cell popped up out of nothing."),
            Self::CellMerge => (
                Error,
                "Two cells merged together into this cell. This is impossible.",
            ),
            Self::PotentiallyWrongDaughters => {
                (Warning, "One of the two daughter cells is maybe wrong.")
            }
            Self::YoungMother => (
                Error,
                "This is most likely not a mother cell: it is a very young cell.",
            ),
            Self::LowMotherScore => (Warning, "This cell is probably not a mother cell."),
            Self::ShrunkALot => (
                Warning,
                "This cell just shrank a lot in size. It may be a mother or daughter cell.",
            ),
            Self::MovedTooFast => (
                Warning,
                "This cell just moved very quickly. The link coming from the past may be wrong.",
            ),
            Self::FailedShape => (
                Warning,
                "This cell has an irregular shape. Maybe it was a misdetection, or it should be a mother cell.",
            ),
            Self::UncertainPosition => (Warning, "Uncertain if there actually is a cell here."),
            Self::LowLinkScore => (Warning, "This is probably not a correct link."),
            Self::Unknown(_) => return None,
        };
        Some(info)
    }

    /// Unknown kinds are errors, so that data from newer versions is never silently accepted.
    pub fn severity(self) -> Severity {
        self.info()
            .map(|(severity, _)| severity)
            .unwrap_or(Severity::Error)
    }

    pub fn message(self) -> String {
        self.info()
            .map(|(_, message)| message.to_string())
            .unwrap_or_else(|| format!("Unknown error code {}", self.code()))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN_{code}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_code(u32::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(ErrorKind::NoFuturePosition.severity(), Severity::Warning);
        assert_eq!(ErrorKind::NoPastPosition.severity(), Severity::Error);
        assert_eq!(ErrorKind::TooManyDaughterCells.severity(), Severity::Error);
        assert_eq!(ErrorKind::CellMerge.severity(), Severity::Error);
        assert_eq!(ErrorKind::LowMotherScore.severity(), Severity::Warning);
    }

    #[test]
    fn test_unknown_code_defaults_to_error() {
        let kind = ErrorKind::from_code(99);
        assert_eq!(kind, ErrorKind::Unknown(99));
        assert_eq!(kind.severity(), Severity::Error);
        assert_eq!(kind.message(), "Unknown error code 99");
        assert_eq!(kind.to_string(), "UNKNOWN_99");
    }

    #[test]
    fn test_serializes_as_code() {
        let text = serde_json::to_string(&ErrorKind::CellMerge).unwrap();
        assert_eq!(text, "6");
        let kind: ErrorKind = serde_json::from_str("42").unwrap();
        assert_eq!(kind, ErrorKind::Unknown(42));
    }
}
