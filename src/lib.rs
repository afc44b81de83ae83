pub mod about;
pub mod cluster_finder;
pub mod connections;
pub mod error;
pub mod error_checker;
pub mod experiment;
pub mod image_cache;
pub mod image_offsets;
pub mod io;
pub mod lineage_drawing;
pub mod lineage_finder;
pub mod linking_differences;
pub mod linking_errors;
pub mod links;
pub mod nearby_position_finder;
pub mod parameters;
pub mod path;
pub mod position;
pub mod position_collection;
pub mod positions_comparison;
pub mod resolution;
pub mod score;
pub mod tracks;

pub use error::{Result, TrackerError};
pub use experiment::Experiment;
pub use position::{Position, TimePoint};
