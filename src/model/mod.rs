//! Public transport value types and the merge engine.
//!
//! All types are plain values: they are cloned freely, compared with the
//! approximate `is_same` checks, and combined with directional `merge`
//! functions that fill the gaps of the left-hand value from the right-hand one.
//! `merge` assumes `is_same` holds; clearly conflicting inputs are rejected
//! with a [`MergeError`].

mod departure;
mod journey;
mod line;
mod location;
mod merge;

pub use departure::Departure;
pub use journey::{Journey, JourneySection, SectionMode};
pub use line::{Color, Line, Mode, Route};
pub use location::{Location, COINCIDENT_DISTANCE, MAX_SAME_LOCATION_DISTANCE};
pub use merge::{MergeError, MergeResult};
