//! Approximate identity checks for names and booked trips.
//!
//! The value types in [`crate::model`] build their `is_same` checks on the
//! name comparisons here. Trip matching relates live public transport data
//! to a booking that only carries a line number, stop names and times.

mod line_name;
mod location_name;
mod trip;

pub use line_name::is_same_line_name;
pub use location_name::is_same_location_name;
pub use trip::{
    is_arrival_for_trip, is_departure_for_trip, is_journey_for_trip, is_same_mode, is_same_route,
    sub_journey_for_trip, TripKind, TripQuery,
};
