//! State module for tracking collection progress
//!
//! # Components
//!
//! - `CollectorState`: the phase a unit of collection work is in
//!   (walking categories, enumerating a listing, extracting a product)
//! - `StateTracker`: owns one unit's current state and validates transitions

mod collector_state;

pub use collector_state::{CollectorState, StateTracker};
