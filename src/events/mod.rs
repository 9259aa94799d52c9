//! Domain model — clubs and their dated history events.

pub mod model;

pub use model::{EventCategory, HistoryEvent, Team};
