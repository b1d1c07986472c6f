//! Shared utilities.

pub mod clock;
pub mod telemetry;

pub use clock::{mod_next_day, time_until};
pub use telemetry::init_tracing;
