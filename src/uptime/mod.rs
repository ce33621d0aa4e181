//! Uptime series engine.
//!
//! Turns an irregular stream of timestamped check results into a
//! fixed-resolution, gap-filled histogram ready for charting. Pure and
//! synchronous: callers hand in a snapshot of checks plus an explicit
//! `now`, and get back an ordered series with stacked segment geometry
//! and axis bounds. Nothing here touches a clock, the store, or shared
//! state, so invocations for different monitors can run side by side.

mod domain;
mod range;
mod series;

pub use domain::*;
pub use range::*;
pub use series::*;
