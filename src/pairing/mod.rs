//! Channel pairing module.
//!
//! Decides which channels of a station are compared and how their
//! geometry resolves.

pub mod axis;
pub mod pairer;
pub mod rotation;

pub use pairer::plan_station;
pub use rotation::{plan_rotation, ComponentSource, RotationPlan};

use crate::models::ChannelAvailability;

/// Drop non-seismic channels (state-of-health text channels and the like).
///
/// Codes are compared exactly and case-sensitively.
pub fn filter_seismic(
    rows: &[ChannelAvailability],
    excluded_channels: &[String],
) -> Vec<ChannelAvailability> {
    rows.iter()
        .filter(|row| !excluded_channels.iter().any(|code| *code == row.channel))
        .cloned()
        .collect()
}
