//! Axis resolution for horizontal channels.
//!
//! Horizontal channels sharing an SNCL prefix are the two components of one
//! sensor. When they are orthogonal within tolerance they are labelled with
//! Cartesian axes so that a later rotation knows which component is which.

use crate::models::{AxisTag, ChannelAvailability, LabeledChannel, Skip, SkipReason};
use tracing::warn;

/// Allowed deviation from a right angle, in degrees.
pub const ORTHOGONAL_TOLERANCE_DEG: f64 = 3.0;

/// Axis label during resolution. `Drop` never leaves this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisLabel {
    X,
    Y,
    Unknown,
    Drop,
}

impl AxisLabel {
    /// The label as a channel tag, or `None` for dropped channels.
    pub fn tag(self) -> Option<AxisTag> {
        match self {
            AxisLabel::X => Some(AxisTag::X),
            AxisLabel::Y => Some(AxisTag::Y),
            AxisLabel::Unknown => Some(AxisTag::Unknown),
            AxisLabel::Drop => None,
        }
    }
}

/// Normalise an angle into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let r = angle.rem_euclid(360.0);
    // rem_euclid may round up to the modulus for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

fn within_tolerance(diff: f64, target: f64) -> bool {
    (diff - target).abs() <= ORTHOGONAL_TOLERANCE_DEG
}

/// Label two mates from their azimuths.
///
/// `az1 - az2` near 270 (i.e. -90) means the first channel is Y and the
/// second X; near 90 (i.e. -270) the reverse. Anything else is not
/// orthogonal enough to rotate and both are `Unknown`.
pub fn classify_axis(az1: f64, az2: f64) -> (AxisLabel, AxisLabel) {
    let diff = normalize_degrees(az1 - az2);

    if within_tolerance(diff, 270.0) {
        (AxisLabel::Y, AxisLabel::X)
    } else if within_tolerance(diff, 90.0) {
        (AxisLabel::X, AxisLabel::Y)
    } else {
        (AxisLabel::Unknown, AxisLabel::Unknown)
    }
}

/// Labels for one prefix group, in input order.
pub fn resolve_axes(group: &[&ChannelAvailability]) -> Vec<AxisLabel> {
    match group {
        [] => Vec::new(),
        [_] => vec![AxisLabel::Unknown],
        [a, b] => {
            let (first, second) = classify_axis(a.azimuth, b.azimuth);
            vec![first, second]
        }
        // Hard to say why there are so many; usually a metadata error.
        _ => vec![AxisLabel::Drop; group.len()],
    }
}

/// Label every horizontal channel of a station, dropping ambiguous groups.
///
/// Output is ordered by SNCL prefix.
pub fn label_horizontals(rows: &[ChannelAvailability]) -> (Vec<LabeledChannel>, Vec<Skip>) {
    let mut sorted: Vec<&ChannelAvailability> = rows.iter().collect();
    sorted.sort_by_cached_key(|row| row.sncl_prefix());

    let mut labeled = Vec::with_capacity(sorted.len());
    let mut skips = Vec::new();

    for group in sorted.chunk_by(|a, b| a.sncl_prefix() == b.sncl_prefix()) {
        let labels = resolve_axes(group);

        if labels.iter().any(|l| *l == AxisLabel::Drop) {
            let prefix = group[0].sncl_prefix();
            warn!(
                "Dropping {} horizontal channels sharing prefix {}",
                group.len(),
                prefix
            );
            skips.push(Skip::new(
                prefix.clone(),
                SkipReason::AmbiguousAxisGroup { prefix },
            ));
            continue;
        }

        for (row, label) in group.iter().zip(labels) {
            if let Some(axis) = label.tag() {
                labeled.push(LabeledChannel {
                    channel: (*row).clone(),
                    axis,
                });
            }
        }
    }

    (labeled, skips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::horizontal;

    #[test]
    fn test_classify_north_east() {
        // N (0) minus E (90) = -90: N is Y, E is X
        assert_eq!(classify_axis(0.0, 90.0), (AxisLabel::Y, AxisLabel::X));
        assert_eq!(classify_axis(90.0, 0.0), (AxisLabel::X, AxisLabel::Y));
    }

    #[test]
    fn test_classify_tolerance_window() {
        assert_eq!(classify_axis(0.0, 93.0), (AxisLabel::Y, AxisLabel::X));
        assert_eq!(classify_axis(0.0, 87.0), (AxisLabel::Y, AxisLabel::X));
        assert_eq!(classify_axis(92.0, 0.0), (AxisLabel::X, AxisLabel::Y));
        assert_eq!(
            classify_axis(0.0, 94.0),
            (AxisLabel::Unknown, AxisLabel::Unknown)
        );
    }

    #[test]
    fn test_classify_wraparound_windows() {
        // 270 and -270 differences
        assert_eq!(classify_axis(300.0, 30.0), (AxisLabel::Y, AxisLabel::X));
        assert_eq!(classify_axis(10.0, 280.0), (AxisLabel::X, AxisLabel::Y));
    }

    #[test]
    fn test_classify_non_orthogonal() {
        assert_eq!(
            classify_axis(0.0, 45.0),
            (AxisLabel::Unknown, AxisLabel::Unknown)
        );
        assert_eq!(
            classify_axis(10.0, 10.0),
            (AxisLabel::Unknown, AxisLabel::Unknown)
        );
    }

    #[test]
    fn test_classify_invariant_under_full_turns() {
        let cases = [(0.0, 90.0), (90.0, 0.0), (15.0, 104.0), (0.0, 45.0), (359.0, 89.0)];
        for (a, b) in cases {
            let base = classify_axis(a, b);
            assert_eq!(classify_axis(a + 360.0, b), base);
            assert_eq!(classify_axis(a - 360.0, b), base);
            assert_eq!(classify_axis(a, b + 360.0), base);
            assert_eq!(classify_axis(a, b - 360.0), base);
        }
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(45.0), 45.0);
    }

    #[test]
    fn test_resolve_single_is_unknown() {
        let n = horizontal("00", "BH1", 0.0);
        assert_eq!(resolve_axes(&[&n]), vec![AxisLabel::Unknown]);
    }

    #[test]
    fn test_label_three_on_one_prefix_dropped() {
        let rows = vec![
            horizontal("00", "BHN", 0.0),
            horizontal("00", "BHE", 90.0),
            horizontal("00", "BH1", 45.0),
            horizontal("10", "BHN", 0.0),
        ];
        let (labeled, skips) = label_horizontals(&rows);

        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].channel.location, "10");
        assert_eq!(labeled[0].axis, AxisTag::Unknown);
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].reason.kind(), "ambiguous_axis_group");
    }

    #[test]
    fn test_label_orthogonal_pair() {
        let rows = vec![horizontal("00", "BHE", 90.0), horizontal("00", "BHN", 0.0)];
        let (labeled, skips) = label_horizontals(&rows);

        assert!(skips.is_empty());
        let axis_of = |code: &str| {
            labeled
                .iter()
                .find(|l| l.channel.channel == code)
                .map(|l| l.axis)
        };
        assert_eq!(axis_of("BHN"), Some(AxisTag::Y));
        assert_eq!(axis_of("BHE"), Some(AxisTag::X));
    }
}
