//! Rotation of a secondary horizontal channel onto the primary's azimuth.
//!
//! The amplitude mixing below is carried over unchanged from the legacy
//! processing chain: squared-trig weighting of the two amplitude spectra,
//! phases passed through from the component of the same axis. It has not
//! been checked against a physical derivation and needs review by a
//! seismologist before its output is trusted. It is disabled by default
//! (`rotation.enabled = false`).

use crate::error::DomainError;
use crate::models::{
    AxisTag, ChannelAvailability, ChannelPair, LabeledChannel, ResponseSpectrum, SkipReason,
};

/// Which fetched channel feeds the rotated component handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSource {
    Secondary,
    Mate,
}

/// Everything needed to rotate one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPlan {
    pub angle_deg: f64,
    /// Orthogonal mate of the secondary channel.
    pub mate: ChannelAvailability,
    pub primary_axis: AxisTag,
    pub secondary_axis: AxisTag,
}

impl RotationPlan {
    /// The un-rotated channel on the primary's axis.
    pub fn component_source(&self) -> ComponentSource {
        if self.secondary_axis == self.primary_axis {
            ComponentSource::Secondary
        } else {
            ComponentSource::Mate
        }
    }

    /// Rotate the secondary/mate amplitude spectra and keep the component
    /// on the primary's axis.
    pub fn apply(
        &self,
        secondary: &ResponseSpectrum,
        mate: &ResponseSpectrum,
    ) -> Result<ResponseSpectrum, DomainError> {
        let (y, x) = match self.secondary_axis {
            AxisTag::Y => (secondary, mate),
            _ => (mate, secondary),
        };
        let (rotated_y, rotated_x) = rotate_amplitudes(y, x, self.angle_deg)?;

        Ok(match self.primary_axis {
            AxisTag::Y => rotated_y,
            _ => rotated_x,
        })
    }
}

/// Resolve the orthogonal mate and axis tags for a pair needing rotation.
///
/// `horizontals` is the station's labelled horizontal set (after dropping
/// ambiguous prefixes).
pub fn plan_rotation(
    pair: &ChannelPair,
    angle_deg: f64,
    horizontals: &[LabeledChannel],
) -> Result<RotationPlan, SkipReason> {
    let secondary_axis = match pair.secondary_axis {
        Some(tag @ (AxisTag::X | AxisTag::Y)) => tag,
        _ => return Err(SkipReason::AmbiguousAxis),
    };

    let prefix = pair.secondary.sncl_prefix();
    let mates: Vec<&LabeledChannel> = horizontals
        .iter()
        .filter(|l| l.axis != secondary_axis)
        .filter(|l| l.channel != pair.secondary)
        .filter(|l| l.channel.sncl_prefix() == prefix)
        .collect();

    let mate = match mates.as_slice() {
        [only] => only.channel.clone(),
        other => {
            return Err(SkipReason::MissingOrthogonalMate {
                candidates: other.len(),
            })
        }
    };

    let primary_axis = match pair.primary_axis {
        Some(tag @ (AxisTag::X | AxisTag::Y)) => tag,
        _ => return Err(SkipReason::UnknownPrimaryAxis),
    };

    Ok(RotationPlan {
        angle_deg,
        mate,
        primary_axis,
        secondary_axis,
    })
}

/// Mix Y and X amplitude spectra by `angle_deg`.
///
/// `rotatedY = cos²θ·Y + sin²θ·X`, `rotatedX = sin²θ·Y + cos²θ·X`.
pub fn rotate_amplitudes(
    y: &ResponseSpectrum,
    x: &ResponseSpectrum,
    angle_deg: f64,
) -> Result<(ResponseSpectrum, ResponseSpectrum), DomainError> {
    if y.amplitudes.len() != x.amplitudes.len() {
        return Err(DomainError::SpectrumMismatch {
            left: y.amplitudes.len(),
            right: x.amplitudes.len(),
        });
    }

    let theta = angle_deg.to_radians();
    let cos2 = theta.cos().powi(2);
    let sin2 = theta.sin().powi(2);

    let mut rotated_y = y.clone();
    let mut rotated_x = x.clone();
    for (i, (amp_y, amp_x)) in y.amplitudes.iter().zip(&x.amplitudes).enumerate() {
        rotated_y.amplitudes[i] = cos2 * amp_y + sin2 * amp_x;
        rotated_x.amplitudes[i] = sin2 * amp_y + cos2 * amp_x;
    }

    Ok((rotated_y, rotated_x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::horizontal;
    use crate::models::{PairAxis, Rotation};

    fn spectrum(amp: f64) -> ResponseSpectrum {
        ResponseSpectrum {
            frequencies: vec![0.1, 0.2, 0.4],
            amplitudes: vec![amp; 3],
            phases: vec![0.0; 3],
        }
    }

    fn labeled(location: &str, code: &str, azimuth: f64, axis: AxisTag) -> LabeledChannel {
        LabeledChannel {
            channel: horizontal(location, code, azimuth),
            axis,
        }
    }

    fn station() -> Vec<LabeledChannel> {
        vec![
            labeled("00", "BHE", 90.0, AxisTag::X),
            labeled("00", "BHN", 0.0, AxisTag::Y),
            labeled("10", "BH1", 30.0, AxisTag::Y),
            labeled("10", "BH2", 120.0, AxisTag::X),
        ]
    }

    fn y_pair() -> ChannelPair {
        ChannelPair {
            primary: horizontal("00", "BHN", 0.0),
            secondary: horizontal("10", "BH1", 30.0),
            axis: PairAxis::Y,
            primary_axis: Some(AxisTag::Y),
            secondary_axis: Some(AxisTag::Y),
            rotation: Rotation::Required { angle_deg: 330.0 },
        }
    }

    #[test]
    fn test_rotation_zero_is_identity() {
        let (ry, rx) = rotate_amplitudes(&spectrum(2.0), &spectrum(5.0), 0.0).unwrap();
        assert!(ry.amplitudes.iter().all(|a| (a - 2.0).abs() < 1e-12));
        assert!(rx.amplitudes.iter().all(|a| (a - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_rotation_ninety_swaps() {
        let (ry, rx) = rotate_amplitudes(&spectrum(2.0), &spectrum(5.0), 90.0).unwrap();
        assert!(ry.amplitudes.iter().all(|a| (a - 5.0).abs() < 1e-9));
        assert!(rx.amplitudes.iter().all(|a| (a - 2.0).abs() < 1e-9));
    }

    #[test]
    fn test_rotation_length_mismatch() {
        let mut short = spectrum(1.0);
        short.amplitudes.pop();
        let err = rotate_amplitudes(&spectrum(1.0), &short, 45.0).unwrap_err();
        assert_eq!(err, DomainError::SpectrumMismatch { left: 3, right: 2 });
    }

    #[test]
    fn test_plan_finds_mate() {
        let plan = plan_rotation(&y_pair(), 330.0, &station()).unwrap();
        assert_eq!(plan.mate.channel, "BH2");
        assert_eq!(plan.secondary_axis, AxisTag::Y);
        assert_eq!(plan.component_source(), ComponentSource::Secondary);
    }

    #[test]
    fn test_plan_missing_mate() {
        let horizontals: Vec<LabeledChannel> = station()
            .into_iter()
            .filter(|l| l.channel.channel != "BH2")
            .collect();
        let err = plan_rotation(&y_pair(), 330.0, &horizontals).unwrap_err();
        assert_eq!(err, SkipReason::MissingOrthogonalMate { candidates: 0 });
    }

    #[test]
    fn test_plan_unknown_axes() {
        let mut pair = y_pair();
        pair.secondary_axis = Some(AxisTag::Unknown);
        assert_eq!(
            plan_rotation(&pair, 330.0, &station()).unwrap_err(),
            SkipReason::AmbiguousAxis
        );

        let mut pair = y_pair();
        pair.primary_axis = Some(AxisTag::Unknown);
        assert_eq!(
            plan_rotation(&pair, 330.0, &station()).unwrap_err(),
            SkipReason::UnknownPrimaryAxis
        );
    }

    #[test]
    fn test_apply_picks_primary_axis() {
        let plan = RotationPlan {
            angle_deg: 90.0,
            mate: horizontal("10", "BH2", 120.0),
            primary_axis: AxisTag::X,
            secondary_axis: AxisTag::Y,
        };
        // secondary is Y (amp 2), mate is X (amp 5); rotated X at 90 deg is the old Y
        let out = plan.apply(&spectrum(2.0), &spectrum(5.0)).unwrap();
        assert!(out.amplitudes.iter().all(|a| (a - 2.0).abs() < 1e-9));
        assert_eq!(plan.component_source(), ComponentSource::Mate);
    }
}
