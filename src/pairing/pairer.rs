//! Candidate pair enumeration for one station.
//!
//! Channels are grouped by absolute dip. Verticals are compared across
//! locations; horizontals are first labelled with axes and compared within
//! the X and Y sets; oblique channels are reported and skipped.

use crate::models::{
    AxisTag, ChannelAvailability, ChannelPair, LabeledChannel, PairAxis, Rotation, Skip,
    SkipReason,
};
use crate::pairing::axis::{label_horizontals, normalize_degrees};
use tracing::{debug, warn};

/// Pairs and policy skips for one station.
#[derive(Debug, Clone, Default)]
pub struct StationPlan {
    pub pairs: Vec<ChannelPair>,
    /// Labelled horizontals, kept for orthogonal-mate lookup.
    pub horizontals: Vec<LabeledChannel>,
    pub skips: Vec<Skip>,
}

/// Channels sharing one absolute dip.
#[derive(Debug, Clone, PartialEq)]
pub struct DipGroup {
    pub dip: f64,
    pub rows: Vec<ChannelAvailability>,
}

impl DipGroup {
    pub fn is_vertical(&self) -> bool {
        self.dip == 90.0
    }

    pub fn is_horizontal(&self) -> bool {
        self.dip == 0.0
    }
}

/// Group rows by `abs(dip)`, ascending. Input order is kept within a group.
pub fn dip_groups(rows: &[ChannelAvailability]) -> Vec<DipGroup> {
    let mut groups: Vec<DipGroup> = Vec::new();

    for row in rows {
        let dip = row.dip.abs();
        match groups.iter_mut().find(|g| g.dip == dip) {
            Some(group) => group.rows.push(row.clone()),
            None => groups.push(DipGroup {
                dip,
                rows: vec![row.clone()],
            }),
        }
    }

    groups.sort_by(|a, b| a.dip.total_cmp(&b.dip));
    groups
}

/// All unordered pairs `(i, j)` with `i < j`, in input order.
pub fn unordered_pairs<T>(items: &[T]) -> Vec<(&T, &T)> {
    let mut out = Vec::with_capacity(items.len() * items.len().saturating_sub(1) / 2);
    for (i, first) in items.iter().enumerate() {
        for second in &items[i + 1..] {
            out.push((first, second));
        }
    }
    out
}

/// Vertical rule: same location and the same channel code once either the
/// band letter or the orientation letter is ignored.
///
/// `BHZ` and `LHZ` at one location are one sensor at two sample rates, which
/// is not an independent comparison.
pub fn is_same_vertical_instrument(a: &ChannelAvailability, b: &ChannelAvailability) -> bool {
    a.location == b.location
        && (a.channel_suffix() == b.channel_suffix() || a.channel_stem() == b.channel_stem())
}

/// Horizontal rule: same location and same channel code ignoring orientation.
pub fn is_same_horizontal_instrument(a: &ChannelAvailability, b: &ChannelAvailability) -> bool {
    a.location == b.location && a.channel_stem() == b.channel_stem()
}

/// Rotation needed to bring the secondary onto the primary's azimuth.
pub fn rotation_for(primary: &ChannelAvailability, secondary: &ChannelAvailability) -> Rotation {
    let angle_deg = normalize_degrees(primary.azimuth - secondary.azimuth);
    if angle_deg == 0.0 {
        Rotation::None
    } else {
        Rotation::Required { angle_deg }
    }
}

/// Plan every comparison for one station's seismic channels.
pub fn plan_station(rows: &[ChannelAvailability]) -> StationPlan {
    let mut plan = StationPlan::default();

    for group in dip_groups(rows) {
        if group.is_vertical() {
            plan_vertical(&group.rows, &mut plan);
        } else if group.is_horizontal() {
            plan_horizontal(&group.rows, &mut plan);
        } else {
            plan_oblique(&group, &mut plan);
        }
    }

    plan
}

fn plan_vertical(rows: &[ChannelAvailability], plan: &mut StationPlan) {
    if rows.len() < 2 {
        if let Some(only) = rows.first() {
            debug!(
                "Skipping {} because there are no other channels for comparison",
                only.sncl_id()
            );
            plan.skips
                .push(Skip::new(only.sncl_id(), SkipReason::InsufficientChannels));
        }
        return;
    }

    for (primary, secondary) in unordered_pairs(rows) {
        let pair = ChannelPair {
            primary: primary.clone(),
            secondary: secondary.clone(),
            axis: PairAxis::None,
            primary_axis: None,
            secondary_axis: None,
            rotation: Rotation::None,
        };
        push_unless_same_instrument(pair, is_same_vertical_instrument, plan);
    }
}

fn plan_horizontal(rows: &[ChannelAvailability], plan: &mut StationPlan) {
    let (labeled, skips) = label_horizontals(rows);
    plan.skips.extend(skips);

    let x_set: Vec<&LabeledChannel> = labeled.iter().filter(|l| l.axis != AxisTag::Y).collect();
    let y_set: Vec<&LabeledChannel> = labeled.iter().filter(|l| l.axis != AxisTag::X).collect();

    for (axis, set) in [(PairAxis::X, &x_set), (PairAxis::Y, &y_set)] {
        for (primary, secondary) in unordered_pairs(set) {
            let both_unknown =
                primary.axis == AxisTag::Unknown && secondary.axis == AxisTag::Unknown;
            // Unknown channels sit in both sets; emit such pairs once.
            if both_unknown && axis == PairAxis::Y {
                continue;
            }

            let pair = ChannelPair {
                primary: primary.channel.clone(),
                secondary: secondary.channel.clone(),
                axis: if both_unknown { PairAxis::None } else { axis },
                primary_axis: Some(primary.axis),
                secondary_axis: Some(secondary.axis),
                rotation: rotation_for(&primary.channel, &secondary.channel),
            };
            push_unless_same_instrument(pair, is_same_horizontal_instrument, plan);
        }
    }

    plan.horizontals = labeled;
}

fn plan_oblique(group: &DipGroup, plan: &mut StationPlan) {
    for row in &group.rows {
        warn!(
            "Skipping {}: dip {} requires 3D rotation",
            row.sncl_id(),
            row.dip
        );
        plan.skips
            .push(Skip::new(row.sncl_id(), SkipReason::ObliqueDip { dip: row.dip }));
    }
}

fn push_unless_same_instrument(
    pair: ChannelPair,
    same_instrument: fn(&ChannelAvailability, &ChannelAvailability) -> bool,
    plan: &mut StationPlan,
) {
    if same_instrument(&pair.primary, &pair.secondary) {
        debug!("Skipping {}: same instrument", pair.label());
        plan.skips
            .push(Skip::new(pair.label(), SkipReason::SameInstrument));
        return;
    }
    plan.pairs.push(pair);
}
