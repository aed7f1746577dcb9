//! Ranking, gap-to-target and radar scores over aggregated groups.

use crate::aggregate::{self, AggregateRow};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl Polarity {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Polarity::LowerIsBetter
        } else {
            Polarity::HigherIsBetter
        }
    }

    /// `Less` when `a` is the better value.
    fn order(&self, a: f64, b: f64) -> Ordering {
        match self {
            Polarity::HigherIsBetter => b.total_cmp(&a),
            Polarity::LowerIsBetter => a.total_cmp(&b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    pub value: Option<f64>,
    pub item: T,
}

/// Sort best-first by `metric` and number the result 1..N.
///
/// The sort is stable, so equal values keep their input order and take
/// consecutive ranks: `[0.9, 0.5, 0.9]` ranks as `[1, 3, 2]`. Items without a
/// finite value go last, still in input order.
pub fn rank_by<T, F>(items: Vec<T>, metric: F, polarity: Polarity) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> Option<f64>,
{
    let mut valued: Vec<(Option<f64>, T)> = items
        .into_iter()
        .map(|item| (metric(&item).filter(|v| v.is_finite()), item))
        .collect();

    valued.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => polarity.order(*a, *b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    valued
        .into_iter()
        .enumerate()
        .map(|(i, (value, item))| Ranked {
            rank: i + 1,
            value,
            item,
        })
        .collect()
}

/// Rank aggregate rows on one of their fields.
pub fn rank_groups(
    rows: Vec<AggregateRow>,
    field: &str,
    polarity: Polarity,
) -> Vec<Ranked<AggregateRow>> {
    let ranked = rank_by(rows, |row| row.get(field), polarity);
    debug!(field, groups = ranked.len(), "ranked groups");
    ranked
}

/// The first `n` ranked entries; fewer when the input is short.
pub fn top_n<T>(ranked: &[Ranked<T>], n: usize) -> &[Ranked<T>] {
    &ranked[..n.min(ranked.len())]
}

/// The last `n` entries that carry a value, worst first.
pub fn bottom_n<T>(ranked: &[Ranked<T>], n: usize) -> Vec<&Ranked<T>> {
    ranked
        .iter()
        .rev()
        .filter(|r| r.value.is_some())
        .take(n)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum GapSeverity {
    Critical,
    Severe,
    Moderate,
    Minor,
    Good,
    Excellent,
}

impl GapSeverity {
    /// Each bound is exclusive: a gap of exactly -0.3 is `Severe`.
    pub fn from_gap(gap: f64) -> Self {
        if gap < -0.3 {
            GapSeverity::Critical
        } else if gap < -0.2 {
            GapSeverity::Severe
        } else if gap < -0.1 {
            GapSeverity::Moderate
        } else if gap < 0.0 {
            GapSeverity::Minor
        } else if gap < 0.1 {
            GapSeverity::Good
        } else {
            GapSeverity::Excellent
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GapSeverity::Critical => "Critical",
            GapSeverity::Severe => "Severe",
            GapSeverity::Moderate => "Moderate",
            GapSeverity::Minor => "Minor",
            GapSeverity::Good => "Good",
            GapSeverity::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gap {
    pub value: f64,
    pub target: f64,
    /// Negative below target.
    pub gap: f64,
    /// 0 when the target is 0.
    pub gap_percent: f64,
    pub severity: GapSeverity,
}

/// `None` when either side is not finite.
pub fn gap(value: f64, target: f64) -> Option<Gap> {
    if !value.is_finite() || !target.is_finite() {
        return None;
    }
    let gap = value - target;
    let gap_percent = if target == 0.0 {
        0.0
    } else {
        gap / target * 100.0
    };
    Some(Gap {
        value,
        target,
        gap,
        gap_percent,
        severity: GapSeverity::from_gap(gap),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupGap<'a> {
    pub row: &'a AggregateRow,
    pub gap: Gap,
}

/// Gap of every group's `field` against `target`, largest shortfall first.
/// Groups without a value for the field are skipped.
pub fn group_gaps<'a>(rows: &'a [AggregateRow], field: &str, target: f64) -> Vec<GroupGap<'a>> {
    let mut gaps: Vec<GroupGap<'a>> = rows
        .iter()
        .filter_map(|row| {
            let value = row.get(field)?;
            Some(GroupGap {
                row,
                gap: gap(value, target)?,
            })
        })
        .collect();
    gaps.sort_by(|a, b| a.gap.gap.total_cmp(&b.gap.gap));
    gaps
}

/// How one axis maps a raw value onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Normalization {
    /// Already a 0..1 index.
    PassThrough,
    /// Divide by the top of the scale (100 for percentages, 4 for water).
    Scale { max: f64 },
    /// Lower is better: `max(0, 1 - value / cap)`.
    Inverse { cap: f64 },
}

impl Normalization {
    /// Always lands in `[0, 1]`; a non-positive scale or cap and non-finite
    /// input give 0.
    pub fn apply(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let scored = match *self {
            Normalization::PassThrough => value,
            Normalization::Scale { max } if max > 0.0 => value / max,
            Normalization::Inverse { cap } if cap > 0.0 => 1.0 - value / cap,
            Normalization::Scale { .. } | Normalization::Inverse { .. } => 0.0,
        };
        scored.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AxisSource {
    Field(&'static str),
    /// `numerator / denominator × scale` over two group fields; 0 when the
    /// denominator is 0 or missing.
    Ratio {
        numerator: &'static str,
        denominator: &'static str,
        scale: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadarAxis {
    pub label: &'static str,
    pub source: AxisSource,
    pub normalization: Normalization,
}

impl RadarAxis {
    /// Score of one group on this axis. A missing group value scores 0.
    pub fn score(&self, row: &AggregateRow) -> f64 {
        let raw = match self.source {
            AxisSource::Field(name) => row.get(name),
            AxisSource::Ratio {
                numerator,
                denominator,
                scale,
            } => match (row.get(numerator), row.get(denominator)) {
                (Some(n), Some(d)) if d > 0.0 => Some(n / d * scale),
                _ => Some(0.0),
            },
        };
        raw.map_or(0.0, |v| self.normalization.apply(v))
    }
}

/// Eight-axis district comparison. Field names match
/// [`aggregate::district_metric_config`].
pub fn district_radar_axes() -> Vec<RadarAxis> {
    vec![
        RadarAxis {
            label: "Infrastructure",
            source: AxisSource::Field(aggregate::INFRA_INDEX),
            normalization: Normalization::PassThrough,
        },
        RadarAxis {
            label: "Electricity",
            source: AxisSource::Field(aggregate::ELECTRICITY_PCT),
            normalization: Normalization::Scale { max: 100.0 },
        },
        RadarAxis {
            label: "Water Quality",
            source: AxisSource::Field(aggregate::WATER_SCORE),
            normalization: Normalization::Scale { max: 4.0 },
        },
        RadarAxis {
            label: "Fence Coverage",
            source: AxisSource::Field(aggregate::FENCE_PCT),
            normalization: Normalization::Scale { max: 100.0 },
        },
        RadarAxis {
            label: "Low S/C Ratio",
            source: AxisSource::Field(aggregate::SC_RATIO),
            normalization: Normalization::Inverse { cap: 60.0 },
        },
        RadarAxis {
            label: "Low S/T Ratio",
            source: AxisSource::Field(aggregate::ST_RATIO),
            normalization: Normalization::Inverse { cap: 50.0 },
        },
        RadarAxis {
            label: "Low Damage",
            source: AxisSource::Field(aggregate::CLASSROOM_DAMAGE),
            normalization: Normalization::Inverse { cap: 1.0 },
        },
        RadarAxis {
            label: "Teacher Coverage",
            source: AxisSource::Ratio {
                numerator: aggregate::TEACHERS,
                denominator: aggregate::STUDENTS,
                scale: 100.0,
            },
            normalization: Normalization::PassThrough,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarProfile {
    pub key: String,
    pub scores: Vec<(&'static str, f64)>,
}

pub fn radar_profiles(rows: &[&AggregateRow], axes: &[RadarAxis]) -> Vec<RadarProfile> {
    rows.iter()
        .map(|row| RadarProfile {
            key: row.key.clone(),
            scores: axes.iter().map(|axis| (axis.label, axis.score(row))).collect(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    Left,
    Right,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: String,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub winner: Winner,
}

/// Head-to-head over `metrics`. A side without a value cannot win.
pub fn compare_groups(
    left: &AggregateRow,
    right: &AggregateRow,
    metrics: &[(&str, Polarity)],
) -> Vec<MetricComparison> {
    metrics
        .iter()
        .map(|(name, polarity)| {
            let (l, r) = (left.get(name), right.get(name));
            let winner = match (l, r) {
                (Some(a), Some(b)) => match polarity.order(a, b) {
                    Ordering::Less => Winner::Left,
                    Ordering::Greater => Winner::Right,
                    Ordering::Equal => Winner::Tie,
                },
                (Some(_), None) => Winner::Left,
                (None, Some(_)) => Winner::Right,
                (None, None) => Winner::Tie,
            };
            MetricComparison {
                metric: name.to_string(),
                left: l,
                right: r,
                winner,
            }
        })
        .collect()
}
