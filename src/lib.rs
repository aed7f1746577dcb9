//! School infrastructure dashboards: filtering, alert classification,
//! group aggregation and ranking over the SCMS assessment table.
//!
//! The engines are pure functions over an immutable [`Dataset`]. The three
//! entry points used by the rendering layer are re-exported here.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod kpi;
pub mod loader;
pub mod output;
pub mod ranking;
pub mod reports;
pub mod telemetry;
pub mod types;
pub mod util;

pub use aggregate::{FieldSpec, GroupKey, Metric, Reduction};
pub use classify::{AlertReport, ClassificationRules, Status};
pub use error::AppError;
pub use filter::{filter_records, FilterCriteria};
pub use ranking::{Polarity, Ranked};
pub use types::{Dataset, LocationType, SchoolRecord};

use aggregate::AggregateRow;

pub type RankedGroup = Ranked<AggregateRow>;

/// Partition a filtered subset into urgent, attention and good schools with
/// the default thresholds.
pub fn classify_schools<'a>(subset: &[&'a SchoolRecord]) -> AlertReport<'a> {
    classify::calculate_alerts(subset.iter().copied(), &ClassificationRules::default())
}

/// Group `subset` by `group_key`, reduce the configured fields and rank the
/// groups on `rank_metric`, best first.
pub fn aggregate_and_rank(
    subset: &[&SchoolRecord],
    group_key: GroupKey,
    metric_config: &[FieldSpec],
    rank_metric: &str,
    rank_polarity: Polarity,
) -> Vec<RankedGroup> {
    let rows = aggregate::aggregate(subset.iter().copied(), group_key, metric_config);
    ranking::rank_groups(rows, rank_metric, rank_polarity)
}
