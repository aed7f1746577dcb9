//! Headline figures for the overview, maintenance, inspection and
//! safety/utilities views.

use crate::aggregate::{AggregateRow, Metric};
use crate::ranking::{self, MetricComparison, Polarity};
use crate::types::SchoolRecord;
use crate::util::{mean, percent, round_to};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Colour band of a headline figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    Good,
    Warning,
    Critical,
    NoData,
}

impl Band {
    pub fn label(&self) -> &'static str {
        match self {
            Band::Good => "good",
            Band::Warning => "warning",
            Band::Critical => "critical",
            Band::NoData => "no data",
        }
    }
}

fn upper_band(value: Option<f64>, limit: f64) -> Band {
    match value {
        Some(v) if v > limit => Band::Critical,
        Some(_) => Band::Good,
        None => Band::NoData,
    }
}

/// Damage rates are 0..1; the bands are set in percent.
fn damage_band(value: Option<f64>) -> Band {
    match value.map(|v| v * 100.0) {
        Some(v) if v < 15.0 => Band::Good,
        Some(v) if v < 30.0 => Band::Warning,
        Some(_) => Band::Critical,
        None => Band::NoData,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewKpis {
    pub total_schools: usize,
    pub total_students: u64,
    pub total_classrooms: u64,
    pub total_teachers: u64,
    pub toilets_boys: u64,
    pub toilets_girls: u64,
    pub avg_student_classroom: Option<f64>,
    pub avg_student_teacher: Option<f64>,
    pub avg_teacher_classroom: Option<f64>,
    pub avg_infrastructure: Option<f64>,
    pub avg_water_quality: Option<f64>,
    pub avg_classroom_damage: Option<f64>,
    pub avg_toilet_damage: Option<f64>,
    pub pct_electricity: f64,
    pub pct_fence: f64,
    /// `|boys - girls| / max(boys, girls)` in percent.
    pub toilet_gender_gap_pct: f64,
    pub student_classroom_band: Band,
    pub student_teacher_band: Band,
    pub infrastructure_band: Band,
    pub classroom_damage_band: Band,
    pub toilet_damage_band: Band,
}

fn metric_mean(records: &[&SchoolRecord], metric: Metric) -> Option<f64> {
    mean(records.iter().map(|r| metric.value(r)))
}

fn metric_percent(records: &[&SchoolRecord], metric: Metric) -> f64 {
    metric_mean(records, metric).map_or(0.0, |m| m * 100.0)
}

pub fn overview_kpis(records: &[&SchoolRecord]) -> OverviewKpis {
    let sum = |f: fn(&SchoolRecord) -> u32| records.iter().map(|r| u64::from(f(r))).sum::<u64>();
    let toilets_boys = sum(|r| r.toilets_boys);
    let toilets_girls = sum(|r| r.toilets_girls);
    let toilet_gender_gap_pct = match toilets_boys.max(toilets_girls) {
        0 => 0.0,
        most => round_to(toilets_boys.abs_diff(toilets_girls) as f64 / most as f64 * 100.0, 1),
    };

    let avg_student_classroom = metric_mean(records, Metric::StudentClassroomRatio);
    let avg_student_teacher = metric_mean(records, Metric::StudentTeacherRatio);
    let avg_infrastructure = metric_mean(records, Metric::InfrastructureHealth);
    let avg_classroom_damage = metric_mean(records, Metric::ClassroomDamageRate);
    let avg_toilet_damage = metric_mean(records, Metric::ToiletDamageRate);

    OverviewKpis {
        total_schools: records.len(),
        total_students: sum(|r| r.students),
        total_classrooms: sum(|r| r.classrooms),
        total_teachers: sum(|r| r.teachers),
        toilets_boys,
        toilets_girls,
        avg_student_classroom,
        avg_student_teacher,
        avg_teacher_classroom: metric_mean(records, Metric::TeacherClassroomRatio),
        avg_infrastructure,
        avg_water_quality: metric_mean(records, Metric::WaterQuality),
        avg_classroom_damage,
        avg_toilet_damage,
        pct_electricity: metric_percent(records, Metric::ElectricityReliability),
        pct_fence: metric_percent(records, Metric::FenceAvailability),
        toilet_gender_gap_pct,
        student_classroom_band: upper_band(avg_student_classroom, 45.0),
        student_teacher_band: upper_band(avg_student_teacher, 35.0),
        infrastructure_band: match avg_infrastructure {
            Some(v) if v >= 0.7 => Band::Good,
            Some(_) => Band::Critical,
            None => Band::NoData,
        },
        classroom_damage_band: damage_band(avg_classroom_damage),
        toilet_damage_band: damage_band(avg_toilet_damage),
    }
}

/// Per-school maintenance risk on a 0..=10 scale.
pub fn risk_score(r: &SchoolRecord) -> u8 {
    let mut score = 0;
    if r.delayed_maintenance == Some(true) {
        score += 3;
    }
    if r.days_since_maintenance.is_some_and(|d| d > 365) {
        score += 2;
    }
    if r.capitation_grant_pct.is_some_and(|p| p < 15.0) {
        score += 2;
    }
    if r.funding_diversity.is_some_and(|d| d < 0.3) {
        score += 1;
    }
    if r.infrastructure_health.is_some_and(|i| i < 0.5) {
        score += 2;
    }
    score
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => RiskBand::Low,
            4..=6 => RiskBand::Medium,
            _ => RiskBand::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceKpis {
    pub total_schools: usize,
    pub pct_doing_maintenance: f64,
    pub delayed_count: usize,
    pub pct_delayed: f64,
    pub avg_days_since_maintenance: Option<f64>,
    pub avg_frequency_score: Option<f64>,
    pub avg_funding_diversity: Option<f64>,
    pub pct_funding_gap: f64,
    pub gap_index: f64,
    /// Estimated infrastructure health lost per year, percent, capped at 20.
    pub degradation_rate: f64,
    pub pct_high_risk: f64,
}

/// `0.4·delayed share + 0.3·days/365 + 0.3·(1 − diversity)`; missing means
/// contribute nothing.
fn gap_index(delayed_share: f64, avg_days: Option<f64>, avg_diversity: Option<f64>) -> f64 {
    let days = avg_days.map_or(0.0, |d| d / 365.0 * 0.3);
    let funding = avg_diversity.map_or(0.0, |d| (1.0 - d) * 0.3);
    round_to(delayed_share * 0.4 + days + funding, 3)
}

fn degradation_rate(avg_infra: Option<f64>, avg_days: Option<f64>) -> f64 {
    match (avg_infra, avg_days) {
        (Some(health), Some(days)) if days > 0.0 => {
            round_to((((1.0 - health) / (days / 365.0)) * 100.0).min(20.0), 2)
        }
        _ => 0.0,
    }
}

pub fn maintenance_kpis(records: &[&SchoolRecord]) -> MaintenanceKpis {
    let total = records.len();
    if total == 0 {
        return MaintenanceKpis {
            total_schools: 0,
            pct_doing_maintenance: 0.0,
            delayed_count: 0,
            pct_delayed: 0.0,
            avg_days_since_maintenance: None,
            avg_frequency_score: None,
            avg_funding_diversity: None,
            pct_funding_gap: 0.0,
            gap_index: 0.0,
            degradation_rate: 0.0,
            pct_high_risk: 0.0,
        };
    }

    let count = |pred: fn(&SchoolRecord) -> bool| records.iter().filter(|r| pred(r)).count();
    let doing = count(|r| r.maintenance_last_3y == Some(true));
    let delayed_count = count(|r| r.delayed_maintenance == Some(true));
    let funding_gap = count(|r| r.funding_gap == Some(true));
    let high_risk = count(|r| RiskBand::from_score(risk_score(r)) == RiskBand::High);

    let avg_days = metric_mean(records, Metric::DaysSinceMaintenance);
    let avg_diversity = metric_mean(records, Metric::FundingDiversity);
    let avg_infra = metric_mean(records, Metric::InfrastructureHealth);

    let kpis = MaintenanceKpis {
        total_schools: total,
        pct_doing_maintenance: round_to(percent(doing, total), 1),
        delayed_count,
        pct_delayed: round_to(percent(delayed_count, total), 1),
        avg_days_since_maintenance: avg_days,
        avg_frequency_score: metric_mean(records, Metric::MaintenanceFrequency),
        avg_funding_diversity: avg_diversity,
        pct_funding_gap: round_to(percent(funding_gap, total), 1),
        gap_index: gap_index(delayed_count as f64 / total as f64, avg_days, avg_diversity),
        degradation_rate: degradation_rate(avg_infra, avg_days),
        pct_high_risk: round_to(percent(high_risk, total), 1),
    };
    debug!(
        schools = total,
        delayed = delayed_count,
        gap_index = kpis.gap_index,
        "maintenance kpis"
    );
    kpis
}

pub const PCT_DOING_MAINTENANCE: &str = "Doing Maintenance %";
pub const PCT_DELAYED: &str = "Delayed %";
pub const AVG_DAYS_SINCE: &str = "Avg Days Since";
pub const GAP_INDEX: &str = "Gap Index";
pub const DEGRADATION_RATE: &str = "Degradation Rate";
pub const FREQUENCY_SCORE: &str = "Frequency Score";

impl MaintenanceKpis {
    /// The figures as a group row, so they can go through the ranking tools.
    pub fn to_row(&self, key: impl Into<String>) -> AggregateRow {
        AggregateRow {
            key: key.into(),
            parent: None,
            location_type: Default::default(),
            count: self.total_schools,
            fields: vec![
                (PCT_DOING_MAINTENANCE.to_string(), Some(self.pct_doing_maintenance)),
                (PCT_DELAYED.to_string(), Some(self.pct_delayed)),
                (AVG_DAYS_SINCE.to_string(), self.avg_days_since_maintenance),
                (GAP_INDEX.to_string(), Some(self.gap_index)),
                (DEGRADATION_RATE.to_string(), Some(self.degradation_rate)),
                (FREQUENCY_SCORE.to_string(), self.avg_frequency_score),
            ],
        }
    }

    /// Actions suggested by the current figures, most pressing first. Never
    /// empty.
    pub fn recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.pct_doing_maintenance < 80.0 {
            out.push(format!(
                "Only {:.1}% of schools conduct regular maintenance. Target: 90%+",
                self.pct_doing_maintenance
            ));
        }
        if self.pct_delayed > 30.0 {
            out.push(format!(
                "{:.1}% of schools have delayed maintenance. Prioritize backlog clearance.",
                self.pct_delayed
            ));
        }
        if self.gap_index > 0.6 {
            out.push(format!(
                "High Gap Index ({:.2}). Major gap between needs and reality. Urgent action required.",
                self.gap_index
            ));
        } else if self.gap_index > 0.3 {
            out.push(format!(
                "Moderate Gap Index ({:.2}). Some gap exists. Continuous improvement needed.",
                self.gap_index
            ));
        }
        if self.degradation_rate > 10.0 {
            out.push(format!(
                "High degradation rate ({:.1}%/year). Infrastructure deteriorating rapidly without maintenance.",
                self.degradation_rate
            ));
        } else if self.degradation_rate > 5.0 {
            out.push(format!(
                "Moderate degradation rate ({:.1}%/year). Regular maintenance needed to prevent acceleration.",
                self.degradation_rate
            ));
        }
        if let Some(days) = self.avg_days_since_maintenance.filter(|d| *d > 365.0) {
            out.push(format!(
                "Average {days:.0} days since last maintenance. Increase frequency."
            ));
        }
        if let Some(diversity) = self.avg_funding_diversity.filter(|d| *d < 0.3) {
            out.push(format!(
                "Low funding diversity ({diversity:.2}). Explore multiple funding sources."
            ));
        }
        if out.is_empty() {
            out.push(
                "Maintenance operations are performing well. Continue monitoring and best practices."
                    .to_string(),
            );
        }
        out
    }
}

/// Maintenance figures of two provinces side by side.
pub fn compare_provinces(
    records: &[SchoolRecord],
    left: &str,
    right: &str,
) -> Vec<MetricComparison> {
    let kpis_for = |province: &str| {
        let members: Vec<&SchoolRecord> =
            records.iter().filter(|r| r.province == province).collect();
        maintenance_kpis(&members).to_row(province)
    };
    ranking::compare_groups(
        &kpis_for(left),
        &kpis_for(right),
        &[
            (PCT_DOING_MAINTENANCE, Polarity::HigherIsBetter),
            (PCT_DELAYED, Polarity::LowerIsBetter),
            (AVG_DAYS_SINCE, Polarity::LowerIsBetter),
            (GAP_INDEX, Polarity::LowerIsBetter),
            (DEGRADATION_RATE, Polarity::LowerIsBetter),
            (FREQUENCY_SCORE, Polarity::HigherIsBetter),
        ],
    )
}

/// Composite 0..100 score of one school: safety compliance and utilities
/// reliability (both 0..100) at 30 % each, hygiene (0..1) and the share of
/// accessibility, lighting and ventilation flags at 20 % each.
///
/// The flag share is taken over the flags that were observed. `None` when
/// any component is missing entirely.
pub fn overall_safety_score(r: &SchoolRecord) -> Option<f64> {
    let safety = Metric::SafetyCompliance.value(r)?;
    let utilities = Metric::UtilitiesReliability.value(r)?;
    let hygiene = Metric::HygieneIndex.value(r)?;
    let access = mean(ACCESS_FLAGS.iter().map(|m| m.value(r)))?;
    Some(safety * 0.3 + utilities * 0.3 + hygiene * 100.0 * 0.2 + access * 100.0 * 0.2)
}

const ACCESS_FLAGS: [Metric; 3] = [
    Metric::DisabledAccess,
    Metric::AdequateLighting,
    Metric::AdequateVentilation,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyKpis {
    pub total_schools: usize,
    pub avg_safety_compliance: Option<f64>,
    pub avg_utilities_reliability: Option<f64>,
    pub avg_hygiene: Option<f64>,
    /// Accessibility, lighting and ventilation flags set, over flags observed.
    pub pct_accessibility: f64,
    pub pct_pta: f64,
    pub pct_water_available: f64,
    pub avg_overall_score: Option<f64>,
}

pub fn safety_kpis(records: &[&SchoolRecord]) -> SafetyKpis {
    let access = mean(
        records
            .iter()
            .flat_map(|r| ACCESS_FLAGS.iter().map(move |m| m.value(r))),
    );
    let kpis = SafetyKpis {
        total_schools: records.len(),
        avg_safety_compliance: metric_mean(records, Metric::SafetyCompliance)
            .map(|v| round_to(v, 1)),
        avg_utilities_reliability: metric_mean(records, Metric::UtilitiesReliability)
            .map(|v| round_to(v, 1)),
        avg_hygiene: metric_mean(records, Metric::HygieneIndex).map(|v| round_to(v, 2)),
        pct_accessibility: access.map_or(0.0, |a| round_to(a * 100.0, 1)),
        pct_pta: round_to(metric_percent(records, Metric::PtaPresent), 1),
        pct_water_available: round_to(metric_percent(records, Metric::WaterAvailable), 1),
        avg_overall_score: mean(records.iter().map(|r| overall_safety_score(r)))
            .map(|v| round_to(v, 1)),
    };
    debug!(
        schools = kpis.total_schools,
        overall = ?kpis.avg_overall_score,
        "safety kpis"
    );
    kpis
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CriticalIssue {
    Safety,
    NoWater,
    PoorElectricity,
    PoorHygiene,
    NoAccess,
    NoPta,
}

impl CriticalIssue {
    pub fn label(&self) -> &'static str {
        match self {
            CriticalIssue::Safety => "Safety",
            CriticalIssue::NoWater => "No Water",
            CriticalIssue::PoorElectricity => "Poor Electricity",
            CriticalIssue::PoorHygiene => "Poor Hygiene",
            CriticalIssue::NoAccess => "No Access",
            CriticalIssue::NoPta => "No PTA",
        }
    }
}

/// Inspection findings on one school. Unobserved items raise nothing.
pub fn critical_issues(r: &SchoolRecord) -> Vec<CriticalIssue> {
    let checks = [
        (
            r.safety_compliance.is_some_and(|s| s < 50.0),
            CriticalIssue::Safety,
        ),
        (r.water_available == Some(false), CriticalIssue::NoWater),
        (
            r.electricity_reliability.is_some_and(|e| e < 0.5),
            CriticalIssue::PoorElectricity,
        ),
        (
            r.hygiene_index.is_some_and(|h| h < 0.4),
            CriticalIssue::PoorHygiene,
        ),
        (r.disabled_access == Some(false), CriticalIssue::NoAccess),
        (r.pta_present == Some(false), CriticalIssue::NoPta),
    ];
    checks
        .into_iter()
        .filter_map(|(hit, issue)| hit.then_some(issue))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoolIssues<'a> {
    pub record: &'a SchoolRecord,
    pub issues: Vec<CriticalIssue>,
}

/// Schools with at least `min_issues` findings, most findings first; equal
/// counts keep input order.
pub fn schools_with_critical_issues<'a>(
    records: &[&'a SchoolRecord],
    min_issues: usize,
) -> Vec<SchoolIssues<'a>> {
    let mut flagged: Vec<SchoolIssues<'a>> = records
        .iter()
        .map(|r| SchoolIssues {
            record: r,
            issues: critical_issues(r),
        })
        .filter(|s| !s.issues.is_empty() && s.issues.len() >= min_issues)
        .collect();
    flagged.sort_by(|a, b| b.issues.len().cmp(&a.issues.len()));
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(name: &str) -> SchoolRecord {
        SchoolRecord {
            school_name: name.to_string(),
            province: "North".to_string(),
            ..SchoolRecord::default()
        }
    }

    #[test]
    fn overview_totals_and_bands() {
        let mut a = school("A");
        a.students = 500;
        a.classrooms = 10;
        a.teachers = 10;
        a.toilets_boys = 6;
        a.toilets_girls = 4;
        a.student_classroom_ratio = Some(50.0);
        a.infrastructure_health = Some(0.8);
        a.fence_available = Some(true);
        a.classroom_damage_rate = Some(0.2);
        let mut b = school("B");
        b.students = 300;
        b.classrooms = 10;
        b.teachers = 5;
        b.student_classroom_ratio = Some(30.0);
        b.fence_available = Some(false);

        let kpis = overview_kpis(&[&a, &b]);
        assert_eq!(kpis.total_schools, 2);
        assert_eq!(kpis.total_students, 800);
        assert_eq!(kpis.avg_student_classroom, Some(40.0));
        assert_eq!(kpis.avg_teacher_classroom, Some(0.75));
        assert_eq!(kpis.pct_fence, 50.0);
        assert_eq!(kpis.toilet_gender_gap_pct, 33.3);
        assert_eq!(kpis.student_classroom_band, Band::Good);
        assert_eq!(kpis.infrastructure_band, Band::Good);
        assert_eq!(kpis.classroom_damage_band, Band::Warning);
        assert_eq!(kpis.student_teacher_band, Band::NoData);
    }

    #[test]
    fn damage_bands_read_rates_as_fractions() {
        let mut r = school("A");
        r.classroom_damage_rate = Some(0.9);
        r.toilet_damage_rate = Some(0.1);
        let kpis = overview_kpis(&[&r]);
        assert_eq!(kpis.classroom_damage_band, Band::Critical);
        assert_eq!(kpis.toilet_damage_band, Band::Good);
        assert_eq!(damage_band(Some(0.15)), Band::Warning);
        assert_eq!(damage_band(None), Band::NoData);
    }

    #[test]
    fn overview_of_nothing_is_zeroed() {
        let kpis = overview_kpis(&[]);
        assert_eq!(kpis.total_schools, 0);
        assert_eq!(kpis.pct_electricity, 0.0);
        assert_eq!(kpis.toilet_gender_gap_pct, 0.0);
        assert_eq!(kpis.avg_infrastructure, None);
    }

    #[test]
    fn risk_score_adds_weighted_factors() {
        let mut r = school("A");
        assert_eq!(risk_score(&r), 0);
        r.delayed_maintenance = Some(true);
        r.days_since_maintenance = Some(400);
        r.capitation_grant_pct = Some(10.0);
        r.funding_diversity = Some(0.2);
        r.infrastructure_health = Some(0.4);
        assert_eq!(risk_score(&r), 10);
        assert_eq!(RiskBand::from_score(10), RiskBand::High);
        assert_eq!(RiskBand::from_score(3), RiskBand::Low);
        assert_eq!(RiskBand::from_score(4), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(7), RiskBand::High);
    }

    #[test]
    fn maintenance_indices() {
        let mut a = school("A");
        a.delayed_maintenance = Some(true);
        a.maintenance_last_3y = Some(true);
        a.days_since_maintenance = Some(365);
        a.funding_diversity = Some(0.5);
        a.infrastructure_health = Some(0.9);
        let mut b = school("B");
        b.delayed_maintenance = Some(false);
        b.maintenance_last_3y = Some(false);
        b.days_since_maintenance = Some(365);
        b.funding_diversity = Some(0.5);
        b.infrastructure_health = Some(0.9);

        let kpis = maintenance_kpis(&[&a, &b]);
        assert_eq!(kpis.delayed_count, 1);
        assert_eq!(kpis.pct_delayed, 50.0);
        assert_eq!(kpis.pct_doing_maintenance, 50.0);
        // 0.5·0.4 + 1·0.3 + 0.5·0.3
        assert_eq!(kpis.gap_index, 0.65);
        assert_eq!(kpis.degradation_rate, 10.0);
        let recs = kpis.recommendations();
        assert!(recs[0].starts_with("Only 50.0%"));
        assert!(recs.iter().any(|r| r.starts_with("High Gap Index")));
    }

    #[test]
    fn degradation_needs_elapsed_days() {
        assert_eq!(degradation_rate(Some(0.5), Some(0.0)), 0.0);
        assert_eq!(degradation_rate(Some(0.5), None), 0.0);
        assert_eq!(degradation_rate(Some(0.0), Some(30.0)), 20.0);
    }

    #[test]
    fn recommendations_are_never_empty() {
        let kpis = maintenance_kpis(&[]);
        assert_eq!(kpis.gap_index, 0.0);
        // 0 % doing maintenance still triggers the coverage warning.
        assert_eq!(kpis.recommendations().len(), 1);

        let mut healthy = school("A");
        healthy.maintenance_last_3y = Some(true);
        healthy.delayed_maintenance = Some(false);
        healthy.days_since_maintenance = Some(100);
        healthy.funding_diversity = Some(0.9);
        healthy.infrastructure_health = Some(0.99);
        let recs = maintenance_kpis(&[&healthy]).recommendations();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Maintenance operations are performing well"));
    }

    #[test]
    fn province_comparison_picks_winners() {
        let mut n = school("N");
        n.maintenance_last_3y = Some(true);
        n.delayed_maintenance = Some(false);
        let mut s = school("S");
        s.province = "South".to_string();
        s.maintenance_last_3y = Some(false);
        s.delayed_maintenance = Some(true);
        let data = vec![n, s];
        let result = compare_provinces(&data, "North", "South");
        assert_eq!(result[0].winner, ranking::Winner::Left);
        assert_eq!(result[1].winner, ranking::Winner::Left);
        assert_eq!(result[2].winner, ranking::Winner::Tie);
    }

    #[test]
    fn overall_safety_score_weights_components() {
        let mut r = school("A");
        r.safety_compliance = Some(80.0);
        r.utilities_reliability = Some(60.0);
        r.hygiene_index = Some(0.5);
        r.disabled_access = Some(true);
        r.adequate_lighting = Some(true);
        r.adequate_ventilation = Some(false);
        // 24 + 18 + 10 + 13.33
        let score = overall_safety_score(&r).expect("all components observed");
        assert!((score - 65.333).abs() < 0.01);

        r.adequate_ventilation = None;
        let score = overall_safety_score(&r).expect("two flags observed");
        assert!((score - 72.0).abs() < 1e-9);

        r.hygiene_index = None;
        assert_eq!(overall_safety_score(&r), None);
    }

    #[test]
    fn safety_kpis_skip_unobserved_values() {
        let mut a = school("A");
        a.safety_compliance = Some(70.0);
        a.utilities_reliability = Some(50.0);
        a.hygiene_index = Some(0.6);
        a.disabled_access = Some(true);
        a.adequate_lighting = Some(true);
        a.adequate_ventilation = Some(true);
        a.pta_present = Some(true);
        a.water_available = Some(false);
        let mut b = school("B");
        b.safety_compliance = Some(40.0);
        b.disabled_access = Some(false);
        b.pta_present = Some(false);

        let kpis = safety_kpis(&[&a, &b]);
        assert_eq!(kpis.total_schools, 2);
        assert_eq!(kpis.avg_safety_compliance, Some(55.0));
        assert_eq!(kpis.avg_utilities_reliability, Some(50.0));
        assert_eq!(kpis.avg_hygiene, Some(0.6));
        assert_eq!(kpis.pct_accessibility, 75.0);
        assert_eq!(kpis.pct_pta, 50.0);
        assert_eq!(kpis.pct_water_available, 0.0);
        // Only A can be scored: 21 + 15 + 12 + 20.
        assert_eq!(kpis.avg_overall_score, Some(68.0));

        let empty = safety_kpis(&[]);
        assert_eq!(empty.pct_accessibility, 0.0);
        assert_eq!(empty.avg_overall_score, None);
    }

    #[test]
    fn critical_issue_listing() {
        let mut a = school("A");
        a.safety_compliance = Some(40.0);
        a.water_available = Some(false);
        a.pta_present = Some(false);
        let mut b = school("B");
        b.hygiene_index = Some(0.3);
        let mut c = school("C");
        c.disabled_access = Some(false);
        c.electricity_reliability = Some(0.2);

        assert_eq!(
            critical_issues(&a),
            vec![CriticalIssue::Safety, CriticalIssue::NoWater, CriticalIssue::NoPta]
        );
        let listed = schools_with_critical_issues(&[&b, &c, &a], 2);
        let names: Vec<_> = listed.iter().map(|s| s.record.school_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
