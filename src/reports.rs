use crate::aggregate::{self, AggregateRow, GroupKey};
use crate::classify::{AlertReport, ClassifiedSchool};
use crate::filter::FilterCriteria;
use crate::kpi::{self, MaintenanceKpis, OverviewKpis, RiskBand, SafetyKpis};
use crate::ranking::{GroupGap, Ranked};
use crate::types::{AlertRow, GapRow, GroupRankingRow, RiskRow, SchoolRecord};
use crate::util::{format_number, format_opt};
use chrono::NaiveDate;
use serde::Serialize;

fn alert_row(entry: &ClassifiedSchool<'_>) -> AlertRow {
    let r = entry.record;
    AlertRow {
        school: r.school_name.clone(),
        location: r.location_type.label().to_string(),
        province: r.province.clone(),
        district: r.district.clone(),
        status: entry.classification.status.label().to_string(),
        student_classroom: format_opt(r.student_classroom_ratio, 1),
        student_teacher: format_opt(r.student_teacher_ratio, 1),
        infra: format_opt(r.infrastructure_health, 2),
        reasons: entry.classification.reason_tags(),
    }
}

/// Urgent first, then attention, then good; input order within each.
pub fn alert_rows(report: &AlertReport<'_>) -> Vec<AlertRow> {
    report
        .urgent
        .iter()
        .chain(&report.attention)
        .chain(&report.good)
        .map(alert_row)
        .collect()
}

pub fn group_ranking_rows(
    ranked: &[Ranked<AggregateRow>],
    key: GroupKey,
    ranked_by: &str,
) -> Vec<GroupRankingRow> {
    ranked
        .iter()
        .map(|r| {
            let row = &r.item;
            GroupRankingRow {
                rank: r.rank,
                group: row.key.clone(),
                parent: row.parent.clone().unwrap_or_default(),
                location: match key {
                    GroupKey::LocationType => String::new(),
                    _ => row.location_type.label().to_string(),
                },
                schools: row.count,
                students: format_opt(row.get(aggregate::STUDENTS), 0),
                student_classroom: format_opt(row.get(aggregate::SC_RATIO), 1),
                student_teacher: format_opt(row.get(aggregate::ST_RATIO), 1),
                infra: format_opt(row.get(aggregate::INFRA_INDEX), 2),
                ranked_by: ranked_by.to_string(),
                value: format_opt(r.value, 2),
            }
        })
        .collect()
}

pub fn gap_rows(gaps: &[GroupGap<'_>]) -> Vec<GapRow> {
    gaps.iter()
        .map(|g| GapRow {
            group: g.row.key.clone(),
            current: format_number(g.gap.value, 2),
            target: format_number(g.gap.target, 2),
            gap: format_number(g.gap.gap, 2),
            gap_percent: format_number(g.gap.gap_percent, 1),
            severity: g.gap.severity.label().to_string(),
            schools: g.row.count,
        })
        .collect()
}

/// Schools scored for maintenance risk, highest first. Ties keep input order.
pub fn risk_rows(records: &[&SchoolRecord]) -> Vec<RiskRow> {
    let mut scored: Vec<(u8, &SchoolRecord)> =
        records.iter().map(|r| (kpi::risk_score(r), *r)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .map(|(score, r)| RiskRow {
            school: r.school_name.clone(),
            province: r.province.clone(),
            risk_score: score,
            band: RiskBand::from_score(score).label().to_string(),
            critical_issues: kpi::critical_issues(r)
                .iter()
                .map(|i| i.label())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertCounts {
    pub total: usize,
    pub urgent: usize,
    pub attention: usize,
    pub good: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub generated: NaiveDate,
    pub selection: String,
    pub alerts: AlertCounts,
    pub overview: OverviewKpis,
    pub maintenance: MaintenanceKpis,
    pub safety: SafetyKpis,
    pub recommendations: Vec<String>,
    pub schools_with_critical_issues: usize,
}

pub fn generate_summary(
    subset: &[&SchoolRecord],
    criteria: &FilterCriteria,
    alerts: &AlertReport<'_>,
    generated: NaiveDate,
) -> DashboardSummary {
    let maintenance = kpi::maintenance_kpis(subset);
    DashboardSummary {
        generated,
        selection: criteria.describe(),
        alerts: AlertCounts {
            total: alerts.total_count,
            urgent: alerts.urgent_count,
            attention: alerts.attention_count,
            good: alerts.good_count,
        },
        overview: kpi::overview_kpis(subset),
        recommendations: maintenance.recommendations(),
        maintenance,
        safety: kpi::safety_kpis(subset),
        schools_with_critical_issues: kpi::schools_with_critical_issues(subset, 2).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{calculate_alerts, ClassificationRules};
    use crate::ranking::{group_gaps, rank_groups, Polarity};

    fn school(name: &str, code: i64, district: &str, infra: f64) -> SchoolRecord {
        SchoolRecord {
            school_name: name.to_string(),
            school_code: code,
            province: "East".to_string(),
            district: district.to_string(),
            students: 400,
            student_classroom_ratio: Some(30.0),
            student_teacher_ratio: Some(25.0),
            infrastructure_health: Some(infra),
            fence_available: Some(true),
            ..SchoolRecord::default()
        }
    }

    #[test]
    fn alert_rows_list_urgent_first() {
        let data = vec![school("Good", 1, "A", 0.9), school("Bad", 2, "A", 0.3)];
        let report = calculate_alerts(&data, &ClassificationRules::default());
        let rows = alert_rows(&report);
        assert_eq!(rows[0].school, "Bad");
        assert_eq!(rows[0].status, "Urgent");
        assert_eq!(rows[0].reasons, "Infra<0.5");
        assert_eq!(rows[1].infra, "0.90");
    }

    #[test]
    fn ranking_and_gap_rows_render_values() {
        let data = vec![
            school("a", 1, "Kayonza", 0.6),
            school("b", 2, "Kayonza", 0.8),
            school("c", 3, "Nyagatare", 0.9),
        ];
        let rows = aggregate::aggregate(
            &data,
            GroupKey::District,
            &aggregate::district_metric_config(),
        );
        let ranked = rank_groups(rows.clone(), aggregate::INFRA_INDEX, Polarity::HigherIsBetter);
        let table = group_ranking_rows(&ranked, GroupKey::District, aggregate::INFRA_INDEX);
        assert_eq!(table[0].group, "Nyagatare");
        assert_eq!(table[1].rank, 2);
        assert_eq!(table[1].students, "800");
        assert_eq!(table[1].parent, "East");

        let gaps = group_gaps(&rows, aggregate::INFRA_INDEX, 0.7);
        let table = gap_rows(&gaps);
        assert_eq!(table[0].group, "Kayonza");
        assert_eq!(table[0].severity, "Good");
        assert_eq!(table[1].gap, "0.20");
        assert_eq!(table[1].severity, "Excellent");
    }

    #[test]
    fn risk_rows_sort_by_score() {
        let low = school("Low", 1, "A", 0.9);
        let mut high = school("High", 2, "A", 0.3);
        high.delayed_maintenance = Some(true);
        high.pta_present = Some(false);
        let rows = risk_rows(&[&low, &high]);
        assert_eq!(rows[0].school, "High");
        assert_eq!(rows[0].risk_score, 5);
        assert_eq!(rows[0].band, "Medium Risk");
        assert_eq!(rows[0].critical_issues, "No PTA");
        assert_eq!(rows[1].band, "Low Risk");
    }

    #[test]
    fn summary_carries_counts_and_date() {
        let data = vec![school("a", 1, "A", 0.9), school("b", 2, "A", 0.4)];
        let subset: Vec<&SchoolRecord> = data.iter().collect();
        let alerts = calculate_alerts(subset.iter().copied(), &ClassificationRules::default());
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
        let summary = generate_summary(&subset, &FilterCriteria::default(), &alerts, date);
        assert_eq!(summary.alerts.urgent, 1);
        assert_eq!(summary.alerts.good, 1);
        assert_eq!(summary.selection, "All Data");
        let json = serde_json::to_value(&summary).expect("serializable");
        assert_eq!(json["generated"], "2025-03-01");
        assert_eq!(json["overview"]["total_students"], 800);
        assert_eq!(json["safety"]["total_schools"], 2);
        assert!(json["safety"]["avg_overall_score"].is_null());
    }
}
