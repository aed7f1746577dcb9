use scms_dashboard::aggregate::{self, FieldSpec, GroupKey, Metric, Reduction};
use scms_dashboard::classify::Reason;
use scms_dashboard::loader::load_from_reader;
use scms_dashboard::ranking::{gap, GapSeverity};
use scms_dashboard::{
    aggregate_and_rank, classify_schools, filter_records, FilterCriteria, Polarity, SchoolRecord,
    Status,
};
use std::collections::HashSet;

fn school(code: i64, sc: f64, st: f64, infra: f64) -> SchoolRecord {
    SchoolRecord {
        school_name: format!("school{code}"),
        school_code: code,
        province: "West".to_string(),
        district: "Rubavu".to_string(),
        sector: "Gisenyi".to_string(),
        student_classroom_ratio: Some(sc),
        student_teacher_ratio: Some(st),
        infrastructure_health: Some(infra),
        fence_available: Some(true),
        delayed_maintenance: Some(false),
        immediate_safety_concern: Some(false),
        ..SchoolRecord::default()
    }
}

fn all(records: &[SchoolRecord]) -> Vec<&SchoolRecord> {
    filter_records(records, &FilterCriteria::default())
}

#[test]
fn good_count_comes_from_distinct_schools() {
    let mut data: Vec<SchoolRecord> = (1..=10).map(|c| school(c, 30.0, 20.0, 0.8)).collect();
    data[0].student_classroom_ratio = Some(60.0);
    data[1].delayed_maintenance = Some(true);

    let report = classify_schools(&all(&data));
    assert_eq!(report.urgent_count, 1);
    assert_eq!(report.attention_count, 1);
    assert_eq!(report.good_count, 8);
    assert_eq!(report.good.len(), 8);

    let codes: Vec<i64> = [Status::Urgent, Status::Attention, Status::Good]
        .iter()
        .flat_map(|s| report.partition(*s).iter().map(|c| c.record.school_code))
        .collect();
    let distinct: HashSet<i64> = codes.iter().copied().collect();
    assert_eq!(codes.len(), 10);
    assert_eq!(distinct.len(), 10);
}

#[test]
fn urgent_excludes_attention_reasons() {
    let mut record = school(1, 55.0, 20.0, 0.8);
    record.delayed_maintenance = Some(true);
    let data = vec![record];
    let report = classify_schools(&all(&data));
    assert_eq!(report.urgent.len(), 1);
    assert!(report.attention.is_empty());
    let reasons = &report.urgent[0].classification.reasons;
    assert_eq!(reasons, &vec![Reason::CriticalStudentClassroom]);
}

#[test]
fn student_classroom_boundaries() {
    let data = vec![
        school(1, 45.0, 20.0, 0.8),
        school(2, 45.01, 20.0, 0.8),
        school(3, 50.0, 20.0, 0.8),
        school(4, 50.01, 20.0, 0.8),
    ];
    let report = classify_schools(&all(&data));
    let status_of = |code: i64| {
        [Status::Urgent, Status::Attention, Status::Good]
            .into_iter()
            .find(|s| {
                report
                    .partition(*s)
                    .iter()
                    .any(|c| c.record.school_code == code)
            })
    };
    assert_eq!(status_of(1), Some(Status::Good));
    assert_eq!(status_of(2), Some(Status::Attention));
    assert_eq!(status_of(3), Some(Status::Attention));
    assert_eq!(status_of(4), Some(Status::Urgent));
}

#[test]
fn district_mean_and_count() {
    let mut a = school(1, 40.0, 20.0, 0.8);
    a.district = "A".to_string();
    let mut b = school(2, 60.0, 20.0, 0.8);
    b.district = "A".to_string();
    let data = vec![a, b];
    let config = [FieldSpec::new(
        "sc",
        Metric::StudentClassroomRatio,
        Reduction::Mean,
    )];
    let ranked = aggregate_and_rank(
        &all(&data),
        GroupKey::District,
        &config,
        "sc",
        Polarity::LowerIsBetter,
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].item.key, "A");
    assert_eq!(ranked[0].item.count, 2);
    assert_eq!(ranked[0].item.get("sc"), Some(50.0));
    assert_eq!(ranked[0].rank, 1);
}

#[test]
fn equal_values_rank_in_group_order() {
    let mut data = Vec::new();
    for (code, (district, infra)) in [("D1", 0.9), ("D2", 0.5), ("D3", 0.9)]
        .into_iter()
        .enumerate()
    {
        let mut r = school(code as i64 + 1, 30.0, 20.0, infra);
        r.district = district.to_string();
        data.push(r);
    }
    let ranked = aggregate_and_rank(
        &all(&data),
        GroupKey::District,
        &aggregate::district_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    let ranks: Vec<(String, usize)> = ranked
        .iter()
        .map(|r| (r.item.key.clone(), r.rank))
        .collect();
    assert_eq!(
        ranks,
        vec![
            ("D1".to_string(), 1),
            ("D3".to_string(), 2),
            ("D2".to_string(), 3)
        ]
    );
}

#[test]
fn gap_sign_and_exact_boundary() {
    let g = gap(0.4, 0.7).expect("finite");
    assert!(g.gap < 0.0);
    assert!((g.gap_percent - (-42.857)).abs() < 0.01);
    assert_eq!(g.severity, GapSeverity::Severe);
    assert_eq!(GapSeverity::from_gap(-0.3), GapSeverity::Severe);
    assert_eq!(gap(0.35, 0.7).map(|g| g.severity), Some(GapSeverity::Critical));
}

#[test]
fn unknown_province_gives_empty_results() {
    let data: Vec<SchoolRecord> = (1..=3).map(|c| school(c, 30.0, 20.0, 0.8)).collect();
    let criteria = FilterCriteria::default().with_province("Nowhere");
    let subset = filter_records(&data, &criteria);
    assert!(subset.is_empty());

    let report = classify_schools(&subset);
    assert!(report.urgent.is_empty() && report.attention.is_empty() && report.good.is_empty());
    assert_eq!(report.good_count, 0);

    let ranked = aggregate_and_rank(
        &subset,
        GroupKey::Province,
        &aggregate::district_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    assert!(ranked.is_empty());
}

#[test]
fn five_school_walkthrough() {
    let data: Vec<SchoolRecord> = [20.0, 46.0, 52.0, 48.0, 30.0]
        .into_iter()
        .enumerate()
        .map(|(i, sc)| school(i as i64 + 1, sc, 20.0, 0.8))
        .collect();
    let report = classify_schools(&all(&data));
    let codes = |s: Status| -> Vec<i64> {
        report
            .partition(s)
            .iter()
            .map(|c| c.record.school_code)
            .collect()
    };
    assert_eq!(codes(Status::Urgent), vec![3]);
    assert_eq!(codes(Status::Attention), vec![2, 4]);
    assert_eq!(codes(Status::Good), vec![1, 5]);
    assert_eq!(report.good_count, 2);
}

#[test]
fn csv_export_through_the_whole_pipeline() {
    let csv = "\
school_name,school_code,name_of_the_province,name_of_the_district,name_of_the_sector,number_of_students,number_of_teachers,number_of_classrooms,kpi_a1_student_classroom_ratio,kpi_a2_student_teacher_ratio,index_1_infrastructure_health_index,kpi_c1_fence_availability,m5_delayed_maintenance
GS Kacyiru,110504,Kigali,Gasabo,Kacyiru,900,20,20,45,45,0.8,1,0
EP Muhoza,430207,North,Musanze,Muhoza,600,20,15,40,30,0.6,1,0
GS Rural,999999,North,Burera,,300,10,10,30,30,0.9,1,0
Broken,abc,North,Burera,Butaro,10,1,1,10,10,0.9,1,0
";
    let (dataset, load) = load_from_reader(csv.as_bytes()).expect("readable csv");
    assert_eq!(load.loaded_rows, 3);
    assert_eq!(load.parse_errors, 1);

    let criteria = FilterCriteria::from_selection(None, Some("North"), None, None, &[]);
    let subset = filter_records(&dataset, &criteria);
    assert_eq!(subset.len(), 2);
    assert_eq!(subset[1].sector, "Unknown");

    let report = classify_schools(&subset);
    assert_eq!(report.attention_count, 1);
    assert_eq!(report.good_count, 1);

    let ranked = aggregate_and_rank(
        &subset,
        GroupKey::District,
        &aggregate::district_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    let order: Vec<&str> = ranked.iter().map(|r| r.item.key.as_str()).collect();
    assert_eq!(order, vec!["Burera", "Musanze"]);
}

#[test]
fn sector_ranking_keeps_homonymous_sectors_apart() {
    let mut kicukiro = school(1, 30.0, 20.0, 0.9);
    kicukiro.district = "Kicukiro".to_string();
    kicukiro.sector = "Kigarama".to_string();
    let mut kirehe = school(2, 30.0, 20.0, 0.3);
    kirehe.district = "Kirehe".to_string();
    kirehe.sector = "Kigarama".to_string();
    let data = vec![kicukiro, kirehe];

    let ranked = aggregate_and_rank(
        &all(&data),
        GroupKey::Sector,
        &aggregate::sector_metric_config(),
        aggregate::INFRA_INDEX,
        Polarity::HigherIsBetter,
    );
    let rows: Vec<(usize, Option<&str>, usize)> = ranked
        .iter()
        .map(|r| (r.rank, r.item.parent.as_deref(), r.item.count))
        .collect();
    assert_eq!(rows, vec![(1, Some("Kicukiro"), 1), (2, Some("Kirehe"), 1)]);
}
