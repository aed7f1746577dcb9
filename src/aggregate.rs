//! Group-by over the location hierarchy.
//!
//! Fields are described with [`FieldSpec`] (output name, source metric,
//! reduction) so each dashboard brings its own column list to the same
//! engine. Ratio metrics are per-school values: a group's S/C ratio is the
//! mean of its schools' ratios, not total students over total classrooms.

use crate::types::{LocationType, SchoolRecord};
use crate::util::{mean, safe_ratio};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A numeric view of one record column. Flags read as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    Students,
    Teachers,
    Classrooms,
    ToiletsBoys,
    ToiletsGirls,
    SchoolAge,
    StudentClassroomRatio,
    StudentTeacherRatio,
    TeacherClassroomRatio,
    StudentsPerToilet,
    InfrastructureHealth,
    ElectricityReliability,
    WaterQuality,
    ClassroomDamageRate,
    ToiletDamageRate,
    FenceAvailability,
    ClimateVulnerability,
    ClimateMitigation,
    MaintenanceLast3y,
    DaysSinceMaintenance,
    DelayedMaintenance,
    CapitationGrantPct,
    FundingDiversity,
    FundingGap,
    MaintenanceFrequency,
    SafetyCompliance,
    ImmediateSafetyConcern,
    UtilitiesReliability,
    WaterAvailable,
    HygieneIndex,
    DisabledAccess,
    AdequateLighting,
    AdequateVentilation,
    PtaPresent,
}

fn flag(v: Option<bool>) -> Option<f64> {
    v.map(|b| if b { 1.0 } else { 0.0 })
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        use Metric::*;
        &[
            Students,
            Teachers,
            Classrooms,
            ToiletsBoys,
            ToiletsGirls,
            SchoolAge,
            StudentClassroomRatio,
            StudentTeacherRatio,
            TeacherClassroomRatio,
            StudentsPerToilet,
            InfrastructureHealth,
            ElectricityReliability,
            WaterQuality,
            ClassroomDamageRate,
            ToiletDamageRate,
            FenceAvailability,
            ClimateVulnerability,
            ClimateMitigation,
            MaintenanceLast3y,
            DaysSinceMaintenance,
            DelayedMaintenance,
            CapitationGrantPct,
            FundingDiversity,
            FundingGap,
            MaintenanceFrequency,
            SafetyCompliance,
            ImmediateSafetyConcern,
            UtilitiesReliability,
            WaterAvailable,
            HygieneIndex,
            DisabledAccess,
            AdequateLighting,
            AdequateVentilation,
            PtaPresent,
        ]
    }

    /// Per-record value; `None` for missing cells and zero denominators.
    pub fn value(&self, r: &SchoolRecord) -> Option<f64> {
        match self {
            Metric::Students => Some(f64::from(r.students)),
            Metric::Teachers => Some(f64::from(r.teachers)),
            Metric::Classrooms => Some(f64::from(r.classrooms)),
            Metric::ToiletsBoys => Some(f64::from(r.toilets_boys)),
            Metric::ToiletsGirls => Some(f64::from(r.toilets_girls)),
            Metric::SchoolAge => r.school_age,
            Metric::StudentClassroomRatio => r.student_classroom_ratio,
            Metric::StudentTeacherRatio => r.student_teacher_ratio,
            Metric::TeacherClassroomRatio => {
                safe_ratio(f64::from(r.teachers), f64::from(r.classrooms))
            }
            Metric::StudentsPerToilet => safe_ratio(
                f64::from(r.students),
                f64::from(r.toilets_boys) + f64::from(r.toilets_girls),
            ),
            Metric::InfrastructureHealth => r.infrastructure_health,
            Metric::ElectricityReliability => r.electricity_reliability,
            Metric::WaterQuality => r.water_quality,
            Metric::ClassroomDamageRate => r.classroom_damage_rate,
            Metric::ToiletDamageRate => r.toilet_damage_rate,
            Metric::FenceAvailability => flag(r.fence_available),
            Metric::ClimateVulnerability => r.climate_vulnerability,
            Metric::ClimateMitigation => r.climate_mitigation,
            Metric::MaintenanceLast3y => flag(r.maintenance_last_3y),
            Metric::DaysSinceMaintenance => r.days_since_maintenance.map(f64::from),
            Metric::DelayedMaintenance => flag(r.delayed_maintenance),
            Metric::CapitationGrantPct => r.capitation_grant_pct,
            Metric::FundingDiversity => r.funding_diversity,
            Metric::FundingGap => flag(r.funding_gap),
            Metric::MaintenanceFrequency => r.maintenance_frequency,
            Metric::SafetyCompliance => r.safety_compliance,
            Metric::ImmediateSafetyConcern => flag(r.immediate_safety_concern),
            Metric::UtilitiesReliability => r.utilities_reliability,
            Metric::WaterAvailable => flag(r.water_available),
            Metric::HygieneIndex => r.hygiene_index,
            Metric::DisabledAccess => flag(r.disabled_access),
            Metric::AdequateLighting => flag(r.adequate_lighting),
            Metric::AdequateVentilation => flag(r.adequate_ventilation),
            Metric::PtaPresent => flag(r.pta_present),
        }
        .filter(|v| v.is_finite())
    }

    /// Stable name used on the command line and in exported columns.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Students => "students",
            Metric::Teachers => "teachers",
            Metric::Classrooms => "classrooms",
            Metric::ToiletsBoys => "toilets_boys",
            Metric::ToiletsGirls => "toilets_girls",
            Metric::SchoolAge => "school_age",
            Metric::StudentClassroomRatio => "student_classroom_ratio",
            Metric::StudentTeacherRatio => "student_teacher_ratio",
            Metric::TeacherClassroomRatio => "teacher_classroom_ratio",
            Metric::StudentsPerToilet => "students_per_toilet",
            Metric::InfrastructureHealth => "infrastructure_health",
            Metric::ElectricityReliability => "electricity_reliability",
            Metric::WaterQuality => "water_quality",
            Metric::ClassroomDamageRate => "classroom_damage_rate",
            Metric::ToiletDamageRate => "toilet_damage_rate",
            Metric::FenceAvailability => "fence_availability",
            Metric::ClimateVulnerability => "climate_vulnerability",
            Metric::ClimateMitigation => "climate_mitigation",
            Metric::MaintenanceLast3y => "maintenance_last_3y",
            Metric::DaysSinceMaintenance => "days_since_maintenance",
            Metric::DelayedMaintenance => "delayed_maintenance",
            Metric::CapitationGrantPct => "capitation_grant_pct",
            Metric::FundingDiversity => "funding_diversity",
            Metric::FundingGap => "funding_gap",
            Metric::MaintenanceFrequency => "maintenance_frequency",
            Metric::SafetyCompliance => "safety_compliance",
            Metric::ImmediateSafetyConcern => "immediate_safety_concern",
            Metric::UtilitiesReliability => "utilities_reliability",
            Metric::WaterAvailable => "water_available",
            Metric::HygieneIndex => "hygiene_index",
            Metric::DisabledAccess => "disabled_access",
            Metric::AdequateLighting => "adequate_lighting",
            Metric::AdequateVentilation => "adequate_ventilation",
            Metric::PtaPresent => "pta_present",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        let name = name.trim();
        Metric::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reduction {
    /// Mean over members with a value.
    Mean,
    Sum,
    /// Members with a value.
    Count,
    /// Mean × 100, for 0/1 flags shown as a share of schools.
    Percent,
}

impl Reduction {
    fn apply(&self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            Reduction::Mean => mean(values.iter().copied()),
            Reduction::Sum => Some(values.iter().flatten().sum()),
            Reduction::Count => Some(values.iter().flatten().count() as f64),
            Reduction::Percent => mean(values.iter().copied()).map(|m| m * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub source: Metric,
    pub reduction: Reduction,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, source: Metric, reduction: Reduction) -> Self {
        Self {
            name: name.into(),
            source,
            reduction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKey {
    Province,
    District,
    Sector,
    LocationType,
}

impl GroupKey {
    pub fn key_of(&self, r: &SchoolRecord) -> String {
        match self {
            GroupKey::Province => r.province.clone(),
            GroupKey::District => r.district.clone(),
            GroupKey::Sector => r.sector.clone(),
            GroupKey::LocationType => r.location_type.label().to_string(),
        }
    }

    /// The enclosing place. Part of the group identity, so a sector name that
    /// recurs in two districts stays two groups.
    pub fn parent_of(&self, r: &SchoolRecord) -> Option<String> {
        match self {
            GroupKey::District => Some(r.province.clone()),
            GroupKey::Sector => Some(r.district.clone()),
            GroupKey::Province | GroupKey::LocationType => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupKey::Province => "Province",
            GroupKey::District => "District",
            GroupKey::Sector => "Sector",
            GroupKey::LocationType => "Location",
        }
    }

    pub fn from_name(name: &str) -> Option<GroupKey> {
        match name.trim().to_ascii_lowercase().as_str() {
            "province" => Some(GroupKey::Province),
            "district" => Some(GroupKey::District),
            "sector" => Some(GroupKey::Sector),
            "location" | "location_type" => Some(GroupKey::LocationType),
            _ => None,
        }
    }

    /// The heatmap grouping of the overview dashboard: by location type when
    /// no location is chosen, otherwise one level below the deepest chosen
    /// place.
    pub fn drill_down(
        location_selected: bool,
        province_selected: bool,
        district_selected: bool,
    ) -> GroupKey {
        if !location_selected {
            GroupKey::LocationType
        } else if province_selected && district_selected {
            GroupKey::Sector
        } else if province_selected {
            GroupKey::District
        } else {
            GroupKey::Province
        }
    }
}

/// One row per distinct key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    /// Province for districts, district for sectors.
    pub parent: Option<String>,
    pub location_type: LocationType,
    pub count: usize,
    pub fields: Vec<(String, Option<f64>)>,
}

impl AggregateRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }
}

/// Most common location type among the members; ties go to the earlier type
/// in [`LocationType::ordered`].
fn dominant_location(members: &[&SchoolRecord]) -> LocationType {
    let mut best = (LocationType::default(), 0usize);
    for loc in LocationType::ordered() {
        let n = members.iter().filter(|r| r.location_type == loc).count();
        if n > best.1 {
            best = (loc, n);
        }
    }
    best.0
}

/// Group `records` by `key` (within its parent place) and reduce every
/// configured field. Rows come out ordered by key, then parent. Empty input
/// gives no rows.
pub fn aggregate<'a, I>(records: I, key: GroupKey, fields: &[FieldSpec]) -> Vec<AggregateRow>
where
    I: IntoIterator<Item = &'a SchoolRecord>,
{
    // (name, parent) so same-named sectors in different districts stay apart.
    let mut groups: BTreeMap<(String, Option<String>), Vec<&'a SchoolRecord>> = BTreeMap::new();
    for r in records {
        groups
            .entry((key.key_of(r), key.parent_of(r)))
            .or_default()
            .push(r);
    }

    let rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|((group, parent), members)| {
            let fields = fields
                .iter()
                .map(|field| {
                    let values: Vec<Option<f64>> =
                        members.iter().map(|r| field.source.value(r)).collect();
                    (field.name.clone(), field.reduction.apply(&values))
                })
                .collect();
            AggregateRow {
                key: group,
                parent,
                location_type: dominant_location(&members),
                count: members.len(),
                fields,
            }
        })
        .collect();
    debug!(key = key.label(), groups = rows.len(), "aggregated");
    rows
}

pub const SCHOOLS: &str = "Schools";
pub const STUDENTS: &str = "Students";
pub const TEACHERS: &str = "Teachers";
pub const CLASSROOMS: &str = "Classrooms";
pub const SC_RATIO: &str = "S/C Ratio";
pub const ST_RATIO: &str = "S/T Ratio";
pub const TC_RATIO: &str = "T/C Ratio";
pub const INFRA_INDEX: &str = "Infra Index";
pub const ELECTRICITY_PCT: &str = "Electricity %";
pub const WATER_SCORE: &str = "Water Score";
pub const CLASSROOM_DAMAGE: &str = "Classroom Damage";
pub const FENCE_PCT: &str = "Fence %";
pub const DELAYED_MAINTENANCE: &str = "Delayed Maintenance";

/// Columns of the district ranking table.
pub fn district_metric_config() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(STUDENTS, Metric::Students, Reduction::Sum),
        FieldSpec::new(TEACHERS, Metric::Teachers, Reduction::Sum),
        FieldSpec::new(CLASSROOMS, Metric::Classrooms, Reduction::Sum),
        FieldSpec::new(SC_RATIO, Metric::StudentClassroomRatio, Reduction::Mean),
        FieldSpec::new(ST_RATIO, Metric::StudentTeacherRatio, Reduction::Mean),
        FieldSpec::new(TC_RATIO, Metric::TeacherClassroomRatio, Reduction::Mean),
        FieldSpec::new(INFRA_INDEX, Metric::InfrastructureHealth, Reduction::Mean),
        FieldSpec::new(
            ELECTRICITY_PCT,
            Metric::ElectricityReliability,
            Reduction::Percent,
        ),
        FieldSpec::new(WATER_SCORE, Metric::WaterQuality, Reduction::Mean),
        FieldSpec::new(
            CLASSROOM_DAMAGE,
            Metric::ClassroomDamageRate,
            Reduction::Mean,
        ),
        FieldSpec::new(FENCE_PCT, Metric::FenceAvailability, Reduction::Percent),
        FieldSpec::new(
            DELAYED_MAINTENANCE,
            Metric::DelayedMaintenance,
            Reduction::Sum,
        ),
    ]
}

/// Columns of the sector drill-down table.
pub fn sector_metric_config() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(STUDENTS, Metric::Students, Reduction::Sum),
        FieldSpec::new(TEACHERS, Metric::Teachers, Reduction::Sum),
        FieldSpec::new(CLASSROOMS, Metric::Classrooms, Reduction::Sum),
        FieldSpec::new(SC_RATIO, Metric::StudentClassroomRatio, Reduction::Mean),
        FieldSpec::new(ST_RATIO, Metric::StudentTeacherRatio, Reduction::Mean),
        FieldSpec::new(INFRA_INDEX, Metric::InfrastructureHealth, Reduction::Mean),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(district: &str, sc: Option<f64>, teachers: u32, classrooms: u32) -> SchoolRecord {
        SchoolRecord {
            school_name: format!("School in {district}"),
            province: "South".to_string(),
            district: district.to_string(),
            student_classroom_ratio: sc,
            teachers,
            classrooms,
            students: 100,
            ..SchoolRecord::default()
        }
    }

    #[test]
    fn mean_ignores_missing_values() {
        let data = vec![
            school("A", Some(40.0), 1, 1),
            school("A", None, 1, 1),
            school("A", Some(60.0), 1, 1),
        ];
        let rows = aggregate(&data, GroupKey::District, &district_metric_config());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].get(SC_RATIO), Some(50.0));
        assert_eq!(rows[0].get(STUDENTS), Some(300.0));
        assert_eq!(rows[0].parent.as_deref(), Some("South"));
    }

    #[test]
    fn teacher_classroom_ratio_is_mean_of_ratios() {
        // Ratio of means would be 11 / 11 = 1.0.
        let data = vec![school("A", None, 10, 1), school("A", None, 1, 10)];
        let fields = [FieldSpec::new(
            TC_RATIO,
            Metric::TeacherClassroomRatio,
            Reduction::Mean,
        )];
        let rows = aggregate(&data, GroupKey::District, &fields);
        let value = rows[0].get(TC_RATIO).expect("both schools have classrooms");
        assert!((value - 5.05).abs() < 1e-9);
    }

    #[test]
    fn zero_classrooms_are_skipped_not_infinite() {
        let data = vec![school("A", None, 4, 0), school("A", None, 4, 2)];
        let fields = [FieldSpec::new(
            TC_RATIO,
            Metric::TeacherClassroomRatio,
            Reduction::Mean,
        )];
        let rows = aggregate(&data, GroupKey::District, &fields);
        assert_eq!(rows[0].get(TC_RATIO), Some(2.0));
    }

    #[test]
    fn groups_are_unique_and_ordered_by_key() {
        let data = vec![
            school("B", Some(30.0), 1, 1),
            school("A", Some(30.0), 1, 1),
            school("B", Some(50.0), 1, 1),
        ];
        let rows = aggregate(&data, GroupKey::District, &district_metric_config());
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(rows[1].count, 2);
    }

    #[test]
    fn empty_input_gives_no_rows() {
        let data: Vec<SchoolRecord> = Vec::new();
        assert!(aggregate(&data, GroupKey::Province, &district_metric_config()).is_empty());
    }

    #[test]
    fn percent_and_count_reductions() {
        let mut a = school("A", Some(30.0), 1, 1);
        a.fence_available = Some(true);
        let mut b = school("A", None, 1, 1);
        b.fence_available = Some(false);
        let data = vec![a, b];
        let fields = [
            FieldSpec::new(FENCE_PCT, Metric::FenceAvailability, Reduction::Percent),
            FieldSpec::new("with S/C", Metric::StudentClassroomRatio, Reduction::Count),
        ];
        let rows = aggregate(&data, GroupKey::District, &fields);
        assert_eq!(rows[0].get(FENCE_PCT), Some(50.0));
        assert_eq!(rows[0].get("with S/C"), Some(1.0));
    }

    #[test]
    fn same_sector_name_in_two_districts_stays_apart() {
        let mut kicukiro = school("Kicukiro", None, 1, 1);
        kicukiro.province = "Kigali".to_string();
        kicukiro.sector = "Kigarama".to_string();
        kicukiro.infrastructure_health = Some(0.9);
        let mut kirehe = school("Kirehe", None, 1, 1);
        kirehe.province = "East".to_string();
        kirehe.sector = "Kigarama".to_string();
        kirehe.infrastructure_health = Some(0.3);
        let data = vec![kirehe, kicukiro];

        let rows = aggregate(&data, GroupKey::Sector, &sector_metric_config());
        let seen: Vec<_> = rows
            .iter()
            .map(|r| (r.key.as_str(), r.parent.as_deref(), r.count, r.get(INFRA_INDEX)))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("Kigarama", Some("Kicukiro"), 1, Some(0.9)),
                ("Kigarama", Some("Kirehe"), 1, Some(0.3)),
            ]
        );
    }

    #[test]
    fn location_label_follows_the_majority() {
        let mut a = school("A", None, 1, 1);
        a.location_type = LocationType::KigaliCity;
        let b = school("A", None, 1, 1);
        let c = school("A", None, 1, 1);
        let data = vec![a, b, c];
        let rows = aggregate(&data, GroupKey::District, &[]);
        assert_eq!(rows[0].location_type, LocationType::RuralDistricts);
    }

    #[test]
    fn drill_down_follows_selection_depth() {
        assert_eq!(GroupKey::drill_down(false, true, true), GroupKey::LocationType);
        assert_eq!(GroupKey::drill_down(true, false, false), GroupKey::Province);
        assert_eq!(GroupKey::drill_down(true, true, false), GroupKey::District);
        assert_eq!(GroupKey::drill_down(true, true, true), GroupKey::Sector);
    }

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::all() {
            assert_eq!(Metric::from_name(metric.name()), Some(*metric));
        }
    }
}
