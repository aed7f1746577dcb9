use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tabled::Tabled;

/// One row of the assessment sheet as exported to CSV. Every column is read
/// as optional text and parsed later so a single malformed cell does not
/// reject the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub school_name: Option<String>,
    pub school_code: Option<String>,
    #[serde(rename = "name_of_the_province")]
    pub province: Option<String>,
    #[serde(rename = "name_of_the_district")]
    pub district: Option<String>,
    #[serde(rename = "name_of_the_sector")]
    pub sector: Option<String>,
    #[serde(rename = "number_of_students")]
    pub students: Option<String>,
    #[serde(rename = "number_of_teachers")]
    pub teachers: Option<String>,
    #[serde(rename = "number_of_classrooms")]
    pub classrooms: Option<String>,
    #[serde(rename = "toilets_boys_total")]
    pub toilets_boys: Option<String>,
    #[serde(rename = "toilets_girls_total")]
    pub toilets_girls: Option<String>,
    #[serde(rename = "kpi_b3_school_age")]
    pub school_age: Option<String>,
    #[serde(rename = "kpi_a1_student_classroom_ratio")]
    pub student_classroom_ratio: Option<String>,
    #[serde(rename = "kpi_a2_student_teacher_ratio")]
    pub student_teacher_ratio: Option<String>,
    #[serde(rename = "index_1_infrastructure_health_index")]
    pub infrastructure_health: Option<String>,
    #[serde(rename = "kpi_d2_electricity_reliability")]
    pub electricity_reliability: Option<String>,
    #[serde(rename = "kpi_d1_water_quality_score")]
    pub water_quality: Option<String>,
    #[serde(rename = "kpi_b1_classroom_damage_rate")]
    pub classroom_damage_rate: Option<String>,
    #[serde(rename = "kpi_b2_toilet_damage_rate")]
    pub toilet_damage_rate: Option<String>,
    #[serde(rename = "kpi_c1_fence_availability")]
    pub fence_availability: Option<String>,
    #[serde(rename = "kpi_e1_climate_vulnerability_index")]
    pub climate_vulnerability: Option<String>,
    #[serde(rename = "kpi_e2_climate_mitigation_coverage")]
    pub climate_mitigation: Option<String>,
    #[serde(rename = "m1_maintenance_activity_last_3y")]
    pub maintenance_last_3y: Option<String>,
    #[serde(rename = "m2_days_since_last_maintenance")]
    pub days_since_maintenance: Option<String>,
    #[serde(rename = "m3_capitation_grant_pct")]
    pub capitation_grant_pct: Option<String>,
    #[serde(rename = "m4_routine_maintenance_frequency_score")]
    pub maintenance_frequency: Option<String>,
    #[serde(rename = "m5_delayed_maintenance")]
    pub delayed_maintenance: Option<String>,
    #[serde(rename = "m6_funding_source_diversity")]
    pub funding_diversity: Option<String>,
    #[serde(rename = "m8_funding_gap")]
    pub funding_gap: Option<String>,
    #[serde(rename = "s2_immediate_safety_concerns")]
    pub immediate_safety_concern: Option<String>,
    #[serde(rename = "saf_10_safety_compliance_index")]
    pub safety_compliance: Option<String>,
    #[serde(rename = "utl_9_utilities_reliability_index")]
    pub utilities_reliability: Option<String>,
    #[serde(rename = "utl_2_water_availability_observed")]
    pub water_available: Option<String>,
    #[serde(rename = "cln_4_hygiene_index")]
    pub hygiene_index: Option<String>,
    #[serde(rename = "acc_1_accessibility_disabled_observed")]
    pub disabled_access: Option<String>,
    #[serde(rename = "acc_2_adequate_lighting_observed")]
    pub adequate_lighting: Option<String>,
    #[serde(rename = "acc_3_adequate_ventilation_observed")]
    pub adequate_ventilation: Option<String>,
    #[serde(rename = "com_2_pta_presence_observed")]
    pub pta_present: Option<String>,
}

/// Kigali City / Secondary Cities / Rural Districts, derived from the school code.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LocationType {
    KigaliCity,
    SecondaryCities,
    #[default]
    RuralDistricts,
}

impl LocationType {
    pub fn ordered() -> [LocationType; 3] {
        [
            LocationType::KigaliCity,
            LocationType::SecondaryCities,
            LocationType::RuralDistricts,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            LocationType::KigaliCity => "Kigali City",
            LocationType::SecondaryCities => "Secondary Cities",
            LocationType::RuralDistricts => "Rural Districts",
        }
    }

    /// Accepts the dropdown label; the "All Locations" sentinel and unknown
    /// labels map to `None`.
    pub fn from_label(label: &str) -> Option<LocationType> {
        LocationType::ordered()
            .into_iter()
            .find(|loc| loc.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A school's assessment row after load-time cleaning.
///
/// Indices stay `None` when the sheet cell was empty so that means can skip
/// them instead of counting them as zero. Flags follow the same rule.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SchoolRecord {
    pub school_name: String,
    pub school_code: i64,
    pub province: String,
    pub district: String,
    pub sector: String,
    pub location_type: LocationType,

    pub students: u32,
    pub teachers: u32,
    pub classrooms: u32,
    pub toilets_boys: u32,
    pub toilets_girls: u32,
    pub school_age: Option<f64>,

    pub student_classroom_ratio: Option<f64>,
    pub student_teacher_ratio: Option<f64>,
    pub infrastructure_health: Option<f64>,
    pub electricity_reliability: Option<f64>,
    pub water_quality: Option<f64>,
    pub classroom_damage_rate: Option<f64>,
    pub toilet_damage_rate: Option<f64>,
    pub fence_available: Option<bool>,
    pub climate_vulnerability: Option<f64>,
    pub climate_mitigation: Option<f64>,

    pub maintenance_last_3y: Option<bool>,
    pub days_since_maintenance: Option<u32>,
    pub delayed_maintenance: Option<bool>,
    pub capitation_grant_pct: Option<f64>,
    pub funding_diversity: Option<f64>,
    pub funding_gap: Option<bool>,
    pub maintenance_frequency: Option<f64>,

    pub safety_compliance: Option<f64>,
    pub immediate_safety_concern: Option<bool>,
    pub utilities_reliability: Option<f64>,
    pub water_available: Option<bool>,
    pub hygiene_index: Option<f64>,
    pub disabled_access: Option<bool>,
    pub adequate_lighting: Option<bool>,
    pub adequate_ventilation: Option<bool>,
    pub pta_present: Option<bool>,
}

/// An index that fell outside its documented range. Kept on the record, only
/// reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataDefect {
    pub school_code: i64,
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for DataDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "school {}: {} = {} outside [{}, {}]",
            self.school_code, self.field, self.value, self.min, self.max
        )
    }
}

impl SchoolRecord {
    /// Range checks for every bounded index on the record.
    pub fn defects(&self) -> Vec<DataDefect> {
        let checks: [(&'static str, Option<f64>, f64, f64); 13] = [
            ("student_classroom_ratio", self.student_classroom_ratio, 0.0, f64::MAX),
            ("student_teacher_ratio", self.student_teacher_ratio, 0.0, f64::MAX),
            ("infrastructure_health", self.infrastructure_health, 0.0, 1.0),
            ("electricity_reliability", self.electricity_reliability, 0.0, 1.0),
            ("water_quality", self.water_quality, 0.0, 4.0),
            ("classroom_damage_rate", self.classroom_damage_rate, 0.0, 1.0),
            ("toilet_damage_rate", self.toilet_damage_rate, 0.0, 1.0),
            ("climate_vulnerability", self.climate_vulnerability, 0.0, 3.0),
            ("climate_mitigation", self.climate_mitigation, 0.0, 100.0),
            ("maintenance_frequency", self.maintenance_frequency, 0.0, 3.0),
            ("safety_compliance", self.safety_compliance, 0.0, 100.0),
            ("utilities_reliability", self.utilities_reliability, 0.0, 100.0),
            ("hygiene_index", self.hygiene_index, 0.0, 1.0),
        ];
        checks
            .into_iter()
            .filter_map(|(field, value, min, max)| {
                let v = value?;
                if v.is_nan() || v < min || v > max {
                    Some(DataDefect {
                        school_code: self.school_code,
                        field,
                        value: v,
                        min,
                        max,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// The loaded table. Cloning shares the same rows; nothing mutates them
/// after load, so concurrent filter passes need no locking.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Arc<[SchoolRecord]>,
}

impl Dataset {
    pub fn new(records: Vec<SchoolRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn records(&self) -> &[SchoolRecord] {
        &self.records
    }
}

impl Deref for Dataset {
    type Target = [SchoolRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl From<Vec<SchoolRecord>> for Dataset {
    fn from(records: Vec<SchoolRecord>) -> Self {
        Self::new(records)
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AlertRow {
    #[serde(rename = "School")]
    #[tabled(rename = "School")]
    pub school: String,
    #[serde(rename = "Location")]
    #[tabled(rename = "Location")]
    pub location: String,
    #[serde(rename = "Province")]
    #[tabled(rename = "Province")]
    pub province: String,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "S/C")]
    #[tabled(rename = "S/C")]
    pub student_classroom: String,
    #[serde(rename = "S/T")]
    #[tabled(rename = "S/T")]
    pub student_teacher: String,
    #[serde(rename = "Infra")]
    #[tabled(rename = "Infra")]
    pub infra: String,
    #[serde(rename = "Reasons")]
    #[tabled(rename = "Reasons")]
    pub reasons: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Parent")]
    #[tabled(rename = "Parent")]
    pub parent: String,
    #[serde(rename = "Location")]
    #[tabled(rename = "Location")]
    pub location: String,
    #[serde(rename = "Schools")]
    #[tabled(rename = "Schools")]
    pub schools: usize,
    #[serde(rename = "Students")]
    #[tabled(rename = "Students")]
    pub students: String,
    #[serde(rename = "S/C Ratio")]
    #[tabled(rename = "S/C Ratio")]
    pub student_classroom: String,
    #[serde(rename = "S/T Ratio")]
    #[tabled(rename = "S/T Ratio")]
    pub student_teacher: String,
    #[serde(rename = "Infra Index")]
    #[tabled(rename = "Infra Index")]
    pub infra: String,
    #[serde(rename = "RankedBy")]
    #[tabled(rename = "RankedBy")]
    pub ranked_by: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GapRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Current")]
    #[tabled(rename = "Current")]
    pub current: String,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target")]
    pub target: String,
    #[serde(rename = "Gap")]
    #[tabled(rename = "Gap")]
    pub gap: String,
    #[serde(rename = "GapPct")]
    #[tabled(rename = "GapPct")]
    pub gap_percent: String,
    #[serde(rename = "Severity")]
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[serde(rename = "Schools")]
    #[tabled(rename = "Schools")]
    pub schools: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RiskRow {
    #[serde(rename = "School")]
    #[tabled(rename = "School")]
    pub school: String,
    #[serde(rename = "Province")]
    #[tabled(rename = "Province")]
    pub province: String,
    #[serde(rename = "RiskScore")]
    #[tabled(rename = "RiskScore")]
    pub risk_score: u8,
    #[serde(rename = "RiskBand")]
    #[tabled(rename = "RiskBand")]
    pub band: String,
    #[serde(rename = "CriticalIssues")]
    #[tabled(rename = "CriticalIssues")]
    pub critical_issues: String,
}
