use crate::error::LoadError;
use crate::types::{DataDefect, Dataset, LocationType, RawRow, SchoolRecord};
use crate::util::{non_empty_or, parse_f64_safe, parse_flag_safe, parse_i64_safe};
use csv::{ReaderBuilder, Trim};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// School codes of the urban location types. Every other code is rural.

static KIGALI_CODES: Lazy<HashSet<i64>> = Lazy::new(|| {
    [
        110504, 110505, 120735, 130804, 130405, 121207, 110306, 121011, 130819, 110909,
    ]
    .into_iter()
    .collect()
});

static SECONDARY_CITY_CODES: Lazy<HashSet<i64>> = Lazy::new(|| {
    [
        331232, 330802, 330713, 240605, 240504, 240202, 271011, 270202, 270517, 270613, 430207,
        430706, 430518, 430801, 520312, 520403, 520801, 361510, 360614, 361306,
    ]
    .into_iter()
    .collect()
});

/// Placeholder for a blank province, district or sector cell.
pub const UNKNOWN: &str = "Unknown";

/// Codes outside both tables are rural.
pub fn location_type_for(school_code: i64) -> LocationType {
    if KIGALI_CODES.contains(&school_code) {
        LocationType::KigaliCity
    } else if SECONDARY_CITY_CODES.contains(&school_code) {
        LocationType::SecondaryCities
    } else {
        LocationType::RuralDistricts
    }
}

/// What happened while loading: rows seen, rows kept, rows skipped, and the
/// out-of-range values that were kept anyway.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub defects: Vec<DataDefect>,
}

/// Open the CSV export at `path` and load it.
///
/// Only an unreadable file or header is an error. Bad rows are counted in
/// the returned [`LoadReport`] and skipped.
pub fn load_and_clean(path: impl AsRef<Path>) -> Result<(Dataset, LoadReport), LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let (dataset, report) = load_from_reader(file)?;
    info!(
        path = %path.display(),
        total = report.total_rows,
        loaded = report.loaded_rows,
        skipped = report.parse_errors,
        defects = report.defects.len(),
        "assessment data loaded"
    );
    Ok((dataset, report))
}

/// Load from any reader; tests feed in-memory CSV through this.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(Dataset, LoadReport), LoadError> {
    // Exports may drop trailing empty columns, hence `flexible`.
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut report = LoadReport::default();
    let mut records: Vec<SchoolRecord> = Vec::new();

    for (line, result) in rdr.deserialize::<RawRow>().enumerate() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                // +2: one for the header, one for 1-based line numbers.
                warn!(line = line + 2, error = %e, "unreadable row skipped");
                report.parse_errors += 1;
                continue;
            }
        };
        match clean_row(row) {
            Some(record) => {
                for defect in record.defects() {
                    warn!(%defect, "value outside documented range");
                    report.defects.push(defect);
                }
                records.push(record);
            }
            None => {
                warn!(line = line + 2, "row with missing code or invalid counts skipped");
                report.parse_errors += 1;
            }
        }
    }

    report.loaded_rows = records.len();
    Ok((Dataset::new(records), report))
}

/// Missing optional counts read as zero; present but negative or fractional
/// counts reject the row.
///
/// The outer `None` means "reject the row", not "missing".
fn parse_count(s: Option<&str>) -> Option<u32> {
    match s.map(str::trim) {
        None | Some("") => Some(0),
        Some(v) => parse_i64_safe(Some(v)).and_then(|n| u32::try_from(n).ok()),
    }
}

/// Convert one raw row into a typed record.
///
/// Returns `None` when the school code is missing or unparseable, or when a
/// count or the days since maintenance is negative. Index cells that fail
/// to parse become `None` and are skipped by the aggregations.
fn clean_row(row: RawRow) -> Option<SchoolRecord> {
    let school_code = parse_i64_safe(row.school_code.as_deref())?;
    let students = parse_count(row.students.as_deref())?;
    let teachers = parse_count(row.teachers.as_deref())?;
    let classrooms = parse_count(row.classrooms.as_deref())?;
    let toilets_boys = parse_count(row.toilets_boys.as_deref())?;
    let toilets_girls = parse_count(row.toilets_girls.as_deref())?;

    let days_since_maintenance = match parse_i64_safe(row.days_since_maintenance.as_deref()) {
        Some(d) if d < 0 => return None,
        Some(d) => u32::try_from(d).ok(),
        None => None,
    };

    let num = |s: &Option<String>| parse_f64_safe(s.as_deref());
    let flag = |s: &Option<String>| parse_flag_safe(s.as_deref());

    Some(SchoolRecord {
        school_name: non_empty_or(row.school_name.clone(), "Unnamed School"),
        school_code,
        province: non_empty_or(row.province.clone(), UNKNOWN),
        district: non_empty_or(row.district.clone(), UNKNOWN),
        sector: non_empty_or(row.sector.clone(), UNKNOWN),
        location_type: location_type_for(school_code),
        students,
        teachers,
        classrooms,
        toilets_boys,
        toilets_girls,
        school_age: num(&row.school_age),
        student_classroom_ratio: num(&row.student_classroom_ratio),
        student_teacher_ratio: num(&row.student_teacher_ratio),
        infrastructure_health: num(&row.infrastructure_health),
        electricity_reliability: num(&row.electricity_reliability),
        water_quality: num(&row.water_quality),
        classroom_damage_rate: num(&row.classroom_damage_rate),
        toilet_damage_rate: num(&row.toilet_damage_rate),
        fence_available: flag(&row.fence_availability),
        climate_vulnerability: num(&row.climate_vulnerability),
        climate_mitigation: num(&row.climate_mitigation),
        maintenance_last_3y: flag(&row.maintenance_last_3y),
        days_since_maintenance,
        delayed_maintenance: flag(&row.delayed_maintenance),
        capitation_grant_pct: num(&row.capitation_grant_pct),
        funding_diversity: num(&row.funding_diversity),
        funding_gap: flag(&row.funding_gap),
        maintenance_frequency: num(&row.maintenance_frequency),
        safety_compliance: num(&row.safety_compliance),
        immediate_safety_concern: flag(&row.immediate_safety_concern),
        utilities_reliability: num(&row.utilities_reliability),
        water_available: flag(&row.water_available),
        hygiene_index: num(&row.hygiene_index),
        disabled_access: flag(&row.disabled_access),
        adequate_lighting: flag(&row.adequate_lighting),
        adequate_ventilation: flag(&row.adequate_ventilation),
        pta_present: flag(&row.pta_present),
    })
}
