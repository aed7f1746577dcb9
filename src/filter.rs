//! Cascading location filters: location type → province → district → sector → schools.
//!
//! Every criterion is optional. An absent criterion matches everything; present
//! criteria are ANDed. Values that do not occur in the data simply match
//! nothing.

use crate::types::{LocationType, SchoolRecord};
use std::collections::{BTreeSet, HashSet};

pub const ALL_LOCATIONS: &str = "All Locations";
pub const ALL_PROVINCES: &str = "All Provinces";
pub const ALL_DISTRICTS: &str = "All Districts";
pub const ALL_SECTORS: &str = "All Sectors";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// `Err` carries a location label that names no known type; it matches
    /// no record.
    pub location_type: Option<Result<LocationType, String>>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sector: Option<String>,
    pub schools: Option<HashSet<String>>,
}

fn selected(value: Option<&str>, all_sentinel: &str) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || value == all_sentinel {
        None
    } else {
        Some(value.to_string())
    }
}

impl FilterCriteria {
    /// Build criteria from raw dropdown values, mapping the "All ..."
    /// sentinels and an empty school list to "no constraint".
    ///
    /// An unrecognised location label is kept as a constraint that matches
    /// nothing rather than being dropped.
    pub fn from_selection(
        location: Option<&str>,
        province: Option<&str>,
        district: Option<&str>,
        sector: Option<&str>,
        schools: &[String],
    ) -> Self {
        let location_type = selected(location, ALL_LOCATIONS)
            .map(|label| LocationType::from_label(&label).ok_or(label));
        let schools: HashSet<String> = schools
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            location_type,
            province: selected(province, ALL_PROVINCES),
            district: selected(district, ALL_DISTRICTS),
            sector: selected(sector, ALL_SECTORS),
            schools: if schools.is_empty() {
                None
            } else {
                Some(schools)
            },
        }
    }

    pub fn with_location(mut self, location: LocationType) -> Self {
        self.location_type = Some(Ok(location));
        self
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_schools<I, S>(mut self, schools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schools = Some(schools.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, record: &SchoolRecord) -> bool {
        let location_ok = match &self.location_type {
            None => true,
            Some(Ok(loc)) => record.location_type == *loc,
            Some(Err(_)) => false,
        };
        location_ok
            && self
                .province
                .as_deref()
                .map_or(true, |p| record.province == p)
            && self
                .district
                .as_deref()
                .map_or(true, |d| record.district == d)
            && self.sector.as_deref().map_or(true, |s| record.sector == s)
            && self
                .schools
                .as_ref()
                .map_or(true, |set| set.contains(&record.school_name))
    }

    /// The predicate as a standalone closure, for callers that compose it
    /// with their own conditions.
    pub fn predicate(&self) -> impl Fn(&SchoolRecord) -> bool + '_ {
        move |record| self.matches(record)
    }

    /// Breadcrumb shown next to the dropdowns.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        match &self.location_type {
            Some(Ok(loc)) => parts.push(loc.label().to_string()),
            Some(Err(label)) => parts.push(format!("{label} (unknown location)")),
            None => {}
        }
        for part in [&self.province, &self.district, &self.sector]
            .into_iter()
            .flatten()
        {
            parts.push(part.clone());
        }
        if let Some(schools) = self.schools.as_ref().filter(|s| !s.is_empty()) {
            parts.push(format!("{} school(s)", schools.len()));
        }
        if parts.is_empty() {
            "All Data".to_string()
        } else {
            parts.join(" → ")
        }
    }
}

/// Rows matching `criteria`, borrowed from the source table in input order.
pub fn filter_records<'a>(
    records: &'a [SchoolRecord],
    criteria: &FilterCriteria,
) -> Vec<&'a SchoolRecord> {
    records.iter().filter(|r| criteria.matches(r)).collect()
}

/// Option lists for the cascading dropdowns, computed from the full table.
pub struct FilterOptions<'a> {
    records: &'a [SchoolRecord],
}

impl<'a> FilterOptions<'a> {
    pub fn new(records: &'a [SchoolRecord]) -> Self {
        Self { records }
    }

    pub fn provinces(&self) -> Vec<String> {
        distinct_sorted(self.records.iter().map(|r| &r.province))
    }

    /// Every district when no province is selected.
    pub fn districts(&self, province: Option<&str>) -> Vec<String> {
        distinct_sorted(
            self.records
                .iter()
                .filter(|r| province.map_or(true, |p| r.province == p))
                .map(|r| &r.district),
        )
    }

    pub fn sectors(&self, district: Option<&str>) -> Vec<String> {
        distinct_sorted(
            self.records
                .iter()
                .filter(|r| district.map_or(true, |d| r.district == d))
                .map(|r| &r.sector),
        )
    }

    /// School names under the location criteria; the school selection itself
    /// is ignored so the list does not collapse onto what is already picked.
    pub fn schools(&self, criteria: &FilterCriteria) -> Vec<String> {
        let scope = FilterCriteria {
            schools: None,
            ..criteria.clone()
        };
        distinct_sorted(
            self.records
                .iter()
                .filter(|r| scope.matches(r))
                .map(|r| &r.school_name),
        )
    }
}

fn distinct_sorted<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}
