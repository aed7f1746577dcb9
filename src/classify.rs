//! Urgent / Attention / Good classification of individual schools.
//!
//! Rules are evaluated in tiers. A school that meets any Urgent rule is
//! Urgent and its Attention rules are never looked at. Attention is only
//! reached when no Urgent rule fires, and Good is what is left.

use crate::types::SchoolRecord;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Status {
    Urgent,
    Attention,
    Good,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Urgent => "Urgent",
            Status::Attention => "Attention",
            Status::Good => "Good",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reason {
    CriticalStudentClassroom,
    CriticalStudentTeacher,
    PoorInfrastructure,
    HighStudentClassroom,
    HighStudentTeacher,
    MediumInfrastructure,
    DelayedMaintenance,
    SafetyConcern,
    NoFence,
    LowClimateMitigation,
    StudentClassroomOk,
    StudentTeacherOk,
    InfrastructureOk,
}

impl Reason {
    pub fn tag(&self) -> &'static str {
        match self {
            Reason::CriticalStudentClassroom => "S/C>50",
            Reason::CriticalStudentTeacher => "S/T>40",
            Reason::PoorInfrastructure => "Infra<0.5",
            Reason::HighStudentClassroom => "High S/C",
            Reason::HighStudentTeacher => "High S/T",
            Reason::MediumInfrastructure => "Med Infra",
            Reason::DelayedMaintenance => "Delayed",
            Reason::SafetyConcern => "Safety",
            Reason::NoFence => "No Fence",
            Reason::LowClimateMitigation => "Low Mitigation",
            Reason::StudentClassroomOk => "S/C≤45",
            Reason::StudentTeacherOk => "S/T≤35",
            Reason::InfrastructureOk => "Infra≥0.7",
        }
    }
}

/// Attention criteria that do not depend on the ratio bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttentionFlag {
    DelayedMaintenance,
    SafetyConcern,
    NoFence,
    /// Mitigation coverage (0-100) strictly below the given value.
    LowClimateMitigation(f64),
}

/// Thresholds for the two upper tiers. Ratio limits are "greater than";
/// infrastructure limits are "less than".
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRules {
    pub urgent_student_classroom: f64,
    pub urgent_student_teacher: f64,
    pub urgent_infrastructure: f64,
    pub attention_student_classroom: f64,
    pub attention_student_teacher: f64,
    pub attention_infrastructure: f64,
    pub attention_flags: Vec<AttentionFlag>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            urgent_student_classroom: 50.0,
            urgent_student_teacher: 40.0,
            urgent_infrastructure: 0.5,
            attention_student_classroom: 45.0,
            attention_student_teacher: 35.0,
            attention_infrastructure: 0.7,
            attention_flags: vec![
                AttentionFlag::DelayedMaintenance,
                AttentionFlag::SafetyConcern,
                AttentionFlag::NoFence,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub status: Status,
    pub reasons: Vec<Reason>,
}

impl Classification {
    pub fn reason_tags(&self) -> String {
        self.reasons
            .iter()
            .map(Reason::tag)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn above(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v > limit)
}

fn below(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v < limit)
}

fn within(value: Option<f64>, low_exclusive: f64, high_inclusive: f64) -> bool {
    value.is_some_and(|v| v > low_exclusive && v <= high_inclusive)
}

fn between(value: Option<f64>, low_inclusive: f64, high_exclusive: f64) -> bool {
    value.is_some_and(|v| v >= low_inclusive && v < high_exclusive)
}

impl ClassificationRules {
    /// Missing values never trigger a rule.
    pub fn classify(&self, record: &SchoolRecord) -> Classification {
        let sc = record.student_classroom_ratio;
        let st = record.student_teacher_ratio;
        let infra = record.infrastructure_health;

        let mut urgent = Vec::new();
        if above(sc, self.urgent_student_classroom) {
            urgent.push(Reason::CriticalStudentClassroom);
        }
        if above(st, self.urgent_student_teacher) {
            urgent.push(Reason::CriticalStudentTeacher);
        }
        if below(infra, self.urgent_infrastructure) {
            urgent.push(Reason::PoorInfrastructure);
        }
        if !urgent.is_empty() {
            return Classification {
                status: Status::Urgent,
                reasons: urgent,
            };
        }

        let mut attention = Vec::new();
        if within(
            sc,
            self.attention_student_classroom,
            self.urgent_student_classroom,
        ) {
            attention.push(Reason::HighStudentClassroom);
        }
        if within(st, self.attention_student_teacher, self.urgent_student_teacher) {
            attention.push(Reason::HighStudentTeacher);
        }
        if between(
            infra,
            self.urgent_infrastructure,
            self.attention_infrastructure,
        ) {
            attention.push(Reason::MediumInfrastructure);
        }
        for flag in &self.attention_flags {
            let hit = match flag {
                AttentionFlag::DelayedMaintenance => record.delayed_maintenance == Some(true),
                AttentionFlag::SafetyConcern => record.immediate_safety_concern == Some(true),
                AttentionFlag::NoFence => record.fence_available == Some(false),
                AttentionFlag::LowClimateMitigation(limit) => {
                    below(record.climate_mitigation, *limit)
                }
            };
            if hit {
                attention.push(match flag {
                    AttentionFlag::DelayedMaintenance => Reason::DelayedMaintenance,
                    AttentionFlag::SafetyConcern => Reason::SafetyConcern,
                    AttentionFlag::NoFence => Reason::NoFence,
                    AttentionFlag::LowClimateMitigation(_) => Reason::LowClimateMitigation,
                });
            }
        }
        if !attention.is_empty() {
            return Classification {
                status: Status::Attention,
                reasons: attention,
            };
        }

        let mut good = Vec::new();
        if sc.is_some_and(|v| v <= self.attention_student_classroom) {
            good.push(Reason::StudentClassroomOk);
        }
        if st.is_some_and(|v| v <= self.attention_student_teacher) {
            good.push(Reason::StudentTeacherOk);
        }
        if infra.is_some_and(|v| v >= self.attention_infrastructure) {
            good.push(Reason::InfrastructureOk);
        }
        Classification {
            status: Status::Good,
            reasons: good,
        }
    }
}

/// Classify with the default rule set.
pub fn classify(record: &SchoolRecord) -> Classification {
    ClassificationRules::default().classify(record)
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedSchool<'a> {
    pub record: &'a SchoolRecord,
    pub classification: Classification,
}

/// The three partitions plus counts. Counts come from the distinct school
/// codes in each partition, never from list lengths.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertReport<'a> {
    pub urgent: Vec<ClassifiedSchool<'a>>,
    pub attention: Vec<ClassifiedSchool<'a>>,
    pub good: Vec<ClassifiedSchool<'a>>,
    pub total_count: usize,
    pub urgent_count: usize,
    pub attention_count: usize,
    pub good_count: usize,
}

impl<'a> AlertReport<'a> {
    pub fn partition(&self, status: Status) -> &[ClassifiedSchool<'a>] {
        match status {
            Status::Urgent => &self.urgent,
            Status::Attention => &self.attention,
            Status::Good => &self.good,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

fn distinct_codes(list: &[ClassifiedSchool<'_>]) -> usize {
    list.iter()
        .map(|s| s.record.school_code)
        .collect::<HashSet<_>>()
        .len()
}

/// Partition schools by status. A school code seen twice is classified once,
/// from its first row, so every school lands in exactly one partition.
pub fn calculate_alerts<'a, I>(records: I, rules: &ClassificationRules) -> AlertReport<'a>
where
    I: IntoIterator<Item = &'a SchoolRecord>,
{
    let mut seen = HashSet::new();
    let mut report = AlertReport::default();

    for record in records {
        if !seen.insert(record.school_code) {
            debug!(
                school_code = record.school_code,
                "duplicate school code ignored"
            );
            continue;
        }
        let classification = rules.classify(record);
        let entry = ClassifiedSchool {
            record,
            classification,
        };
        match entry.classification.status {
            Status::Urgent => report.urgent.push(entry),
            Status::Attention => report.attention.push(entry),
            Status::Good => report.good.push(entry),
        }
    }

    report.total_count = seen.len();
    report.urgent_count = distinct_codes(&report.urgent);
    report.attention_count = distinct_codes(&report.attention);
    report.good_count = report
        .total_count
        .saturating_sub(report.urgent_count + report.attention_count);
    debug!(
        total = report.total_count,
        urgent = report.urgent_count,
        attention = report.attention_count,
        good = report.good_count,
        "alerts calculated"
    );
    report
}
