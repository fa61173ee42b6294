//! Tracked collections and their reconciliation policies
//!
//! Every collection declares its local key, its remote table (if any), how a
//! fetch result is merged, and whether deletions propagate remotely. Adding a
//! collection means adding a row to [`POLICIES`]; nothing defaults silently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain collections held by the state store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Students,
    Teachers,
    Subjects,
    Departments,
    Classes,
    Allocations,
    ExamSessions,
    Marks,
    GradeScales,
    OnlineExams,
    Submissions,
    Resources,
    Announcements,
    Attendance,
    PeriodAllocations,
    PeriodSessions,
    PeriodAttendance,
    FeeStructures,
    FeePayments,
}

/// How a successful remote read is applied to the in-memory collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Remote is authoritative once reachable; an empty result clears the
    /// collection so remote deletions propagate.
    ReplaceWhenPresent,
    /// Only a non-empty remote result replaces local data.
    ReplaceWhenNonEmpty,
}

impl MergeStrategy {
    /// Whether a remote result of `remote_len` records replaces local data
    pub fn should_replace(self, remote_len: usize) -> bool {
        match self {
            MergeStrategy::ReplaceWhenPresent => true,
            MergeStrategy::ReplaceWhenNonEmpty => remote_len > 0,
        }
    }
}

/// Value used when nothing usable is cached locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialValue {
    Empty,
    DefaultGradeScale,
}

/// Remote read ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

/// Reconciliation policy for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionPolicy {
    pub collection: Collection,
    pub local_key: &'static str,
    /// `None` keeps the collection local-only (never pulled or pushed)
    pub remote_table: Option<&'static str>,
    pub merge: MergeStrategy,
    pub order: Option<OrderBy>,
    /// Record deletes are issued against the remote store before local removal
    pub propagate_deletes: bool,
    pub initial: InitialValue,
}

const fn synced(collection: Collection, local_key: &'static str, table: &'static str) -> CollectionPolicy {
    CollectionPolicy {
        collection,
        local_key,
        remote_table: Some(table),
        merge: MergeStrategy::ReplaceWhenPresent,
        order: None,
        propagate_deletes: false,
        initial: InitialValue::Empty,
    }
}

const fn local_only(collection: Collection, local_key: &'static str) -> CollectionPolicy {
    CollectionPolicy {
        collection,
        local_key,
        remote_table: None,
        merge: MergeStrategy::ReplaceWhenPresent,
        order: None,
        propagate_deletes: false,
        initial: InitialValue::Empty,
    }
}

/// Policy table, one row per [`Collection`] in declaration order
pub const POLICIES: [CollectionPolicy; 19] = [
    CollectionPolicy {
        propagate_deletes: true,
        ..synced(Collection::Students, "sms_students", "students")
    },
    synced(Collection::Teachers, "sms_teachers", "teachers"),
    synced(Collection::Subjects, "sms_subjects", "subjects"),
    local_only(Collection::Departments, "sms_departments"),
    synced(Collection::Classes, "sms_classes", "classes"),
    local_only(Collection::Allocations, "sms_allocations"),
    synced(Collection::ExamSessions, "sms_sessions", "exam_sessions"),
    synced(Collection::Marks, "sms_marks", "student_marks"),
    CollectionPolicy {
        merge: MergeStrategy::ReplaceWhenNonEmpty,
        initial: InitialValue::DefaultGradeScale,
        ..synced(Collection::GradeScales, "sms_gradeScales", "grade_scales")
    },
    synced(Collection::OnlineExams, "sms_onlineExams", "online_exams"),
    synced(Collection::Submissions, "sms_submissions", "exam_submissions"),
    local_only(Collection::Resources, "sms_resources"),
    CollectionPolicy {
        order: Some(OrderBy {
            column: "createdAt",
            descending: true,
        }),
        ..synced(Collection::Announcements, "sms_announcements", "announcements")
    },
    synced(Collection::Attendance, "sms_attendance", "attendance"),
    synced(Collection::PeriodAllocations, "sms_period_allocations", "period_allocations"),
    synced(Collection::PeriodSessions, "sms_period_sessions", "period_sessions"),
    synced(Collection::PeriodAttendance, "sms_period_attendance", "period_attendance"),
    synced(Collection::FeeStructures, "sms_fee_structures", "fee_structures"),
    synced(Collection::FeePayments, "sms_fee_payments", "fee_payments"),
];

/// Hosted table holding branding `{key, value}` rows
pub const SETTINGS_TABLE: &str = "settings";

/// Sentinel id used to express "delete every row" as a filtered delete
pub const CLEAR_ALL_SENTINEL: &str = "_CLEAR_ALL_FORCE_";

impl Collection {
    pub const ALL: [Collection; 19] = [
        Collection::Students,
        Collection::Teachers,
        Collection::Subjects,
        Collection::Departments,
        Collection::Classes,
        Collection::Allocations,
        Collection::ExamSessions,
        Collection::Marks,
        Collection::GradeScales,
        Collection::OnlineExams,
        Collection::Submissions,
        Collection::Resources,
        Collection::Announcements,
        Collection::Attendance,
        Collection::PeriodAllocations,
        Collection::PeriodSessions,
        Collection::PeriodAttendance,
        Collection::FeeStructures,
        Collection::FeePayments,
    ];

    pub fn policy(self) -> &'static CollectionPolicy {
        // POLICIES is ordered like the enum
        &POLICIES[self as usize]
    }

    /// API / event name (`exam_sessions`, `fee_payments`, ...)
    pub fn name(self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Teachers => "teachers",
            Collection::Subjects => "subjects",
            Collection::Departments => "departments",
            Collection::Classes => "classes",
            Collection::Allocations => "allocations",
            Collection::ExamSessions => "exam_sessions",
            Collection::Marks => "marks",
            Collection::GradeScales => "grade_scales",
            Collection::OnlineExams => "online_exams",
            Collection::Submissions => "submissions",
            Collection::Resources => "resources",
            Collection::Announcements => "announcements",
            Collection::Attendance => "attendance",
            Collection::PeriodAllocations => "period_allocations",
            Collection::PeriodSessions => "period_sessions",
            Collection::PeriodAttendance => "period_attendance",
            Collection::FeeStructures => "fee_structures",
            Collection::FeePayments => "fee_payments",
        }
    }

    /// Collections pulled and pushed against the remote store
    pub fn synced() -> impl Iterator<Item = Collection> {
        Collection::ALL
            .into_iter()
            .filter(|c| c.policy().remote_table.is_some())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("Unknown collection: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_policy_table_matches_enum_order() {
        for (i, collection) in Collection::ALL.iter().enumerate() {
            assert_eq!(POLICIES[i].collection, *collection);
            assert_eq!(collection.policy().collection, *collection);
        }
    }

    #[test]
    fn test_local_keys_and_tables_unique() {
        let keys: HashSet<_> = POLICIES.iter().map(|p| p.local_key).collect();
        assert_eq!(keys.len(), POLICIES.len());

        let tables: Vec<_> = POLICIES.iter().filter_map(|p| p.remote_table).collect();
        let unique: HashSet<_> = tables.iter().collect();
        assert_eq!(unique.len(), tables.len());
        assert!(!tables.contains(&SETTINGS_TABLE));
    }

    #[test]
    fn test_synced_tables() {
        let tables: Vec<_> = Collection::synced()
            .map(|c| c.policy().remote_table.unwrap())
            .collect();
        assert_eq!(tables.len(), 16);
        for expected in [
            "students",
            "teachers",
            "subjects",
            "classes",
            "fee_structures",
            "fee_payments",
            "announcements",
            "online_exams",
            "exam_submissions",
            "attendance",
            "student_marks",
            "exam_sessions",
            "grade_scales",
            "period_allocations",
            "period_sessions",
            "period_attendance",
        ] {
            assert!(tables.contains(&expected), "missing table {}", expected);
        }
    }

    #[test]
    fn test_special_policies() {
        let grade = Collection::GradeScales.policy();
        assert_eq!(grade.merge, MergeStrategy::ReplaceWhenNonEmpty);
        assert_eq!(grade.initial, InitialValue::DefaultGradeScale);

        let ann = Collection::Announcements.policy();
        assert_eq!(
            ann.order,
            Some(OrderBy {
                column: "createdAt",
                descending: true
            })
        );

        assert!(Collection::Students.policy().propagate_deletes);
        assert!(!Collection::Teachers.policy().propagate_deletes);
        assert!(Collection::Resources.policy().remote_table.is_none());
    }

    #[test]
    fn test_merge_strategy() {
        assert!(MergeStrategy::ReplaceWhenPresent.should_replace(0));
        assert!(MergeStrategy::ReplaceWhenPresent.should_replace(3));
        assert!(!MergeStrategy::ReplaceWhenNonEmpty.should_replace(0));
        assert!(MergeStrategy::ReplaceWhenNonEmpty.should_replace(1));
    }

    #[test]
    fn test_name_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(collection.name().parse::<Collection>().unwrap(), collection);
        }
        assert!("nonsense".parse::<Collection>().is_err());
    }
}
