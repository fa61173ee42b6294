//! Role-based module visibility
//!
//! Feature modules consult this to decide what a logged-in identity may open.
//! Record-level filtering ("my class", "my submissions") stays with the
//! modules themselves.

use serde::{Deserialize, Serialize};
use sms_common::models::UserRole;

/// Local key holding the logged-in identity
pub const AUTH_USER_KEY: &str = "sms_auth_user";

/// Feature modules, in dashboard order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleType {
    Students,
    Teachers,
    Exams,
    Fees,
    Resources,
    Announcements,
    Enrollment,
    #[serde(rename = "PAYMENT")]
    Academics,
    AdmissionReceipt,
    Attendance,
    #[serde(rename = "EMIS")]
    OnlineExam,
    TransferForm,
    Register,
    ExamAnalysis,
    Class,
    Periodmeter,
    Settings,
}

impl ModuleType {
    pub const ALL: [ModuleType; 17] = [
        ModuleType::Students,
        ModuleType::Teachers,
        ModuleType::Exams,
        ModuleType::Fees,
        ModuleType::Resources,
        ModuleType::Announcements,
        ModuleType::Enrollment,
        ModuleType::Academics,
        ModuleType::AdmissionReceipt,
        ModuleType::Attendance,
        ModuleType::OnlineExam,
        ModuleType::TransferForm,
        ModuleType::Register,
        ModuleType::ExamAnalysis,
        ModuleType::Class,
        ModuleType::Periodmeter,
        ModuleType::Settings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ModuleType::Students => "ADD/CHECK STUDENTS",
            ModuleType::Teachers => "ADD/CHECK TEACHERS",
            ModuleType::Exams => "EXAM MANAGEMENT",
            ModuleType::Fees => "FEES & FINANCE",
            ModuleType::Resources => "STUDYING RESOURCES",
            ModuleType::Announcements => "OFFICIAL ANNOUNCEMENTS",
            ModuleType::Enrollment => "CURRENT ENROLMENT",
            ModuleType::Academics => "ACADEMICS AND CLASSES",
            ModuleType::AdmissionReceipt => "ISSUE ADMISSION RECEIPT",
            ModuleType::Attendance => "ATTENDANCE",
            ModuleType::OnlineExam => "ONLINE EXAM",
            ModuleType::TransferForm => "ISSUE TRANSFER FORM",
            ModuleType::Register => "REGISTER",
            ModuleType::ExamAnalysis => "EXAM ANALYSIS",
            ModuleType::Class => "CLASS",
            ModuleType::Periodmeter => "PERIODMETER",
            ModuleType::Settings => "SYSTEM SETTINGS",
        }
    }
}

/// Modules a role may open, in dashboard order
pub fn visible_modules(role: UserRole) -> Vec<ModuleType> {
    let allowed: &[ModuleType] = match role {
        UserRole::Admin => &ModuleType::ALL,
        UserRole::Teacher => &[
            ModuleType::Exams,
            ModuleType::Resources,
            ModuleType::Attendance,
            ModuleType::Register,
            ModuleType::Class,
            ModuleType::Announcements,
            ModuleType::Periodmeter,
        ],
        UserRole::Student => &[
            ModuleType::Exams,
            ModuleType::Fees,
            ModuleType::Resources,
            ModuleType::Attendance,
            ModuleType::Announcements,
            ModuleType::Periodmeter,
        ],
        UserRole::AttendanceOfficer => &[
            ModuleType::Attendance,
            ModuleType::Periodmeter,
            ModuleType::Announcements,
        ],
    };

    ModuleType::ALL
        .into_iter()
        .filter(|m| allowed.contains(m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_sees_everything() {
        assert_eq!(visible_modules(UserRole::Admin), ModuleType::ALL.to_vec());
    }

    #[test]
    fn test_attendance_officer_in_dashboard_order() {
        assert_eq!(
            visible_modules(UserRole::AttendanceOfficer),
            vec![
                ModuleType::Announcements,
                ModuleType::Attendance,
                ModuleType::Periodmeter
            ]
        );
    }

    #[test]
    fn test_student_cannot_manage_registry() {
        let modules = visible_modules(UserRole::Student);
        assert!(modules.contains(&ModuleType::Fees));
        assert!(!modules.contains(&ModuleType::Students));
        assert!(!modules.contains(&ModuleType::Settings));
    }

    #[test]
    fn test_teacher_modules() {
        let modules = visible_modules(UserRole::Teacher);
        assert_eq!(modules.len(), 7);
        assert!(!modules.contains(&ModuleType::Fees));
    }

    #[test]
    fn test_module_wire_names() {
        assert_eq!(
            serde_json::to_value(ModuleType::Academics).unwrap(),
            "PAYMENT"
        );
        assert_eq!(
            serde_json::to_value(ModuleType::OnlineExam).unwrap(),
            "EMIS"
        );
        assert_eq!(
            serde_json::to_value(ModuleType::AdmissionReceipt).unwrap(),
            "ADMISSION_RECEIPT"
        );
    }
}
