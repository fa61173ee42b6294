//! Domain record types
//!
//! Field names serialize in camelCase so records round-trip unchanged through
//! both the local cache and the hosted tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentStatus {
    Active,
    Alumni,
    Transferred,
    #[serde(rename = "Dropped out")]
    DroppedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Student number
    pub id: String,
    pub name: String,
    /// Class name (not id)
    pub class: String,
    pub gender: Gender,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub date_of_admission: String,
    #[serde(default)]
    pub club: String,
    #[serde(default)]
    pub guardian_name: String,
    #[serde(default)]
    pub residential_address: String,
    #[serde(default)]
    pub contact: String,
    pub status: StudentStatus,
    /// Data URL of the captured photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeacherStatus {
    Active,
    #[serde(rename = "On Leave")]
    OnLeave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    /// Primary subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact: String,
    pub status: TeacherStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    /// Head of department (teacher id)
    pub hod_id: String,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub grade_teacher_id: String,
    #[serde(default)]
    pub subject_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAllocation {
    pub id: String,
    pub class_id: String,
    pub teacher_id: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSession {
    pub id: String,
    /// e.g. "End of Term 1"
    pub name: String,
    pub year: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeScale {
    pub id: String,
    pub label: String,
    pub min_mark: i32,
    pub max_mark: i32,
    pub description: String,
}

impl GradeScale {
    fn band(id: &str, label: &str, min_mark: i32, max_mark: i32, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            min_mark,
            max_mark,
            description: description.to_string(),
        }
    }

    /// Whether a score falls inside this band (inclusive)
    pub fn contains(&self, score: i32) -> bool {
        score >= self.min_mark && score <= self.max_mark
    }
}

/// Built-in grading policy: nine bands `1`..`9` plus `X` for absent
pub fn default_grade_scales() -> Vec<GradeScale> {
    vec![
        GradeScale::band("G1", "1", 90, 100, "Distinction"),
        GradeScale::band("G2", "2", 80, 89, "Excellent"),
        GradeScale::band("G3", "3", 70, 79, "Merit"),
        GradeScale::band("G4", "4", 60, 69, "Credit"),
        GradeScale::band("G5", "5", 50, 59, "Good Pass"),
        GradeScale::band("G6", "6", 45, 49, "Pass"),
        GradeScale::band("G7", "7", 40, 44, "Weak Pass"),
        GradeScale::band("G8", "8", 35, 39, "Very Weak"),
        GradeScale::band("G9", "9", 0, 34, "Fail"),
        GradeScale::band("GX", "X", -1, -1, "Absent"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMark {
    pub id: String,
    pub student_id: String,
    pub session_id: String,
    pub subject_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    ShortAnswer,
    TrueFalse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineExam {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: String,
    pub class_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub status: PublishStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSubmission {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    /// Question id -> answer
    #[serde(default)]
    pub answers: HashMap<String, String>,
    pub score: f64,
    pub total_points: f64,
    pub submitted_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: String,
    pub class_id: String,
    pub teacher_id: String,
    pub file_name: String,
    pub file_type: String,
    /// Base64 payload
    pub file_data: String,
    pub upload_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
    AttendanceOfficer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnouncementTarget {
    Global,
    Role,
    Class,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: UserRole,
    pub target_type: AnnouncementTarget,
    /// Role name or class name/id, depending on `target_type`
    #[serde(default)]
    pub target_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceMark {
    /// Present
    P,
    /// Absent
    A,
    /// Late
    L,
    /// Sick
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConductMark {
    E,
    G,
    F,
    P,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub date: String,
    pub student_id: String,
    #[serde(default)]
    pub status: Option<AttendanceMark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conduct: Option<ConductMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAllocation {
    pub id: String,
    pub teacher_id: String,
    pub class_id: String,
    pub subject_id: String,
    pub weekly_target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSession {
    pub id: String,
    pub allocation_id: String,
    pub date: String,
    /// Usually 1; 2 for a double period
    pub periods_held: u32,
    pub recorded_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceMark {
    P,
    A,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAttendance {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub status: PresenceMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub id: String,
    pub class_name: String,
    pub tuition_fee: f64,
    pub development_fee: f64,
    pub exam_fee: f64,
    pub other_fees: f64,
    pub term: String,
    pub year: String,
}

impl FeeStructure {
    /// Amount expected per student for the term
    pub fn total(&self) -> f64 {
        self.tuition_fee + self.development_fee + self.exam_fee + self.other_fees
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePayment {
    pub id: String,
    pub student_id: String,
    pub amount: f64,
    pub date: String,
    pub payment_method: String,
    pub receipt_number: String,
    pub term: String,
    pub year: String,
    pub recorded_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One row of the hosted `settings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Logged-in identity cached locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email_or_id: String,
    pub role: UserRole,
    /// Student class or teacher subjects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_grade_scale_bands() {
        let scales = default_grade_scales();
        assert_eq!(scales.len(), 10);

        let labels: Vec<&str> = scales.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["1", "2", "3", "4", "5", "6", "7", "8", "9", "X"]);

        assert!(scales[0].contains(95));
        assert!(scales[8].contains(0));
        assert!(!scales[8].contains(35));
        assert!(scales[9].contains(-1));
    }

    #[test]
    fn test_student_wire_format() {
        let student: Student = serde_json::from_value(json!({
            "id": "MDS1",
            "name": "Jane Phiri",
            "class": "Grade 10A",
            "gender": "Female",
            "dob": "2008-05-15",
            "dateOfAdmission": "2024-01-10",
            "club": "Chess",
            "guardianName": "Mary Phiri",
            "residentialAddress": "12 Lake Rd",
            "contact": "0977000000",
            "status": "Dropped out"
        }))
        .unwrap();

        assert_eq!(student.status, StudentStatus::DroppedOut);
        assert_eq!(student.date_of_admission, "2024-01-10");
        assert!(student.photo.is_none());

        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(value["guardianName"], "Mary Phiri");
        assert!(value.get("photo").is_none());
    }

    #[test]
    fn test_auth_user_roles() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "T1",
            "name": "Mr Banda",
            "emailOrId": "banda@school.zm",
            "role": "ATTENDANCE_OFFICER"
        }))
        .unwrap();
        assert_eq!(user.role, UserRole::AttendanceOfficer);
        assert!(user.meta.is_none());
    }

    #[test]
    fn test_fee_structure_total() {
        let fee = FeeStructure {
            id: "FS-1".into(),
            class_name: "Grade 8A".into(),
            tuition_fee: 1500.0,
            development_fee: 200.0,
            exam_fee: 100.0,
            other_fees: 50.0,
            term: "Term 1".into(),
            year: "2024".into(),
        };
        assert_eq!(fee.total(), 1850.0);
    }

    #[test]
    fn test_question_type_rename() {
        let q: Question = serde_json::from_value(json!({
            "id": "Q1",
            "type": "MCQ",
            "text": "2 + 2?",
            "options": ["3", "4"],
            "correctAnswer": "4",
            "points": 2
        }))
        .unwrap();
        assert_eq!(q.question_type, QuestionType::Mcq);
    }
}
