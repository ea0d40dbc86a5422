use crate::collaborators::questions::GeneratedQuestion;
use crate::schema::{assignments, bookings, enrollments};
use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Insertable, Debug)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub student_id: i64,
    pub course_id: i64,
    pub tutor_id: i64,
    pub status: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    // price stays NULL until payment confirms it
    // created_at, updated_at have DB defaults
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct BookingResponse {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub tutor_id: i64,
    pub status: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub price: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = enrollments)]
pub struct NewEnrollment {
    pub student_id: i64,
    pub course_id: i64,
    pub booking_id: i64,
    pub progress: i32,
    pub completed_resource_ids: JsonValue,
    // assignment_id stays NULL until the first attempt is generated
    // created_at has a DB default
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct EnrollmentResponse {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub booking_id: i64,
    pub progress: i32,
    pub completed_resource_ids: JsonValue,
    pub assignment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PayBookingResponse {
    pub booking_id: i64,
    pub status: String,
    pub price: BigDecimal,
    pub receipt: String,
    pub enrollment_id: i64,
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct PublishedCourseResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub price: BigDecimal,
    pub level: String,
    pub max_students: i32,
    pub instructor_id: Option<i64>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = assignments)]
pub struct NewAssignment {
    pub booking_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub questions: JsonValue,
    pub status: String,
    // student_answers and numeric_grade stay NULL until submission
    // created_at has a DB default, graded_at is nullable
}

/// Full stored attempt, including grading keys. Never serialized outward.
#[derive(Debug, Queryable)]
pub struct AssignmentRow {
    pub id: i64,
    pub booking_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub questions: JsonValue,
    pub student_answers: Option<JsonValue>,
    pub status: String,
    pub numeric_grade: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl AssignmentRow {
    pub fn parse_questions(&self) -> anyhow::Result<Vec<GeneratedQuestion>> {
        serde_json::from_value(self.questions.clone())
            .with_context(|| format!("corrupt question set stored on assignment {}", self.id))
    }
}

/// What the student is allowed to see of a question: the correct index is
/// stripped before serialization.
#[derive(Serialize, Deserialize, Debug)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
}

impl From<GeneratedQuestion> for QuestionView {
    fn from(question: GeneratedQuestion) -> Self {
        QuestionView {
            text: question.text,
            options: question.options,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AssignmentView {
    pub id: i64,
    pub booking_id: i64,
    pub course_id: i64,
    pub status: String,
    pub questions: Vec<QuestionView>,
    pub student_answers: Option<Vec<Option<usize>>>,
    pub numeric_grade: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl AssignmentView {
    pub fn from_row(row: AssignmentRow) -> anyhow::Result<Self> {
        let questions = row.parse_questions()?;
        let student_answers = match row.student_answers {
            Some(raw) => Some(
                serde_json::from_value(raw).with_context(|| {
                    format!("corrupt answer set stored on assignment {}", row.id)
                })?,
            ),
            None => None,
        };

        Ok(AssignmentView {
            id: row.id,
            booking_id: row.booking_id,
            course_id: row.course_id,
            status: row.status,
            questions: questions.into_iter().map(QuestionView::from).collect(),
            student_answers,
            numeric_grade: row.numeric_grade,
            created_at: row.created_at,
            graded_at: row.graded_at,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateAssignmentResponse {
    pub assignment: AssignmentView,
    pub already_exists: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitAssignmentResponse {
    pub assignment_id: i64,
    pub numeric_grade: i32,
    pub grade_band: String,
    pub correct_count: usize,
    pub question_count: usize,
}
