use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateBookingPayload {
    pub student_id: i64,
    pub course_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CancelBookingPayload {
    pub booking_id: i64,
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PayBookingPayload {
    pub booking_id: i64,
    pub student_id: i64,
    pub method: String,
    pub reference: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetStudentBookingsParams {
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetEnrollmentParams {
    pub booking_id: i64,
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UpdateEnrollmentProgressPayload {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub progress: i32,
    pub completed_resource_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateAssignmentPayload {
    pub booking_id: i64,
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetAssignmentParams {
    pub assignment_id: i64,
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ListAssignmentAttemptsParams {
    pub booking_id: i64,
    pub student_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitAssignmentPayload {
    pub assignment_id: i64,
    pub student_id: i64,
    pub answers: Vec<Option<usize>>,
}
