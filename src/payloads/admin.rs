use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateCategoryPayload {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateStudentPayload {
    pub email: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateTutorPayload {
    pub email: String,
    pub display_name: String,
    pub hourly_rate: BigDecimal,
    pub cv_reference: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateCoursePayload {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub price: BigDecimal,
    pub level: String,
    pub max_students: i32,
    pub instructor_id: Option<i64>,
    pub is_published: bool,
    #[serde(default)]
    pub prerequisite_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UpdateCoursePayload {
    pub course_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<BigDecimal>,
    pub level: Option<String>,
    pub max_students: Option<i32>,
    /// Admin-initiated direct assignment; leaving it out keeps the current
    /// instructor. There is no unassignment path.
    pub instructor_id: Option<i64>,
    pub is_published: Option<bool>,
    pub prerequisite_ids: Option<Vec<i64>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AcceptBookingPayload {
    pub booking_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeclineBookingPayload {
    pub booking_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AcceptApplicationPayload {
    pub course_id: i64,
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RejectApplicationPayload {
    pub course_id: i64,
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ListPendingApplicationsParams {
    pub admin_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminNotificationsParams {
    pub admin_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminMarkNotificationReadPayload {
    pub notification_id: i64,
    pub admin_id: i64,
}
