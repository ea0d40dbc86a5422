use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct ApplyToCoursePayload {
    pub tutor_id: i64,
    pub course_id: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AvailabilitySlotData {
    pub day: NaiveDate,
    pub start_minute: i32,
    pub end_minute: i32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SetAvailabilityPayload {
    pub tutor_id: i64,
    pub slots: Vec<AvailabilitySlotData>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetAvailabilityParams {
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetCourseSuggestionsParams {
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TutorNotificationsParams {
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MarkNotificationReadPayload {
    pub notification_id: i64,
    pub tutor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DismissNotificationPayload {
    pub notification_id: i64,
    pub tutor_id: i64,
}
