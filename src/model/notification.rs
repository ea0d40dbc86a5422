use crate::schema::notifications;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Denormalized payload frozen at send time so a notification stays
/// human-readable after the source course or tutor is edited or removed.
/// Never re-joined against the live catalog.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NotificationSnapshot {
    pub course_id: i64,
    pub course_title: String,
    pub category_name: String,
    pub tutor_id: Option<i64>,
    pub tutor_name: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub recipient_kind: String,
    pub recipient_id: i64,
    pub notification_type: String,
    pub course_id: Option<i64>,
    pub tutor_id: Option<i64>,
    pub payload: JsonValue,
    // is_read defaults to false, action_status to 'none',
    // created_at to CURRENT_TIMESTAMP
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct NotificationResponse {
    pub id: i64,
    pub recipient_kind: String,
    pub recipient_id: i64,
    pub notification_type: String,
    pub course_id: Option<i64>,
    pub tutor_id: Option<i64>,
    pub payload: JsonValue,
    pub is_read: bool,
    pub action_status: String,
    pub created_at: DateTime<Utc>,
}
