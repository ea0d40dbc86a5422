use crate::schema::{tutor_availability, tutor_courses};
use chrono::NaiveDate;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

#[derive(Insertable, Debug)]
#[diesel(table_name = tutor_availability)]
pub struct NewAvailabilitySlot {
    pub tutor_id: i64,
    pub day: NaiveDate,
    pub start_minute: i32,
    pub end_minute: i32,
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct AvailabilitySlotResponse {
    pub id: i64,
    pub tutor_id: i64,
    pub day: NaiveDate,
    pub start_minute: i32,
    pub end_minute: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tutor_courses)]
pub struct NewTutorCourse {
    pub tutor_id: i64,
    pub course_id: i64,
}
