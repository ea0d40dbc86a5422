use crate::schema::{admins, categories, course_prerequisites, courses, students, tutors};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{AsChangeset, Insertable, Queryable};
use serde::{Deserialize, Serialize};

#[derive(Insertable, Debug)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub name: String,
    // created_at has a DB default
}

#[derive(Insertable, Debug)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub email: String,
    pub display_name: String,
    // created_at, last_active have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tutors)]
pub struct NewTutor {
    pub email: String,
    pub display_name: String,
    pub hourly_rate: BigDecimal,
    pub cv_reference: Option<String>,
    // created_at, last_active have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = admins)]
pub struct NewAdmin {
    pub email: String,
    pub display_name: String,
    // created_at, last_active have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = courses)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub price: BigDecimal,
    pub level: String,
    pub max_students: i32,
    pub instructor_id: Option<i64>,
    pub is_published: bool,
    // created_at, updated_at have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = course_prerequisites)]
pub struct NewCoursePrerequisite {
    pub course_id: i64,
    pub prerequisite_id: i64,
}

/// Partial course update. `instructor_id` is not part of the changeset:
/// the admin-initiated assignment path writes it explicitly so a partial
/// payload can never null it out.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = courses)]
pub struct CourseChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<BigDecimal>,
    pub level: Option<String>,
    pub max_students: Option<i32>,
    pub is_published: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Queryable)]
pub struct CourseResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub price: BigDecimal,
    pub level: String,
    pub max_students: i32,
    pub instructor_id: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
