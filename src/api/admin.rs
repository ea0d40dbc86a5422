use super::helper;
use crate::AppState;
use crate::errors::AppError;
use crate::model::admin::{
    CourseChangeset, CourseResponse, NewCategory, NewCourse, NewCoursePrerequisite, NewStudent,
    NewTutor,
};
use crate::model::notification::{NewNotification, NotificationResponse, NotificationSnapshot};
use crate::model::status::{BookingStatus, NotificationAction, NotificationType, RecipientKind};
use crate::model::student::BookingResponse;
use crate::model::tutor::NewTutorCourse;
use crate::payloads::admin::{
    AcceptApplicationPayload, AcceptBookingPayload, AdminMarkNotificationReadPayload,
    AdminNotificationsParams, CreateCategoryPayload, CreateCoursePayload, CreateStudentPayload,
    CreateTutorPayload, DeclineBookingPayload, ListPendingApplicationsParams,
    RejectApplicationPayload, UpdateCoursePayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    admins::dsl as admins_dsl, bookings::dsl as bookings_dsl, categories::dsl as categories_dsl,
    course_prerequisites::dsl as prereq_dsl, courses::dsl as courses_dsl,
    notifications::dsl as notif_dsl, students::dsl as students_dsl,
    tutor_courses::dsl as tutor_courses_dsl, tutors::dsl as tutors_dsl,
};
use anyhow::anyhow;
use axum::extract::{Query, State};
use axum::response::Json;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::prelude::*;
use serde_json::json;
use tracing::log::warn;
use tracing::{debug, error, info, instrument};

/// Creates a catalog category.
///
/// Request Body: `CreateCategoryPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The new category ID (200 OK).
/// * `400 Bad Request`: If the name is blank.
#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Category name must not be blank.".to_string(),
        ));
    }

    let category_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(categories_dsl::categories)
            .values(&NewCategory { name })
            .returning(categories_dsl::id)
            .get_result::<i64>(conn)
    })
    .await?;

    info!("Created category {}", category_id);
    Ok(ApiResponse::ok(category_id))
}

/// Registers a student account.
///
/// Request Body: `CreateStudentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The new student ID (200 OK).
/// * `400 Bad Request`: If email or display name is blank.
#[instrument(skip(state, payload))]
pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    if payload.email.trim().is_empty() || payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Student email and display name must not be blank.".to_string(),
        ));
    }

    let new_student = NewStudent {
        email: payload.email,
        display_name: payload.display_name,
    };
    let student_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(students_dsl::students)
            .values(&new_student)
            .returning(students_dsl::id)
            .get_result::<i64>(conn)
    })
    .await?;

    info!("Created student {}", student_id);
    Ok(ApiResponse::ok(student_id))
}

/// Registers a tutor account.
///
/// Request Body: `CreateTutorPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The new tutor ID (200 OK).
/// * `400 Bad Request`: If fields are blank or the hourly rate is negative.
#[instrument(skip(state, payload))]
pub async fn create_tutor(
    State(state): State<AppState>,
    Json(payload): Json<CreateTutorPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    if payload.email.trim().is_empty() || payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Tutor email and display name must not be blank.".to_string(),
        ));
    }
    if payload.hourly_rate < BigDecimal::from(0) {
        return Err(AppError::BadRequest(format!(
            "Hourly rate must not be negative, got {}.",
            payload.hourly_rate
        )));
    }

    let new_tutor = NewTutor {
        email: payload.email,
        display_name: payload.display_name,
        hourly_rate: payload.hourly_rate,
        cv_reference: payload.cv_reference,
    };
    let tutor_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(tutors_dsl::tutors)
            .values(&new_tutor)
            .returning(tutors_dsl::id)
            .get_result::<i64>(conn)
    })
    .await?;

    info!("Created tutor {}", tutor_id);
    Ok(ApiResponse::ok(tutor_id))
}

/// Creates a course.
///
/// An admin may assign the instructor directly here (the single-write path
/// trivially satisfies the one-instructor invariant). When the course is
/// created unassigned, tutors whose linked courses share its category are
/// notified best-effort with a `course_match`; a failed push is logged and
/// never fails the call.
///
/// Request Body: `CreateCoursePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The new course ID (200 OK).
/// * `400 Bad Request`: If title/price/capacity are malformed.
/// * `404 Not Found`: If the category or instructor does not exist.
/// * `422 Unprocessable Entity`: If publishing without an instructor or a
///   prerequisite is unknown.
/// * `500 Internal Server Error`: If a database error or transaction
///   failure occurs.
#[instrument(skip(state, payload))]
pub async fn create_course(
    State(state): State<AppState>,
    Json(payload): Json<CreateCoursePayload>,
) -> Result<ApiResponse<i64>, AppError> {
    info!("Attempting to create course '{}'", payload.title);
    debug!("Create course payload: {:?}", payload);

    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Course title must not be blank.".to_string(),
        ));
    }
    if payload.price < BigDecimal::from(0) {
        return Err(AppError::BadRequest(format!(
            "Course price must not be negative, got {}.",
            payload.price
        )));
    }
    if payload.max_students <= 0 {
        return Err(AppError::BadRequest(format!(
            "Course capacity must be positive, got {}.",
            payload.max_students
        )));
    }
    if payload.is_published && payload.instructor_id.is_none() {
        return Err(AppError::UnprocessableEntity(
            "A course cannot be published without an instructor.".to_string(),
        ));
    }

    let category_name = helper::run_query(&state.pool, {
        let category_id = payload.category_id;
        move |conn| {
            categories_dsl::categories
                .find(category_id)
                .select(categories_dsl::name)
                .first::<String>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Category with ID {} not found.",
            payload.category_id
        ))
    })?;

    if let Some(instructor_id) = payload.instructor_id {
        let tutor_exists = helper::run_query(&state.pool, move |conn| {
            diesel::select(exists(tutors_dsl::tutors.find(instructor_id)))
                .get_result::<bool>(conn)
        })
        .await?;
        if !tutor_exists {
            return Err(AppError::NotFound(format!(
                "Tutor with ID {} not found.",
                instructor_id
            )));
        }
    }

    let mut prerequisite_ids = payload.prerequisite_ids.clone();
    prerequisite_ids.sort_unstable();
    prerequisite_ids.dedup();
    if !prerequisite_ids.is_empty() {
        let known = helper::run_query(&state.pool, {
            let ids = prerequisite_ids.clone();
            move |conn| {
                courses_dsl::courses
                    .filter(courses_dsl::id.eq_any(ids))
                    .count()
                    .get_result::<i64>(conn)
            }
        })
        .await?;
        if known != prerequisite_ids.len() as i64 {
            return Err(AppError::UnprocessableEntity(
                "One or more prerequisite courses do not exist.".to_string(),
            ));
        }
    }

    let course_title = payload.title.clone();
    let category_id = payload.category_id;
    let created_unassigned = payload.instructor_id.is_none();

    let new_course = NewCourse {
        title: payload.title,
        description: payload.description,
        category_id: payload.category_id,
        price: payload.price,
        level: payload.level,
        max_students: payload.max_students,
        instructor_id: payload.instructor_id,
        is_published: payload.is_published,
    };

    let conn = state.pool.get().await?;
    let course_id = conn
        .interact({
            let prerequisite_ids = prerequisite_ids.clone();
            move |conn_sync| {
                conn_sync.transaction::<i64, diesel::result::Error, _>(|tx_conn| {
                    let course_id = diesel::insert_into(courses_dsl::courses)
                        .values(&new_course)
                        .returning(courses_dsl::id)
                        .get_result::<i64>(tx_conn)?;

                    let prereq_rows: Vec<NewCoursePrerequisite> = prerequisite_ids
                        .iter()
                        .map(|prerequisite_id| NewCoursePrerequisite {
                            course_id,
                            prerequisite_id: *prerequisite_id,
                        })
                        .collect();
                    if !prereq_rows.is_empty() {
                        diesel::insert_into(prereq_dsl::course_prerequisites)
                            .values(&prereq_rows)
                            .execute(tx_conn)?;
                    }
                    Ok(course_id)
                })
            }
        })
        .await??;

    info!("Created course {}", course_id);

    // Low-priority push sharing the notification pipeline: tutors already
    // linked to this category hear about the unassigned course. Failure is
    // logged only and never fails course creation.
    if created_unassigned {
        if let Err(err) = push_course_match_notifications(
            &state,
            course_id,
            category_id,
            course_title,
            category_name,
        )
        .await
        {
            warn!(
                "Course-match push for course {} failed (non-fatal): {}",
                course_id, err
            );
        }
    }

    Ok(ApiResponse::ok(course_id))
}

async fn push_course_match_notifications(
    state: &AppState,
    course_id: i64,
    category_id: i64,
    course_title: String,
    category_name: String,
) -> Result<(), AppError> {
    let candidate_tutors = helper::run_query(&state.pool, move |conn| {
        tutor_courses_dsl::tutor_courses
            .inner_join(courses_dsl::courses)
            .filter(courses_dsl::category_id.eq(category_id))
            .select(tutor_courses_dsl::tutor_id)
            .distinct()
            .load::<i64>(conn)
    })
    .await?;

    if candidate_tutors.is_empty() {
        return Ok(());
    }

    let snapshot = NotificationSnapshot {
        course_id,
        course_title,
        category_name,
        tutor_id: None,
        tutor_name: None,
    };

    let conn = state.pool.get().await?;
    let notified = conn
        .interact(move |conn_sync| {
            conn_sync.transaction::<i64, diesel::result::Error, _>(|tx_conn| {
                let mut inserted = 0;
                for candidate in candidate_tutors {
                    let new_notification = NewNotification {
                        recipient_kind: RecipientKind::Tutor.as_str().to_string(),
                        recipient_id: candidate,
                        notification_type: NotificationType::CourseMatch.as_str().to_string(),
                        course_id: Some(course_id),
                        tutor_id: None,
                        payload: json!(snapshot),
                    };
                    if helper::insert_notification_deduped(tx_conn, &new_notification)? {
                        inserted += 1;
                    }
                }
                Ok(inserted)
            })
        })
        .await??;

    info!(
        "Course-match push for course {} notified {} tutors",
        course_id, notified
    );
    Ok(())
}

/// Updates a course with a partial changeset.
///
/// Price edits never rewrite historical booking prices: those were
/// snapshotted at payment time. Publishing requires an instructor; a
/// prerequisite list may not reference the course itself.
///
/// Request Body: `UpdateCoursePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CourseResponse`: the updated course (200 OK).
/// * `400 Bad Request`: If price/capacity are malformed.
/// * `404 Not Found`: If the course, category or instructor is unknown.
/// * `422 Unprocessable Entity`: If publishing without an instructor or the
///   prerequisites are invalid.
#[instrument(skip(state, payload))]
pub async fn update_course(
    State(state): State<AppState>,
    Json(payload): Json<UpdateCoursePayload>,
) -> Result<ApiResponse<CourseResponse>, AppError> {
    info!("Attempting to update course {}", payload.course_id);
    debug!("Update course payload: {:?}", payload);

    let current = helper::run_query(&state.pool, {
        let course_id = payload.course_id;
        move |conn| {
            courses_dsl::courses
                .find(course_id)
                .first::<CourseResponse>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("Course with ID {} not found.", payload.course_id))
    })?;

    if let Some(price) = &payload.price {
        if *price < BigDecimal::from(0) {
            return Err(AppError::BadRequest(format!(
                "Course price must not be negative, got {}.",
                price
            )));
        }
    }
    if let Some(max_students) = payload.max_students {
        if max_students <= 0 {
            return Err(AppError::BadRequest(format!(
                "Course capacity must be positive, got {}.",
                max_students
            )));
        }
    }

    if let Some(category_id) = payload.category_id {
        let category_exists = helper::run_query(&state.pool, move |conn| {
            diesel::select(exists(categories_dsl::categories.find(category_id)))
                .get_result::<bool>(conn)
        })
        .await?;
        if !category_exists {
            return Err(AppError::NotFound(format!(
                "Category with ID {} not found.",
                category_id
            )));
        }
    }

    if let Some(instructor_id) = payload.instructor_id {
        let tutor_exists = helper::run_query(&state.pool, move |conn| {
            diesel::select(exists(tutors_dsl::tutors.find(instructor_id)))
                .get_result::<bool>(conn)
        })
        .await?;
        if !tutor_exists {
            return Err(AppError::NotFound(format!(
                "Tutor with ID {} not found.",
                instructor_id
            )));
        }
    }

    let final_instructor = payload.instructor_id.or(current.instructor_id);
    let final_published = payload.is_published.unwrap_or(current.is_published);
    if final_published && final_instructor.is_none() {
        return Err(AppError::UnprocessableEntity(
            "A course cannot be published without an instructor.".to_string(),
        ));
    }

    let prerequisite_ids = match &payload.prerequisite_ids {
        Some(ids) => {
            let mut ids = ids.clone();
            ids.sort_unstable();
            ids.dedup();
            if ids.contains(&payload.course_id) {
                return Err(AppError::UnprocessableEntity(
                    "A course cannot be its own prerequisite.".to_string(),
                ));
            }
            if !ids.is_empty() {
                let known = helper::run_query(&state.pool, {
                    let ids = ids.clone();
                    move |conn| {
                        courses_dsl::courses
                            .filter(courses_dsl::id.eq_any(ids))
                            .count()
                            .get_result::<i64>(conn)
                    }
                })
                .await?;
                if known != ids.len() as i64 {
                    return Err(AppError::UnprocessableEntity(
                        "One or more prerequisite courses do not exist.".to_string(),
                    ));
                }
            }
            Some(ids)
        }
        None => None,
    };

    let changeset = CourseChangeset {
        title: payload.title,
        description: payload.description,
        category_id: payload.category_id,
        price: payload.price,
        level: payload.level,
        max_students: payload.max_students,
        is_published: payload.is_published,
        updated_at: Some(Utc::now()),
    };

    let conn = state.pool.get().await?;
    let updated = conn
        .interact({
            let course_id = payload.course_id;
            let instructor_id = payload.instructor_id;
            move |conn_sync| {
                conn_sync.transaction::<CourseResponse, diesel::result::Error, _>(|tx_conn| {
                    diesel::update(courses_dsl::courses.find(course_id))
                        .set(&changeset)
                        .execute(tx_conn)?;

                    if let Some(instructor_id) = instructor_id {
                        diesel::update(courses_dsl::courses.find(course_id))
                            .set(courses_dsl::instructor_id.eq(instructor_id))
                            .execute(tx_conn)?;
                    }

                    if let Some(ids) = prerequisite_ids {
                        diesel::delete(
                            prereq_dsl::course_prerequisites
                                .filter(prereq_dsl::course_id.eq(course_id)),
                        )
                        .execute(tx_conn)?;
                        let rows: Vec<NewCoursePrerequisite> = ids
                            .iter()
                            .map(|prerequisite_id| NewCoursePrerequisite {
                                course_id,
                                prerequisite_id: *prerequisite_id,
                            })
                            .collect();
                        if !rows.is_empty() {
                            diesel::insert_into(prereq_dsl::course_prerequisites)
                                .values(&rows)
                                .execute(tx_conn)?;
                        }
                    }

                    courses_dsl::courses
                        .find(course_id)
                        .first::<CourseResponse>(tx_conn)
                })
            }
        })
        .await??;

    info!("Updated course {}", payload.course_id);
    Ok(ApiResponse::ok(updated))
}

/// Queries the full course catalog, published or not.
#[instrument(skip(state))]
pub async fn list_courses(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<CourseResponse>>, AppError> {
    let courses = helper::run_query(&state.pool, |conn| {
        courses_dsl::courses
            .order(courses_dsl::id.asc())
            .load::<CourseResponse>(conn)
    })
    .await?;
    Ok(ApiResponse::ok(courses))
}

/// Moves a booking from `requested` to `awaiting_payment`.
///
/// Request Body: `AcceptBookingPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the booking does not exist.
/// * `422 Unprocessable Entity`: If the booking is not in `requested`.
#[instrument(skip(state, payload))]
pub async fn accept_booking(
    State(state): State<AppState>,
    Json(payload): Json<AcceptBookingPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!("Accepting booking {}", payload.booking_id);
    transition_booking(
        &state,
        payload.booking_id,
        BookingStatus::Requested,
        BookingStatus::AwaitingPayment,
    )
    .await
}

/// Moves a booking from `requested` to the terminal `declined`.
///
/// Request Body: `DeclineBookingPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the booking does not exist.
/// * `422 Unprocessable Entity`: If the booking is not in `requested`.
#[instrument(skip(state, payload))]
pub async fn decline_booking(
    State(state): State<AppState>,
    Json(payload): Json<DeclineBookingPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!("Declining booking {}", payload.booking_id);
    transition_booking(
        &state,
        payload.booking_id,
        BookingStatus::Requested,
        BookingStatus::Declined,
    )
    .await
}

/// Queries the admin's active booking queue (`requested` and
/// `awaiting_payment`), oldest first. Booking creation emits no
/// notification; admins poll this queue instead.
#[instrument(skip(state))]
pub async fn list_active_bookings(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<BookingResponse>>, AppError> {
    let active = [
        BookingStatus::Requested.as_str(),
        BookingStatus::AwaitingPayment.as_str(),
    ];
    let bookings = helper::run_query(&state.pool, move |conn| {
        bookings_dsl::bookings
            .filter(bookings_dsl::status.eq_any(active))
            .order((bookings_dsl::created_at.asc(), bookings_dsl::id.asc()))
            .load::<BookingResponse>(conn)
    })
    .await?;

    info!("Fetched {} active bookings", bookings.len());
    Ok(ApiResponse::ok(bookings))
}

/// Queries this admin's actionable tutor applications.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<NotificationResponse>` (200 OK).
/// * `404 Not Found`: If the admin does not exist.
#[instrument(skip(state))]
pub async fn list_pending_applications(
    State(state): State<AppState>,
    Query(params): Query<ListPendingApplicationsParams>,
) -> Result<ApiResponse<Vec<NotificationResponse>>, AppError> {
    ensure_admin_exists(&state, params.admin_id).await?;

    let applications = helper::run_query(&state.pool, {
        let admin_id = params.admin_id;
        move |conn| {
            notif_dsl::notifications
                .filter(notif_dsl::recipient_kind.eq(RecipientKind::Admin.as_str()))
                .filter(notif_dsl::recipient_id.eq(admin_id))
                .filter(
                    notif_dsl::notification_type
                        .eq(NotificationType::TutorApplication.as_str()),
                )
                .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str()))
                .order((notif_dsl::created_at.asc(), notif_dsl::id.asc()))
                .load::<NotificationResponse>(conn)
        }
    })
    .await?;

    info!(
        "Fetched {} pending applications for admin {}",
        applications.len(),
        params.admin_id
    );
    Ok(ApiResponse::ok(applications))
}

/// Accepts a tutor's application for a course.
///
/// This is the critical race point of the matching workflow: the first
/// write is a conditional update that sets the instructor only while the
/// course is still unassigned. A losing accept (second admin, double click)
/// aborts with `409 Conflict` before any side effect. The winning accept,
/// in one transaction, resolves the winning application as `applied`,
/// retires every other pending application for the course, links the tutor
/// to the course, and fans out `course_accepted` to the winner and
/// `course_assigned_elsewhere` to every other pending applicant.
///
/// Request Body: `AcceptApplicationPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the course or tutor no longer exists.
/// * `409 Conflict`: If the course is already assigned; the caller should
///   refresh its view rather than retry.
/// * `500 Internal Server Error`: If a database error or transaction
///   failure occurs.
#[instrument(skip(state, payload))]
pub async fn accept_application(
    State(state): State<AppState>,
    Json(payload): Json<AcceptApplicationPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Accepting application of tutor {} for course {}",
        payload.tutor_id, payload.course_id
    );

    let winner_name = helper::run_query(&state.pool, {
        let tutor_id = payload.tutor_id;
        move |conn| {
            tutors_dsl::tutors
                .find(tutor_id)
                .select(tutors_dsl::display_name)
                .first::<String>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Tutor with ID {} not found.", payload.tutor_id)))?;

    let course = helper::run_query(&state.pool, {
        let course_id = payload.course_id;
        move |conn| {
            courses_dsl::courses
                .inner_join(categories_dsl::categories)
                .filter(courses_dsl::id.eq(course_id))
                .select((courses_dsl::title, categories_dsl::name))
                .first::<(String, String)>(conn)
                .optional()
        }
    })
    .await?;
    let (course_title, category_name) = course.ok_or_else(|| {
        AppError::NotFound(format!("Course with ID {} not found.", payload.course_id))
    })?;

    let snapshot = NotificationSnapshot {
        course_id: payload.course_id,
        course_title,
        category_name,
        tutor_id: Some(payload.tutor_id),
        tutor_name: Some(winner_name),
    };

    let conn = state.pool.get().await?;
    conn.interact({
        let course_id = payload.course_id;
        let tutor_id = payload.tutor_id;
        move |conn_sync| {
            conn_sync.transaction::<(), AppError, _>(|tx_conn| {
                // First write decides the race; everything below only runs
                // for the winner and is rolled back with it on failure.
                let rows_affected = diesel::update(
                    courses_dsl::courses
                        .filter(courses_dsl::id.eq(course_id))
                        .filter(courses_dsl::instructor_id.is_null()),
                )
                .set((
                    courses_dsl::instructor_id.eq(tutor_id),
                    courses_dsl::updated_at.eq(Utc::now()),
                ))
                .execute(tx_conn)?;

                if rows_affected == 0 {
                    let current = courses_dsl::courses
                        .find(course_id)
                        .select(courses_dsl::instructor_id)
                        .first::<Option<i64>>(tx_conn)
                        .optional()?;
                    return match current {
                        Some(Some(assigned)) => Err(AppError::Conflict(format!(
                            "Course {course_id} is already assigned to tutor {assigned}.",
                        ))),
                        _ => Err(AppError::NotFound(format!(
                            "Course with ID {course_id} not found.",
                        ))),
                    };
                }

                diesel::update(
                    notif_dsl::notifications
                        .filter(
                            notif_dsl::notification_type
                                .eq(NotificationType::TutorApplication.as_str()),
                        )
                        .filter(notif_dsl::course_id.eq(course_id))
                        .filter(notif_dsl::tutor_id.eq(tutor_id))
                        .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str())),
                )
                .set(notif_dsl::action_status.eq(NotificationAction::Applied.as_str()))
                .execute(tx_conn)?;

                let losing_applicants: Vec<i64> = notif_dsl::notifications
                    .filter(
                        notif_dsl::notification_type
                            .eq(NotificationType::TutorApplication.as_str()),
                    )
                    .filter(notif_dsl::course_id.eq(course_id))
                    .filter(notif_dsl::tutor_id.is_not_null())
                    .filter(notif_dsl::tutor_id.ne(tutor_id))
                    .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str()))
                    .select(notif_dsl::tutor_id.assume_not_null())
                    .distinct()
                    .load::<i64>(tx_conn)?;

                // Retire the other applications so no admin acts on them.
                diesel::update(
                    notif_dsl::notifications
                        .filter(
                            notif_dsl::notification_type
                                .eq(NotificationType::TutorApplication.as_str()),
                        )
                        .filter(notif_dsl::course_id.eq(course_id))
                        .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str())),
                )
                .set(notif_dsl::action_status.eq(NotificationAction::Dismissed.as_str()))
                .execute(tx_conn)?;

                diesel::insert_into(tutor_courses_dsl::tutor_courses)
                    .values(&NewTutorCourse {
                        tutor_id,
                        course_id,
                    })
                    .on_conflict((
                        tutor_courses_dsl::tutor_id,
                        tutor_courses_dsl::course_id,
                    ))
                    .do_nothing()
                    .execute(tx_conn)?;

                helper::insert_notification_deduped(
                    tx_conn,
                    &NewNotification {
                        recipient_kind: RecipientKind::Tutor.as_str().to_string(),
                        recipient_id: tutor_id,
                        notification_type: NotificationType::CourseAccepted.as_str().to_string(),
                        course_id: Some(course_id),
                        tutor_id: Some(tutor_id),
                        payload: json!(snapshot),
                    },
                )?;

                for losing_tutor in losing_applicants {
                    helper::insert_notification_deduped(
                        tx_conn,
                        &NewNotification {
                            recipient_kind: RecipientKind::Tutor.as_str().to_string(),
                            recipient_id: losing_tutor,
                            notification_type: NotificationType::CourseAssignedElsewhere
                                .as_str()
                                .to_string(),
                            course_id: Some(course_id),
                            tutor_id: Some(tutor_id),
                            payload: json!(snapshot),
                        },
                    )?;
                }

                Ok(())
            })
        }
    })
    .await??;

    info!(
        "Course {} assigned to tutor {}",
        payload.course_id, payload.tutor_id
    );
    Ok(ApiResponse::ok(true))
}

/// Rejects a tutor's application for a course.
///
/// Resolves the pending application notifications as `dismissed` and sends
/// the tutor a `course_rejected`. The course's instructor is untouched and
/// the tutor is free to apply again later.
///
/// Request Body: `RejectApplicationPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the course or tutor is unknown, or no pending
///   application exists for the pair.
/// * `500 Internal Server Error`: If a database error or transaction
///   failure occurs.
#[instrument(skip(state, payload))]
pub async fn reject_application(
    State(state): State<AppState>,
    Json(payload): Json<RejectApplicationPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Rejecting application of tutor {} for course {}",
        payload.tutor_id, payload.course_id
    );

    let tutor_name = helper::run_query(&state.pool, {
        let tutor_id = payload.tutor_id;
        move |conn| {
            tutors_dsl::tutors
                .find(tutor_id)
                .select(tutors_dsl::display_name)
                .first::<String>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Tutor with ID {} not found.", payload.tutor_id)))?;

    let course = helper::run_query(&state.pool, {
        let course_id = payload.course_id;
        move |conn| {
            courses_dsl::courses
                .inner_join(categories_dsl::categories)
                .filter(courses_dsl::id.eq(course_id))
                .select((courses_dsl::title, categories_dsl::name))
                .first::<(String, String)>(conn)
                .optional()
        }
    })
    .await?;
    let (course_title, category_name) = course.ok_or_else(|| {
        AppError::NotFound(format!("Course with ID {} not found.", payload.course_id))
    })?;

    let snapshot = NotificationSnapshot {
        course_id: payload.course_id,
        course_title,
        category_name,
        tutor_id: Some(payload.tutor_id),
        tutor_name: Some(tutor_name),
    };

    let conn = state.pool.get().await?;
    conn.interact({
        let course_id = payload.course_id;
        let tutor_id = payload.tutor_id;
        move |conn_sync| {
            conn_sync.transaction::<(), AppError, _>(|tx_conn| {
                let resolved = diesel::update(
                    notif_dsl::notifications
                        .filter(
                            notif_dsl::notification_type
                                .eq(NotificationType::TutorApplication.as_str()),
                        )
                        .filter(notif_dsl::course_id.eq(course_id))
                        .filter(notif_dsl::tutor_id.eq(tutor_id))
                        .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str())),
                )
                .set(notif_dsl::action_status.eq(NotificationAction::Dismissed.as_str()))
                .execute(tx_conn)?;

                if resolved == 0 {
                    return Err(AppError::NotFound(format!(
                        "No pending application of tutor {tutor_id} for course {course_id}.",
                    )));
                }

                helper::insert_notification_deduped(
                    tx_conn,
                    &NewNotification {
                        recipient_kind: RecipientKind::Tutor.as_str().to_string(),
                        recipient_id: tutor_id,
                        notification_type: NotificationType::CourseRejected.as_str().to_string(),
                        course_id: Some(course_id),
                        tutor_id: Some(tutor_id),
                        payload: json!(snapshot),
                    },
                )?;

                Ok(())
            })
        }
    })
    .await??;

    info!(
        "Application of tutor {} for course {} rejected",
        payload.tutor_id, payload.course_id
    );
    Ok(ApiResponse::ok(true))
}

/// Queries an admin's notifications, newest first.
#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<AdminNotificationsParams>,
) -> Result<ApiResponse<Vec<NotificationResponse>>, AppError> {
    ensure_admin_exists(&state, params.admin_id).await?;

    let notifications = helper::run_query(&state.pool, {
        let admin_id = params.admin_id;
        move |conn| {
            notif_dsl::notifications
                .filter(notif_dsl::recipient_kind.eq(RecipientKind::Admin.as_str()))
                .filter(notif_dsl::recipient_id.eq(admin_id))
                .order((notif_dsl::created_at.desc(), notif_dsl::id.desc()))
                .load::<NotificationResponse>(conn)
        }
    })
    .await?;

    Ok(ApiResponse::ok(notifications))
}

/// Marks one of the admin's notifications as read. Idempotent.
#[instrument(skip(state, payload))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Json(payload): Json<AdminMarkNotificationReadPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    let rows_affected = helper::run_query(&state.pool, {
        let notification_id = payload.notification_id;
        let admin_id = payload.admin_id;
        move |conn| {
            diesel::update(
                notif_dsl::notifications
                    .filter(notif_dsl::id.eq(notification_id))
                    .filter(notif_dsl::recipient_kind.eq(RecipientKind::Admin.as_str()))
                    .filter(notif_dsl::recipient_id.eq(admin_id)),
            )
            .set(notif_dsl::is_read.eq(true))
            .execute(conn)
        }
    })
    .await?;

    match rows_affected {
        1 => Ok(ApiResponse::ok(true)),
        0 => Err(AppError::NotFound(format!(
            "Notification {} not found for admin {}.",
            payload.notification_id, payload.admin_id
        ))),
        n => {
            error!(
                "Expected 1 row to be affected by mark-read, but {} rows were affected for notification {}",
                n, payload.notification_id
            );
            Err(AppError::InternalServerError(anyhow!(
                "Mark-read affected {} rows, expected 1",
                n
            )))
        }
    }
}

async fn ensure_admin_exists(state: &AppState, admin_id: i64) -> Result<(), AppError> {
    let admin_exists = helper::run_query(&state.pool, move |conn| {
        diesel::select(exists(admins_dsl::admins.find(admin_id))).get_result::<bool>(conn)
    })
    .await?;
    if admin_exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "Admin with ID {admin_id} not found."
        )))
    }
}

async fn transition_booking(
    state: &AppState,
    booking_id: i64,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<ApiResponse<bool>, AppError> {
    let rows_affected = helper::run_query(&state.pool, move |conn| {
        diesel::update(
            bookings_dsl::bookings
                .filter(bookings_dsl::id.eq(booking_id))
                .filter(bookings_dsl::status.eq(from.as_str())),
        )
        .set((
            bookings_dsl::status.eq(to.as_str()),
            bookings_dsl::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
    })
    .await?;

    match rows_affected {
        1 => {
            info!("Booking {} moved {} -> {}", booking_id, from, to);
            Ok(ApiResponse::ok(true))
        }
        0 => {
            let status = helper::run_query(&state.pool, move |conn| {
                bookings_dsl::bookings
                    .find(booking_id)
                    .select(bookings_dsl::status)
                    .first::<String>(conn)
                    .optional()
            })
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Booking with ID {booking_id} not found."))
            })?;
            warn!(
                "Booking {} cannot move {} -> {} from status '{}'",
                booking_id, from, to, status
            );
            Err(AppError::UnprocessableEntity(format!(
                "Booking {booking_id} cannot move to '{to}' from status '{status}'.",
            )))
        }
        n => {
            error!(
                "Expected 1 row to be affected by transition, but {} rows were affected for booking {}",
                n, booking_id
            );
            Err(AppError::InternalServerError(anyhow!(
                "Transition affected {} rows, expected 1",
                n
            )))
        }
    }
}
