use super::helper;
use crate::AppState;
use crate::errors::AppError;
use crate::model::notification::{NewNotification, NotificationResponse, NotificationSnapshot};
use crate::model::status::{NotificationAction, NotificationType, RecipientKind};
use crate::model::tutor::{AvailabilitySlotResponse, NewAvailabilitySlot};
use crate::payloads::tutor::{
    ApplyToCoursePayload, DismissNotificationPayload, GetAvailabilityParams,
    GetCourseSuggestionsParams, MarkNotificationReadPayload, SetAvailabilityPayload,
    TutorNotificationsParams,
};
use crate::response::ApiResponse;
use crate::schema::{
    admins::dsl as admins_dsl, categories::dsl as categories_dsl, courses::dsl as courses_dsl,
    notifications::dsl as notif_dsl, tutor_availability::dsl as availability_dsl,
    tutors::dsl as tutors_dsl,
};
use anyhow::anyhow;
use axum::extract::{Query, State};
use axum::response::Json;
use diesel::dsl::exists;
use diesel::prelude::*;
use serde_json::json;
use tracing::log::warn;
use tracing::{debug, error, info, instrument};

/// Applies to teach a course.
///
/// Fans one `tutor_application` notification out to every admin, carrying a
/// denormalized snapshot of the course, category and tutor names so the item
/// stays readable even after catalog edits. Re-applying while an application
/// is still pending is absorbed by the dedupe guard.
///
/// Request Body: `ApplyToCoursePayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The number of admins newly notified (200 OK).
/// * `404 Not Found`: If the tutor or course does not exist.
/// * `409 Conflict`: If the course is already assigned to this same tutor.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(state, payload))]
pub async fn apply_to_course(
    State(state): State<AppState>,
    Json(payload): Json<ApplyToCoursePayload>,
) -> Result<ApiResponse<i64>, AppError> {
    info!(
        "Tutor {} applying to course {}",
        payload.tutor_id, payload.course_id
    );
    debug!("Apply payload: {:?}", payload);

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
                .select((
                    courses_dsl::title,
                    courses_dsl::instructor_id,
                    categories_dsl::name,
                ))
                .first::<(String, Option<i64>, String)>(conn)
                .optional()
        }
    })
    .await?;

    let (course_title, instructor_id, category_name) = match course {
        Some(row) => row,
        None => {
            return Err(AppError::NotFound(format!(
                "Course with ID {} not found.",
                payload.course_id
            )));
        }
    };

    if instructor_id == Some(payload.tutor_id) {
        return Err(AppError::Conflict(format!(
            "Tutor {} already teaches course {}.",
            payload.tutor_id, payload.course_id
        )));
    }

    let admin_ids = helper::run_query(&state.pool, |conn| {
        admins_dsl::admins.select(admins_dsl::id).load::<i64>(conn)
    })
    .await?;

    let snapshot = NotificationSnapshot {
        course_id: payload.course_id,
        course_title,
        category_name,
        tutor_id: Some(payload.tutor_id),
        tutor_name: Some(tutor_name),
    };

    let conn = state.pool.get().await?;
    let notified = conn
        .interact({
            let course_id = payload.course_id;
            let tutor_id = payload.tutor_id;
            move |conn_sync| {
                conn_sync.transaction::<i64, diesel::result::Error, _>(|tx_conn| {
                    let mut inserted = 0;
                    for admin_id in admin_ids {
                        let new_notification = NewNotification {
                            recipient_kind: RecipientKind::Admin.as_str().to_string(),
                            recipient_id: admin_id,
                            notification_type: NotificationType::TutorApplication
                                .as_str()
                                .to_string(),
                            course_id: Some(course_id),
                            tutor_id: Some(tutor_id),
                            payload: json!(snapshot),
                        };
                        if helper::insert_notification_deduped(tx_conn, &new_notification)? {
                            inserted += 1;
                        }
                    }
                    Ok(inserted)
                })
            }
        })
        .await??;

    info!(
        "Tutor {} application for course {} notified {} admins",
        payload.tutor_id, payload.course_id, notified
    );
    Ok(ApiResponse::ok(notified))
}

/// Suggests catalog courses matching a tutor's CV.
///
/// Delegates to the CV-matching collaborator over the published catalog.
/// The result pre-populates UI choices and is never authoritative; a tutor
/// without a CV on file simply gets no suggestions.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<i64>`: Suggested course IDs (200 OK).
/// * `404 Not Found`: If the tutor does not exist.
/// * `502 Bad Gateway`: If the matching collaborator failed.
#[instrument(skip(state))]
pub async fn get_course_suggestions(
    State(state): State<AppState>,
    Query(params): Query<GetCourseSuggestionsParams>,
) -> Result<ApiResponse<Vec<i64>>, AppError> {
    info!("Fetching course suggestions for tutor {}", params.tutor_id);

    let cv_reference = helper::run_query(&state.pool, {
        let tutor_id = params.tutor_id;
        move |conn| {
            tutors_dsl::tutors
                .find(tutor_id)
                .select(tutors_dsl::cv_reference)
                .first::<Option<String>>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Tutor with ID {} not found.", params.tutor_id)))?;

    let Some(cv_reference) = cv_reference else {
        info!(
            "Tutor {} has no CV on file, returning no suggestions",
            params.tutor_id
        );
        return Ok(ApiResponse::ok(Vec::new()));
    };

    let catalog = helper::run_query(&state.pool, |conn| {
        courses_dsl::courses
            .filter(courses_dsl::is_published.eq(true))
            .select((courses_dsl::id, courses_dsl::title))
            .load::<(i64, String)>(conn)
    })
    .await?;

    let suggested = state
        .course_suggester
        .suggest_courses(&cv_reference, &catalog)
        .await
        .map_err(|err| {
            error!(
                "CV matching failed for tutor {}: {}",
                params.tutor_id, err
            );
            AppError::BadGateway(format!("CV matching failed: {err}"))
        })?;

    info!(
        "Suggesting {} of {} published courses to tutor {}",
        suggested.len(),
        catalog.len(),
        params.tutor_id
    );
    Ok(ApiResponse::ok(suggested))
}

/// Replaces a tutor's office-hour availability in one transaction.
///
/// Each slot must satisfy `0 <= start_minute < end_minute <= 1440`.
///
/// Request Body: `SetAvailabilityPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `i64`: The number of slots now stored (200 OK).
/// * `400 Bad Request`: If any slot is malformed.
/// * `404 Not Found`: If the tutor does not exist.
/// * `500 Internal Server Error`: If a database error or transaction
///   failure occurs.
#[instrument(skip(state, payload))]
pub async fn set_availability(
    State(state): State<AppState>,
    Json(payload): Json<SetAvailabilityPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    info!(
        "Replacing availability for tutor {} with {} slots",
        payload.tutor_id,
        payload.slots.len()
    );

    for (index, slot) in payload.slots.iter().enumerate() {
        if slot.start_minute < 0
            || slot.end_minute > 1440
            || slot.start_minute >= slot.end_minute
        {
            return Err(AppError::BadRequest(format!(
                "Slot {} is invalid: start {} and end {} must satisfy 0 <= start < end <= 1440.",
                index, slot.start_minute, slot.end_minute
            )));
        }
    }

    let tutor_exists = helper::run_query(&state.pool, {
        let tutor_id = payload.tutor_id;
        move |conn| {
            diesel::select(exists(tutors_dsl::tutors.find(tutor_id))).get_result::<bool>(conn)
        }
    })
    .await?;
    if !tutor_exists {
        return Err(AppError::NotFound(format!(
            "Tutor with ID {} not found.",
            payload.tutor_id
        )));
    }

    let slot_count = payload.slots.len() as i64;
    let conn = state.pool.get().await?;
    conn.interact({
        let tutor_id = payload.tutor_id;
        let slots = payload.slots;
        move |conn_sync| {
            conn_sync.transaction::<_, diesel::result::Error, _>(|tx_conn| {
                diesel::delete(
                    availability_dsl::tutor_availability
                        .filter(availability_dsl::tutor_id.eq(tutor_id)),
                )
                .execute(tx_conn)?;

                let new_slots: Vec<NewAvailabilitySlot> = slots
                    .into_iter()
                    .map(|slot| NewAvailabilitySlot {
                        tutor_id,
                        day: slot.day,
                        start_minute: slot.start_minute,
                        end_minute: slot.end_minute,
                    })
                    .collect();
                diesel::insert_into(availability_dsl::tutor_availability)
                    .values(&new_slots)
                    .execute(tx_conn)?;
                Ok(())
            })
        }
    })
    .await??;

    info!(
        "Stored {} availability slots for tutor {}",
        slot_count, payload.tutor_id
    );
    Ok(ApiResponse::ok(slot_count))
}

/// Queries a tutor's availability, ordered by day and start time.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<AvailabilitySlotResponse>` (200 OK).
/// * `404 Not Found`: If the tutor does not exist.
#[instrument(skip(state))]
pub async fn get_availability(
    State(state): State<AppState>,
    Query(params): Query<GetAvailabilityParams>,
) -> Result<ApiResponse<Vec<AvailabilitySlotResponse>>, AppError> {
    let tutor_exists = helper::run_query(&state.pool, {
        let tutor_id = params.tutor_id;
        move |conn| {
            diesel::select(exists(tutors_dsl::tutors.find(tutor_id))).get_result::<bool>(conn)
        }
    })
    .await?;
    if !tutor_exists {
        return Err(AppError::NotFound(format!(
            "Tutor with ID {} not found.",
            params.tutor_id
        )));
    }

    let slots = helper::run_query(&state.pool, {
        let tutor_id = params.tutor_id;
        move |conn| {
            availability_dsl::tutor_availability
                .filter(availability_dsl::tutor_id.eq(tutor_id))
                .order((
                    availability_dsl::day.asc(),
                    availability_dsl::start_minute.asc(),
                ))
                .load::<AvailabilitySlotResponse>(conn)
        }
    })
    .await?;

    Ok(ApiResponse::ok(slots))
}

/// Queries a tutor's notifications, newest first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<NotificationResponse>` (200 OK).
/// * `404 Not Found`: If the tutor does not exist.
#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<TutorNotificationsParams>,
) -> Result<ApiResponse<Vec<NotificationResponse>>, AppError> {
    let tutor_exists = helper::run_query(&state.pool, {
        let tutor_id = params.tutor_id;
        move |conn| {
            diesel::select(exists(tutors_dsl::tutors.find(tutor_id))).get_result::<bool>(conn)
        }
    })
    .await?;
    if !tutor_exists {
        return Err(AppError::NotFound(format!(
            "Tutor with ID {} not found.",
            params.tutor_id
        )));
    }

    let notifications = helper::run_query(&state.pool, {
        let tutor_id = params.tutor_id;
        move |conn| {
            notif_dsl::notifications
                .filter(notif_dsl::recipient_kind.eq(RecipientKind::Tutor.as_str()))
                .filter(notif_dsl::recipient_id.eq(tutor_id))
                .order((notif_dsl::created_at.desc(), notif_dsl::id.desc()))
                .load::<NotificationResponse>(conn)
        }
    })
    .await?;

    info!(
        "Fetched {} notifications for tutor {}",
        notifications.len(),
        params.tutor_id
    );
    Ok(ApiResponse::ok(notifications))
}

/// Marks one of the tutor's notifications as read. Idempotent.
///
/// Request Body: `MarkNotificationReadPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the notification does not exist for this tutor.
#[instrument(skip(state, payload))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Json(payload): Json<MarkNotificationReadPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    let rows_affected = helper::run_query(&state.pool, {
        let notification_id = payload.notification_id;
        let tutor_id = payload.tutor_id;
        move |conn| {
            diesel::update(
                notif_dsl::notifications
                    .filter(notif_dsl::id.eq(notification_id))
                    .filter(notif_dsl::recipient_kind.eq(RecipientKind::Tutor.as_str()))
                    .filter(notif_dsl::recipient_id.eq(tutor_id)),
            )
            .set(notif_dsl::is_read.eq(true))
            .execute(conn)
        }
    })
    .await?;

    match rows_affected {
        1 => Ok(ApiResponse::ok(true)),
        0 => Err(AppError::NotFound(format!(
            "Notification {} not found for tutor {}.",
            payload.notification_id, payload.tutor_id
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

/// Dismisses an actionable notification.
///
/// The resolve is a conditional update guarded by `action_status = 'none'`;
/// a notification resolves exactly once and never reverts.
///
/// Request Body: `DismissNotificationPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true (200 OK).
/// * `404 Not Found`: If the notification does not exist for this tutor.
/// * `409 Conflict`: If the notification was already resolved.
#[instrument(skip(state, payload))]
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Json(payload): Json<DismissNotificationPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Tutor {} dismissing notification {}",
        payload.tutor_id, payload.notification_id
    );

    let rows_affected = helper::run_query(&state.pool, {
        let notification_id = payload.notification_id;
        let tutor_id = payload.tutor_id;
        move |conn| {
            diesel::update(
                notif_dsl::notifications
                    .filter(notif_dsl::id.eq(notification_id))
                    .filter(notif_dsl::recipient_kind.eq(RecipientKind::Tutor.as_str()))
                    .filter(notif_dsl::recipient_id.eq(tutor_id))
                    .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str())),
            )
            .set((
                notif_dsl::action_status.eq(NotificationAction::Dismissed.as_str()),
                notif_dsl::is_read.eq(true),
            ))
            .execute(conn)
        }
    })
    .await?;

    if rows_affected == 1 {
        return Ok(ApiResponse::ok(true));
    }

    let exists_for_tutor = helper::run_query(&state.pool, {
        let notification_id = payload.notification_id;
        let tutor_id = payload.tutor_id;
        move |conn| {
            diesel::select(exists(
                notif_dsl::notifications
                    .filter(notif_dsl::id.eq(notification_id))
                    .filter(notif_dsl::recipient_kind.eq(RecipientKind::Tutor.as_str()))
                    .filter(notif_dsl::recipient_id.eq(tutor_id)),
            ))
            .get_result::<bool>(conn)
        }
    })
    .await?;

    if exists_for_tutor {
        warn!(
            "Notification {} already resolved, dismissal by tutor {} rejected",
            payload.notification_id, payload.tutor_id
        );
        Err(AppError::Conflict(format!(
            "Notification {} was already resolved.",
            payload.notification_id
        )))
    } else {
        Err(AppError::NotFound(format!(
            "Notification {} not found for tutor {}.",
            payload.notification_id, payload.tutor_id
        )))
    }
}
