use super::helper;
use crate::AppState;
use crate::collaborators::payment::{ChargeOutcome, ChargeRequest, METHOD_CARD, METHOD_WALLET};
use crate::collaborators::questions::CourseContext;
use crate::errors::AppError;
use crate::model::status::{AssignmentStatus, BookingStatus, GradeBand};
use crate::model::student::{
    AssignmentRow, AssignmentView, BookingResponse, CreateAssignmentResponse, EnrollmentResponse,
    NewAssignment, NewBooking, NewEnrollment, PayBookingResponse, PublishedCourseResponse,
    SubmitAssignmentResponse,
};
use crate::payloads::student::{
    CancelBookingPayload, CreateAssignmentPayload, CreateBookingPayload, GetAssignmentParams,
    GetEnrollmentParams, GetStudentBookingsParams, ListAssignmentAttemptsParams,
    PayBookingPayload, SubmitAssignmentPayload, UpdateEnrollmentProgressPayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    assignments::dsl as assignments_dsl, bookings::dsl as bookings_dsl,
    categories::dsl as categories_dsl, courses::dsl as courses_dsl,
    enrollments::dsl as enrollments_dsl, students::dsl as students_dsl,
};
use anyhow::anyhow;
use axum::extract::{Query, State};
use axum::response::Json;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use tracing::log::warn;
use tracing::{debug, error, info, instrument};

/// Queries all published courses, the student-facing catalog.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<PublishedCourseResponse>`: catalog entries (200 OK).
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(state))]
pub async fn list_published_courses(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<PublishedCourseResponse>>, AppError> {
    info!("Fetching published courses");

    let courses = helper::run_query(&state.pool, |conn| {
        courses_dsl::courses
            .filter(courses_dsl::is_published.eq(true))
            .select((
                courses_dsl::id,
                courses_dsl::title,
                courses_dsl::description,
                courses_dsl::category_id,
                courses_dsl::price,
                courses_dsl::level,
                courses_dsl::max_students,
                courses_dsl::instructor_id,
            ))
            .order(courses_dsl::title.asc())
            .load::<PublishedCourseResponse>(conn)
    })
    .await?;

    info!("Successfully fetched {} published courses", courses.len());
    Ok(ApiResponse::ok(courses))
}

/// Creates a booking request for a course.
///
/// The course's current instructor is snapshotted onto the booking; a course
/// with no instructor assigned cannot be booked yet.
///
/// Request Body: `CreateBookingPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `BookingResponse`: the new booking in status `requested` (200 OK).
/// * `400 Bad Request`: If the time window is inverted, the course has no
///   instructor, or the course is already at capacity.
/// * `404 Not Found`: If the student or course does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(state, payload))]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<ApiResponse<BookingResponse>, AppError> {
    info!(
        "Attempting to create booking for student {} on course {}",
        payload.student_id, payload.course_id
    );
    debug!("Create booking payload: {:?}", payload);

    if payload.start_at >= payload.end_at {
        return Err(AppError::BadRequest(
            "Booking start must be before booking end.".to_string(),
        ));
    }

    let student_exists = helper::run_query(&state.pool, {
        let student_id = payload.student_id;
        move |conn| {
            diesel::select(exists(students_dsl::students.find(student_id)))
                .get_result::<bool>(conn)
        }
    })
    .await?;
    if !student_exists {
        return Err(AppError::NotFound(format!(
            "Student with ID {} not found.",
            payload.student_id
        )));
    }

    let course = helper::run_query(&state.pool, {
        let course_id = payload.course_id;
        move |conn| {
            courses_dsl::courses
                .find(course_id)
                .select((courses_dsl::instructor_id, courses_dsl::max_students))
                .first::<(Option<i64>, i32)>(conn)
                .optional()
        }
    })
    .await?;

    let (instructor_id, max_students) = match course {
        Some(row) => row,
        None => {
            return Err(AppError::NotFound(format!(
                "Course with ID {} not found.",
                payload.course_id
            )));
        }
    };

    let tutor_id = instructor_id.ok_or_else(|| {
        warn!(
            "Rejecting booking for course {}: no instructor assigned",
            payload.course_id
        );
        AppError::BadRequest(format!(
            "Course {} has no instructor assigned and cannot be booked yet.",
            payload.course_id
        ))
    })?;

    let enrolled_count = helper::run_query(&state.pool, {
        let course_id = payload.course_id;
        move |conn| {
            enrollments_dsl::enrollments
                .filter(enrollments_dsl::course_id.eq(course_id))
                .count()
                .get_result::<i64>(conn)
        }
    })
    .await?;
    if enrolled_count >= max_students as i64 {
        warn!(
            "Rejecting booking for course {}: capacity {} reached",
            payload.course_id, max_students
        );
        return Err(AppError::BadRequest(format!(
            "Course {} is full ({} enrolled students).",
            payload.course_id, enrolled_count
        )));
    }

    let new_booking = NewBooking {
        student_id: payload.student_id,
        course_id: payload.course_id,
        tutor_id,
        status: BookingStatus::Requested.as_str().to_string(),
        start_at: payload.start_at,
        end_at: payload.end_at,
    };

    let booking = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(bookings_dsl::bookings)
            .values(&new_booking)
            .get_result::<BookingResponse>(conn)
    })
    .await?;

    info!(
        "Created booking {} for student {} on course {} with tutor snapshot {}",
        booking.id, payload.student_id, payload.course_id, tutor_id
    );
    Ok(ApiResponse::ok(booking))
}

/// Cancels a booking on behalf of its student.
///
/// Legal from `requested` or `awaiting_payment`; a confirmed booking is
/// final (no refund path).
///
/// Request Body: `CancelBookingPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `bool`: true once the booking is canceled (200 OK).
/// * `403 Forbidden`: If the booking belongs to a different student.
/// * `404 Not Found`: If the booking does not exist.
/// * `422 Unprocessable Entity`: If the booking is not cancelable anymore.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(state, payload))]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Json(payload): Json<CancelBookingPayload>,
) -> Result<ApiResponse<bool>, AppError> {
    info!(
        "Attempting to cancel booking {} for student {}",
        payload.booking_id, payload.student_id
    );

    let owner = fetch_booking_owner(&state, payload.booking_id).await?;
    if owner != payload.student_id {
        return Err(AppError::Forbidden(format!(
            "Booking {} does not belong to student {}.",
            payload.booking_id, payload.student_id
        )));
    }

    let cancelable = [
        BookingStatus::Requested.as_str(),
        BookingStatus::AwaitingPayment.as_str(),
    ];
    let rows_affected = helper::run_query(&state.pool, {
        let booking_id = payload.booking_id;
        move |conn| {
            diesel::update(
                bookings_dsl::bookings
                    .filter(bookings_dsl::id.eq(booking_id))
                    .filter(bookings_dsl::status.eq_any(cancelable)),
            )
            .set((
                bookings_dsl::status.eq(BookingStatus::Canceled.as_str()),
                bookings_dsl::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
        }
    })
    .await?;

    match rows_affected {
        1 => {
            info!("Booking {} canceled", payload.booking_id);
            Ok(ApiResponse::ok(true))
        }
        0 => {
            let status = fetch_booking_status(&state, payload.booking_id).await?;
            warn!(
                "Cannot cancel booking {} from status '{}'",
                payload.booking_id, status
            );
            Err(AppError::UnprocessableEntity(format!(
                "Booking {} cannot be canceled from status '{}'.",
                payload.booking_id, status
            )))
        }
        n => {
            error!(
                "Expected at most 1 row to be affected by cancel, but {} rows were affected for booking {}",
                n, payload.booking_id
            );
            Err(AppError::InternalServerError(anyhow!(
                "Cancel affected {} rows, expected 1",
                n
            )))
        }
    }
}

/// Pays for a booking awaiting payment.
///
/// Delegates the charge to the payment collaborator; on success the course's
/// current price is snapshotted onto the booking (immune to later catalog
/// edits), the booking flips to `confirmed` as the irreversible commit
/// point, and exactly one enrollment is created for it. The enrollment
/// insert is idempotent so a crash-and-retry between the two writes cannot
/// produce duplicates.
///
/// Request Body: `PayBookingPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `PayBookingResponse`: confirmed booking, price snapshot, receipt and
///   enrollment id (200 OK).
/// * `400 Bad Request`: If the payment method is unknown.
/// * `402 Payment Required`: If the provider declined the charge; the
///   booking stays `awaiting_payment` and the call is retryable.
/// * `403 Forbidden`: If the booking belongs to a different student.
/// * `404 Not Found`: If the booking or its course no longer exists.
/// * `409 Conflict`: If the booking was already paid (a concurrent `pay`
///   won the race); no second enrollment is created.
/// * `422 Unprocessable Entity`: If the booking is not awaiting payment.
/// * `502 Bad Gateway`: If the payment collaborator itself failed.
#[instrument(skip(state, payload))]
pub async fn pay_booking(
    State(state): State<AppState>,
    Json(payload): Json<PayBookingPayload>,
) -> Result<ApiResponse<PayBookingResponse>, AppError> {
    info!(
        "Attempting payment for booking {} by student {} via '{}'",
        payload.booking_id, payload.student_id, payload.method
    );

    if payload.method != METHOD_CARD && payload.method != METHOD_WALLET {
        return Err(AppError::BadRequest(format!(
            "Unknown payment method '{}'.",
            payload.method
        )));
    }

    let booking = helper::run_query(&state.pool, {
        let booking_id = payload.booking_id;
        move |conn| {
            bookings_dsl::bookings
                .find(booking_id)
                .first::<BookingResponse>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("Booking with ID {} not found.", payload.booking_id))
    })?;

    if booking.student_id != payload.student_id {
        return Err(AppError::Forbidden(format!(
            "Booking {} does not belong to student {}.",
            payload.booking_id, payload.student_id
        )));
    }

    match BookingStatus::from_str(&booking.status) {
        Some(BookingStatus::AwaitingPayment) => {}
        Some(BookingStatus::Confirmed) => {
            return Err(AppError::Conflict(format!(
                "Booking {} was already processed.",
                payload.booking_id
            )));
        }
        _ => {
            return Err(AppError::UnprocessableEntity(format!(
                "Booking {} cannot be paid from status '{}'.",
                payload.booking_id, booking.status
            )));
        }
    }

    // Price is read at payment time; this value, not any later edit of the
    // course, is what the booking keeps forever.
    let amount = helper::run_query(&state.pool, {
        let course_id = booking.course_id;
        move |conn| {
            courses_dsl::courses
                .find(course_id)
                .select(courses_dsl::price)
                .first::<BigDecimal>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Course with ID {} no longer exists.",
            booking.course_id
        ))
    })?;

    let charge_outcome = state
        .payments
        .charge(ChargeRequest {
            amount: amount.clone(),
            method: payload.method.clone(),
            reference: payload.reference.clone(),
        })
        .await
        .map_err(|err| {
            error!(
                "Payment collaborator failed for booking {}: {}",
                payload.booking_id, err
            );
            AppError::BadGateway(format!("Payment backend unavailable: {err}"))
        })?;

    let receipt = match charge_outcome {
        ChargeOutcome::Approved { receipt } => receipt,
        ChargeOutcome::Declined { reason } => {
            warn!(
                "Charge declined for booking {}: {}",
                payload.booking_id, reason
            );
            return Err(AppError::PaymentDeclined(reason));
        }
    };

    // Irreversible commit point: only the caller whose conditional update
    // lands sees rows_affected == 1; every other concurrent pay loses here.
    let rows_affected = helper::run_query(&state.pool, {
        let booking_id = payload.booking_id;
        let price = amount.clone();
        move |conn| {
            diesel::update(
                bookings_dsl::bookings
                    .filter(bookings_dsl::id.eq(booking_id))
                    .filter(bookings_dsl::status.eq(BookingStatus::AwaitingPayment.as_str())),
            )
            .set((
                bookings_dsl::status.eq(BookingStatus::Confirmed.as_str()),
                bookings_dsl::price.eq(price),
                bookings_dsl::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
        }
    })
    .await?;

    if rows_affected == 0 {
        let status = fetch_booking_status(&state, payload.booking_id).await?;
        if status == BookingStatus::Confirmed.as_str() {
            warn!(
                "Booking {} was confirmed concurrently; charge receipt {} reported to caller as conflict",
                payload.booking_id, receipt
            );
            return Err(AppError::Conflict(format!(
                "Booking {} was already processed.",
                payload.booking_id
            )));
        }
        return Err(AppError::UnprocessableEntity(format!(
            "Booking {} cannot be paid from status '{}'.",
            payload.booking_id, status
        )));
    }

    // Second write, outside any shared transaction: if the process dies
    // before it lands, retrying the insert is safe because the unique
    // booking reference absorbs the duplicate.
    helper::run_query(&state.pool, {
        let new_enrollment = NewEnrollment {
            student_id: booking.student_id,
            course_id: booking.course_id,
            booking_id: booking.id,
            progress: 0,
            completed_resource_ids: json!([]),
        };
        move |conn| {
            diesel::insert_into(enrollments_dsl::enrollments)
                .values(&new_enrollment)
                .on_conflict(enrollments_dsl::booking_id)
                .do_nothing()
                .execute(conn)
        }
    })
    .await?;

    let enrollment_id = helper::run_query(&state.pool, {
        let booking_id = payload.booking_id;
        move |conn| {
            enrollments_dsl::enrollments
                .filter(enrollments_dsl::booking_id.eq(booking_id))
                .select(enrollments_dsl::id)
                .first::<i64>(conn)
        }
    })
    .await?;

    info!(
        "Booking {} confirmed at price {}, enrollment {} in place, receipt {}",
        payload.booking_id, amount, enrollment_id, receipt
    );
    Ok(ApiResponse::ok(PayBookingResponse {
        booking_id: payload.booking_id,
        status: BookingStatus::Confirmed.as_str().to_string(),
        price: amount,
        receipt,
        enrollment_id,
    }))
}

/// Queries all bookings of a student, newest first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<BookingResponse>` (200 OK).
/// * `404 Not Found`: If the student does not exist.
#[instrument(skip(state))]
pub async fn get_student_bookings(
    State(state): State<AppState>,
    Query(params): Query<GetStudentBookingsParams>,
) -> Result<ApiResponse<Vec<BookingResponse>>, AppError> {
    info!("Fetching bookings for student {}", params.student_id);

    let student_exists = helper::run_query(&state.pool, {
        let student_id = params.student_id;
        move |conn| {
            diesel::select(exists(students_dsl::students.find(student_id)))
                .get_result::<bool>(conn)
        }
    })
    .await?;
    if !student_exists {
        return Err(AppError::NotFound(format!(
            "Student with ID {} not found.",
            params.student_id
        )));
    }

    let bookings = helper::run_query(&state.pool, {
        let student_id = params.student_id;
        move |conn| {
            bookings_dsl::bookings
                .filter(bookings_dsl::student_id.eq(student_id))
                .order((bookings_dsl::created_at.desc(), bookings_dsl::id.desc()))
                .load::<BookingResponse>(conn)
        }
    })
    .await?;

    info!(
        "Successfully fetched {} bookings for student {}",
        bookings.len(),
        params.student_id
    );
    Ok(ApiResponse::ok(bookings))
}

/// Queries the enrollment created for a paid booking.
///
/// Returns (wrapped in `ApiResponse`)
/// * `EnrollmentResponse` (200 OK).
/// * `403 Forbidden`: If the enrollment belongs to a different student.
/// * `404 Not Found`: If no enrollment exists for the booking.
#[instrument(skip(state))]
pub async fn get_enrollment(
    State(state): State<AppState>,
    Query(params): Query<GetEnrollmentParams>,
) -> Result<ApiResponse<EnrollmentResponse>, AppError> {
    info!("Fetching enrollment for booking {}", params.booking_id);

    let enrollment = helper::run_query(&state.pool, {
        let booking_id = params.booking_id;
        move |conn| {
            enrollments_dsl::enrollments
                .filter(enrollments_dsl::booking_id.eq(booking_id))
                .first::<EnrollmentResponse>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "No enrollment found for booking {}.",
            params.booking_id
        ))
    })?;

    if enrollment.student_id != params.student_id {
        return Err(AppError::Forbidden(format!(
            "Enrollment for booking {} does not belong to student {}.",
            params.booking_id, params.student_id
        )));
    }

    Ok(ApiResponse::ok(enrollment))
}

/// Updates an enrollment's progress and completed-resource set.
///
/// Request Body: `UpdateEnrollmentProgressPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `EnrollmentResponse`: the updated enrollment (200 OK).
/// * `400 Bad Request`: If progress is outside 0-100.
/// * `403 Forbidden`: If the enrollment belongs to a different student.
/// * `404 Not Found`: If the enrollment does not exist.
#[instrument(skip(state, payload))]
pub async fn update_enrollment_progress(
    State(state): State<AppState>,
    Json(payload): Json<UpdateEnrollmentProgressPayload>,
) -> Result<ApiResponse<EnrollmentResponse>, AppError> {
    info!(
        "Updating progress on enrollment {} to {}",
        payload.enrollment_id, payload.progress
    );

    if !(0..=100).contains(&payload.progress) {
        return Err(AppError::BadRequest(format!(
            "Progress must be between 0 and 100, got {}.",
            payload.progress
        )));
    }

    let owner = helper::run_query(&state.pool, {
        let enrollment_id = payload.enrollment_id;
        move |conn| {
            enrollments_dsl::enrollments
                .find(enrollment_id)
                .select(enrollments_dsl::student_id)
                .first::<i64>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Enrollment with ID {} not found.",
            payload.enrollment_id
        ))
    })?;

    if owner != payload.student_id {
        return Err(AppError::Forbidden(format!(
            "Enrollment {} does not belong to student {}.",
            payload.enrollment_id, payload.student_id
        )));
    }

    let mut completed = payload.completed_resource_ids;
    completed.sort_unstable();
    completed.dedup();

    let enrollment = helper::run_query(&state.pool, {
        let enrollment_id = payload.enrollment_id;
        let progress = payload.progress;
        let completed_json = json!(completed);
        move |conn| {
            diesel::update(enrollments_dsl::enrollments.find(enrollment_id))
                .set((
                    enrollments_dsl::progress.eq(progress),
                    enrollments_dsl::completed_resource_ids.eq(completed_json),
                ))
                .get_result::<EnrollmentResponse>(conn)
        }
    })
    .await?;

    Ok(ApiResponse::ok(enrollment))
}

/// Creates a quiz attempt for a confirmed booking.
///
/// Idempotent against double submission from a slow UI: if an ungraded
/// attempt already exists it is returned unchanged with
/// `already_exists = true`. Once the latest attempt is graded, a fresh call
/// starts a new attempt (retake). Question generation is delegated to the
/// generation collaborator; on collaborator failure nothing is persisted.
///
/// Request Body: `CreateAssignmentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CreateAssignmentResponse`: the attempt (grading keys stripped) plus
///   the idempotency flag (200 OK).
/// * `403 Forbidden`: If the booking belongs to a different student.
/// * `404 Not Found`: If the booking or its course does not exist.
/// * `422 Unprocessable Entity`: If the booking is not confirmed.
/// * `502 Bad Gateway`: If question generation failed.
#[instrument(skip(state, payload))]
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(payload): Json<CreateAssignmentPayload>,
) -> Result<ApiResponse<CreateAssignmentResponse>, AppError> {
    info!(
        "Attempting to create assignment for booking {} by student {}",
        payload.booking_id, payload.student_id
    );

    let booking = helper::run_query(&state.pool, {
        let booking_id = payload.booking_id;
        move |conn| {
            bookings_dsl::bookings
                .find(booking_id)
                .first::<BookingResponse>(conn)
                .optional()
        }
    })
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("Booking with ID {} not found.", payload.booking_id))
    })?;

    if booking.student_id != payload.student_id {
        return Err(AppError::Forbidden(format!(
            "Booking {} does not belong to student {}.",
            payload.booking_id, payload.student_id
        )));
    }
    if booking.status != BookingStatus::Confirmed.as_str() {
        return Err(AppError::UnprocessableEntity(format!(
            "Assignments require a confirmed booking; booking {} is '{}'.",
            payload.booking_id, booking.status
        )));
    }

    if let Some(open_attempt) = fetch_open_attempt(&state, payload.booking_id).await? {
        info!(
            "Returning existing open attempt {} for booking {}",
            open_attempt.id, payload.booking_id
        );
        let view = AssignmentView::from_row(open_attempt)?;
        return Ok(ApiResponse::ok(CreateAssignmentResponse {
            assignment: view,
            already_exists: true,
        }));
    }

    let context = helper::run_query(&state.pool, {
        let course_id = booking.course_id;
        move |conn| {
            courses_dsl::courses
                .inner_join(categories_dsl::categories)
                .filter(courses_dsl::id.eq(course_id))
                .select((
                    courses_dsl::title,
                    courses_dsl::level,
                    courses_dsl::description,
                    categories_dsl::name,
                ))
                .first::<(String, String, String, String)>(conn)
                .optional()
        }
    })
    .await?
    .map(|(title, level, description, category_name)| CourseContext {
        course_id: booking.course_id,
        title,
        level,
        category_name,
        description,
    })
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Course with ID {} no longer exists.",
            booking.course_id
        ))
    })?;

    let questions = state
        .question_gen
        .generate(&context)
        .await
        .map_err(|err| {
            error!(
                "Question generation failed for booking {}: {}",
                payload.booking_id, err
            );
            AppError::BadGateway(format!("Question generation failed: {err}"))
        })?;
    if questions.is_empty() {
        error!(
            "Question generator returned an empty set for booking {}",
            payload.booking_id
        );
        return Err(AppError::BadGateway(
            "Question generation produced an empty question set.".to_string(),
        ));
    }

    let new_assignment = NewAssignment {
        booking_id: booking.id,
        course_id: booking.course_id,
        student_id: booking.student_id,
        questions: serde_json::to_value(&questions)
            .map_err(|err| AppError::InternalServerError(anyhow::Error::new(err)))?,
        status: AssignmentStatus::Created.as_str().to_string(),
    };

    let conn = state.pool.get().await?;
    let insert_result = conn
        .interact(move |conn_sync| {
            conn_sync.transaction::<AssignmentRow, DieselError, _>(|tx_conn| {
                let row = diesel::insert_into(assignments_dsl::assignments)
                    .values(&new_assignment)
                    .get_result::<AssignmentRow>(tx_conn)?;
                diesel::update(
                    enrollments_dsl::enrollments
                        .filter(enrollments_dsl::booking_id.eq(row.booking_id)),
                )
                .set(enrollments_dsl::assignment_id.eq(row.id))
                .execute(tx_conn)?;
                Ok(row)
            })
        })
        .await?;

    match insert_result {
        Ok(row) => {
            info!(
                "Created assignment {} ({} questions) for booking {}",
                row.id,
                questions.len(),
                payload.booking_id
            );
            let view = AssignmentView::from_row(row)?;
            Ok(ApiResponse::ok(CreateAssignmentResponse {
                assignment: view,
                already_exists: false,
            }))
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            // A concurrent create won the open-attempt guard; fall back to
            // the idempotent path and hand out the winner's attempt.
            warn!(
                "Concurrent assignment creation for booking {} detected: {}",
                payload.booking_id,
                info.message()
            );
            let open_attempt = fetch_open_attempt(&state, payload.booking_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalServerError(anyhow!(
                        "Open attempt for booking {} vanished after unique-violation",
                        payload.booking_id
                    ))
                })?;
            let view = AssignmentView::from_row(open_attempt)?;
            Ok(ApiResponse::ok(CreateAssignmentResponse {
                assignment: view,
                already_exists: true,
            }))
        }
        Err(other) => Err(AppError::from(other)),
    }
}

/// Queries one assignment attempt, with grading keys stripped.
///
/// Returns (wrapped in `ApiResponse`)
/// * `AssignmentView` (200 OK).
/// * `403 Forbidden`: If the attempt belongs to a different student.
/// * `404 Not Found`: If the attempt does not exist.
#[instrument(skip(state))]
pub async fn get_assignment(
    State(state): State<AppState>,
    Query(params): Query<GetAssignmentParams>,
) -> Result<ApiResponse<AssignmentView>, AppError> {
    info!("Fetching assignment {}", params.assignment_id);

    let row = fetch_assignment_row(&state, params.assignment_id).await?;
    if row.student_id != params.student_id {
        return Err(AppError::Forbidden(format!(
            "Assignment {} does not belong to student {}.",
            params.assignment_id, params.student_id
        )));
    }

    Ok(ApiResponse::ok(AssignmentView::from_row(row)?))
}

/// Queries every attempt generated for a booking, newest first. Graded
/// attempts stay retrievable unchanged after a retake.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<AssignmentView>` (200 OK).
/// * `403 Forbidden`: If the booking belongs to a different student.
/// * `404 Not Found`: If the booking does not exist.
#[instrument(skip(state))]
pub async fn list_assignment_attempts(
    State(state): State<AppState>,
    Query(params): Query<ListAssignmentAttemptsParams>,
) -> Result<ApiResponse<Vec<AssignmentView>>, AppError> {
    info!("Fetching assignment attempts for booking {}", params.booking_id);

    let owner = fetch_booking_owner(&state, params.booking_id).await?;
    if owner != params.student_id {
        return Err(AppError::Forbidden(format!(
            "Booking {} does not belong to student {}.",
            params.booking_id, params.student_id
        )));
    }

    let rows = helper::run_query(&state.pool, {
        let booking_id = params.booking_id;
        move |conn| {
            assignments_dsl::assignments
                .filter(assignments_dsl::booking_id.eq(booking_id))
                .order((
                    assignments_dsl::created_at.desc(),
                    assignments_dsl::id.desc(),
                ))
                .load::<AssignmentRow>(conn)
        }
    })
    .await?;

    let views = rows
        .into_iter()
        .map(AssignmentView::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ApiResponse::ok(views))
}

/// Submits answers for an attempt and grades it in the same call.
///
/// The grade is `round(100 * correct / total)`. The write is a conditional
/// update guarded on status `created`, so a second submission loses and is
/// rejected; a retake goes through `create_assignment` instead.
///
/// Request Body: `SubmitAssignmentPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmitAssignmentResponse`: numeric grade and its band (200 OK).
/// * `400 Bad Request`: If the answer list does not line up with the
///   question list.
/// * `403 Forbidden`: If the attempt belongs to a different student.
/// * `404 Not Found`: If the attempt does not exist.
/// * `409 Conflict`: If the attempt was already graded.
#[instrument(skip(state, payload))]
pub async fn submit_assignment(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAssignmentPayload>,
) -> Result<ApiResponse<SubmitAssignmentResponse>, AppError> {
    info!(
        "Submitting assignment {} for student {}",
        payload.assignment_id, payload.student_id
    );

    let row = fetch_assignment_row(&state, payload.assignment_id).await?;
    if row.student_id != payload.student_id {
        return Err(AppError::Forbidden(format!(
            "Assignment {} does not belong to student {}.",
            payload.assignment_id, payload.student_id
        )));
    }
    if row.status == AssignmentStatus::Graded.as_str() {
        return Err(AppError::Conflict(format!(
            "Assignment {} was already graded; request a new attempt instead.",
            payload.assignment_id
        )));
    }

    let questions = row.parse_questions()?;
    if payload.answers.len() != questions.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}.",
            questions.len(),
            payload.answers.len()
        )));
    }
    for (index, (answer, question)) in payload.answers.iter().zip(&questions).enumerate() {
        if let Some(choice) = answer {
            if *choice >= question.options.len() {
                return Err(AppError::BadRequest(format!(
                    "Answer {} selects option {} but question has only {} options.",
                    index,
                    choice,
                    question.options.len()
                )));
            }
        }
    }

    let correct_count = payload
        .answers
        .iter()
        .zip(&questions)
        .filter(|(answer, question)| **answer == Some(question.correct_index))
        .count();
    let question_count = questions.len();
    let numeric_grade =
        ((100.0 * correct_count as f64) / question_count as f64).round() as i32;

    let rows_affected = helper::run_query(&state.pool, {
        let assignment_id = payload.assignment_id;
        let answers_json = json!(payload.answers);
        move |conn| {
            diesel::update(
                assignments_dsl::assignments
                    .filter(assignments_dsl::id.eq(assignment_id))
                    .filter(assignments_dsl::status.eq(AssignmentStatus::Created.as_str())),
            )
            .set((
                assignments_dsl::status.eq(AssignmentStatus::Graded.as_str()),
                assignments_dsl::student_answers.eq(answers_json),
                assignments_dsl::numeric_grade.eq(numeric_grade),
                assignments_dsl::graded_at.eq(Utc::now()),
            ))
            .execute(conn)
        }
    })
    .await?;

    if rows_affected == 0 {
        warn!(
            "Assignment {} was graded concurrently; rejecting late submission",
            payload.assignment_id
        );
        return Err(AppError::Conflict(format!(
            "Assignment {} was already graded; request a new attempt instead.",
            payload.assignment_id
        )));
    }

    let grade_band = GradeBand::for_grade(numeric_grade);
    info!(
        "Assignment {} graded: {}/{} correct, grade {} ({})",
        payload.assignment_id,
        correct_count,
        question_count,
        numeric_grade,
        grade_band.as_str()
    );
    Ok(ApiResponse::ok(SubmitAssignmentResponse {
        assignment_id: payload.assignment_id,
        numeric_grade,
        grade_band: grade_band.as_str().to_string(),
        correct_count,
        question_count,
    }))
}

async fn fetch_booking_owner(state: &AppState, booking_id: i64) -> Result<i64, AppError> {
    helper::run_query(&state.pool, move |conn| {
        bookings_dsl::bookings
            .find(booking_id)
            .select(bookings_dsl::student_id)
            .first::<i64>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Booking with ID {booking_id} not found.")))
}

async fn fetch_booking_status(state: &AppState, booking_id: i64) -> Result<String, AppError> {
    helper::run_query(&state.pool, move |conn| {
        bookings_dsl::bookings
            .find(booking_id)
            .select(bookings_dsl::status)
            .first::<String>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Booking with ID {booking_id} not found.")))
}

async fn fetch_assignment_row(
    state: &AppState,
    assignment_id: i64,
) -> Result<AssignmentRow, AppError> {
    helper::run_query(&state.pool, move |conn| {
        assignments_dsl::assignments
            .find(assignment_id)
            .first::<AssignmentRow>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Assignment with ID {assignment_id} not found.")))
}

async fn fetch_open_attempt(
    state: &AppState,
    booking_id: i64,
) -> Result<Option<AssignmentRow>, AppError> {
    helper::run_query(&state.pool, move |conn| {
        assignments_dsl::assignments
            .filter(assignments_dsl::booking_id.eq(booking_id))
            .filter(assignments_dsl::status.ne(AssignmentStatus::Graded.as_str()))
            .order((
                assignments_dsl::created_at.desc(),
                assignments_dsl::id.desc(),
            ))
            .first::<AssignmentRow>(conn)
            .optional()
    })
    .await
}
