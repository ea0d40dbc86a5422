use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use serde_json::json;
use std::str::FromStr;
use tutorhub_server::model::admin::CourseResponse;
use tutorhub_server::model::notification::NotificationResponse;
use tutorhub_server::model::student::BookingResponse;
use tutorhub_server::payloads::admin::{
    AcceptApplicationPayload, CreateCoursePayload, CreateStudentPayload, CreateTutorPayload,
    UpdateCoursePayload,
};
use tutorhub_server::response::ApiResponse;

mod helpers;
use helpers::{
    check_tutor_course_link, count_pending_applications_for_course, create_test_admin,
    create_test_application_notification, create_test_booking, create_test_category,
    create_test_course, create_test_student, create_test_tutor, get_booking_status,
    get_course_instructor, link_tutor_course, list_notifications_for, setup_test_environment,
};

fn course_payload(category_id: i64, instructor_id: Option<i64>) -> CreateCoursePayload {
    CreateCoursePayload {
        title: "New Course".to_string(),
        description: "Desc".to_string(),
        category_id,
        price: BigDecimal::from_str("30.00").unwrap(),
        level: "beginner".to_string(),
        max_students: 10,
        instructor_id,
        is_published: instructor_id.is_some(),
        prerequisite_ids: vec![],
    }
}

// create_category / create_student / create_tutor

#[tokio::test]
async fn test_create_category_success_and_blank_rejected() {
    let (server, _pool) = setup_test_environment().await;

    let created = server
        .post("/admin/create_category")
        .json(&json!({ "name": "Science" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);
    let body: ApiResponse<i64> = created.json();
    assert!(body.data.unwrap() > 0);

    let blank = server
        .post("/admin/create_category")
        .json(&json!({ "name": "   " }))
        .await;
    assert_eq!(blank.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_student_success() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/create_student")
        .json(&CreateStudentPayload {
            email: "new@test.com".to_string(),
            display_name: "New Student".to_string(),
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_tutor_rejects_negative_rate() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/create_tutor")
        .json(&CreateTutorPayload {
            email: "tutor@test.com".to_string(),
            display_name: "Tutor".to_string(),
            hourly_rate: BigDecimal::from_str("-5").unwrap(),
            cv_reference: None,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// create_course

#[tokio::test]
async fn test_create_course_with_instructor_publishes() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;

    let response = server
        .post("/admin/create_course")
        .json(&course_payload(category_id, Some(tutor_id)))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<i64> = response.json();
    let course_id = body.data.unwrap();
    assert_eq!(get_course_instructor(&pool, course_id).await, Some(tutor_id));
}

#[tokio::test]
async fn test_create_course_published_without_instructor_rejected() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;

    let mut payload = course_payload(category_id, None);
    payload.is_published = true;
    let response = server.post("/admin/create_course").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_course_unknown_category_or_instructor() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;

    let unknown_category = server
        .post("/admin/create_course")
        .json(&course_payload(99999, None))
        .await;
    assert_eq!(unknown_category.status_code(), StatusCode::NOT_FOUND);

    let unknown_instructor = server
        .post("/admin/create_course")
        .json(&course_payload(category_id, Some(99999)))
        .await;
    assert_eq!(unknown_instructor.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_course_unknown_prerequisite_rejected() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;

    let mut payload = course_payload(category_id, None);
    payload.prerequisite_ids = vec![99999];
    let response = server.post("/admin/create_course").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_unassigned_course_pushes_category_matches() {
    let (server, pool) = setup_test_environment().await;
    let math = create_test_category(&pool, "Math").await;
    let arts = create_test_category(&pool, "Arts").await;
    let instructor = create_test_tutor(&pool, "instructor@test.com", "Instructor").await;
    let math_tutor = create_test_tutor(&pool, "math@test.com", "Math Tutor").await;
    let arts_tutor = create_test_tutor(&pool, "arts@test.com", "Arts Tutor").await;
    let math_course =
        create_test_course(&pool, math, "Old Math Course", "30.00", Some(instructor)).await;
    let arts_course =
        create_test_course(&pool, arts, "Old Arts Course", "30.00", Some(instructor)).await;
    link_tutor_course(&pool, math_tutor, math_course).await;
    link_tutor_course(&pool, arts_tutor, arts_course).await;

    let response = server
        .post("/admin/create_course")
        .json(&course_payload(math, None))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let math_tutor_notifications = list_notifications_for(&pool, "tutor", math_tutor).await;
    assert_eq!(math_tutor_notifications.len(), 1);
    assert_eq!(math_tutor_notifications[0].1, "course_match");

    let arts_tutor_notifications = list_notifications_for(&pool, "tutor", arts_tutor).await;
    assert!(arts_tutor_notifications.is_empty());
}

// update_course

#[tokio::test]
async fn test_update_course_price_edit() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", Some(tutor_id)).await;

    let response = server
        .post("/admin/update_course")
        .json(&UpdateCoursePayload {
            course_id,
            title: None,
            description: None,
            category_id: None,
            price: Some(BigDecimal::from_str("35.50").unwrap()),
            level: None,
            max_students: None,
            instructor_id: None,
            is_published: None,
            prerequisite_ids: None,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<CourseResponse> = response.json();
    let course = body.data.unwrap();
    assert_eq!(course.price, BigDecimal::from_str("35.50").unwrap());
    assert_eq!(course.instructor_id, Some(tutor_id));
}

#[tokio::test]
async fn test_update_course_assigns_instructor_directly() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;

    let response = server
        .post("/admin/update_course")
        .json(&UpdateCoursePayload {
            course_id,
            title: None,
            description: None,
            category_id: None,
            price: None,
            level: None,
            max_students: None,
            instructor_id: Some(tutor_id),
            is_published: Some(true),
            prerequisite_ids: None,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(get_course_instructor(&pool, course_id).await, Some(tutor_id));
}

#[tokio::test]
async fn test_update_course_publish_without_instructor_rejected() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;

    let response = server
        .post("/admin/update_course")
        .json(&UpdateCoursePayload {
            course_id,
            title: None,
            description: None,
            category_id: None,
            price: None,
            level: None,
            max_students: None,
            instructor_id: None,
            is_published: Some(true),
            prerequisite_ids: None,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_course_self_prerequisite_rejected() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;

    let response = server
        .post("/admin/update_course")
        .json(&UpdateCoursePayload {
            course_id,
            title: None,
            description: None,
            category_id: None,
            price: None,
            level: None,
            max_students: None,
            instructor_id: None,
            is_published: None,
            prerequisite_ids: Some(vec![course_id]),
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

// accept_booking / decline_booking

#[tokio::test]
async fn test_accept_booking_moves_to_awaiting_payment() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let student_id = create_test_student(&pool, "student@test.com", "Student").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", Some(tutor_id)).await;
    let booking_id = create_test_booking(&pool, student_id, course_id, tutor_id, "requested").await;

    let response = server
        .post("/admin/accept_booking")
        .json(&json!({ "booking_id": booking_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        get_booking_status(&pool, booking_id).await,
        "awaiting_payment"
    );
}

#[tokio::test]
async fn test_accept_booking_illegal_from_awaiting_payment() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let student_id = create_test_student(&pool, "student@test.com", "Student").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", Some(tutor_id)).await;
    let booking_id =
        create_test_booking(&pool, student_id, course_id, tutor_id, "awaiting_payment").await;

    let response = server
        .post("/admin/accept_booking")
        .json(&json!({ "booking_id": booking_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_decline_booking_terminal_and_only_from_requested() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let student_id = create_test_student(&pool, "student@test.com", "Student").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", Some(tutor_id)).await;
    let booking_id = create_test_booking(&pool, student_id, course_id, tutor_id, "requested").await;

    let declined = server
        .post("/admin/decline_booking")
        .json(&json!({ "booking_id": booking_id }))
        .await;
    assert_eq!(declined.status_code(), StatusCode::OK);
    assert_eq!(get_booking_status(&pool, booking_id).await, "declined");

    // terminal: no way out of declined
    let again = server
        .post("/admin/accept_booking")
        .json(&json!({ "booking_id": booking_id }))
        .await;
    assert_eq!(again.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let paid_booking =
        create_test_booking(&pool, student_id, course_id, tutor_id, "awaiting_payment").await;
    let decline_late = server
        .post("/admin/decline_booking")
        .json(&json!({ "booking_id": paid_booking }))
        .await;
    assert_eq!(decline_late.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_booking_decisions_unknown_booking() {
    let (server, _pool) = setup_test_environment().await;

    let accept = server
        .post("/admin/accept_booking")
        .json(&json!({ "booking_id": 99999 }))
        .await;
    assert_eq!(accept.status_code(), StatusCode::NOT_FOUND);

    let decline = server
        .post("/admin/decline_booking")
        .json(&json!({ "booking_id": 99999 }))
        .await;
    assert_eq!(decline.status_code(), StatusCode::NOT_FOUND);
}

// list_active_bookings

#[tokio::test]
async fn test_list_active_bookings_filters_terminal_states() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let student_id = create_test_student(&pool, "student@test.com", "Student").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", Some(tutor_id)).await;
    let requested = create_test_booking(&pool, student_id, course_id, tutor_id, "requested").await;
    let awaiting =
        create_test_booking(&pool, student_id, course_id, tutor_id, "awaiting_payment").await;
    let _confirmed =
        create_test_booking(&pool, student_id, course_id, tutor_id, "confirmed").await;
    let _canceled = create_test_booking(&pool, student_id, course_id, tutor_id, "canceled").await;

    let response = server.get("/admin/list_active_bookings").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<BookingResponse>> = response.json();
    let mut ids: Vec<i64> = body.data.unwrap().iter().map(|b| b.id).collect();
    ids.sort();
    assert_eq!(ids, vec![requested, awaiting]);
}

// accept_application

#[tokio::test]
async fn test_accept_application_assigns_and_fans_out() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let winner = create_test_tutor(&pool, "winner@test.com", "Winner").await;
    let loser = create_test_tutor(&pool, "loser@test.com", "Loser").await;
    let admin_id = create_test_admin(&pool, "admin@test.com", "Admin").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;
    create_test_application_notification(&pool, admin_id, course_id, winner).await;
    create_test_application_notification(&pool, admin_id, course_id, loser).await;

    let response = server
        .post("/admin/accept_application")
        .json(&AcceptApplicationPayload {
            course_id,
            tutor_id: winner,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(get_course_instructor(&pool, course_id).await, Some(winner));
    assert!(check_tutor_course_link(&pool, winner, course_id).await);

    // every pending application for the course is resolved
    assert_eq!(count_pending_applications_for_course(&pool, course_id).await, 0);

    let winner_notifications = list_notifications_for(&pool, "tutor", winner).await;
    assert_eq!(winner_notifications.len(), 1);
    assert_eq!(winner_notifications[0].1, "course_accepted");

    let loser_notifications = list_notifications_for(&pool, "tutor", loser).await;
    assert_eq!(loser_notifications.len(), 1);
    assert_eq!(loser_notifications[0].1, "course_assigned_elsewhere");

    let admin_notifications = list_notifications_for(&pool, "admin", admin_id).await;
    let statuses: Vec<&str> = admin_notifications
        .iter()
        .map(|(_, _, action, _)| action.as_str())
        .collect();
    assert!(statuses.contains(&"applied"));
    assert!(statuses.contains(&"dismissed"));
}

#[tokio::test]
async fn test_accept_application_on_assigned_course_conflicts_without_side_effects() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let incumbent = create_test_tutor(&pool, "incumbent@test.com", "Incumbent").await;
    let challenger = create_test_tutor(&pool, "challenger@test.com", "Challenger").await;
    let admin_id = create_test_admin(&pool, "admin@test.com", "Admin").await;
    let course_id =
        create_test_course(&pool, category_id, "Algebra", "30.00", Some(incumbent)).await;
    create_test_application_notification(&pool, admin_id, course_id, challenger).await;

    let response = server
        .post("/admin/accept_application")
        .json(&AcceptApplicationPayload {
            course_id,
            tutor_id: challenger,
        })
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(get_course_instructor(&pool, course_id).await, Some(incumbent));
    // the losing accept rolled back: application still pending, no fan-out
    assert_eq!(count_pending_applications_for_course(&pool, course_id).await, 1);
    assert!(list_notifications_for(&pool, "tutor", challenger).await.is_empty());
    assert!(!check_tutor_course_link(&pool, challenger, course_id).await);
}

#[tokio::test]
async fn test_accept_application_concurrent_race_has_one_winner() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_one = create_test_tutor(&pool, "one@test.com", "Tutor One").await;
    let tutor_two = create_test_tutor(&pool, "two@test.com", "Tutor Two").await;
    let admin_id = create_test_admin(&pool, "admin@test.com", "Admin").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;
    create_test_application_notification(&pool, admin_id, course_id, tutor_one).await;
    create_test_application_notification(&pool, admin_id, course_id, tutor_two).await;

    let payload_one = AcceptApplicationPayload {
        course_id,
        tutor_id: tutor_one,
    };
    let payload_two = AcceptApplicationPayload {
        course_id,
        tutor_id: tutor_two,
    };
    let (first, second) = tokio::join!(
        async {
            server
                .post("/admin/accept_application")
                .json(&payload_one)
                .await
        },
        async {
            server
                .post("/admin/accept_application")
                .json(&payload_two)
                .await
        },
    );

    let codes = [first.status_code(), second.status_code()];
    assert!(codes.contains(&StatusCode::OK), "one accept must win: {codes:?}");
    assert!(
        codes.contains(&StatusCode::CONFLICT),
        "one accept must lose: {codes:?}"
    );

    let assigned = get_course_instructor(&pool, course_id)
        .await
        .expect("course must end up assigned");
    assert!(assigned == tutor_one || assigned == tutor_two);

    let winner = assigned;
    let winner_notifications = list_notifications_for(&pool, "tutor", winner).await;
    assert_eq!(
        winner_notifications
            .iter()
            .filter(|(_, t, _, _)| t == "course_accepted")
            .count(),
        1,
        "exactly one course_accepted for the winner"
    );
}

#[tokio::test]
async fn test_accept_application_unknown_course_or_tutor() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;

    let unknown_course = server
        .post("/admin/accept_application")
        .json(&AcceptApplicationPayload {
            course_id: 99999,
            tutor_id,
        })
        .await;
    assert_eq!(unknown_course.status_code(), StatusCode::NOT_FOUND);

    let unknown_tutor = server
        .post("/admin/accept_application")
        .json(&AcceptApplicationPayload {
            course_id,
            tutor_id: 99999,
        })
        .await;
    assert_eq!(unknown_tutor.status_code(), StatusCode::NOT_FOUND);
}

// reject_application

#[tokio::test]
async fn test_reject_application_leaves_course_untouched_and_allows_reapply() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let admin_id = create_test_admin(&pool, "admin@test.com", "Admin").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;
    create_test_application_notification(&pool, admin_id, course_id, tutor_id).await;

    let response = server
        .post("/admin/reject_application")
        .json(&json!({ "course_id": course_id, "tutor_id": tutor_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(get_course_instructor(&pool, course_id).await, None);
    assert_eq!(count_pending_applications_for_course(&pool, course_id).await, 0);

    let tutor_notifications = list_notifications_for(&pool, "tutor", tutor_id).await;
    assert_eq!(tutor_notifications.len(), 1);
    assert_eq!(tutor_notifications[0].1, "course_rejected");

    // rejection does not block a fresh application
    let reapply = server
        .post("/tutor/apply_to_course")
        .json(&json!({ "tutor_id": tutor_id, "course_id": course_id }))
        .await;
    assert_eq!(reapply.status_code(), StatusCode::OK);
    assert_eq!(count_pending_applications_for_course(&pool, course_id).await, 1);
}

#[tokio::test]
async fn test_reject_application_without_pending_application() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    create_test_admin(&pool, "admin@test.com", "Admin").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;

    let response = server
        .post("/admin/reject_application")
        .json(&json!({ "course_id": course_id, "tutor_id": tutor_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// list_pending_applications

#[tokio::test]
async fn test_list_pending_applications_scoped_to_admin() {
    let (server, pool) = setup_test_environment().await;
    let category_id = create_test_category(&pool, "Math").await;
    let tutor_id = create_test_tutor(&pool, "tutor@test.com", "Tutor").await;
    let admin_one = create_test_admin(&pool, "admin1@test.com", "Admin One").await;
    let admin_two = create_test_admin(&pool, "admin2@test.com", "Admin Two").await;
    let course_id = create_test_course(&pool, category_id, "Algebra", "30.00", None).await;
    create_test_application_notification(&pool, admin_one, course_id, tutor_id).await;

    let own = server
        .get("/admin/list_pending_applications")
        .add_query_param("admin_id", admin_one)
        .await;
    assert_eq!(own.status_code(), StatusCode::OK);
    let own_body: ApiResponse<Vec<NotificationResponse>> = own.json();
    assert_eq!(own_body.data.unwrap().len(), 1);

    let other = server
        .get("/admin/list_pending_applications")
        .add_query_param("admin_id", admin_two)
        .await;
    let other_body: ApiResponse<Vec<NotificationResponse>> = other.json();
    assert!(other_body.data.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_notifications_unknown_admin() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .get("/admin/list_notifications")
        .add_query_param("admin_id", 99999)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
