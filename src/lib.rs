use crate::cli::Args;
use crate::collaborators::cv::{CourseSuggester, KeywordCourseSuggester};
use crate::collaborators::payment::{PaymentGateway, SimulatedPaymentGateway};
use crate::collaborators::questions::{QuestionGenerator, ScriptedQuestionGenerator};
use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use axum_keycloak_auth::PassthroughMode;
use axum_keycloak_auth::instance::{KeycloakAuthInstance, KeycloakConfig};
use axum_keycloak_auth::layer::KeycloakAuthLayer;
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use std::sync::Arc;
use tracing::log::info;

pub mod cli;
pub mod collaborators;
pub mod model;
pub mod payloads;
pub mod response;
pub mod schema;

mod api;
mod errors;

/// Shared handler state: the connection pool plus the external
/// collaborators, held as trait objects so tests can swap them out.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub payments: Arc<dyn PaymentGateway>,
    pub question_gen: Arc<dyn QuestionGenerator>,
    pub course_suggester: Arc<dyn CourseSuggester>,
}

pub fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Initializing database pool...");
    let pool = init_pool(&args.connection_str, args.db_pool_max_size)
        .context("Failed to initialize database pool")?;

    info!("Initializing Keycloak authentication layer...");
    let keycloak_layer =
        init_protection_layer(args).context("Failed to initialize Keycloak layer")?;

    let state = AppState {
        pool,
        payments: Arc::new(SimulatedPaymentGateway::new(args.payment_decline_rate)),
        question_gen: Arc::new(ScriptedQuestionGenerator::default()),
        course_suggester: Arc::new(KeywordCourseSuggester),
    };

    info!("Initializing router...");
    Ok(init_router_internal(state, keycloak_layer))
}

pub fn init_test_router(pool: Pool) -> Router {
    init_test_router_with_state(AppState {
        pool,
        payments: Arc::new(SimulatedPaymentGateway::new(0.0)),
        question_gen: Arc::new(ScriptedQuestionGenerator::default()),
        course_suggester: Arc::new(KeywordCourseSuggester),
    })
}

pub fn init_test_router_with_state(state: AppState) -> Router {
    let student_api = student_routes();
    let tutor_api = tutor_routes();
    let admin_api = admin_routes();

    Router::new()
        .nest("/student", student_api)
        .nest("/tutor", tutor_api)
        .nest("/admin", admin_api)
        .with_state(state)
}

fn init_router_internal(state: AppState, keycloak_layer: KeycloakAuthLayer<String>) -> Router {
    let student_api = student_routes().layer(keycloak_layer.clone());
    let tutor_api = tutor_routes().layer(keycloak_layer.clone());
    let admin_api = admin_routes().layer(keycloak_layer.clone());

    Router::new()
        .nest("/student", student_api)
        .nest("/tutor", tutor_api)
        .nest("/admin", admin_api)
        .with_state(state)
}

fn init_pool(conn_str: &str, max_size: u32) -> anyhow::Result<Pool> {
    let manager = Manager::new(conn_str, Runtime::Tokio1);
    let pool = Pool::builder(manager).max_size(max_size as usize).build()?;
    Ok(pool)
}

fn init_protection_layer(args: &Args) -> anyhow::Result<KeycloakAuthLayer<String>> {
    let config = KeycloakConfig::builder()
        .server(args.keycloak_server_url.clone())
        .realm(args.keycloak_realm.clone())
        .build();

    let instance = KeycloakAuthInstance::new(config);

    let layer = KeycloakAuthLayer::builder()
        .instance(instance)
        .passthrough_mode(PassthroughMode::Block)
        .persist_raw_claims(false)
        .expected_audiences(vec![args.keycloak_audiences.clone()])
        .build();

    Ok(layer)
}

fn student_routes() -> Router<AppState> {
    Router::new()
        // protected routes go here
        .route(
            "/list_published_courses",
            get(api::student::list_published_courses),
        )
        .route("/create_booking", post(api::student::create_booking))
        .route("/cancel_booking", post(api::student::cancel_booking))
        .route("/pay_booking", post(api::student::pay_booking))
        .route(
            "/get_student_bookings",
            get(api::student::get_student_bookings),
        )
        .route("/get_enrollment", get(api::student::get_enrollment))
        .route(
            "/update_enrollment_progress",
            post(api::student::update_enrollment_progress),
        )
        .route("/create_assignment", post(api::student::create_assignment))
        .route("/get_assignment", get(api::student::get_assignment))
        .route(
            "/list_assignment_attempts",
            get(api::student::list_assignment_attempts),
        )
        .route("/submit_assignment", post(api::student::submit_assignment))
    // public routes go here
}

fn tutor_routes() -> Router<AppState> {
    Router::new()
        // protected routes go here
        .route("/apply_to_course", post(api::tutor::apply_to_course))
        .route(
            "/get_course_suggestions",
            get(api::tutor::get_course_suggestions),
        )
        .route("/set_availability", post(api::tutor::set_availability))
        .route("/get_availability", get(api::tutor::get_availability))
        .route("/list_notifications", get(api::tutor::list_notifications))
        .route(
            "/mark_notification_read",
            post(api::tutor::mark_notification_read),
        )
        .route(
            "/dismiss_notification",
            post(api::tutor::dismiss_notification),
        )
    // public routes go here
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        // protected routes go here
        .route("/create_category", post(api::admin::create_category))
        .route("/create_student", post(api::admin::create_student))
        .route("/create_tutor", post(api::admin::create_tutor))
        .route("/create_course", post(api::admin::create_course))
        .route("/update_course", post(api::admin::update_course))
        .route("/list_courses", get(api::admin::list_courses))
        .route("/accept_booking", post(api::admin::accept_booking))
        .route("/decline_booking", post(api::admin::decline_booking))
        .route(
            "/list_active_bookings",
            get(api::admin::list_active_bookings),
        )
        .route(
            "/list_pending_applications",
            get(api::admin::list_pending_applications),
        )
        .route("/accept_application", post(api::admin::accept_application))
        .route("/reject_application", post(api::admin::reject_application))
        .route("/list_notifications", get(api::admin::list_notifications))
        .route(
            "/mark_notification_read",
            post(api::admin::mark_notification_read),
        )
    // public routes go here
}
