use crate::errors::AppError;
use crate::model::notification::NewNotification;
use crate::model::status::NotificationAction;
use crate::schema::notifications::dsl as notif_dsl;
use diesel::dsl::exists;
use diesel::prelude::*;
use tracing::log::{debug, error};

pub(super) async fn run_query<T, F>(
    pool: &deadpool_diesel::postgres::Pool,
    query: F,
) -> Result<T, AppError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await.map_err(AppError::from)?;
    debug!("DB connection object obtained from pool for interaction");

    let res = conn.interact(query).await;

    match res {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(diesel_err)) => {
            error!("Diesel query failed within interaction: {:?}", diesel_err);
            Err(AppError::from(diesel_err))
        }
        Err(interact_err) => {
            error!("Deadpool interact error: {:?}", interact_err);
            Err(AppError::from(interact_err))
        }
    }
}

/// Appends a notification unless an identical actionable one is already
/// pending for the same recipient. The dedupe key is
/// `{type, recipient, course, tutor, action_status = none}`, so duplicate
/// sends are absorbed at write time instead of double-acting later.
///
/// Returns `true` if a row was inserted.
pub(super) fn insert_notification_deduped(
    conn: &mut diesel::PgConnection,
    new_notification: &NewNotification,
) -> Result<bool, diesel::result::Error> {
    let duplicate_pending = diesel::select(exists(
        notif_dsl::notifications
            .filter(notif_dsl::recipient_kind.eq(&new_notification.recipient_kind))
            .filter(notif_dsl::recipient_id.eq(new_notification.recipient_id))
            .filter(notif_dsl::notification_type.eq(&new_notification.notification_type))
            .filter(notif_dsl::course_id.is_not_distinct_from(new_notification.course_id))
            .filter(notif_dsl::tutor_id.is_not_distinct_from(new_notification.tutor_id))
            .filter(notif_dsl::action_status.eq(NotificationAction::None.as_str())),
    ))
    .get_result::<bool>(conn)?;

    if duplicate_pending {
        return Ok(false);
    }

    diesel::insert_into(notif_dsl::notifications)
        .values(new_notification)
        .execute(conn)?;
    Ok(true)
}
