use chrono::Utc;

use crate::db::models::StatKind;
use crate::error::AppError;
use crate::store::Store;

/// Bump today's counter for a client.
///
/// `previous_total` is the cumulative total before today; it becomes the
/// row's baseline only if this call creates the row. Concurrent bumps the
/// same day cannot corrupt the baseline because the store never rewrites it
/// on increment.
pub async fn bump(
    store: &dyn Store,
    client_id: &str,
    stat: StatKind,
    previous_total: i64,
) -> Result<(), AppError> {
    let day = Utc::now().date_naive();
    store
        .increment_client_stat(client_id, day, stat, previous_total)
        .await?;
    Ok(())
}
