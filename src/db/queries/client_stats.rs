use chrono::NaiveDate;
use tiberius::Row;

use crate::db::models::{ClientStat, StatKind};
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{map_pool_err, map_query_err};

fn row_to_client_stat(row: &Row) -> ClientStat {
    ClientStat {
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        day: row.get::<NaiveDate, _>("day").unwrap_or_default(),
        stat: match row.get::<&str, _>("stat").unwrap_or_default() {
            "active_users" => StatKind::ActiveUsers,
            "test_accounts" => StatKind::TestAccounts,
            _ => StatKind::RegisteredUsers,
        },
        count: row.get::<i64, _>("count").unwrap_or_default(),
        previous_count: row.get::<i64, _>("previous_count").unwrap_or_default(),
    }
}

/// Upsert-with-increment. The UPDATE-then-INSERT ordering plus the unique
/// index makes concurrent increments safe: a racer whose INSERT collides
/// retries the UPDATE, and `previous_count` is only ever written by the
/// INSERT that creates the row.
pub async fn increment(
    pool: &Db,
    client_id: &str,
    day: NaiveDate,
    stat: StatKind,
    previous_count: i64,
) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;

    let updated = conn
        .execute(
            "UPDATE client_stats SET [count] = [count] + 1 WHERE client_id = @P1 AND [day] = @P2 AND stat = @P3",
            &[&client_id, &day, &stat.as_str()],
        )
        .await
        .map_err(map_query_err)?;
    if updated.total() > 0 {
        return Ok(());
    }

    let inserted = conn
        .execute(
            "INSERT INTO client_stats (client_id, [day], stat, [count], previous_count) VALUES (@P1, @P2, @P3, 1, @P4)",
            &[&client_id, &day, &stat.as_str(), &previous_count],
        )
        .await;

    match inserted {
        Ok(_) => Ok(()),
        Err(e) => match map_query_err(e) {
            StoreError::DuplicateKey(_) => {
                // Lost the creation race; the row exists now.
                conn.execute(
                    "UPDATE client_stats SET [count] = [count] + 1 WHERE client_id = @P1 AND [day] = @P2 AND stat = @P3",
                    &[&client_id, &day, &stat.as_str()],
                )
                .await
                .map_err(map_query_err)?;
                Ok(())
            }
            other => Err(other),
        },
    }
}

pub async fn find(
    pool: &Db,
    client_id: &str,
    day: NaiveDate,
    stat: StatKind,
) -> Result<Option<ClientStat>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM client_stats WHERE client_id = @P1 AND [day] = @P2 AND stat = @P3",
            &[&client_id, &day, &stat.as_str()],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_client_stat))
}
