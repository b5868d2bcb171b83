use super::pool::Db;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Apply the schema, one semicolon-terminated statement at a time. Every
/// statement carries its own existence guard, so reapplying is a no-op.
/// Returns how many statements ran.
pub async fn run(pool: &Db) -> Result<usize, Box<dyn std::error::Error>> {
    let mut conn = pool.get().await?;
    let mut applied = 0;
    for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        conn.execute(stmt, &[]).await?;
        applied += 1;
    }
    Ok(applied)
}
