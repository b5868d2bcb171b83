use bb8::Pool;
use bb8_tiberius::ConnectionManager;
use tiberius::Config as TdsConfig;

pub type Db = Pool<ConnectionManager>;

pub async fn connect(
    connection_string: &str,
    max_size: u32,
) -> Result<Db, Box<dyn std::error::Error>> {
    let config = TdsConfig::from_ado_string(connection_string)?;
    let pool = Pool::builder()
        .max_size(max_size)
        .build(ConnectionManager::new(config))
        .await?;
    Ok(pool)
}
