use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::retry::{self, Retryable};
use crate::store::is_transient_sqlx;

struct ConnectError(sqlx::Error);

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Retryable for ConnectError {
    fn is_transient(&self) -> bool {
        is_transient_sqlx(&self.0)
    }
}

pub async fn init_db(config: &Config) -> Result<MySqlPool, AppError> {
    let options = MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name);

    let pool = retry::run(&config.retry, "connect to MySQL", || {
        let options = options.clone();
        async move {
            MySqlPoolOptions::new()
                .max_connections(2)
                .connect_with(options)
                .await
                .map_err(ConnectError)
        }
    })
    .await
    .map_err(|ConnectError(e)| AppError::Connection(e))?;

    info!(host = %config.db_host, database = %config.db_name, "Connected to MySQL");
    Ok(pool)
}
