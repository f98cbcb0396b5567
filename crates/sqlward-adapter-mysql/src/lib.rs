//! MySQL / MariaDB implementation of [`ConnectionPool`] on top of sqlx.

use async_trait::async_trait;
use sqlward_core::{DatabaseConfig, SqlValue, WriteOutcome};
use sqlward_runtime::{ConnectionPool, PoolError, QueryRows};
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions};
use sqlx::Arguments;
use std::time::Duration;

mod decode;

use decode::{classify, column_names, decode_row};

fn args_add<T>(args: &mut MySqlArguments, v: T) -> Result<(), PoolError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, MySql> + sqlx::Type<MySql>,
{
    args.add(v)
        .map_err(|e| PoolError::programming(format!("cannot bind parameter: {}", e)))
}

fn bind_params(params: &[SqlValue]) -> Result<MySqlArguments, PoolError> {
    let mut args = MySqlArguments::default();
    for param in params {
        match param {
            SqlValue::Null => args_add(&mut args, Option::<String>::None)?,
            SqlValue::Bool(b) => args_add(&mut args, *b)?,
            SqlValue::Int(i) => args_add(&mut args, *i)?,
            SqlValue::Float(f) => args_add(&mut args, *f)?,
            SqlValue::Text(s) => args_add(&mut args, s.clone())?,
        }
    }
    Ok(args)
}

fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
}

pub struct MySqlAdapter {
    pool: MySqlPool,
}

impl MySqlAdapter {
    /// Open a pool and establish the first connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PoolError> {
        let pool = pool_options(config)
            .connect(&config.connection_string())
            .await
            .map_err(classify)?;
        tracing::info!(
            target_db = %config.redacted_connection_string(),
            max_connections = config.max_connections,
            "Connected to MySQL"
        );
        Ok(Self { pool })
    }

    /// Build the pool without dialing; connections are opened on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, PoolError> {
        let pool = pool_options(config)
            .connect_lazy(&config.connection_string())
            .map_err(classify)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Statements without parameters go over the text protocol: MySQL refuses to
// prepare some of them (CREATE TRIGGER, several SHOW forms).
#[async_trait]
impl ConnectionPool for MySqlAdapter {
    async fn fetch_all(&self, statement: &str, params: &[SqlValue]) -> Result<QueryRows, PoolError> {
        let records = if params.is_empty() {
            sqlx::raw_sql(statement).fetch_all(&self.pool).await
        } else {
            sqlx::query_with(statement, bind_params(params)?)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(classify)?;

        let columns = records.first().map(column_names).unwrap_or_default();
        let rows = records
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;
        Ok(QueryRows::new(columns, rows))
    }

    async fn execute(&self, statement: &str, params: &[SqlValue]) -> Result<WriteOutcome, PoolError> {
        let result = if params.is_empty() {
            sqlx::raw_sql(statement).execute(&self.pool).await
        } else {
            sqlx::query_with(statement, bind_params(params)?)
                .execute(&self.pool)
                .await
        }
        .map_err(classify)?;
        Ok(WriteOutcome::new(result.rows_affected()))
    }

    fn is_active(&self) -> bool {
        !self.pool.is_closed()
    }
}
