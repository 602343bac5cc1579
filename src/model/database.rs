use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::model::error::DatabaseResult;

static MAX_CONNECTIONS: u32 = 16;
static ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lazily connected postgres pool shared by every request.
#[derive(Debug, Clone)]
pub struct DbConnection {
    pool: PgPool,
}

impl DbConnection {
    /// Validates `database_uri` without opening a connection yet.
    pub fn connect(database_uri: &str) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_uri)?;
        tracing::debug!("database pool created, max {MAX_CONNECTIONS} connections");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
