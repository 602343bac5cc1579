mod access;
pub use access::{HasOwner, check_access};
pub(crate) use access::owner_of;

pub mod calc;

mod database;
pub use database::DbConnection;

pub mod entity;

mod error;
pub use error::{DatabaseError, DatabaseResult};

mod repo;
pub use repo::{
    CrudRepository, DEFAULT_PAGE_SIZE, Page, PageRequest, PaginatableRepository, ResourceType,
    ResourceTyped,
};

mod types;
pub use types::{
    AttemptStatus, ContentType, CourseStatus, EnrollmentStatus, QuestionType, Role,
};

use sqlx::{PgPool, Postgres, Transaction};

#[derive(Debug, Clone)]
pub struct ModelManager {
    database: DbConnection,
}

impl ModelManager {
    pub fn new(conn: DbConnection) -> Self {
        Self { database: conn }
    }

    pub fn executor(&self) -> &PgPool {
        self.database.pool()
    }

    /// Starts a transaction; dropped without `commit` it rolls back.
    pub async fn begin(&self) -> DatabaseResult<Transaction<'static, Postgres>> {
        let tx = self.database.pool().begin().await?;
        Ok(tx)
    }
}
