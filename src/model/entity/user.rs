use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::entity::{Enrollment, LearningPathEnrollment};
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{DatabaseError, ModelManager, Role, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserEntity {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    #[serde(skip)]
    password_hash: String,
    role: Role,
    bio: Option<String>,
    phone: Option<String>,
    city: Option<String>,
    country: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Profile columns. `password_hash` is required on create and kept when `None` on update.
#[derive(Debug, Clone, Default)]
pub struct UserEntityCreateUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub instructors: i64,
    pub students: i64,
    pub admins: i64,
}

impl ResourceTyped for UserEntity {
    fn get_resource_type() -> ResourceType {
        ResourceType::User
    }
}

impl UserEntity {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[async_trait]
impl CrudRepository<UserEntity, UserEntityCreateUpdate, Uuid> for UserEntity {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let Some(hash) = data.password_hash else {
            return Err(DatabaseError::invalid_state("password is required"));
        };

        sqlx::query_as(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, role, bio, phone, city, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.email.to_lowercase())
        .bind(&hash)
        .bind(data.role)
        .bind(&data.bio)
        .bind(&data.phone)
        .bind(&data.city)
        .bind(&data.country)
        .fetch_one(mm.executor())
        .await
        .map_err(|e| DatabaseError::unique_or(e, "email is already registered"))
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        sqlx::query_as(
            r#"
            UPDATE users SET
                first_name = $1, last_name = $2, email = $3,
                password_hash = COALESCE($4, password_hash),
                role = $5, bio = $6, phone = $7, city = $8, country = $9,
                updated_at = now()
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.email.to_lowercase())
        .bind(&data.password_hash)
        .bind(data.role)
        .bind(&data.bio)
        .bind(&data.phone)
        .bind(&data.city)
        .bind(&data.country)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await
        .map_err(|e| DatabaseError::unique_or(e, "email is already registered"))
    }

    /// Enrollments go with the account, so their seats are released first.
    #[tracing::instrument(skip(self, mm, _actor), fields(user = %self.id))]
    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        let mut tx = mm.begin().await?;

        Enrollment::release_seats_in(&mut tx, self.id).await?;
        LearningPathEnrollment::release_for_user_in(&mut tx, self.id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("user {} deleted", self.id);
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM users ORDER BY created_at LIMIT $1 OFFSET $2")
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(UserEntity, UserEntityCreateUpdate, Uuid);

#[async_trait]
impl HasOwner for UserEntity {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.id) // owners of users are themselves
    }
}

impl UserEntity {
    pub async fn find_by_email(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        email: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn exists_by_email(mm: &ModelManager, email: &str) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email.to_lowercase())
            .fetch_one(mm.executor())
            .await?;
        Ok(exists)
    }

    pub async fn page_by_role(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        role: Role,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM users WHERE role = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
        )
        .bind(role)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn page_active(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM users WHERE is_active ORDER BY created_at LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    /// Case-insensitive match on first name, last name or both joined by a space.
    pub async fn search_by_name(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        name: &str,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let pattern = format!("%{}%", name.trim());
        let filter = "first_name ILIKE $1 OR last_name ILIKE $1 OR (first_name || ' ' || last_name) ILIKE $1";

        let items = sqlx::query_as(&format!(
            "SELECT * FROM users WHERE {filter} ORDER BY last_name, first_name LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn set_active(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        active: bool,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            "UPDATE users SET is_active = $1, updated_at = now() WHERE id = $2 RETURNING *",
        )
        .bind(active)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn statistics(mm: &ModelManager) -> DatabaseResult<UserStatistics> {
        let result = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_users,
                COUNT(*) FILTER (WHERE is_active) AS active_users,
                COUNT(*) FILTER (WHERE role = 'INSTRUCTOR') AS instructors,
                COUNT(*) FILTER (WHERE role = 'STUDENT') AS students,
                COUNT(*) FILTER (WHERE role = 'ADMIN') AS admins
            FROM users
            "#,
        )
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }
}
