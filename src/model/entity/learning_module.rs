use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::entity::{ContentBlock, LearningSection};
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{DatabaseError, ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LearningModule {
    id: Uuid,
    created_by: Uuid,
    title: String,
    description: Option<String>,
    subject: Option<String>,
    level: Option<String>,
    estimated_duration_minutes: Option<i32>,
    tags: Vec<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct LearningModuleCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    #[validate(range(min = 0))]
    pub estimated_duration_minutes: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ModuleSearch {
    pub query: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
}

impl ResourceTyped for LearningModule {
    fn get_resource_type() -> ResourceType {
        ResourceType::LearningModule
    }
}

impl LearningModule {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    /// Published modules are public, drafts only to their creator and admins.
    pub fn is_visible_to(&self, actor: Option<&AuthenticatedUser>) -> bool {
        self.is_published
            || actor.is_some_and(|a| a.is_admin() || a.user_id() == self.created_by)
    }
}

#[async_trait]
impl CrudRepository<LearningModule, LearningModuleCreate, Uuid> for LearningModule {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: LearningModuleCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO learning_modules (id, created_by, title, description, subject, level, estimated_duration_minutes, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(&data.level)
        .bind(data.estimated_duration_minutes)
        .bind(&data.tags)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LearningModuleCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE learning_modules SET
                title = $1, description = $2, subject = $3, level = $4,
                estimated_duration_minutes = $5, tags = $6, updated_at = now()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(&data.level)
        .bind(data.estimated_duration_minutes)
        .bind(&data.tags)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM learning_modules WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM learning_modules WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Published modules only.
    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM learning_modules WHERE is_published ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM learning_modules WHERE is_published")
                .fetch_one(mm.executor())
                .await?;
        Ok(result)
    }
}

impl_paginatable_for!(LearningModule, LearningModuleCreate, Uuid);

#[async_trait]
impl HasOwner for LearningModule {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.created_by)
    }
}

impl LearningModule {
    pub async fn list_by_creator(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM learning_modules WHERE created_by = $1 ORDER BY created_at DESC",
        )
        .bind(actor.user_id())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Published modules filtered by free text, subject and level; absent filters match all.
    pub async fn search(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        search: &ModuleSearch,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let pattern = search
            .query
            .as_deref()
            .map(|q| format!("%{}%", q.trim()));
        let filter = r#"is_published
            AND ($1::TEXT IS NULL OR title ILIKE $1 OR description ILIKE $1)
            AND ($2::TEXT IS NULL OR subject = $2)
            AND ($3::TEXT IS NULL OR level = $3)"#;

        let items = sqlx::query_as(&format!(
            "SELECT * FROM learning_modules WHERE {filter} ORDER BY title LIMIT $4 OFFSET $5"
        ))
        .bind(&pattern)
        .bind(&search.subject)
        .bind(&search.level)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM learning_modules WHERE {filter}"))
                .bind(&pattern)
                .bind(&search.subject)
                .bind(&search.level)
                .fetch_one(mm.executor())
                .await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn subjects(mm: &ModelManager) -> DatabaseResult<Vec<String>> {
        let result = sqlx::query_scalar(
            "SELECT DISTINCT subject FROM learning_modules WHERE is_published AND subject IS NOT NULL ORDER BY subject",
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn levels(mm: &ModelManager) -> DatabaseResult<Vec<String>> {
        let result = sqlx::query_scalar(
            "SELECT DISTINCT level FROM learning_modules WHERE is_published AND level IS NOT NULL ORDER BY level",
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn set_published(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        published: bool,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            "UPDATE learning_modules SET is_published = $1, updated_at = now() WHERE id = $2 RETURNING *",
        )
        .bind(published)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    /// Copies the module with its sections and blocks as an unpublished draft owned by `actor`.
    #[tracing::instrument(skip(self, mm, actor), fields(module = %self.id))]
    pub async fn clone_for(
        &self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self> {
        if !self.is_visible_to(Some(actor)) {
            return Err(DatabaseError::Forbidden);
        }

        let mut tx = mm.begin().await?;

        let copy: Self = sqlx::query_as(
            r#"
            INSERT INTO learning_modules (id, created_by, title, description, subject, level, estimated_duration_minutes, tags, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(format!("{} (Copy)", self.title))
        .bind(&self.description)
        .bind(&self.subject)
        .bind(&self.level)
        .bind(self.estimated_duration_minutes)
        .bind(&self.tags)
        .fetch_one(&mut *tx)
        .await?;

        let sections: Vec<LearningSection> = sqlx::query_as(
            "SELECT * FROM learning_sections WHERE module_id = $1 ORDER BY order_index",
        )
        .bind(self.id)
        .fetch_all(&mut *tx)
        .await?;

        for section in sections {
            let section_copy = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO learning_sections (id, module_id, title, description, order_index, estimated_time_minutes, is_required)
                SELECT $1, $2, title, description, order_index, estimated_time_minutes, is_required
                FROM learning_sections WHERE id = $3
                "#,
            )
            .bind(section_copy)
            .bind(copy.id)
            .bind(section.id())
            .execute(&mut *tx)
            .await?;

            let blocks: Vec<ContentBlock> =
                sqlx::query_as("SELECT * FROM content_blocks WHERE section_id = $1")
                    .bind(section.id())
                    .fetch_all(&mut *tx)
                    .await?;

            for block in blocks {
                sqlx::query(
                    r#"
                    INSERT INTO content_blocks (id, section_id, content_type, content, content_url, order_index, estimated_time_minutes, difficulty_level)
                    SELECT $1, $2, content_type, content, content_url, order_index, estimated_time_minutes, difficulty_level
                    FROM content_blocks WHERE id = $3
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(section_copy)
                .bind(block.id())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(copy)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Role;

    fn module(published: bool, created_by: Uuid) -> LearningModule {
        let now = Utc::now();
        LearningModule {
            id: Uuid::new_v4(),
            created_by,
            title: String::from("Ownership"),
            description: None,
            subject: Some(String::from("Rust")),
            level: None,
            estimated_duration_minutes: None,
            tags: vec![],
            is_published: published,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn drafts_are_private() {
        let creator = AuthenticatedUser::new(Uuid::new_v4(), Role::Instructor);
        let stranger = AuthenticatedUser::new(Uuid::new_v4(), Role::Student);
        let draft = module(false, creator.user_id());

        assert!(draft.is_visible_to(Some(&creator)));
        assert!(draft.is_visible_to(Some(&AuthenticatedUser::admin())));
        assert!(!draft.is_visible_to(Some(&stranger)));
        assert!(!draft.is_visible_to(None));
        assert!(module(true, creator.user_id()).is_visible_to(None));
    }
}
