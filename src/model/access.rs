use uuid::Uuid;

use crate::{
    model::{
        ModelManager, ResourceType,
        error::{DatabaseError, DatabaseResult},
    },
    web::AuthenticatedUser,
};

#[async_trait::async_trait]
pub trait HasOwner {
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid>;
}

pub async fn check_access<T: HasOwner + Sync>(
    mm: &ModelManager,
    actor: &AuthenticatedUser,
    resource: &T,
) -> DatabaseResult<()> {
    // admin can touch every resource
    if actor.is_admin() {
        return Ok(());
    }

    let owner = resource.get_owner_id(mm, actor).await?;
    if owner == actor.user_id() {
        Ok(())
    } else {
        Err(DatabaseError::Forbidden)
    }
}

/// Resolves the owner of a parent row, `query` must select a single uuid by `$1`.
pub(crate) async fn owner_of(
    mm: &ModelManager,
    query: &'static str,
    id: Uuid,
    parent: ResourceType,
) -> DatabaseResult<Uuid> {
    let owner: Option<Uuid> = sqlx::query_scalar(query)
        .bind(id)
        .fetch_optional(mm.executor())
        .await?;

    owner.ok_or(DatabaseError::NotFound(parent))
}
