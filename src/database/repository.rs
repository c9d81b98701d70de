//! Common repository traits

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::PgPool;

/// Basic lookup interface shared by the entity repositories.
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Send + Sync;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError>;
}

/// Marker for repositories that expose their pool so callers can run
/// multi-statement work in a single transaction.
pub trait TransactionalRepository {
    fn pool(&self) -> &PgPool;
}
