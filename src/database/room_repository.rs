use crate::database::error::DatabaseError;
use crate::database::repository::{Repository, TransactionalRepository};
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Room entity: read-only from this service's perspective. Rooms are
/// created and edited by the listings subsystem; admission only needs
/// price, capacity and the owning host.
#[derive(Debug, Clone, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub hostel_id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub price_per_night: BigDecimal,
    pub capacity: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for room lookups
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_uuid(&self, id: Uuid) -> Result<Option<Room>, DatabaseError> {
        sqlx::query_as::<_, Room>(
            "SELECT id, hostel_id, host_id, title, price_per_night, capacity, created_at
             FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl Repository for RoomRepository {
    type Entity = Room;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError> {
        let uuid = Uuid::parse_str(id).map_err(|e| {
            DatabaseError::new(crate::database::error::DatabaseErrorKind::Unknown {
                message: format!("Invalid UUID: {}", e),
            })
        })?;
        self.find_by_uuid(uuid).await
    }
}

impl TransactionalRepository for RoomRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}
