use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::tenant::TenantOwned;

/// Client (customer) entity, tenant-owned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantOwned for Client {
    const TABLE: &'static str = "clients";
    const SELECT_COLUMNS: &'static str =
        "id, organization_id, name, notes, created_at, updated_at";

    fn organization_id(&self) -> Uuid {
        self.organization_id
    }
}
