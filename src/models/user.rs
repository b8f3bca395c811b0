//! Represents an account that owns bins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered user.
///
/// The credential hash is produced by the external identity service and is
/// never serialized back to clients.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    /// Unique login email. Also the seed of every object key the user owns.
    pub email: String,

    pub display_name: String,

    #[serde(skip_serializing)]
    pub credential_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a user together with the default bin.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub credential_hash: String,
}
