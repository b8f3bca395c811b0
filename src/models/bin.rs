//! Represents a bin, a user-owned container for documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Name given to the bin created alongside every user.
pub const DEFAULT_BIN_NAME: &str = "No Bin";

pub const BIN_NAME_MIN_LEN: usize = 3;
pub const BIN_NAME_MAX_LEN: usize = 100;

/// A document container.
///
/// Bins are flat namespaces for reference names: two documents in the same
/// bin can never share one.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    pub id: i64,

    pub name: String,

    /// ID of the user that owns this bin.
    #[serde(rename = "owner")]
    pub owner_id: i64,

    pub created_at: DateTime<Utc>,
}
