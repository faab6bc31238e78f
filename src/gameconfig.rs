use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::time::Timestamp;

/// Used when the very first config row is created without a value.
pub const DEFAULT_EVENT_CHANCE: i64 = 0;

#[derive(Debug, Serialize, FromRow, PartialEq, Eq)]
pub struct GameConfig {
    pub config_id: i64,
    pub event_chance: i64,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigUpdate {
    pub event_chance: Option<i64>,
}
