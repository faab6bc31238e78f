use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};

use crate::time::Timestamp;

#[derive(Debug, Serialize, FromRow)]
pub struct Room {
    pub room_id: i64,
    pub owner_id: i64,
    pub participants_id: Json<Value>,
    pub first_params: Json<Value>,
    pub completed: bool,
    pub is_start: bool,
    pub budget_per_month: i64,
    pub users_steps_state: Option<Json<Vec<Value>>>,
    pub current_month: i64,
    pub is_finished: bool,
    pub winners: Option<Json<Value>>,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct NewRoom {
    pub owner_id: i64,
    pub participants_id: Value,
    pub first_params: Value,
    #[serde(default)]
    pub budget_per_month: i64,
}

/// Game-state fields a client may change; `None` leaves a field as is.
#[derive(Debug, Deserialize, Default)]
pub struct RoomUpdate {
    pub completed: Option<bool>,
    pub is_start: Option<bool>,
    pub current_month: Option<i64>,
    pub users_steps_state: Option<Vec<Value>>,
    pub is_finished: Option<bool>,
    pub winners: Option<Value>,
}
