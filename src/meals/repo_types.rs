use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored meal row. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub slug: String,          // unique lookup key
    pub title: String,
    pub summary: String,
    pub instructions: String,  // sanitized
    pub image: String,         // object-store key, not the bytes
    pub creator: String,
    pub creator_email: String,
}
