use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::time::Timestamp;

#[derive(Debug, Serialize, FromRow, PartialEq, Eq)]
pub struct Review {
    pub review_id: i64,
    pub author_id: i64,
    pub room_id: i64,
    pub rating: i64,
    pub comment: String,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct NewReview {
    pub author_id: i64,
    pub room_id: i64,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewAuthor {
    pub user_id: i64,
    pub login: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub author: ReviewAuthor,
}

// flat row of the reviews/users join
#[derive(Debug, FromRow)]
pub struct ReviewJoinRow {
    #[sqlx(flatten)]
    pub review: Review,
    pub login: String,
    pub name: String,
}

impl From<ReviewJoinRow> for ReviewWithAuthor {
    fn from(row: ReviewJoinRow) -> Self {
        let author = ReviewAuthor {
            user_id: row.review.author_id,
            login: row.login,
            name: row.name,
        };

        Self {
            review: row.review,
            author,
        }
    }
}
