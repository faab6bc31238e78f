use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{query, query_as, query_scalar, types::Json, Pool, Sqlite};

use log::{error, info};

use crate::backend::FindError;
use crate::gameconfig::GameConfig;
use crate::review::{NewReview, Review, ReviewJoinRow, ReviewWithAuthor};
use crate::room::{NewRoom, Room, RoomUpdate};
use crate::time::Timestamp;
use crate::user::{NewUser, User, UserSummary};

type Result<T> = std::result::Result<T, ()>;

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("game.sql")
}

impl Backend {
    pub async fn new(data_dir: &Path) -> std::result::Result<Self, sqlx::Error> {
        let db_path = into_sql(data_dir);
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("Using {}", db_path.display());

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self(pool))
    }
}

impl Backend {
    pub async fn find_user(&self, login: &str) -> std::result::Result<User, FindError> {
        query_as::<_, User>(
            "
            SELECT *
            FROM users
            WHERE login = ?
            ORDER BY user_id
            LIMIT 1
            ",
        )
        .bind(login)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("couldn't query for user: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn create_user(&self, user: &NewUser, now: Timestamp) -> Result<i64> {
        query_scalar::<_, i64>(
            "
            INSERT INTO users
            (login, name, password, admin, created_at, updated_at)
            VALUES
            (?, ?, ?, ?, ?, ?)
            RETURNING user_id
            ",
        )
        .bind(&user.login)
        .bind(&user.name)
        .bind(&user.pwhash)
        .bind(user.admin)
        .bind(now)
        .bind(now)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting user: {e:?}");
        })
    }

    pub async fn users_page(&self, skip: i64, limit: i64) -> Result<Vec<UserSummary>> {
        query_as::<_, UserSummary>(
            "
            SELECT user_id, login, name, created_at
            FROM users
            ORDER BY updated_at DESC, user_id DESC
            LIMIT ? OFFSET ?
            ",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting users: {e:?}");
        })
    }

    /// Reviews by the user go with it (`ON DELETE CASCADE`).
    pub async fn delete_user(&self, user_id: i64) -> Result<u64> {
        query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.0)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                error!("error deleting user {user_id}: {e:?}");
            })
    }
}

impl Backend {
    pub async fn latest_config(&self) -> Result<Option<GameConfig>> {
        query_as::<_, GameConfig>(
            "
            SELECT *
            FROM global_config
            ORDER BY created_at DESC, config_id DESC
            LIMIT 1
            ",
        )
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting config: {e:?}");
        })
    }

    /// Appends a config row. A missing `event_chance` is carried over from
    /// the newest row, falling back to `default`.
    pub async fn insert_config(
        &self,
        event_chance: Option<i64>,
        default: i64,
        now: Timestamp,
    ) -> Result<GameConfig> {
        query_as::<_, GameConfig>(
            "
            INSERT INTO global_config
            (event_chance, created_at, updated_at)
            VALUES
            (
                coalesce(
                    ?,
                    (
                        SELECT event_chance
                        FROM global_config
                        ORDER BY created_at DESC, config_id DESC
                        LIMIT 1
                    ),
                    ?
                ),
                ?, ?
            )
            RETURNING *
            ",
        )
        .bind(event_chance)
        .bind(default)
        .bind(now)
        .bind(now)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting config: {e:?}");
        })
    }
}

impl Backend {
    pub async fn reviews(&self) -> Result<Vec<ReviewWithAuthor>> {
        query_as::<_, ReviewJoinRow>(
            "
            SELECT reviews.*, users.login, users.name
            FROM reviews
            INNER JOIN users
                ON reviews.author_id = users.user_id
            ORDER BY reviews.created_at DESC, reviews.review_id DESC
            ",
        )
        .fetch_all(&self.0)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| {
            error!("error selecting reviews: {e:?}");
        })
    }

    pub async fn review(&self, review_id: i64) -> Result<Option<Review>> {
        query_as::<_, Review>("SELECT * FROM reviews WHERE review_id = ?")
            .bind(review_id)
            .fetch_optional(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting review {review_id}: {e:?}");
            })
    }

    pub async fn add_review(&self, review: &NewReview, now: Timestamp) -> Result<Review> {
        query_as::<_, Review>(
            "
            INSERT INTO reviews
            (author_id, room_id, rating, comment, created_at, updated_at)
            VALUES
            (?, ?, ?, ?, ?, ?)
            RETURNING *
            ",
        )
        .bind(review.author_id)
        .bind(review.room_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(now)
        .bind(now)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting review: {e:?}");
        })
    }

    pub async fn delete_review(&self, review_id: i64) -> Result<u64> {
        query("DELETE FROM reviews WHERE review_id = ?")
            .bind(review_id)
            .execute(&self.0)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                error!("error deleting review {review_id}: {e:?}");
            })
    }
}

impl Backend {
    pub async fn create_room(&self, room: &NewRoom, now: Timestamp) -> Result<Room> {
        query_as::<_, Room>(
            "
            INSERT INTO rooms
            (owner_id, participants_id, first_params, budget_per_month, created_at, updated_at)
            VALUES
            (?, ?, ?, ?, ?, ?)
            RETURNING *
            ",
        )
        .bind(room.owner_id)
        .bind(Json(&room.participants_id))
        .bind(Json(&room.first_params))
        .bind(room.budget_per_month)
        .bind(now)
        .bind(now)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting room: {e:?}");
        })
    }

    pub async fn room(&self, room_id: i64) -> Result<Option<Room>> {
        query_as::<_, Room>("SELECT * FROM rooms WHERE room_id = ?")
            .bind(room_id)
            .fetch_optional(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting room {room_id}: {e:?}");
            })
    }

    /// `Ok(None)` when there is no such room.
    pub async fn update_room(
        &self,
        room_id: i64,
        update: &RoomUpdate,
        now: Timestamp,
    ) -> Result<Option<Room>> {
        query_as::<_, Room>(
            "
            UPDATE rooms
            SET
                completed = coalesce(?, completed),
                is_start = coalesce(?, is_start),
                current_month = coalesce(?, current_month),
                users_steps_state = coalesce(?, users_steps_state),
                is_finished = coalesce(?, is_finished),
                winners = coalesce(?, winners),
                updated_at = ?
            WHERE room_id = ?
            RETURNING *
            ",
        )
        .bind(update.completed)
        .bind(update.is_start)
        .bind(update.current_month)
        .bind(update.users_steps_state.as_ref().map(Json))
        .bind(update.is_finished)
        .bind(update.winners.as_ref().map(Json))
        .bind(now)
        .bind(room_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error updating room {room_id}: {e:?}");
        })
    }

    pub async fn rooms_page(&self, skip: i64, limit: i64) -> Result<Vec<Room>> {
        query_as::<_, Room>(
            "
            SELECT *
            FROM rooms
            ORDER BY updated_at DESC, room_id DESC
            LIMIT ? OFFSET ?
            ",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting rooms: {e:?}");
        })
    }

    pub async fn delete_room(&self, room_id: i64) -> Result<u64> {
        query("DELETE FROM rooms WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.0)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| {
                error!("error deleting room {room_id}: {e:?}");
            })
    }
}
