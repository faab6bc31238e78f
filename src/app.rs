use std::{result, sync::Arc};

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use warp::http;

use crate::auth::{self, AuthError, AuthHeader, Claims, TokenKeys};
use crate::backend::{Backend, FindError};
use crate::gameconfig::{ConfigUpdate, GameConfig, DEFAULT_EVENT_CHANCE};
use crate::review::{NewReview, Review, ReviewWithAuthor};
use crate::room::{NewRoom, Room, RoomUpdate};
use crate::time::Timestamp;
use crate::user::{NewUser, UserSummary};

pub const PAGE_SIZE: i64 = 10;

pub struct App {
    backend: Backend,
    tokens: TokenKeys,
    hash_cost: u32,
}

/// Only obtainable through [`App::authenticate_admin`], so holding one
/// means the request carried a valid admin token.
pub struct AppAdmin {
    app: Arc<App>,
    claims: Claims,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    status: u16,
    message: &'static str,
    token: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Internal,
    Unauthorized,
    Forbidden,
    BadRequest,
    BadCredentials,
    NotFound,
}

pub type Result<T> = result::Result<T, Error>;

impl Into<http::StatusCode> for Error {
    fn into(self) -> http::StatusCode {
        match self {
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Self::Forbidden => http::StatusCode::FORBIDDEN,
            Self::BadRequest => http::StatusCode::BAD_REQUEST,
            Self::BadCredentials | Self::NotFound => http::StatusCode::NOT_FOUND,
        }
    }
}

impl Error {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Internal => "internal server error",
            Self::Unauthorized => "not authorized",
            Self::Forbidden => "admin access required",
            Self::BadRequest => "empty or malformed request",
            Self::BadCredentials => "wrong login or password",
            Self::NotFound => "not found",
        }
    }
}

impl warp::reject::Reject for Error {}

/// Page numbers start at 1; anything lower is the first page.
pub fn page_skip(offset: i64) -> i64 {
    offset.saturating_sub(1).saturating_mul(PAGE_SIZE).max(0)
}

impl App {
    pub fn new(backend: Backend, tokens: TokenKeys) -> Self {
        Self {
            backend,
            tokens,
            hash_cost: auth::DEFAULT_COST,
        }
    }

    #[cfg(test)]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let LoginRequest { login, password } = request;

        if login.is_empty() || password.is_empty() {
            debug!("empty login attempt");
            return Err(Error::BadRequest);
        }

        let user = self.backend.find_user(&login).await.map_err(|e| match e {
            FindError::NotFound => {
                info!("rejecting non-existant user {login}");
                Error::BadCredentials
            }
            FindError::Internal => {
                error!("couldn't authenticate user {login}");
                Error::Internal
            }
        })?;

        let matched = auth::verify_password(password, user.password)
            .await
            .map_err(|auth::HashError| Error::Internal)?;

        if !matched {
            info!("wrong password for user {login}");
            return Err(Error::BadCredentials);
        }

        let token = self
            .tokens
            .issue(Claims {
                id: user.user_id,
                name: user.name,
                admin: user.admin,
            })
            .map_err(|e| {
                error!("couldn't sign token for {login}: {e}");
                Error::Internal
            })?;

        info!("{login} logged in");
        Ok(LoginResponse {
            status: http::StatusCode::ACCEPTED.as_u16(),
            message: "user found",
            token,
        })
    }

    pub fn authenticate_admin(self: &Arc<Self>, header: Option<&str>) -> Result<AppAdmin> {
        let header: AuthHeader = header
            .ok_or(AuthError::Missing)
            .and_then(str::parse)
            .map_err(|e| {
                debug!("bad authorization header: {e:?}");
                Error::Unauthorized
            })?;

        let claims = self
            .tokens
            .verify(header.token())
            .map_err(|_| Error::Unauthorized)?;

        if !claims.admin {
            warn!("user {} ({}) is not an admin", claims.id, claims.name);
            return Err(Error::Forbidden);
        }

        trace!("admin {} authenticated", claims.id);
        Ok(AppAdmin {
            app: Arc::clone(self),
            claims,
        })
    }

    /// Seeds a user; there is no public endpoint for this.
    pub async fn add_user(
        &self,
        login: String,
        name: String,
        password: String,
        admin: bool,
    ) -> Result<i64> {
        if login.is_empty() || password.is_empty() {
            return Err(Error::BadRequest);
        }

        let pwhash = auth::hash_password(password, self.hash_cost)
            .await
            .map_err(|auth::HashError| Error::Internal)?;
        let now = now()?;

        let user_id = self
            .backend
            .create_user(
                &NewUser {
                    login,
                    name,
                    pwhash,
                    admin,
                },
                now,
            )
            .await
            .map_err(|()| Error::Internal)?;

        info!("created user {user_id}");
        Ok(user_id)
    }
}

impl App {
    pub async fn reviews(&self) -> Result<Vec<ReviewWithAuthor>> {
        let reviews = self
            .backend
            .reviews()
            .await
            .map_err(|()| Error::Internal)?;

        trace!("{} reviews", reviews.len());
        Ok(reviews)
    }

    pub async fn review(&self, review_id: i64) -> Result<Option<Review>> {
        self.backend
            .review(review_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn add_review(&self, review: NewReview) -> Result<Review> {
        let now = now()?;
        let review = self
            .backend
            .add_review(&review, now)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "user {} reviewed room {}: {}",
            review.author_id, review.room_id, review.rating
        );
        Ok(review)
    }

    pub async fn delete_review(&self, review_id: i64) -> Result<()> {
        let deleted = self
            .backend
            .delete_review(review_id)
            .await
            .map_err(|()| Error::Internal)?;

        info!("deleted review {review_id} ({deleted} rows)");
        Ok(())
    }
}

impl App {
    pub async fn create_room(&self, room: NewRoom) -> Result<Room> {
        let now = now()?;
        let room = self
            .backend
            .create_room(&room, now)
            .await
            .map_err(|()| Error::Internal)?;

        info!("user {} created room {}", room.owner_id, room.room_id);
        Ok(room)
    }

    pub async fn room(&self, room_id: i64) -> Result<Option<Room>> {
        self.backend
            .room(room_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn update_room(&self, room_id: i64, update: RoomUpdate) -> Result<Room> {
        trace!("updating room {room_id}: {update:?}");

        let now = now()?;
        self.backend
            .update_room(room_id, &update, now)
            .await
            .map_err(|()| Error::Internal)?
            .ok_or_else(|| {
                info!("no room {room_id} to update");
                Error::NotFound
            })
    }
}

impl AppAdmin {
    #[cfg(test)]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub async fn users(&self, offset: i64) -> Result<Vec<UserSummary>> {
        let skip = page_skip(offset);
        trace!("admin {} listing users from {skip}", self.claims.id);

        self.app
            .backend
            .users_page(skip, PAGE_SIZE)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        let deleted = self
            .app
            .backend
            .delete_user(user_id)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "admin {} deleted user {user_id} ({deleted} rows)",
            self.claims.id
        );
        Ok(())
    }

    pub async fn config(&self) -> Result<Option<GameConfig>> {
        self.app
            .backend
            .latest_config()
            .await
            .map_err(|()| Error::Internal)
    }

    /// Config is versioned: this appends a row rather than editing one.
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<GameConfig> {
        let now = now()?;
        let config = self
            .app
            .backend
            .insert_config(update.event_chance, DEFAULT_EVENT_CHANCE, now)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "admin {} set event_chance {}",
            self.claims.id, config.event_chance
        );
        Ok(config)
    }

    pub async fn rooms(&self, offset: i64) -> Result<Vec<Room>> {
        self.app
            .backend
            .rooms_page(page_skip(offset), PAGE_SIZE)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn delete_room(&self, room_id: i64) -> Result<()> {
        let deleted = self
            .app
            .backend
            .delete_room(room_id)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "admin {} deleted room {room_id} ({deleted} rows)",
            self.claims.id
        );
        Ok(())
    }
}

fn now() -> Result<Timestamp> {
    Timestamp::now().map_err(|()| Error::Internal)
}

#[cfg(test)]
pub mod test {
    use super::*;

    use serde_json::json;
    use sqlx::query;

    use crate::backend;

    pub const SECRET: &[u8] = b"test secret";

    pub async fn create_app() -> Arc<App> {
        let db = backend::test::create_db().await;
        let tokens = TokenKeys::new(SECRET, None);

        Arc::new(App::new(backend::Backend(db), tokens).with_hash_cost(4))
    }

    pub fn token_for(id: i64, admin: bool) -> String {
        TokenKeys::new(SECRET, None)
            .issue(Claims {
                id,
                name: format!("user{id}"),
                admin,
            })
            .unwrap()
    }

    fn admin(app: &Arc<App>) -> AppAdmin {
        app.authenticate_admin(Some(token_for(1, true).as_str()))
            .ok()
            .unwrap()
    }

    #[test]
    fn page_skip_clamps() {
        assert_eq!(page_skip(1), 0);
        assert_eq!(page_skip(2), 10);
        assert_eq!(page_skip(0), 0);
        assert_eq!(page_skip(-5), 0);
        assert_eq!(page_skip(i64::MIN), 0);
    }

    #[tokio::test]
    async fn login() {
        let app = create_app().await;
        app.add_user("nikita".into(), "Nikita".into(), "pass".into(), true)
            .await
            .unwrap();

        let ok = app
            .login(LoginRequest {
                login: "nikita".into(),
                password: "pass".into(),
            })
            .await
            .unwrap();
        assert_eq!(ok.status, 202);

        let claims = app.tokens.verify(&ok.token).unwrap();
        assert_eq!(claims.name, "Nikita");
        assert!(claims.admin);

        let wrong_pass = app
            .login(LoginRequest {
                login: "nikita".into(),
                password: "nope".into(),
            })
            .await;
        assert_eq!(wrong_pass.err(), Some(Error::BadCredentials));

        let no_user = app
            .login(LoginRequest {
                login: "ghost".into(),
                password: "pass".into(),
            })
            .await;
        assert_eq!(no_user.err(), Some(Error::BadCredentials));

        let empty = app
            .login(LoginRequest {
                login: "nikita".into(),
                password: "".into(),
            })
            .await;
        assert_eq!(empty.err(), Some(Error::BadRequest));
    }

    #[tokio::test]
    async fn login_with_broken_hash_is_internal() {
        let app = create_app().await;

        query(
            "INSERT INTO users (login, name, password, admin, created_at, updated_at)
            VALUES ('plain', 'Plain', 'not-a-bcrypt-hash', FALSE, 1, 1)",
        )
        .execute(&app.backend.0)
        .await
        .unwrap();

        let r = app
            .login(LoginRequest {
                login: "plain".into(),
                password: "not-a-bcrypt-hash".into(),
            })
            .await;
        assert_eq!(r.err(), Some(Error::Internal));
    }

    #[tokio::test]
    async fn admin_gate() {
        let app = create_app().await;

        assert_eq!(app.authenticate_admin(None).err(), Some(Error::Unauthorized));
        assert_eq!(
            app.authenticate_admin(Some("junk")).err(),
            Some(Error::Unauthorized)
        );
        assert_eq!(
            app.authenticate_admin(Some(token_for(2, false).as_str())).err(),
            Some(Error::Forbidden)
        );

        let bearer = format!("Bearer {}", token_for(3, true));
        let admin = app.authenticate_admin(Some(bearer.as_str())).ok().unwrap();
        assert_eq!(admin.claims().id, 3);
    }

    #[tokio::test]
    async fn user_pages() {
        let app = create_app().await;

        // user i was last updated at time i, so newest-first is 25, 24, ...
        for i in 1..=25 {
            query(
                "INSERT INTO users (login, name, password, admin, created_at, updated_at)
                VALUES (?, ?, 'x', FALSE, ?, ?)",
            )
            .bind(format!("login{i}"))
            .bind(format!("name{i}"))
            .bind(i)
            .bind(i)
            .execute(&app.backend.0)
            .await
            .unwrap();
        }

        let admin = admin(&app);
        let ids = |users: Vec<UserSummary>| users.iter().map(|u| u.user_id).collect::<Vec<_>>();

        let first = ids(admin.users(1).await.unwrap());
        assert_eq!(first, (16..=25).rev().collect::<Vec<_>>());

        let second = ids(admin.users(2).await.unwrap());
        assert_eq!(second, (6..=15).rev().collect::<Vec<_>>());

        let third = ids(admin.users(3).await.unwrap());
        assert_eq!(third, (1..=5).rev().collect::<Vec<_>>());

        assert_eq!(ids(admin.users(0).await.unwrap()), first);
        assert_eq!(ids(admin.users(-3).await.unwrap()), first);
        assert!(admin.users(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_user_deletes_their_reviews() {
        let app = create_app().await;
        let keep = app
            .add_user("keep".into(), "Keep".into(), "pw".into(), false)
            .await
            .unwrap();
        let gone = app
            .add_user("gone".into(), "Gone".into(), "pw".into(), false)
            .await
            .unwrap();

        for (author_id, rating) in [(keep, 5), (gone, 1), (gone, 2)] {
            app.add_review(NewReview {
                author_id,
                room_id: 1,
                rating,
                comment: "c".into(),
            })
            .await
            .unwrap();
        }
        assert_eq!(app.reviews().await.unwrap().len(), 3);

        admin(&app).delete_user(gone).await.unwrap();

        let left = app.reviews().await.unwrap();
        let [ref only] = left[..] else {
            panic!("expected single review")
        };
        assert_eq!(only.review.author_id, keep);
        assert_eq!(only.author.login, "keep");
    }

    #[tokio::test]
    async fn reviews() {
        let app = create_app().await;
        let author = app
            .add_user("rev".into(), "Reviewer".into(), "pw".into(), false)
            .await
            .unwrap();

        let first = app
            .add_review(NewReview {
                author_id: author,
                room_id: 4,
                rating: 3,
                comment: "fine".into(),
            })
            .await
            .unwrap();
        let second = app
            .add_review(NewReview {
                author_id: author,
                room_id: 4,
                rating: 5,
                comment: "great".into(),
            })
            .await
            .unwrap();

        // newest first
        let all = app.reviews().await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.review.review_id).collect();
        assert_eq!(ids, vec![second.review_id, first.review_id]);
        assert_eq!(all[0].author.name, "Reviewer");

        assert_eq!(app.review(first.review_id).await.unwrap(), Some(first));
        assert_eq!(app.review(999).await.unwrap(), None);

        app.delete_review(second.review_id).await.unwrap();
        assert_eq!(app.review(second.review_id).await.unwrap(), None);

        // no such author
        let orphan = app
            .add_review(NewReview {
                author_id: 12345,
                room_id: 4,
                rating: 1,
                comment: "".into(),
            })
            .await;
        assert_eq!(orphan.err(), Some(Error::Internal));
    }

    #[tokio::test]
    async fn config_is_appended() {
        let app = create_app().await;
        let admin = admin(&app);

        assert_eq!(admin.config().await.unwrap(), None);

        let initial = admin.update_config(ConfigUpdate::default()).await.unwrap();
        assert_eq!(initial.event_chance, DEFAULT_EVENT_CHANCE);

        let set = admin
            .update_config(ConfigUpdate {
                event_chance: Some(35),
            })
            .await
            .unwrap();
        assert_eq!(set.event_chance, 35);

        let carried = admin.update_config(ConfigUpdate::default()).await.unwrap();
        assert_eq!(carried.event_chance, 35);
        assert!(carried.config_id > set.config_id);

        let current = admin.config().await.unwrap().unwrap();
        assert_eq!(current.config_id, carried.config_id);
    }

    #[tokio::test]
    async fn current_config_is_newest_created() {
        let app = create_app().await;

        // inserted out of creation order
        query(
            "INSERT INTO global_config (event_chance, created_at, updated_at)
            VALUES (50, 200, 200), (10, 100, 100)",
        )
        .execute(&app.backend.0)
        .await
        .unwrap();

        let admin = admin(&app);
        let current = admin.config().await.unwrap().unwrap();
        assert_eq!(current.event_chance, 50);
        assert_eq!(current.created_at, Timestamp::from_i64(200));

        let carried = admin.update_config(ConfigUpdate::default()).await.unwrap();
        assert_eq!(carried.event_chance, 50);
    }

    #[tokio::test]
    async fn rooms() {
        let app = create_app().await;

        let room = app
            .create_room(NewRoom {
                owner_id: 1,
                participants_id: json!([1, 2]),
                first_params: json!({ "salary": 1000 }),
                budget_per_month: 500,
            })
            .await
            .unwrap();
        assert!(!room.completed);
        assert!(room.is_start);
        assert_eq!(room.current_month, 0);
        assert!(room.users_steps_state.is_none());

        let updated = app
            .update_room(
                room.room_id,
                RoomUpdate {
                    current_month: Some(2),
                    users_steps_state: Some(vec![json!({ "user": 1, "step": 2 })]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.current_month, 2);
        assert_eq!(updated.budget_per_month, 500);
        assert_eq!(updated.first_params.0, json!({ "salary": 1000 }));
        assert_eq!(
            updated.users_steps_state.map(|s| s.0),
            Some(vec![json!({ "user": 1, "step": 2 })])
        );

        let missing = app.update_room(999, RoomUpdate::default()).await;
        assert_eq!(missing.err(), Some(Error::NotFound));

        let admin = admin(&app);
        assert_eq!(admin.rooms(1).await.unwrap().len(), 1);

        admin.delete_room(room.room_id).await.unwrap();
        assert!(app.room(room.room_id).await.unwrap().is_none());
    }
}
