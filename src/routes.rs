use std::{convert::Infallible, sync::Arc};

use log::{error, trace};
use serde::de::DeserializeOwned;
use serde_json::json;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::app::{App, AppAdmin, Error, LoginRequest};
use crate::gameconfig::ConfigUpdate;
use crate::review::NewReview;
use crate::room::{NewRoom, RoomUpdate};

const BODY_LIMIT: u64 = 64 * 1024;

pub fn with_state<T>(state: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send,
{
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

/// Authenticates once for the whole `/api/admin/` subtree.
fn admin_gate(app: Arc<App>) -> impl Filter<Extract = (AppAdmin,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(app))
        .and_then(|auth: Option<String>, app: Arc<App>| async move {
            app.authenticate_admin(auth.as_deref())
                .map_err(warp::reject::custom)
        })
}

#[derive(Debug)]
enum AdminRequest {
    Users(i64),
    DeleteUser(i64),
    Config,
    UpdateConfig(ConfigUpdate),
    Rooms(i64),
    DeleteRoom(i64),
}

/// Paths below `/api/admin/`.
fn admin_requests() -> impl Filter<Extract = (AdminRequest,), Error = Rejection> + Clone {
    let users = warp::path!("users" / "list" / i64)
        .and(warp::get())
        .map(AdminRequest::Users);
    let delete_user = warp::path!("users" / "id" / i64)
        .and(warp::delete())
        .map(AdminRequest::DeleteUser);
    let config = warp::path!("globalconfig")
        .and(warp::get())
        .map(|| AdminRequest::Config);
    let update_config = warp::path!("globalconfig")
        .and(warp::post())
        .and(json_body())
        .map(AdminRequest::UpdateConfig);
    let rooms = warp::path!("rooms" / "list" / i64)
        .and(warp::get())
        .map(AdminRequest::Rooms);
    let delete_room = warp::path!("rooms" / "id" / i64)
        .and(warp::delete())
        .map(AdminRequest::DeleteRoom);

    users
        .or(delete_user)
        .unify()
        .or(config)
        .unify()
        .or(update_config)
        .unify()
        .or(rooms)
        .unify()
        .or(delete_room)
        .unify()
}

async fn serve_admin(
    admin: AppAdmin,
    request: AdminRequest,
) -> Result<warp::reply::Json, Rejection> {
    trace!("admin {request:?}");

    let reply = match request {
        AdminRequest::Users(offset) => admin
            .users(offset)
            .await
            .map(|users| warp::reply::json(&users)),
        AdminRequest::DeleteUser(user_id) => admin.delete_user(user_id).await.map(|()| ok()),
        AdminRequest::Config => admin
            .config()
            .await
            .map(|config| warp::reply::json(&json!({ "config": config }))),
        AdminRequest::UpdateConfig(update) => admin
            .update_config(update)
            .await
            .map(|config| warp::reply::json(&json!({ "result": config }))),
        AdminRequest::Rooms(offset) => admin
            .rooms(offset)
            .await
            .map(|rooms| warp::reply::json(&rooms)),
        AdminRequest::DeleteRoom(room_id) => admin.delete_room(room_id).await.map(|()| ok()),
    };

    reply.map_err(warp::reject::custom)
}

fn ok() -> warp::reply::Json {
    warp::reply::json(&json!({ "message": "ok" }))
}

pub fn routes(app: Arc<App>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(with_state(app.clone()))
        .and(json_body())
        .and_then(|app: Arc<App>, body: LoginRequest| async move {
            app.login(body)
                .await
                .map(|r| warp::reply::json(&r))
                .map_err(warp::reject::custom)
        });

    let admin = warp::path!("api" / "admin" / ..)
        .and(admin_gate(app.clone()))
        .and(admin_requests())
        .and_then(serve_admin);

    let reviews = {
        let list = warp::path!("api" / "reviewslist")
            .and(warp::get())
            .and(with_state(app.clone()))
            .and_then(|app: Arc<App>| async move {
                app.reviews()
                    .await
                    .map(|reviews| warp::reply::json(&json!({ "reviews": reviews })))
                    .map_err(warp::reject::custom)
            });

        let get = warp::path!("api" / "reviews" / i64)
            .and(warp::get())
            .and(with_state(app.clone()))
            .and_then(|review_id: i64, app: Arc<App>| async move {
                app.review(review_id)
                    .await
                    .map(|review| warp::reply::json(&review))
                    .map_err(warp::reject::custom)
            });

        let add = warp::path!("api" / "addreview")
            .and(warp::post())
            .and(with_state(app.clone()))
            .and(json_body())
            .and_then(|app: Arc<App>, review: NewReview| async move {
                app.add_review(review)
                    .await
                    .map(|review| warp::reply::json(&review))
                    .map_err(warp::reject::custom)
            });

        let delete = warp::path!("api" / "reviews" / i64)
            .and(warp::delete())
            .and(with_state(app.clone()))
            .and_then(|review_id: i64, app: Arc<App>| async move {
                app.delete_review(review_id)
                    .await
                    .map(|()| ok())
                    .map_err(warp::reject::custom)
            });

        list.or(get).or(add).or(delete)
    };

    let rooms = {
        let create = warp::path!("api" / "rooms")
            .and(warp::post())
            .and(with_state(app.clone()))
            .and(json_body())
            .and_then(|app: Arc<App>, room: NewRoom| async move {
                app.create_room(room)
                    .await
                    .map(|room| warp::reply::json(&room))
                    .map_err(warp::reject::custom)
            });

        let get = warp::path!("api" / "rooms" / i64)
            .and(warp::get())
            .and(with_state(app.clone()))
            .and_then(|room_id: i64, app: Arc<App>| async move {
                app.room(room_id)
                    .await
                    .map(|room| warp::reply::json(&room))
                    .map_err(warp::reject::custom)
            });

        let update = warp::path!("api" / "rooms" / i64)
            .and(warp::put())
            .and(with_state(app))
            .and(json_body())
            .and_then(|room_id: i64, app: Arc<App>, update: RoomUpdate| async move {
                app.update_room(room_id, update)
                    .await
                    .map(|room| warp::reply::json(&room))
                    .map_err(warp::reject::custom)
            });

        create.or(get).or(update)
    };

    login
        .or(admin)
        .or(reviews)
        .or(rooms)
        .recover(handle_rejection)
        .with(warp::log("gamebudget::http"))
}

fn reply_error(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({
            "status": status.as_u16(),
            "message": message,
        })),
        status,
    )
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(e) = err.find::<Error>() {
        if *e == Error::Internal {
            error!("internal error serving request");
        }
        return Ok(reply_error((*e).into(), e.message()));
    }

    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        trace!("bad body: {e}");
        return Ok(reply_error(StatusCode::BAD_REQUEST, Error::BadRequest.message()));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
    {
        return Ok(reply_error(StatusCode::BAD_REQUEST, Error::BadRequest.message()));
    }

    if err.is_not_found() {
        return Ok(reply_error(StatusCode::NOT_FOUND, Error::NotFound.message()));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(reply_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }

    error!("unhandled rejection: {err:?}");
    Ok(reply_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        Error::Internal.message(),
    ))
}
