use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

mod app;
mod args;
mod auth;
mod backend;
mod gameconfig;
mod review;
mod room;
mod routes;
mod time;
mod user;

use app::App;
use args::{Args, Command};
use auth::TokenKeys;
use backend::Backend;

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let mut args = Args::parse();

    let backend = match Backend::new(args.data_dir()).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("couldn't open database in {}: {e}", args.data_dir().display());
            return ExitCode::FAILURE;
        }
    };

    let tokens = TokenKeys::new(args.secret(), args.token_ttl());
    let app = Arc::new(App::new(backend, tokens));

    if let Some(Command::AddUser {
        login,
        name,
        password,
        admin,
    }) = args.take_command()
    {
        return match app.add_user(login, name, password, admin).await {
            Ok(id) => {
                info!("added user {id}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("couldn't add user: {}", e.message());
                ExitCode::FAILURE
            }
        };
    }

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid address: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("listening on {addr}");
    warp::serve(routes::routes(app)).run(addr).await;

    ExitCode::SUCCESS
}
