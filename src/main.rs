use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use log::{error, info};
use sea_orm::SqlxPostgresConnector;
use sqlx::postgres::PgPoolOptions;

use tokio::main;
use tower_http::cors::CorsLayer;

use migration::{Migrator, MigratorTrait};

use crate::api_client::InfoClient;
use crate::endpoint_handlers::{add_song, delete_song, get_song_verse, get_songs, update_song};
use crate::service::SongService;

mod api_client;
mod config;
mod endpoint_handlers;
mod responses;
mod service;

#[derive(Clone)]
pub struct AppState {
    pub service: SongService,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, short, default_value_t = 3)]
    verbosity: usize,
    #[arg(long, short, default_value_t = false)]
    quiet: bool,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(get_songs))
        .route("/info/verse", get(get_song_verse))
        .route(
            "/songs",
            post(add_song).delete(delete_song).put(update_song),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[main]
async fn main() -> Result<(), sqlx::Error> {
    let args = Args::parse();
    stderrlog::new()
        .verbosity(args.verbosity)
        .quiet(args.quiet)
        .timestamp(stderrlog::Timestamp::Millisecond)
        .init()
        .unwrap();

    let config_result = config::Config::from_env();
    if let Err(err) = config_result {
        error!("Malformed configuration: {}", err);
        return Ok(());
    }
    let config = config_result.unwrap();

    let pool_result = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database.connection_string().as_str())
        .await;
    if let Err(err) = pool_result {
        error!("Error connecting to database: {}", err);
        return Ok(());
    }
    let pool = pool_result.unwrap();

    let connection = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.to_owned());
    if let Err(err) = Migrator::up(&connection, None).await {
        error!("Error running migrations: {}", err);
        return Ok(());
    }

    let client = InfoClient::new(&config.api);
    let state = AppState {
        service: SongService::new(pool, client),
    };
    let app = router(state);

    info!("Listening on 0.0.0.0:{}", config.host.port);
    info!("Welcome to songvault!");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.host.port))
        .await
        .unwrap();
    Ok(axum::serve(listener, app).await.unwrap())
}
