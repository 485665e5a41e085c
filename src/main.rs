#[macro_use]
extern crate diesel;
#[macro_use]
extern crate lazy_static;

use std::fs;
use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::content::ContentStore;
use crate::database::common::Now;
use crate::database::{category, Stores};
use crate::error::BlogError;
use crate::notifier::{Notifier, SmtpNotifier};
use crate::posts::PostRepository;
use crate::upload::UploadStore;

pub mod schema;
mod accounts;
mod api;
mod avatar;
mod config;
mod content;
mod context;
mod database;
mod error;
mod models;
mod notifier;
mod posts;
mod slug;
mod upload;
#[cfg(test)]
mod test_support;

const MAX_JSON_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub posts: PostRepository,
    pub uploads: UploadStore,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, notifier: Arc<dyn Notifier>) -> AppState {
        let content = ContentStore::new(&config.content_dir);
        AppState {
            posts: PostRepository::new(stores.clone(), content),
            uploads: UploadStore::new(&config.upload_dir, config.max_upload_bytes),
            config: Arc::new(config),
            stores,
            notifier,
        }
    }

    pub fn content(&self) -> &ContentStore {
        self.posts.content()
    }

    pub fn now(&self) -> Now {
        Now::capture(self.config.timezone)
    }
}

/// Opens the stores, seeds the default categories and creates the content
/// and upload directories.
fn bootstrap(config: Config) -> Result<AppState, BlogError> {
    let stores = Stores::open(
        &config.accounts_database_url,
        &config.comments_database_url,
        &config.stats_database_url,
    )?;
    if !config.mail.has_credentials() {
        tracing::warn!("MAIL_USERNAME/MAIL_PASSWORD not set, outgoing email will fail");
    }
    let notifier = Arc::new(SmtpNotifier::new(config.mail.clone()));
    let state = AppState::new(config, stores, notifier);

    fs::create_dir_all(state.content().root())?;
    fs::create_dir_all(state.uploads.dir())?;
    let mut connection = state.stores.accounts.get()?;
    let seeded = category::seed_defaults(&mut connection, &state.now().local)?;
    if seeded > 0 {
        tracing::info!("seeded {} default categories", seeded);
    }
    category::ensure_dirs(&mut connection, state.content())?;
    Ok(state)
}

fn startup_error<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(startup_error)?;
    let bind_address = config.bind_address.clone();
    let state = web::Data::new(bootstrap(config).map_err(startup_error)?);
    tracing::info!("listening on {}", bind_address);

    HttpServer::new(move || {
        let cors = state
            .config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::AUTHORIZATION,
            ])
            .max_age(3600);
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(MAX_JSON_BYTES))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .service(api::user::get_service())
            .service(api::category::get_service())
            .service(api::post::get_service())
            .service(api::comment::get_service())
            .service(api::admin::get_service())
            .service(api::upload::get_service())
            .service(api::upload::get_static_service())
            .service(api::contact::get_service())
    })
        .bind(bind_address)?
        .run()
        .await
}
