#![allow(async_fn_in_trait)]

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

use error::BackendError;
use mongodb::{Client, Database};
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use std::time::Duration;
use tracing::Level;
use tracing_futures::Instrument;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::dashboard::feed::DashboardFeed;
use crate::error::ConfigurationError;
use crate::locale::Catalogs;
use crate::mail::Mailer;
use crate::middleware::redirect::RedirectFairing;
use crate::middleware::seo::SeoHeaders;
use crate::resp::auth::AuthSettings;
use crate::route::mount_api;
use crate::schedule::SlotRules;

pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod locale;
pub mod mail;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod schedule;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

/// Sets up logging, reads configuration and builds the server.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            tracing::warn!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(dir)) => {
            tracing::info!("No configuration in '{}', using defaults.", dir.display());
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };
    c.validate()?;

    build(c).await
}

/// Builds the server from an already validated configuration.
pub async fn build(c: Config) -> Result<Rocket<Build>, BackendError> {
    let tz = c.business_timezone()?;
    let slot_rules = SlotRules::from_config(&c)?;

    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    tracing::info!("Loading message catalogs from '{}'", c.locales_path.display());
    let catalogs = Catalogs::load(&c);

    let mailer = Mailer::new(c.mail.clone());
    if !mailer.is_configured() {
        tracing::warn!("Mail provider isn't configured; outgoing mail is disabled.");
    }

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    let feed_enabled = c.dashboard_feed;
    let poll = Duration::from_secs(c.dashboard_poll_secs.max(1));

    let mut r = rocket::build()
        .attach(cors)
        .attach(RedirectFairing::new(&c))
        .attach(SeoHeaders::new(c.locales.clone()))
        .manage(AuthSettings::new(&c))
        .manage(slot_rules)
        .manage(mailer)
        .manage(catalogs)
        .manage(DashboardFeed::new(tz))
        .manage(db)
        .manage(c);

    r = r.attach(AdHoc::on_liftoff("Background tasks", move |rocket| {
        Box::pin(async move {
            let (Some(db), Some(feed)) = (
                rocket.state::<Database>().cloned(),
                rocket.state::<DashboardFeed>().cloned(),
            ) else {
                tracing::error!("Database or dashboard feed missing from managed state.");
                return;
            };

            let index_db = db.clone();
            tokio::spawn(async move {
                match data::ensure_indexes(&index_db).await {
                    Ok(()) => tracing::info!("MongoDB indexes are in place."),
                    Err(e) => tracing::warn!("Unable to create MongoDB indexes: {}", e),
                }
            });

            if feed_enabled {
                let shutdown = rocket.shutdown();
                tokio::spawn(
                    feed.run(db, poll, shutdown)
                        .instrument(tracing::info_span!("dashboard_feed")),
                );
            }
        })
    }));

    Ok(mount_api(r))
}
