//! Shared fixtures for unit and endpoint tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rocket::local::asynchronous::Client;
use uuid::Uuid;

use crate::config::Config;
use crate::resp::auth::{AccessClaims, AppMetadata};
use crate::role::Role;

pub const TEST_SECRET: &str = "test-provider-secret";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt_secret = TEST_SECRET.to_string();
    config.subscribe_secret = "test-subscribe-secret".to_string();
    config.mongodb_uri = "mongodb://localhost:27017".to_string();
    config.mongodb_db = "tutoring_test".to_string();
    config.site_url = "https://example.com".to_string();
    config.admin_emails = vec![];
    config.locales = vec!["en".to_string(), "es".to_string()];
    config.default_locale = "en".to_string();
    config.timezone = "UTC".to_string();
    config.dashboard_feed = false;
    config.mail = Default::default();
    config
}

/// Signs a token the way the auth provider would.
pub fn token_for(user: Uuid, email: &str, role: Role) -> String {
    let claims = AccessClaims {
        sub: user,
        email: Some(email.to_string()),
        exp: Utc::now() + Duration::hours(1),
        app_metadata: AppMetadata { role: Some(role) },
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("test token must encode")
}

pub fn bearer(role: Role) -> rocket::http::Header<'static> {
    let token = token_for(Uuid::new_v4(), &format!("{}@example.com", role), role);
    rocket::http::Header::new("Authorization", format!("Bearer {}", token))
}

/// Rocket client whose requests all come from the canonical host.
pub async fn test_client() -> Client {
    let rocket = crate::build(test_config())
        .await
        .expect("test backend must build");
    Client::tracked(rocket).await.expect("invalid backend")
}
