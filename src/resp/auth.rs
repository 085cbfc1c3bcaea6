//! Verification of access tokens issued by the external auth provider.
//!
//! The service never issues credentials itself. A request is authenticated when it carries
//! a provider-signed HS256 JWT either as a bearer token or in the [`AUTH_COOKIE_NAME`] cookie.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::util::date_time_as_unix_seconds;
use rocket::outcome::Outcome::{Failure, Success};
use uuid::Uuid;

pub static AUTH_COOKIE_NAME: &str = "access_token";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<Role>,
}

/// Claims the provider puts into its access tokens. Unknown claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(with = "date_time_as_unix_seconds")]
    pub exp: DateTime<Utc>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Verification key and role promotion rules, managed by rocket.
#[derive(Clone)]
pub struct AuthSettings {
    key: DecodingKey,
    admin_emails: Vec<String>,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("admin_emails", &self.admin_emails)
            .finish_non_exhaustive()
    }
}

impl AuthSettings {
    pub fn new(config: &Config) -> AuthSettings {
        AuthSettings {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            admin_emails: config
                .admin_emails
                .iter()
                .map(|it| crate::util::normalize_email(it))
                .collect(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthToken, Problem> {
        let claims = decode::<AccessClaims>(token, &self.key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("rejected access token: {}", e);
                Problem::from(e)
            })?;

        let mut role = claims.app_metadata.role.unwrap_or_default();
        if let Some(email) = &claims.email {
            if self
                .admin_emails
                .contains(&crate::util::normalize_email(email))
            {
                role = Role::Admin;
            }
        }

        Ok(AuthToken {
            user: claims.sub,
            email: claims.email,
            role,
            expires: claims.exp,
        })
    }
}

/// Identity of the caller, extracted from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub user: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub expires: DateTime<Utc>,
}

impl AuthToken {
    pub fn require_staff(&self) -> Result<(), Problem> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(forbidden_problem("Teacher or admin role required."))
        }
    }

    pub fn require_admin(&self) -> Result<(), Problem> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(forbidden_problem("Admin role required."))
        }
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
        .clone()
}

pub fn forbidden_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Forbidden, "Permission level too low.")
        .detail(detail)
        .clone()
}

fn bearer_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    req.headers()
        .get_one("Authorization")
        .and_then(|it| it.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|it| !it.is_empty())
}

pub fn extract_token(req: &Request<'_>) -> Result<AuthToken, Problem> {
    let settings: &AuthSettings = req
        .rocket()
        .state()
        .ok_or_else(|| auth_problem("Authentication isn't configured."))?;

    let token = match bearer_token(req) {
        Some(token) => token.to_string(),
        None => match req.cookies().get(AUTH_COOKIE_NAME) {
            Some(cookie) => cookie.value().to_string(),
            None => return Err(auth_problem("No access token.")),
        },
    };
    tracing::trace!("extracted access token from request");

    let auth = settings.verify(&token)?;
    tracing::debug!("verified access token for user: {}", auth.user);
    Ok(auth)
}

/// Keeps the guard's problem around so the catcher can render it.
fn fail<T>(req: &Request<'_>, status: Status, problem: Problem) -> request::Outcome<T, Problem> {
    req.local_cache(|| Some(problem.clone()));
    Failure((status, problem))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match extract_token(req) {
            Ok(it) => Success(it),
            Err(e) => {
                tracing::debug!("unable to authenticate request: {}", e);
                fail(req, Status::Unauthorized, e)
            }
        }
    }
}

/// Guard that only admits teachers and admins.
#[derive(Debug, Clone)]
pub struct StaffToken(pub AuthToken);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StaffToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth = match extract_token(req) {
            Ok(it) => it,
            Err(e) => return fail(req, Status::Unauthorized, e),
        };
        match auth.require_staff() {
            Ok(()) => Success(StaffToken(auth)),
            Err(e) => fail(req, Status::Forbidden, e),
        }
    }
}

impl std::ops::Deref for StaffToken {
    type Target = AuthToken;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, token_for};

    #[test]
    fn verifies_provider_token() {
        let config = test_config();
        let settings = AuthSettings::new(&config);
        let user = Uuid::new_v4();

        let token = token_for(user, "student@example.com", Role::Teacher);
        let auth = settings.verify(&token).expect("token should verify");

        assert_eq!(auth.user, user);
        assert_eq!(auth.role, Role::Teacher);
        assert_eq!(auth.email.as_deref(), Some("student@example.com"));
    }

    #[test]
    fn admin_emails_are_promoted() {
        let mut config = test_config();
        config.admin_emails = vec!["Owner@Example.com".to_string()];
        let settings = AuthSettings::new(&config);

        let token = token_for(Uuid::new_v4(), "owner@example.com", Role::Student);
        let auth = settings.verify(&token).expect("token should verify");

        assert_eq!(auth.role, Role::Admin);
    }

    #[test]
    fn rejects_foreign_signature() {
        let mut config = test_config();
        config.jwt_secret = "another-secret".to_string();
        let settings = AuthSettings::new(&config);

        let token = token_for(Uuid::new_v4(), "student@example.com", Role::Student);
        let problem = settings.verify(&token).expect_err("signature must not verify");

        assert_eq!(problem.status, Status::Unauthorized);
    }

    #[test]
    fn staff_and_admin_requirements() {
        let mut auth = AuthToken {
            user: Uuid::new_v4(),
            email: None,
            role: Role::Student,
            expires: Utc::now(),
        };
        assert_eq!(
            auth.require_staff().unwrap_err().status,
            Status::Forbidden
        );

        auth.role = Role::Teacher;
        assert!(auth.require_staff().is_ok());
        assert!(auth.require_admin().is_err());
    }
}
