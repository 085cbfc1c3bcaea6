//! Hostname canonicalization and locale-prefix redirects.
//!
//! Fairings can't answer a request themselves, so [`RedirectFairing`] stores the planned
//! redirect in the request-local cache and reroutes the request to [`REDIRECT_PATH`],
//! where [`pending_redirect`] turns it into the response.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::uri::Origin;
use rocket::http::Method;
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::{Data, Request};

use crate::config::Config;
use crate::locale::negotiate;

pub const REDIRECT_PATH: &str = "/_redirect";
pub const LOCALE_COOKIE_NAME: &str = "locale";

/// Paths that never get a locale prefix.
const UNLOCALIZED_PREFIXES: [&str; 3] = ["/api", "/swagger", REDIRECT_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRedirect {
    /// Permanent move to the canonical host.
    Host(String),
    /// Temporary move to the locale-prefixed path.
    Locale(String),
}

/// Path the client asked for, kept when the request is rerouted to [`REDIRECT_PATH`].
#[derive(Debug, Clone, Default)]
pub struct RequestedPath(pub Option<String>);

impl RequestedPath {
    /// The path before any rerouting.
    pub fn of<'r>(req: &'r Request<'_>) -> &'r str {
        match &req.local_cache(RequestedPath::default).0 {
            Some(path) => path.as_str(),
            None => req.uri().path().as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectFairing {
    /// `scheme://host[:port]` of the public site.
    canonical_origin: Option<String>,
    canonical_host: Option<String>,
    locales: Vec<String>,
    default_locale: String,
}

fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_inclusive(']').next().unwrap_or(host);
    }
    host.split(':').next().unwrap_or(host)
}

fn with_query(path: String, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path,
    }
}

impl RedirectFairing {
    pub fn new(config: &Config) -> RedirectFairing {
        let canonical_origin = config.canonical_host().map(|host| {
            let (scheme, rest) = config
                .site_url
                .split_once("://")
                .unwrap_or(("https", config.site_url.as_str()));
            let authority = rest.split('/').next().unwrap_or(host);
            format!("{}://{}", scheme, authority)
        });

        RedirectFairing {
            canonical_origin,
            canonical_host: config.canonical_host().map(str::to_ascii_lowercase),
            locales: config.locales.clone(),
            default_locale: config.default_locale.clone(),
        }
    }

    fn host_redirect(&self, host: Option<&str>, path: &str, query: Option<&str>) -> Option<String> {
        let host = strip_port(host?.trim()).to_ascii_lowercase();
        if host.is_empty() || is_local_host(&host) {
            return None;
        }
        let canonical = self.canonical_host.as_deref()?;
        if host == canonical {
            return None;
        }
        let origin = self.canonical_origin.as_deref()?;
        Some(with_query(format!("{}{}", origin, path), query))
    }

    fn is_localized_page(&self, path: &str) -> bool {
        if UNLOCALIZED_PREFIXES
            .iter()
            .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
        {
            return false;
        }
        let mut segments = path.split('/').filter(|it| !it.is_empty());
        if let Some(first) = segments.next() {
            if self.locales.iter().any(|it| it == first) {
                return false;
            }
        }
        // Assets are recognized by their file extension.
        let last = path.rsplit('/').next().unwrap_or_default();
        !last.contains('.')
    }

    fn preferred_locale(&self, cookie: Option<&str>, accept_language: Option<&str>) -> &str {
        if let Some(cookie) = cookie {
            if let Some(locale) = self.locales.iter().find(|it| it.as_str() == cookie) {
                return locale;
            }
        }
        accept_language
            .and_then(|header| negotiate(header, &self.locales))
            .unwrap_or(&self.default_locale)
    }

    /// Decides whether a request gets redirected, and where to.
    pub fn plan(
        &self,
        method: Method,
        host: Option<&str>,
        path: &str,
        query: Option<&str>,
        cookie_locale: Option<&str>,
        accept_language: Option<&str>,
    ) -> Option<PendingRedirect> {
        if let Some(location) = self.host_redirect(host, path, query) {
            return Some(PendingRedirect::Host(location));
        }

        if !matches!(method, Method::Get | Method::Head) || !self.is_localized_page(path) {
            return None;
        }
        let locale = self.preferred_locale(cookie_locale, accept_language);
        let localized = if path == "/" {
            format!("/{}", locale)
        } else {
            format!("/{}{}", locale, path)
        };
        Some(PendingRedirect::Locale(with_query(localized, query)))
    }
}

#[rocket::async_trait]
impl Fairing for RedirectFairing {
    fn info(&self) -> Info {
        Info {
            name: "Host and locale redirects",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _: &mut Data<'_>) {
        let planned = self.plan(
            req.method(),
            req.headers().get_one("Host"),
            req.uri().path().as_str(),
            req.uri().query().map(|it| it.as_str()),
            req.cookies().get(LOCALE_COOKIE_NAME).map(|it| it.value()),
            req.headers().get_one("Accept-Language"),
        );

        let Some(redirect) = planned else {
            return;
        };
        tracing::debug!("redirecting {} {:?}", req.uri(), redirect);

        match Origin::parse(REDIRECT_PATH) {
            Ok(uri) => {
                let requested = req.uri().path().to_string();
                req.local_cache(|| RequestedPath(Some(requested)));
                req.local_cache(|| Some(redirect));
                req.set_uri(uri);
                req.set_method(Method::Get);
            }
            Err(e) => tracing::error!("invalid redirect route: {}", e),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PendingRedirect {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.local_cache(|| None::<PendingRedirect>) {
            Some(redirect) => Outcome::Success(redirect.clone()),
            None => Outcome::Forward(()),
        }
    }
}

#[get("/_redirect")]
pub fn pending_redirect(redirect: PendingRedirect) -> Redirect {
    match redirect {
        PendingRedirect::Host(location) => Redirect::permanent(location),
        PendingRedirect::Locale(location) => Redirect::temporary(location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_client, test_config};
    use rocket::http::{Cookie, Header, Status};

    fn fairing() -> RedirectFairing {
        RedirectFairing::new(&test_config())
    }

    #[test]
    fn foreign_hosts_go_to_canonical_origin() {
        let planned = fairing().plan(
            Method::Post,
            Some("www.other.com:8443"),
            "/api/v1/contact",
            Some("a=1"),
            None,
            None,
        );
        assert_eq!(
            planned,
            Some(PendingRedirect::Host(
                "https://example.com/api/v1/contact?a=1".to_string()
            ))
        );
    }

    #[test]
    fn local_and_canonical_hosts_stay() {
        let f = fairing();
        for host in ["localhost:8000", "127.0.0.1", "EXAMPLE.com"] {
            assert_eq!(f.plan(Method::Get, Some(host), "/api/v1/health", None, None, None), None);
        }
    }

    #[test]
    fn pages_get_locale_prefix() {
        let f = fairing();
        assert_eq!(
            f.plan(Method::Get, None, "/about", None, None, None),
            Some(PendingRedirect::Locale("/en/about".to_string()))
        );
        assert_eq!(
            f.plan(Method::Get, None, "/", None, None, Some("es-ES,es;q=0.9")),
            Some(PendingRedirect::Locale("/es".to_string()))
        );
        assert_eq!(
            f.plan(Method::Get, None, "/blog", Some("page=2"), Some("es"), Some("en")),
            Some(PendingRedirect::Locale("/es/blog?page=2".to_string()))
        );
    }

    #[test]
    fn api_assets_and_localized_paths_are_left_alone() {
        let f = fairing();
        for path in ["/api/v1/pricing", "/swagger/index.html", "/favicon.ico", "/es/blog", "/en"] {
            assert_eq!(f.plan(Method::Get, None, path, None, None, None), None, "{}", path);
        }
        assert_eq!(f.plan(Method::Post, None, "/about", None, None, None), None);
        // A prefix match on a longer word is still a page.
        assert!(f.plan(Method::Get, None, "/apiary", None, None, None).is_some());
    }

    #[rocket::async_test]
    async fn page_request_is_redirected_to_locale() {
        let client = test_client().await;
        let response = client.get("/about").dispatch().await;

        assert_eq!(response.status(), Status::TemporaryRedirect);
        assert_eq!(response.headers().get_one("Location"), Some("/en/about"));
    }

    #[rocket::async_test]
    async fn locale_cookie_wins_over_header() {
        let client = test_client().await;
        let response = client
            .get("/pricing")
            .cookie(Cookie::new(LOCALE_COOKIE_NAME, "es"))
            .header(Header::new("Accept-Language", "en"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::TemporaryRedirect);
        assert_eq!(response.headers().get_one("Location"), Some("/es/pricing"));
    }

    #[rocket::async_test]
    async fn foreign_host_is_redirected_permanently() {
        let client = test_client().await;
        let response = client
            .get("/api/v1/health")
            .header(Header::new("Host", "www.other.com"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::PermanentRedirect);
        assert_eq!(
            response.headers().get_one("Location"),
            Some("https://example.com/api/v1/health")
        );
    }

    #[rocket::async_test]
    async fn redirect_route_without_plan_is_not_found() {
        let client = test_client().await;
        let response = client.get(REDIRECT_PATH).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
