use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};

use crate::middleware::redirect::RequestedPath;

pub const ROBOTS_HEADER: &str = "X-Robots-Tag";

const PRIVATE_PREFIXES: [&str; 3] = ["/admin", "/dashboard", "/api"];

/// Indexing directive for a request path. Locale prefixes are ignored.
pub fn robots_directive(path: &str, locales: &[String]) -> &'static str {
    let unprefixed = locales
        .iter()
        .find_map(|locale| {
            path.strip_prefix('/')
                .and_then(|it| it.strip_prefix(locale.as_str()))
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        })
        .unwrap_or(path);

    let private = PRIVATE_PREFIXES.iter().any(|prefix| {
        unprefixed == *prefix || unprefixed.starts_with(&format!("{}/", prefix))
    });
    if private {
        "noindex, nofollow"
    } else {
        "index, follow"
    }
}

/// Adds search engine directives to every response.
#[derive(Debug, Clone)]
pub struct SeoHeaders {
    locales: Vec<String>,
}

impl SeoHeaders {
    pub fn new(locales: Vec<String>) -> SeoHeaders {
        SeoHeaders { locales }
    }
}

#[rocket::async_trait]
impl Fairing for SeoHeaders {
    fn info(&self) -> Info {
        Info {
            name: "SEO response headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let directive = robots_directive(RequestedPath::of(req), &self.locales);
        res.set_header(Header::new(ROBOTS_HEADER, directive));
    }
}
