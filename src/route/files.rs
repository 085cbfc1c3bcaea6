//! Marketing site bundle. Unknown paths fall back to `index.html` so the
//! client-side router can resolve localized pages.

use std::path::PathBuf;

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;

const INDEX_FILE: &str = "index.html";
const API_PREFIX: &str = "api";

pub async fn app_index_file(c: &State<Config>) -> Option<NamedFile> {
    let index = c.public_content.join(INDEX_FILE);
    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("Unable to open '{}': {}", index.display(), e);
            None
        }
    }
}

#[utoipa::path(responses(
    (status = 200, description = "Site entry page"),
    (status = 404, description = "Site bundle isn't deployed"),
))]
#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    if path.starts_with(API_PREFIX) {
        return None;
    }
    match NamedFile::open(c.public_content.join(&path)).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::test_config;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    async fn client_serving(dir: &std::path::Path) -> Client {
        let mut config = test_config();
        config.public_content = dir.to_path_buf();
        let rocket = crate::build(config).await.expect("backend must build");
        Client::tracked(rocket).await.expect("invalid backend")
    }

    #[rocket::async_test]
    async fn unknown_page_falls_back_to_index() {
        let dir = std::env::temp_dir().join(format!("site-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(dir.join("index.html"), "<html>site</html>").expect("index");
        std::fs::write(dir.join("robots.txt"), "User-agent: *").expect("robots");

        let client = client_serving(&dir).await;

        let response = client.get("/en/about").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.as_deref(), Some("<html>site</html>"));

        let response = client.get("/api/v2/anything").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get("/robots.txt").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.as_deref(), Some("User-agent: *"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[rocket::async_test]
    async fn missing_bundle_is_not_found() {
        let dir = std::env::temp_dir().join(format!("no-site-{}", uuid::Uuid::new_v4()));
        let client = client_serving(&dir).await;

        let response = client.get("/en").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
