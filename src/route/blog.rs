use mongodb::Database;
use rocket::http::{RawStr, Status};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::content::blog::{BlogDbExt, BlogPost, BlogPostData};
use crate::data::content::subscriber::{
    unsubscribe_token, verify_unsubscribe_token, SubscribeRequest, SubscribeResponse,
    SubscriberDbExt,
};
use crate::data::RecordDbExt;
use crate::mail::{Email, Mailer};
use crate::middleware::paging::PageState;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

/// Published blog posts, newest first
#[utoipa::path(
    params(("locale" = Option<String>, Query, description = "Only posts in this locale")),
    responses((status = 200, body = Vec<BlogPost>))
)]
#[get("/blog?<locale>")]
#[tracing::instrument]
pub async fn blog_list(
    locale: Option<&str>,
    page: PageState,
    db: &State<Database>,
) -> Result<Json<Vec<BlogPost>>, Problem> {
    Ok(Json(db.published_posts(locale, page).await?))
}

#[utoipa::path(
    params(
        ("slug", description = "Post slug"),
        ("locale" = Option<String>, Query, description = "Post locale"),
    ),
    responses(
        (status = 200, body = BlogPost),
        (status = 404, description = "No published post with that slug", body = Problem),
    )
)]
#[get("/blog/<slug>?<locale>", rank = 2)]
#[tracing::instrument]
pub async fn blog_post(
    slug: &str,
    locale: Option<&str>,
    db: &State<Database>,
) -> Result<Json<BlogPost>, Problem> {
    db.published_post(slug, locale)
        .await?
        .map(Json)
        .ok_or_else(|| {
            Problem::new_untyped(Status::NotFound, "Blog post doesn't exist.")
                .insert_str("slug", slug)
                .to_owned()
        })
}

/// Newsletter subscription
///
/// Subscribing an address twice succeeds with `alreadySubscribed` set.
#[utoipa::path(
    request_body = SubscribeRequest,
    responses(
        (status = 200, body = SubscribeResponse),
        (status = 400, description = "Malformed e-mail address", body = Problem),
    )
)]
#[post("/blog/subscribe", format = "application/json", data = "<request>")]
#[tracing::instrument(skip(mailer, config))]
pub async fn subscribe(
    request: Json<SubscribeRequest>,
    db: &State<Database>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<Json<SubscribeResponse>, Problem> {
    let request = request.into_inner();
    request.validate()?;
    let email = crate::util::normalize_email(&request.email);

    let created = db.subscribe(request).await?;
    if created {
        let token = unsubscribe_token(&config.subscribe_secret, &email);
        let link = format!(
            "{}/api/v1/blog/unsubscribe?email={}&token={}",
            config.site_url.trim_end_matches('/'),
            RawStr::new(&email).percent_encode(),
            token
        );
        mailer
            .send_best_effort(Email::new(
                &email,
                "Welcome to the newsletter",
                format!(
                    "Thanks for subscribing! You'll hear about new posts and lesson offers.\n\n\
                     Unsubscribe at any time: {}",
                    link
                ),
            ))
            .await;
    }

    Ok(Json(SubscribeResponse::after_insert(created)))
}

#[get("/blog/unsubscribe?<email>&<token>")]
#[tracing::instrument(skip(token, config))]
pub async fn unsubscribe(
    email: &str,
    token: &str,
    db: &State<Database>,
    config: &State<Config>,
) -> Result<Json<SubscribeResponse>, Problem> {
    if !verify_unsubscribe_token(&config.subscribe_secret, email, token) {
        return Err(problems::bad_request(
            "Invalid unsubscribe link.",
            "The link is incomplete or was not issued for this address.",
        ));
    }
    db.unsubscribe(email).await?;
    Ok(Json(SubscribeResponse {
        success: true,
        already_subscribed: false,
    }))
}

#[get("/admin/blog")]
#[tracing::instrument]
pub async fn admin_blog_list(
    _auth: StaffToken,
    page: PageState,
    db: &State<Database>,
) -> Result<Json<Vec<BlogPost>>, Problem> {
    Ok(Json(db.all_posts(page).await?))
}

#[get("/admin/blog/<id>")]
#[tracing::instrument]
pub async fn admin_blog_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<BlogPost>, Problem> {
    db.get::<BlogPost>(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::not_found("Blog post", id))
}

#[utoipa::path(
    request_body = BlogPostData,
    responses(
        (status = 200, body = BlogPost),
        (status = 409, description = "Slug already used in this locale", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/blog", format = "application/json", data = "<post>")]
#[tracing::instrument]
pub async fn admin_blog_create(
    post: Json<BlogPostData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<BlogPost>, Problem> {
    Ok(Json(db.save_post(None, post.into_inner()).await?))
}

#[put("/admin/blog/<id>", format = "application/json", data = "<post>")]
#[tracing::instrument]
pub async fn admin_blog_update(
    id: Uuid,
    post: Json<BlogPostData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<BlogPost>, Problem> {
    Ok(Json(db.save_post(Some(id), post.into_inner()).await?))
}

#[delete("/admin/blog/<id>")]
#[tracing::instrument]
pub async fn admin_blog_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<BlogPost>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Blog post", id)),
    }
}
