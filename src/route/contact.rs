use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::content::contact::{ContactDbExt, ContactForm, ContactMessage};
use crate::data::RecordDbExt;
use crate::mail::{Email, Mailer};
use crate::middleware::paging::PageState;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadFlag {
    pub read: bool,
}

/// Contact form submission
#[utoipa::path(
    request_body = ContactForm,
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Missing name, malformed e-mail or empty message", body = Problem),
    )
)]
#[post("/contact", format = "application/json", data = "<form>")]
#[tracing::instrument(skip(mailer))]
pub async fn contact_submit(
    form: Json<ContactForm>,
    db: &State<Database>,
    mailer: &State<Mailer>,
) -> Result<Status, Problem> {
    let form = form.into_inner();
    form.validate()?;
    let message = form.into_message();
    db.insert(&message).await?;
    tracing::info!("Stored contact message {}", message.id);

    if let Some(notify) = mailer.notify_address() {
        let email = Email::new(
            notify,
            format!("New contact message from {}", message.name),
            format!("{} <{}> wrote:\n\n{}", message.name, message.email, message.message),
        );
        mailer.send_best_effort(email).await;
    }

    Ok(Status::Created)
}

#[get("/admin/contact?<unread>")]
#[tracing::instrument]
pub async fn admin_contact_list(
    unread: Option<bool>,
    page: PageState,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<ContactMessage>>, Problem> {
    Ok(Json(
        db.contact_messages(unread.unwrap_or(false), page).await?,
    ))
}

#[put("/admin/contact/<id>/read", format = "application/json", data = "<flag>")]
#[tracing::instrument]
pub async fn admin_contact_mark(
    id: Uuid,
    flag: Json<ReadFlag>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ContactMessage>, Problem> {
    Ok(Json(db.mark_read(id, flag.read).await?))
}

#[delete("/admin/contact/<id>")]
#[tracing::instrument]
pub async fn admin_contact_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<ContactMessage>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Contact message", id)),
    }
}
