use mongodb::Database;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{Shutdown, State};

use crate::dashboard::feed::DashboardFeed;
use crate::dashboard::DashboardSnapshot;
use crate::resp::auth::StaffToken;
use crate::resp::problem::Problem;

const SNAPSHOT_EVENT: &str = "snapshot";

/// Counters for the admin landing page
#[utoipa::path(
    responses(
        (status = 200, body = DashboardSnapshot),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/dashboard")]
#[tracing::instrument(skip(feed))]
pub async fn dashboard_snapshot(
    _auth: StaffToken,
    db: &State<Database>,
    feed: &State<DashboardFeed>,
) -> Result<Json<DashboardSnapshot>, Problem> {
    Ok(Json(feed.current(db).await?))
}

/// Server-sent events carrying a fresh snapshot whenever the counted data changes.
///
/// The current snapshot is always sent first. Clients that fall behind only
/// receive the newest snapshot.
#[get("/admin/dashboard/events")]
#[tracing::instrument(skip(feed, shutdown))]
pub async fn dashboard_events(
    auth: StaffToken,
    db: &State<Database>,
    feed: &State<DashboardFeed>,
    mut shutdown: Shutdown,
) -> Result<EventStream<impl rocket::futures::stream::Stream<Item = Event>>, Problem> {
    let first = feed.current(db).await?;
    let mut updates = feed.subscribe();
    updates.borrow_and_update();
    tracing::debug!("User {} subscribed to dashboard events", auth.user);

    Ok(EventStream! {
        yield Event::json(&first).event(SNAPSHOT_EVENT);
        loop {
            let next = tokio::select! {
                changed = updates.changed() => match changed {
                    Ok(()) => updates.borrow_and_update().clone(),
                    Err(_) => break,
                },
                _ = &mut shutdown => break,
            };
            if let Some(snapshot) = next {
                yield Event::json(&snapshot).event(SNAPSHOT_EVENT);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::Status;

    #[rocket::async_test]
    async fn dashboard_requires_staff() {
        let client = test_client().await;

        let response = client.get("/api/v1/admin/dashboard").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .get("/api/v1/admin/dashboard/events")
            .header(bearer(Role::Student))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
