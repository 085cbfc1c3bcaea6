//! Keeps the staff dashboard snapshot current.
//!
//! The feed computes a snapshot on start, then follows the store's change stream and
//! recomputes after every change to a collection the snapshot depends on. Deployments
//! without change streams (standalone servers) get polled instead; the subscription is
//! retried on every poll cycle.

use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use chrono::Utc;
use chrono_tz::Tz;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use rocket::Shutdown;
use tokio::sync::watch;

use super::{DashboardInputs, DashboardSnapshot};
use crate::data::class::{Class, ClassStatus};
use crate::data::class_request::ClassRequest;
use crate::data::content::contact::ContactMessage;
use crate::data::content::review::Review;
use crate::data::homework::{Homework, HomeworkStatus};
use crate::data::payment::PaymentNotification;
use crate::data::user::User;
use crate::data::{Record, RecordDbExt};
use crate::resp::problem::Problem;
use crate::role::Role;

/// Collections whose changes affect the snapshot.
pub fn watched_collections() -> [&'static str; 7] {
    [
        ClassRequest::COLLECTION,
        PaymentNotification::COLLECTION,
        Homework::COLLECTION,
        Class::COLLECTION,
        ContactMessage::COLLECTION,
        Review::COLLECTION,
        User::COLLECTION,
    ]
}

pub async fn load_inputs(db: &Database) -> Result<DashboardInputs, Problem> {
    Ok(DashboardInputs {
        class_requests: db
            .list::<ClassRequest>(doc! {}, None, None)
            .await?,
        payments: db
            .list::<PaymentNotification>(doc! { "status": "pending" }, None, None)
            .await?,
        homework: db
            .list::<Homework>(
                doc! { "status": { "$in": [
                    HomeworkStatus::Assigned.as_str(),
                    HomeworkStatus::Submitted.as_str(),
                ] } },
                None,
                None,
            )
            .await?,
        classes: db
            .list::<Class>(
                doc! { "status": { "$in": [
                    ClassStatus::PendingPayment.as_str(),
                    ClassStatus::Scheduled.as_str(),
                ] } },
                None,
                None,
            )
            .await?,
        unread_messages: db.count::<ContactMessage>(doc! { "read": false }).await?,
        reviews_to_approve: db.count::<Review>(doc! { "approved": false }).await?,
        students: db
            .count::<User>(doc! { "role": Role::Student.to_string() })
            .await?,
    })
}

/// Latest dashboard snapshot, shared by the background task and every SSE client.
#[derive(Debug, Clone)]
pub struct DashboardFeed {
    inner: Arc<watch::Sender<Option<DashboardSnapshot>>>,
    tz: Tz,
}

impl DashboardFeed {
    pub fn new(tz: Tz) -> DashboardFeed {
        let (tx, _rx) = watch::channel(None);
        DashboardFeed {
            inner: Arc::new(tx),
            tz,
        }
    }

    pub fn latest(&self) -> Option<DashboardSnapshot> {
        self.inner.borrow().clone()
    }

    /// Receivers only ever see the newest snapshot; slow clients skip the ones in between.
    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardSnapshot>> {
        self.inner.subscribe()
    }

    /// Recomputes the snapshot and publishes it to every subscriber.
    pub async fn refresh(&self, db: &Database) -> Result<DashboardSnapshot, Problem> {
        let inputs = load_inputs(db).await?;
        let snapshot = DashboardSnapshot::derive(&inputs, Utc::now(), self.tz);
        self.inner.send_replace(Some(snapshot.clone()));
        Ok(snapshot)
    }

    /// Cached snapshot, computed on demand when the background task isn't running.
    pub async fn current(&self, db: &Database) -> Result<DashboardSnapshot, Problem> {
        match self.latest() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh(db).await,
        }
    }

    async fn refresh_logged(&self, db: &Database) {
        if let Err(problem) = self.refresh(db).await {
            tracing::error!("Unable to refresh dashboard snapshot: {}", problem);
        }
    }

    /// Runs until `shutdown` fires.
    pub async fn run(self, db: Database, poll: Duration, mut shutdown: Shutdown) {
        let pipeline = [doc! {
            "$match": { "ns.coll": { "$in": watched_collections().to_vec() } }
        }];

        loop {
            self.refresh_logged(&db).await;

            match db.watch(pipeline.clone(), None).await {
                Ok(mut changes) => {
                    tracing::info!("Following change stream for dashboard updates");
                    loop {
                        tokio::select! {
                            change = changes.try_next() => match change {
                                Ok(Some(event)) => {
                                    tracing::debug!("{:?} change, refreshing dashboard", event.operation_type);
                                    self.refresh_logged(&db).await;
                                }
                                Ok(None) => {
                                    tracing::warn!("Dashboard change stream closed");
                                    break;
                                }
                                Err(e) => {
                                    tracing::warn!("Dashboard change stream failed: {}", e);
                                    break;
                                }
                            },
                            _ = &mut shutdown => return,
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!("Change streams unavailable ({}), polling dashboard", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = &mut shutdown => return,
            }
        }
    }
}
