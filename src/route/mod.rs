use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::{Build, Request, Rocket, Route};

pub mod availability;
pub mod blog;
pub mod class;
pub mod class_request;
pub mod contact;
pub mod dashboard;
pub mod files;
pub mod homework;
pub mod mail;
pub mod me;
pub mod payment;
pub mod public;
pub mod reviews;
pub mod settings;
pub mod users;

use availability::*;
use blog::*;
use class::*;
use class_request::*;
use contact::*;
use dashboard::*;
use files::*;
use homework::*;
use mail::*;
use me::*;
use payment::*;
use public::*;
use reviews::*;
use settings::*;
use users::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dashboard::{DashboardSnapshot, StudentSummary},
    data::{
        availability as av, class as cd, class_request as crd, content, homework as hw,
        payment as pd, user as ud,
    },
    resp::{
        auth::doc::JWTAuth,
        problem::{problems::status_problem, Problem},
    },
    role::Role,
    schedule::Interval,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        pricing,
        messages,
        open_slots,
        blog_list,
        blog_post,
        subscribe,
        admin_blog_create,
        review_list,
        review_submit,
        contact_submit,
        setting_put,
        user_list,
        user_set_role,
        test_email,
        class_list,
        class_create,
        request_list,
        request_approve,
        homework_list,
        homework_create,
        payment_list,
        payment_confirm,
        availability_list,
        blocked_create,
        dashboard_snapshot,
        me_get,
        me_update,
        me_dashboard,
        me_notify_payment,
        me_request_classes,
        app
    ),
    components(schemas(
        Role,
        Health,
        Interval,
        ud::User,
        ud::ProfileUpdate,
        ud::RoleUpdate,
        ud::TeacherAssignment,
        cd::Class,
        cd::ClassData,
        cd::ClassStatus,
        cd::PaymentStatus,
        crd::ClassRequest,
        crd::ClassRequestData,
        crd::NewClassRequest,
        crd::RequestedSlot,
        crd::RequestStatus,
        crd::Proposal,
        crd::ApproveRequest,
        crd::RejectRequest,
        ApprovedRequest,
        hw::Homework,
        hw::HomeworkData,
        hw::HomeworkStatus,
        hw::HomeworkSubmission,
        hw::HomeworkReview,
        pd::PaymentNotification,
        pd::NewPaymentNotification,
        pd::NotificationStatus,
        pd::PaymentDecision,
        av::AvailabilitySlot,
        av::BlockedPeriod,
        content::blog::BlogPost,
        content::blog::BlogPostData,
        content::contact::ContactForm,
        content::contact::ContactMessage,
        content::review::Review,
        content::review::NewReview,
        content::review::ReviewApproval,
        content::setting::Setting,
        content::setting::PricePlan,
        content::subscriber::SubscribeRequest,
        content::subscriber::SubscribeResponse,
        SettingValue,
        ReadFlag,
        TestEmailRequest,
        TestEmailResponse,
        DashboardSnapshot,
        StudentSummary,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            // The site entry page lives outside the API prefix.
            if path == "/" {
                new_paths.insert(path, item);
            } else {
                new_paths.insert(self.0.to_string() + path.as_ref(), item);
            }
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        health,
        pricing,
        messages,
        open_slots,
        blog_list,
        blog_post,
        subscribe,
        unsubscribe,
        admin_blog_list,
        admin_blog_get,
        admin_blog_create,
        admin_blog_update,
        admin_blog_delete,
        review_list,
        review_submit,
        admin_review_list,
        admin_review_approve,
        admin_review_delete,
        contact_submit,
        admin_contact_list,
        admin_contact_mark,
        admin_contact_delete,
        settings_list,
        setting_get,
        setting_put,
        setting_delete,
        user_list,
        user_get,
        user_set_role,
        user_assign_teacher,
        student_list,
        test_email,
        class_list,
        class_get,
        class_create,
        class_update,
        class_delete,
        request_list,
        request_get,
        request_update,
        request_approve,
        request_reject,
        request_propose,
        homework_list,
        homework_get,
        homework_create,
        homework_update,
        homework_review,
        homework_delete,
        payment_list,
        payment_get,
        payment_confirm,
        payment_reject,
        availability_list,
        availability_create,
        availability_update,
        availability_delete,
        blocked_list,
        blocked_create,
        blocked_update,
        blocked_delete,
        dashboard_snapshot,
        dashboard_events,
        me_get,
        me_update,
        me_dashboard,
        me_classes,
        me_homework,
        me_payments,
        me_class_requests,
        me_submit_homework,
        me_notify_payment,
        me_request_classes,
        me_withdraw_request,
        me_accept_proposal
    ]
}

/// Renders every error status as a problem document. Guards leave their
/// problem in the request cache so its details survive.
#[catch(default)]
pub fn problem_catcher(status: Status, req: &Request<'_>) -> Problem {
    match req.local_cache(|| None::<Problem>) {
        Some(problem) if problem.status == status => problem.clone(),
        _ => status_problem(status),
    }
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .mount(
            "/",
            routes![app, app_path, crate::middleware::redirect::pending_redirect],
        )
        .register("/", catchers![problem_catcher])
}
