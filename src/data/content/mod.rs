//! Marketing content: blog, reviews, contact form, newsletter and site settings.

pub mod blog;
pub mod contact;
pub mod review;
pub mod setting;
pub mod subscriber;
