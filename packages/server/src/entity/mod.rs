pub mod acl;
pub mod conversation_subscription;
pub mod exercise;
pub mod lifecycle_event;
pub mod look;
pub mod notification;
pub mod reaction;
pub mod submission;
pub mod submission_view;
pub mod user;
pub mod user_exercise;
