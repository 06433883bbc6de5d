pub mod accounts;
pub mod auth;
pub mod error;
pub mod home;
pub mod likes;
pub mod messages;
pub mod routes;
pub mod session;
pub mod users;
pub mod views;
