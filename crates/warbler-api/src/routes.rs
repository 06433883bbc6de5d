use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::error::not_found;
use crate::{accounts, home, likes, messages, users};

/// All application routes. Static files and tracing layers are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::homepage))
        .route("/signup", get(accounts::signup_page).post(accounts::signup))
        .route("/login", get(accounts::login_page).post(accounts::login))
        .route("/logout", post(accounts::logout))
        .route("/messages/new", get(messages::new_message_page).post(messages::create_message))
        .route("/messages/{message_id}", get(messages::show_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/users", get(users::list_users))
        .route("/users/profile", get(users::edit_profile_page).post(users::edit_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/like/{message_id}", post(likes::toggle_like))
        .route("/users/follow/{user_id}", post(users::follow))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(likes::show_likes))
        .fallback(not_found)
        .with_state(state)
}
