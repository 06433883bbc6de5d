use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use tracing::info;

use warbler_db::models::LikeToggle;
use warbler_types::models::Message;

use crate::auth::AppState;
use crate::error::AppError;
use crate::session::{Session, referer_path};
use crate::views;

pub const SELF_LIKE_NOTICE: &str = "You can't like your own message";

/// Likes the message, or unlikes it if the caller already likes it.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    headers: HeaderMap,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let message = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;

    if message.user_id == actor.id {
        return Err(session.refuse(SELF_LIKE_NOTICE));
    }

    match state.db.toggle_like(actor.id, message.id)? {
        LikeToggle::Added => info!("User {} liked message {}", actor.id, message.id),
        LikeToggle::Removed => info!("User {} unliked message {}", actor.id, message.id),
    }

    Ok(session.redirect(&referer_path(&headers)))
}

/// Messages liked by user `user_id`.
pub async fn show_likes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let user = state.db.get_user(user_id)?.ok_or(AppError::NotFound)?;

    let messages: Vec<Message> = state
        .db
        .liked_messages(user.id)?
        .into_iter()
        .map(|row| row.into_message())
        .collect();

    let mut ctx = views::profile_context(&state, Some(&actor), &user)?;
    ctx.insert("messages", &messages);
    views::page(&state, &mut session, Some(&actor), "likes.html", ctx)
}
