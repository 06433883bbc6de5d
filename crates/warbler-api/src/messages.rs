use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};
use tera::Context;
use tracing::{info, warn};

use warbler_types::api::MessageForm;
use warbler_types::models::{Flash, MAX_MESSAGE_LEN};

use crate::auth::AppState;
use crate::error::AppError;
use crate::session::{Session, UNAUTHORIZED_NOTICE};
use crate::views;

pub async fn new_message_page(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    views::page(&state, &mut session, Some(&actor), "message_new.html", Context::new())
}

pub async fn create_message(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;

    let text = form.text.trim();
    let problem = if text.is_empty() {
        Some("Message text is required")
    } else if text.chars().count() > MAX_MESSAGE_LEN {
        Some("Messages are limited to 140 characters")
    } else {
        None
    };

    if let Some(problem) = problem {
        session.flash(Flash::danger(problem));
        let mut ctx = Context::new();
        ctx.insert("text", &form.text);
        return views::page(&state, &mut session, Some(&actor), "message_new.html", ctx);
    }

    let message = state.db.create_message(actor.id, text)?;
    info!("User {} posted message {}", actor.id, message.id);

    Ok(session.redirect(&format!("/users/{}", actor.id)))
}

pub async fn show_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let message = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;
    let liked = state.db.find_like(actor.id, message.id)?.is_some();

    let mut ctx = Context::new();
    ctx.insert("message", &message.into_message());
    ctx.insert("liked", &liked);
    views::page(&state, &mut session, Some(&actor), "message_show.html", ctx)
}

/// Only the author may delete; anyone else is sent back with the
/// unauthorized notice and the message is left alone.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let message = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;

    if message.user_id != actor.id {
        warn!("User {} tried to delete message {} owned by {}", actor.id, message.id, message.user_id);
        return Err(session.refuse(UNAUTHORIZED_NOTICE));
    }

    state.db.delete_message(message.id)?;
    info!("User {} deleted message {}", actor.id, message.id);

    Ok(session.redirect(&format!("/users/{}", actor.id)))
}
