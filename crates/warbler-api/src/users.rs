use axum::{
    Form,
    extract::{Path, Query, State},
    response::Response,
};
use tera::Context;
use tracing::{info, warn};

use warbler_db::is_integrity_error;
use warbler_db::models::{ProfileUpdate, UserRow};
use warbler_types::api::{ProfileForm, SearchQuery, non_blank};
use warbler_types::models::{Flash, Message, User};

use crate::auth::{self, AppState};
use crate::error::AppError;
use crate::session::Session;
use crate::views;

pub const SELF_FOLLOW_NOTICE: &str = "You can not follow yourself!";

/// Messages shown on a profile page.
const PROFILE_MESSAGE_LIMIT: u32 = 100;

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    mut session: Session,
) -> Result<Response, AppError> {
    let viewer = session.current_user(&state)?;
    let users: Vec<User> = state
        .db
        .list_users(non_blank(&query.q))?
        .into_iter()
        .map(UserRow::into_user)
        .collect();

    let mut ctx = Context::new();
    ctx.insert("users", &users);
    views::page(&state, &mut session, viewer.as_ref(), "users_index.html", ctx)
}

pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let user = state.db.get_user(user_id)?.ok_or(AppError::NotFound)?;
    let viewer = session.current_user(&state)?;

    let messages: Vec<Message> = state
        .db
        .user_messages(user.id, PROFILE_MESSAGE_LIMIT)?
        .into_iter()
        .map(|row| row.into_message())
        .collect();

    let mut ctx = views::profile_context(&state, viewer.as_ref(), &user)?;
    ctx.insert("messages", &messages);
    views::page(&state, &mut session, viewer.as_ref(), "user_show.html", ctx)
}

pub async fn show_following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let user = state.db.get_user(user_id)?.ok_or(AppError::NotFound)?;
    let users = state.db.following(user.id)?;
    follows_page(&state, &mut session, &actor, &user, users, "Following")
}

pub async fn show_followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let user = state.db.get_user(user_id)?.ok_or(AppError::NotFound)?;
    let users = state.db.followers(user.id)?;
    follows_page(&state, &mut session, &actor, &user, users, "Followers")
}

fn follows_page(
    state: &AppState,
    session: &mut Session,
    actor: &UserRow,
    user: &UserRow,
    users: Vec<UserRow>,
    heading: &str,
) -> Result<Response, AppError> {
    let users: Vec<User> = users.into_iter().map(UserRow::into_user).collect();

    let mut ctx = views::profile_context(state, Some(actor), user)?;
    ctx.insert("heading", heading);
    ctx.insert("users", &users);
    views::page(state, session, Some(actor), "follows.html", ctx)
}

pub async fn follow(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let target = state.db.get_user(target_id)?.ok_or(AppError::NotFound)?;

    if target.id == actor.id {
        return Err(session.refuse(SELF_FOLLOW_NOTICE));
    }

    if state.db.follow(actor.id, target.id)? {
        info!("User {} followed {}", actor.id, target.id);
    }

    Ok(session.redirect(&format!("/users/{}/following", actor.id)))
}

pub async fn stop_following(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
    mut session: Session,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;
    let target = state.db.get_user(target_id)?.ok_or(AppError::NotFound)?;

    if state.db.unfollow(actor.id, target.id)? {
        info!("User {} unfollowed {}", actor.id, target.id);
    }

    Ok(session.redirect(&format!("/users/{}/following", actor.id)))
}

pub async fn edit_profile_page(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;

    let mut ctx = Context::new();
    ctx.insert("user", &actor.clone().into_user());
    views::page(&state, &mut session, Some(&actor), "edit_profile.html", ctx)
}

/// Applies profile changes once the current password is confirmed.
pub async fn edit_profile(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;

    if auth::authenticate(&state.db, &actor.username, &form.password)?.is_none() {
        warn!("Profile edit for user {} rejected: wrong password", actor.id);
        session.flash(Flash::danger("Wrong password, please try again."));
        return edit_form_again(&state, &mut session, &actor);
    }

    let update = ProfileUpdate {
        username: form.username.trim(),
        email: form.email.trim(),
        image_url: non_blank(&form.image_url),
        header_image_url: non_blank(&form.header_image_url),
        bio: non_blank(&form.bio),
        location: non_blank(&form.location),
    };

    if update.username.is_empty() || update.email.is_empty() {
        session.flash(Flash::danger("Username and email are required"));
        return edit_form_again(&state, &mut session, &actor);
    }

    match state.db.update_profile(actor.id, &update) {
        Ok(user) => {
            info!("User {} updated their profile", user.id);
            Ok(session.redirect(&format!("/users/{}", user.id)))
        }
        Err(e) if is_integrity_error(&e) => {
            session.flash(Flash::danger("Username or email already taken"));
            edit_form_again(&state, &mut session, &actor)
        }
        Err(e) => Err(e.into()),
    }
}

fn edit_form_again(state: &AppState, session: &mut Session, actor: &UserRow) -> Result<Response, AppError> {
    let mut ctx = Context::new();
    ctx.insert("user", &actor.clone().into_user());
    views::page(state, session, Some(actor), "edit_profile.html", ctx)
}

/// Deletes the current user and everything they own, then logs out.
pub async fn delete_user(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    let actor = session.require_user(&state)?;

    state.db.delete_user(actor.id)?;
    info!("User {} deleted their account", actor.id);

    session.logout(&state.sessions);
    session.flash(Flash::info("Your account has been deleted."));
    Ok(session.redirect("/signup"))
}
