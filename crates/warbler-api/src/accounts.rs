use axum::{Form, extract::State, response::Response};
use serde::Serialize;
use tera::Context;
use tracing::{error, info};

use warbler_types::api::{LoginForm, SignupForm, non_blank};
use warbler_types::models::Flash;

use crate::auth::{self, AppState, NewUser, SignupError};
use crate::error::AppError;
use crate::session::Session;
use crate::views;

/// Values echoed back into the signup form after a failed attempt.
#[derive(Debug, Default, Serialize)]
struct SignupEcho<'a> {
    username: &'a str,
    email: &'a str,
    image_url: &'a str,
}

pub async fn signup_page(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    let mut ctx = Context::new();
    ctx.insert("form", &SignupEcho::default());
    views::page(&state, &mut session, None, "signup.html", ctx)
}

pub async fn signup(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let new_user = NewUser {
        username: non_blank(&form.username),
        email: non_blank(&form.email),
        password: form.password.as_deref(),
        image_url: non_blank(&form.image_url),
    };

    let notice = match auth::signup(&state.db, new_user) {
        Ok(user) => {
            session.login(&state.sessions, user.id);
            session.flash(Flash::success(format!("Hello, {}!", user.username)));
            return Ok(session.redirect("/"));
        }
        Err(SignupError::MissingPassword) => "Password is required",
        Err(SignupError::Integrity(reason)) => {
            info!("Signup rejected: {}", reason);
            if new_user.username.is_none() || new_user.email.is_none() {
                "Username and email are required"
            } else {
                "Username already taken"
            }
        }
        Err(SignupError::Other(e)) => {
            error!("Signup failed: {:#}", e);
            return Err(AppError::Internal(e));
        }
    };

    session.flash(Flash::danger(notice));
    let mut ctx = Context::new();
    ctx.insert(
        "form",
        &SignupEcho {
            username: form.username.as_deref().unwrap_or_default(),
            email: form.email.as_deref().unwrap_or_default(),
            image_url: form.image_url.as_deref().unwrap_or_default(),
        },
    );
    views::page(&state, &mut session, None, "signup.html", ctx)
}

pub async fn login_page(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    views::page(&state, &mut session, None, "login.html", Context::new())
}

pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Some(user) = auth::authenticate(&state.db, &form.username, &form.password)? {
        info!("User {} logged in", user.id);
        session.login(&state.sessions, user.id);
        session.flash(Flash::success(format!("Hello, {}!", user.username)));
        return Ok(session.redirect("/"));
    }

    session.flash(Flash::danger("Invalid credentials."));
    let mut ctx = Context::new();
    ctx.insert("username", &form.username);
    views::page(&state, &mut session, None, "login.html", ctx)
}

pub async fn logout(State(state): State<AppState>, mut session: Session) -> Response {
    if let Some(user_id) = session.user_id {
        info!("User {} logged out", user_id);
    }
    session.logout(&state.sessions);
    session.flash(Flash::success("You have been logged out."));
    session.redirect("/login")
}
