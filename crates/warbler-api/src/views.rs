use std::collections::HashSet;

use axum::response::{Html, Response};
use tera::{Context, Tera};

use warbler_db::models::UserRow;

use crate::auth::AppStateInner;
use crate::error::AppError;
use crate::session::Session;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("message_list.html", include_str!("../templates/message_list.html")),
    ("user_card.html", include_str!("../templates/user_card.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("home_anon.html", include_str!("../templates/home_anon.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("message_new.html", include_str!("../templates/message_new.html")),
    ("message_show.html", include_str!("../templates/message_show.html")),
    ("users_index.html", include_str!("../templates/users_index.html")),
    ("user_show.html", include_str!("../templates/user_show.html")),
    ("follows.html", include_str!("../templates/follows.html")),
    ("likes.html", include_str!("../templates/likes.html")),
    ("edit_profile.html", include_str!("../templates/edit_profile.html")),
];

/// Compiled page templates. `.html` names are autoescaped.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, ctx: &Context) -> Result<String, tera::Error> {
        self.tera.render(template, ctx)
    }
}

/// Renders `template` as a full page. Pending flashes and the logged-in
/// user are added to `ctx`.
pub fn page(
    state: &AppStateInner,
    session: &mut Session,
    current_user: Option<&UserRow>,
    template: &str,
    mut ctx: Context,
) -> Result<Response, AppError> {
    ctx.insert("flashes", &session.take_flashes());
    ctx.insert("current_user", &current_user.cloned().map(UserRow::into_user));

    let body = state.views.render(template, &ctx)?;
    Ok(session.respond(Html(body)))
}

/// Context shared by every page that shows a profile card: the profile
/// owner, their counters, and what the viewer follows and likes.
pub fn profile_context(
    state: &AppStateInner,
    viewer: Option<&UserRow>,
    user: &UserRow,
) -> Result<Context, AppError> {
    let (following_ids, likes) = match viewer {
        Some(viewer) => (
            state.db.following_ids(viewer.id)?,
            state.db.liked_message_ids(viewer.id)?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    let mut ctx = Context::new();
    ctx.insert("user", &user.clone().into_user());
    ctx.insert("stats", &state.db.user_stats(user.id)?);
    ctx.insert("following_ids", &following_ids);
    ctx.insert("likes", &likes);
    Ok(ctx)
}
