use axum::{extract::State, response::Response};
use tera::Context;
use tracing::{error, warn};

use warbler_types::models::Message;

use crate::auth::AppState;
use crate::error::AppError;
use crate::session::Session;
use crate::views;

/// Most messages shown on the home timeline.
const FEED_LIMIT: u32 = 100;

/// Timeline of the user and everyone they follow; a landing page for
/// anonymous visitors.
pub async fn homepage(State(state): State<AppState>, mut session: Session) -> Result<Response, AppError> {
    let Some(user) = session.current_user(&state)? else {
        if session.user_id.is_some() {
            warn!("Dropping session for deleted user");
            session.logout(&state.sessions);
        }
        return views::page(&state, &mut session, None, "home_anon.html", Context::new());
    };

    // Run the feed query off the async runtime
    let db = state.clone();
    let user_id = user.id;
    let rows = tokio::task::spawn_blocking(move || db.db.home_feed(user_id, FEED_LIMIT))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            anyhow::Error::from(e)
        })??;

    let messages: Vec<Message> = rows.into_iter().map(|row| row.into_message()).collect();

    let mut ctx = views::profile_context(&state, Some(&user), &user)?;
    ctx.insert("messages", &messages);
    views::page(&state, &mut session, Some(&user), "home.html", ctx)
}
