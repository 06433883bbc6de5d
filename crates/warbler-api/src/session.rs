use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};
use uuid::Uuid;

use warbler_db::models::UserRow;
use warbler_types::models::Flash;

use crate::auth::{AppState, AppStateInner};
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "warbler_session";

/// Holds flashes queued for the next page the client renders.
pub const FLASH_COOKIE: &str = "warbler_flash";

pub const UNAUTHORIZED_NOTICE: &str = "Access unauthorized.";

/// Logged-in sessions idle for longer than this are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug)]
struct SessionData {
    user_id: i64,
    last_seen: Instant,
}

/// Server-side store of logged-in sessions, keyed by the opaque id in the
/// session cookie. Anonymous callers never get an entry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionData>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionData>> {
        // Session data stays consistent even if a holder panicked.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session for `user_id` under a new id and returns the id.
    /// Expired sessions are evicted on the way.
    pub fn create(&self, user_id: i64) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen.elapsed() < self.idle_timeout);
        if sessions.len() < before {
            debug!("Evicted {} expired sessions", before - sessions.len());
        }
        sessions.insert(
            id.clone(),
            SessionData {
                user_id,
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// User logged in under `id`, refreshing the idle timer.
    pub fn user_id(&self, id: &str) -> Option<i64> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(id)?;
        if session.last_seen.elapsed() >= self.idle_timeout {
            sessions.remove(id);
            return None;
        }
        session.last_seen = Instant::now();
        Some(session.user_id)
    }

    pub fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The caller's session as resolved from the request cookies.
///
/// Login state lives in the `SessionStore`; flashes travel in their own
/// cookie so anonymous requests leave nothing behind on the server.
/// `respond` writes whatever cookie changes the request made.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    pub user_id: Option<i64>,
    issued: bool,
    ended: bool,
    flashes: Vec<Flash>,
    had_flash_cookie: bool,
    flashes_changed: bool,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let (id, user_id) = match jar.get(SESSION_COOKIE) {
            Some(cookie) => match state.sessions.user_id(cookie.value()) {
                Some(user_id) => (Some(cookie.value().to_string()), Some(user_id)),
                None => (None, None),
            },
            None => (None, None),
        };

        let flash_cookie = jar.get(FLASH_COOKIE);
        let flashes = flash_cookie
            .and_then(|c| match serde_json::from_str::<Vec<Flash>>(c.value()) {
                Ok(flashes) => Some(flashes),
                Err(e) => {
                    debug!("Ignoring malformed flash cookie: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Ok(Session {
            id,
            user_id,
            had_flash_cookie: flash_cookie.is_some(),
            flashes,
            ..Session::default()
        })
    }
}

impl Session {
    /// Logs `user_id` in under a newly issued session id. Any id the
    /// request carried is discarded.
    pub fn login(&mut self, store: &SessionStore, user_id: i64) {
        if let Some(old) = self.id.take() {
            store.remove(&old);
        }
        let id = store.create(user_id);
        debug!("Issued session {} for user {}", id, user_id);
        self.id = Some(id);
        self.user_id = Some(user_id);
        self.issued = true;
        self.ended = false;
    }

    pub fn logout(&mut self, store: &SessionStore) {
        if let Some(id) = self.id.take() {
            store.remove(&id);
        }
        self.user_id = None;
        self.issued = false;
        self.ended = true;
    }

    pub fn flash(&mut self, flash: Flash) {
        self.flashes.push(flash);
        self.flashes_changed = true;
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if !self.flashes.is_empty() {
            self.flashes_changed = true;
        }
        std::mem::take(&mut self.flashes)
    }

    /// Adds this request's cookie changes to `resp`.
    pub fn respond(&self, resp: impl IntoResponse) -> Response {
        let mut jar = CookieJar::new();

        match &self.id {
            Some(id) if self.issued => {
                jar = jar.add(
                    Cookie::build((SESSION_COOKIE, id.clone()))
                        .path("/")
                        .http_only(true)
                        .same_site(SameSite::Lax),
                );
            }
            _ if self.ended => {
                jar = jar.add(Cookie::build((SESSION_COOKIE, "")).path("/").removal());
            }
            _ => {}
        }

        if !self.flashes.is_empty() {
            if self.flashes_changed {
                match serde_json::to_string(&self.flashes) {
                    Ok(value) => {
                        jar = jar.add(
                            Cookie::build((FLASH_COOKIE, value))
                                .path("/")
                                .http_only(true)
                                .same_site(SameSite::Lax),
                        );
                    }
                    Err(e) => warn!("Failed to encode flashes: {}", e),
                }
            }
        } else if self.had_flash_cookie {
            jar = jar.add(Cookie::build((FLASH_COOKIE, "")).path("/").removal());
        }

        (jar, resp).into_response()
    }

    /// 302 redirect to `location`.
    pub fn redirect(&self, location: &str) -> Response {
        self.respond((StatusCode::FOUND, [(header::LOCATION, location.to_string())]))
    }

    /// Queues a danger flash and builds the refusal redirect to `/`.
    pub fn refuse(&mut self, message: &str) -> AppError {
        self.flash(Flash::danger(message));
        AppError::Refused(self.redirect("/"))
    }

    /// Resolves the acting user. Logged-out callers are refused with the
    /// unauthorized notice; a session pointing at a deleted user is a 404.
    pub fn require_user(&mut self, state: &AppStateInner) -> Result<UserRow, AppError> {
        let Some(user_id) = self.user_id else {
            warn!("Unauthenticated request refused");
            return Err(self.refuse(UNAUTHORIZED_NOTICE));
        };

        state.db.get_user(user_id)?.ok_or_else(|| {
            warn!("Session refers to missing user {}", user_id);
            AppError::NotFound
        })
    }

    /// The logged-in user if any, without refusing anonymous callers.
    pub fn current_user(&self, state: &AppStateInner) -> Result<Option<UserRow>, AppError> {
        match self.user_id {
            Some(user_id) => Ok(state.db.get_user(user_id)?),
            None => Ok(None),
        }
    }
}

/// Path of the `Referer` header, used to send the caller back where they
/// came from. Falls back to `/`.
pub fn referer_path(headers: &HeaderMap) -> String {
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return "/".to_string();
    };

    let path = match referer.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => referer,
    };

    if path.starts_with('/') && !path.starts_with("//") {
        path.to_string()
    } else {
        "/".to_string()
    }
}
