#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use warbler_api::auth::{AppState, AppStateInner};
use warbler_api::routes;
use warbler_api::session::{FLASH_COOKIE, SESSION_COOKIE};
use warbler_db::Database;
use warbler_db::models::{NewUserRow, UserRow};

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db).unwrap();
        let router = routes::router(state.clone());
        Self { state, router }
    }

    /// Inserts a user directly, skipping password hashing.
    pub fn user(&self, username: &str) -> UserRow {
        let email = format!("{username}@test.com");
        self.state
            .db
            .create_user(&NewUserRow {
                username: Some(username),
                email: Some(&email),
                password_hash: Some("HASHED_PASSWORD"),
                image_url: None,
            })
            .unwrap()
    }

    /// Session cookie for a session whose stored user id is `user_id`.
    pub fn login_as(&self, user_id: i64) -> String {
        let id = self.state.sessions.create(user_id);
        format!("{SESSION_COOKIE}={id}")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::get(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, form: &str) -> Response<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(form.to_string())).unwrap()).await
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// GETs the redirect target, carrying the session the redirect left
    /// behind and any flash it queued.
    pub async fn follow_redirect(&self, resp: Response<Body>, cookie: Option<&str>) -> Response<Body> {
        assert_eq!(resp.status(), StatusCode::FOUND);
        let session = session_cookie(&resp).or(cookie.map(String::from));
        let cookies: Vec<String> = session.into_iter().chain(set_cookie(&resp, FLASH_COOKIE)).collect();
        let cookies = cookies.join("; ");
        self.get(&location(&resp), (!cookies.is_empty()).then_some(cookies.as_str())).await
    }
}

pub fn location(resp: &Response<Body>) -> String {
    resp.headers()[header::LOCATION].to_str().unwrap().to_string()
}

/// `name=value` of the cookie `name` set by the response, skipping removals.
pub fn set_cookie(resp: &Response<Body>, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.split_once('=').is_some_and(|(n, v)| n == name && !v.is_empty()))
        .map(String::from)
}

/// Session cookie set by the response, if a new one was issued.
pub fn session_cookie(resp: &Response<Body>) -> Option<String> {
    set_cookie(resp, SESSION_COOKIE)
}

/// True if the response tells the client to drop cookie `name`.
pub fn clears_cookie(resp: &Response<Body>, name: &str) -> bool {
    let prefix = format!("{name}=;");
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
