//! Scriptable stand-in for the dwitter backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct Backend {
	/// `METHOD path` of every request, in arrival order.
	pub log: Mutex<Vec<String>>,
	/// Bearer token `auth/me` and `tweets` accept.
	pub valid_token: Mutex<Option<String>>,
	/// Token `auth/refresh` hands out; refresh answers 401 when unset.
	pub refresh_token: Mutex<Option<String>>,
	/// Status `auth/logout` answers with.
	pub logout_status: Mutex<Option<StatusCode>>,
}

impl Backend {
	pub fn requests(&self) -> Vec<String> {
		self.log.lock().clone()
	}

	fn record(&self, entry: String) {
		self.log.lock().push(entry);
	}

	fn authorized(&self, headers: &HeaderMap) -> bool {
		let presented = headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.strip_prefix("Bearer "))
			.map(str::to_string);
		presented.is_some() && presented == *self.valid_token.lock()
	}
}

pub struct TestServer {
	pub base_url: String,
	pub backend: Arc<Backend>,
	handle: JoinHandle<()>,
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

pub async fn spawn_backend() -> TestServer {
	let backend = Arc::new(Backend::default());
	let app = Router::new()
		.route("/auth/signup", post(signup))
		.route("/auth/login", post(login))
		.route("/auth/me", get(me))
		.route("/auth/refresh", get(refresh))
		.route("/auth/logout", get(logout))
		.route("/tweets", get(list_tweets).post(create_tweet))
		.route("/tweets/{id}", put(update_tweet).delete(delete_tweet))
		.route("/broken", get(broken))
		.route("/teapot", get(teapot))
		.route("/echo/headers", get(echo_headers).post(echo_headers))
		.with_state(Arc::clone(&backend));

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let handle = tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});

	TestServer {
		base_url: format!("http://{addr}"),
		backend,
		handle,
	}
}

fn unauthorized() -> Response {
	(StatusCode::UNAUTHORIZED, Json(json!({ "message": "Authentication Error" }))).into_response()
}

fn tweet(id: &str, text: &str, username: &str) -> Value {
	json!({
		"id": id,
		"text": text,
		"createdAt": "2026-10-14T09:00:00.000Z",
		"name": "Nan",
		"username": username,
	})
}

async fn signup(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
	backend.record("POST /auth/signup".into());
	*backend.valid_token.lock() = Some("abc".into());
	(StatusCode::CREATED, Json(json!({ "accessToken": "abc", "username": body["username"] }))).into_response()
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
	backend.record("POST /auth/login".into());
	if body["password"] != PASSWORD {
		return unauthorized();
	}
	*backend.valid_token.lock() = Some("abc".into());
	Json(json!({ "accessToken": "abc", "username": body["username"] })).into_response()
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
	backend.record("GET /auth/me".into());
	if !backend.authorized(&headers) {
		return unauthorized();
	}
	let token = backend.valid_token.lock().clone();
	Json(json!({ "token": token, "username": "nanduck" })).into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>, Query(query): Query<HashMap<String, String>>) -> Response {
	let username = query.get("username").cloned().unwrap_or_default();
	backend.record(format!("GET /auth/refresh?username={username}"));
	let Some(token) = backend.refresh_token.lock().clone() else {
		return unauthorized();
	};
	*backend.valid_token.lock() = Some(token.clone());
	Json(json!({ "accessToken": token, "username": username })).into_response()
}

async fn logout(State(backend): State<Arc<Backend>>) -> Response {
	backend.record("GET /auth/logout".into());
	match *backend.logout_status.lock() {
		Some(status) if !status.is_success() => (status, Json(json!({ "message": "logout failed" }))).into_response(),
		_ => StatusCode::OK.into_response(),
	}
}

async fn list_tweets(State(backend): State<Arc<Backend>>, headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
	backend.record("GET /tweets".into());
	if !backend.authorized(&headers) {
		return unauthorized();
	}
	let all = vec![tweet("1", "hello", "nanduck"), tweet("2", "hi", "ellie")];
	let filtered: Vec<Value> = match query.get("username") {
		Some(username) => all.into_iter().filter(|t| t["username"] == username.as_str()).collect(),
		None => all,
	};
	Json(Value::Array(filtered)).into_response()
}

async fn create_tweet(State(backend): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
	backend.record("POST /tweets".into());
	if !backend.authorized(&headers) {
		return unauthorized();
	}
	let text = body["text"].as_str().unwrap_or_default();
	(StatusCode::CREATED, Json(tweet("3", text, "nanduck"))).into_response()
}

async fn update_tweet(
	State(backend): State<Arc<Backend>>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(body): Json<Value>,
) -> Response {
	backend.record(format!("PUT /tweets/{id}"));
	if !backend.authorized(&headers) {
		return unauthorized();
	}
	if id == "missing" {
		return (StatusCode::NOT_FOUND, Json(json!({ "message": "Tweet not found: missing" }))).into_response();
	}
	let text = body["text"].as_str().unwrap_or_default();
	Json(tweet(&id, text, "nanduck")).into_response()
}

async fn delete_tweet(State(backend): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
	backend.record(format!("DELETE /tweets/{id}"));
	if !backend.authorized(&headers) {
		return unauthorized();
	}
	StatusCode::NO_CONTENT.into_response()
}

async fn broken() -> Response {
	(StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "database down" }))).into_response()
}

async fn teapot() -> Response {
	StatusCode::IM_A_TEAPOT.into_response()
}

/// Answers with the request's `content-type` and `authorization` headers.
async fn echo_headers(headers: HeaderMap) -> Response {
	let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
	Json(json!({
		"contentType": header("content-type"),
		"authorization": header("authorization"),
	}))
	.into_response()
}
