//! In-process stand-in for the Packet API and the telemetry collector.
//!
//! Shared between integration test crates via:
//!
//! ```rust
//! #[path = "common/fake_packet.rs"]
//! mod fake_packet;
//! ```
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const API_TOKEN: &str = "api-token";
pub const COLLECTOR_TOKEN: &str = "collector-token";
pub const ORG_ID: &str = "org-1";
pub const PROJECT_ID: &str = "project-1";
pub const CREATED_AT: &str = "2023-01-01T00:00:00Z";
pub const UPDATED_AT: &str = "2023-01-01T00:05:30Z";

type Reply = (StatusCode, Json<Value>);

/// How `/organizations` paginates.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum OrganizationPages {
    /// Two pages, the second holding [`ORG_ID`].
    #[default]
    Two,
    /// Every page links to another one.
    Endless,
    /// An empty page that still links onward.
    EmptyWithNext,
}

#[derive(Debug, Default)]
struct Recorded {
    requests: Vec<String>,
    records: Vec<Value>,
    devices: HashMap<String, Value>,
    project_status: Option<u16>,
    collector_status: Option<u16>,
    organization_pages: OrganizationPages,
}

/// Shared handle on everything the fake server has seen.
#[derive(Clone, Debug, Default)]
pub struct FakePacket {
    inner: Arc<Mutex<Recorded>>,
}

impl FakePacket {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, line: String) {
        self.lock().requests.push(line);
    }

    /// Makes project creation answer with `status`.
    pub fn reject_projects_with(&self, status: u16) {
        self.lock().project_status = Some(status);
    }

    /// Makes the collector answer with `status` instead of 201.
    pub fn collector_answers(&self, status: u16) {
        self.lock().collector_status = Some(status);
    }

    /// Makes every organization page advertise a next page.
    pub fn endless_organization_pages(&self) {
        self.lock().organization_pages = OrganizationPages::Endless;
    }

    /// Makes the first organization page empty while still linking onward.
    pub fn empty_organization_page(&self) {
        self.lock().organization_pages = OrganizationPages::EmptyWithNext;
    }

    /// Requests received so far as `METHOD /path` lines.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Telemetry bodies accepted or rejected by the collector.
    pub fn records(&self) -> Vec<Value> {
        self.lock().records.clone()
    }

    /// Binds an ephemeral local port and serves the fake API on it.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake packet listener");
        let addr = listener.local_addr().expect("listener address");
        let app = router(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        addr
    }
}

fn router(state: FakePacket) -> Router {
    Router::new()
        .route("/organizations", get(list_organizations))
        .route("/organizations/{org_id}/projects", post(create_project))
        .route("/projects/{project_id}", axum::routing::delete(delete_project))
        .route("/projects/{project_id}/devices", post(create_device))
        .route("/devices/{device_id}", get(get_device).delete(delete_device))
        .route("/insert", post(insert_record))
        .with_state(state)
}

fn authorised(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("X-Auth-Token")
        .and_then(|value| value.to_str().ok())
        == Some(token)
}

fn unauthorised() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "errors": ["invalid token"] })),
    )
}

async fn list_organizations(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let page = query.get("page").cloned().unwrap_or_else(|| String::from("1"));
    state.record(format!("GET /organizations?page={page}"));
    if !authorised(&headers, API_TOKEN) {
        return unauthorised();
    }
    let pages = state.lock().organization_pages;
    let body = match pages {
        OrganizationPages::Endless => json!({
            "organizations": [{ "id": format!("org-page-{page}"), "name": "Looping" }],
            "meta": { "next": { "href": "/organizations?page=1" } }
        }),
        OrganizationPages::EmptyWithNext => json!({
            "organizations": [],
            "meta": { "next": { "href": "/organizations?page=2" } }
        }),
        OrganizationPages::Two if page == "1" => json!({
            "organizations": [{ "id": "org-other", "name": "Other" }],
            "meta": { "next": { "href": "/organizations?page=2" } }
        }),
        OrganizationPages::Two => json!({
            "organizations": [{ "id": ORG_ID, "name": "Testers" }],
            "meta": { "next": null }
        }),
    };
    (StatusCode::OK, Json(body))
}

async fn create_project(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    state.record(format!("POST /organizations/{org_id}/projects"));
    if !authorised(&headers, API_TOKEN) {
        return unauthorised();
    }
    if let Some(code) = state.lock().project_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "errors": ["project rejected"] })));
    }
    let name = body.get("name").cloned().unwrap_or(Value::Null);
    (
        StatusCode::CREATED,
        Json(json!({ "id": PROJECT_ID, "name": name })),
    )
}

async fn delete_project(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
) -> StatusCode {
    state.record(format!("DELETE /projects/{project_id}"));
    if authorised(&headers, API_TOKEN) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn create_device(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    state.record(format!("POST /projects/{project_id}/devices"));
    if !authorised(&headers, API_TOKEN) {
        return unauthorised();
    }
    let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or_default().to_owned();
    let mut recorded = state.lock();
    let id = format!("device-{}", recorded.devices.len());
    let device = json!({
        "id": id,
        "hostname": field("hostname"),
        "state": "queued",
        "created_at": CREATED_AT,
        "updated_at": CREATED_AT,
        "facility": { "code": field("facility") },
        "plan": { "slug": field("plan") },
        "operating_system": { "slug": field("operating_system") }
    });
    recorded.devices.insert(id, device.clone());
    (StatusCode::CREATED, Json(device))
}

async fn get_device(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Path(device_id): Path<String>,
) -> Reply {
    state.record(format!("GET /devices/{device_id}"));
    if !authorised(&headers, API_TOKEN) {
        return unauthorised();
    }
    let Some(mut device) = state.lock().devices.get(&device_id).cloned() else {
        return (StatusCode::NOT_FOUND, Json(json!({ "errors": ["not found"] })));
    };
    device["state"] = json!("active");
    device["updated_at"] = json!(UPDATED_AT);
    (StatusCode::OK, Json(device))
}

async fn delete_device(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Path(device_id): Path<String>,
) -> StatusCode {
    state.record(format!("DELETE /devices/{device_id}"));
    if authorised(&headers, API_TOKEN) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn insert_record(
    State(state): State<FakePacket>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    state.record(String::from("POST /insert"));
    if !authorised(&headers, COLLECTOR_TOKEN) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut recorded = state.lock();
    recorded.records.push(body);
    recorded
        .collector_status
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::CREATED)
}
