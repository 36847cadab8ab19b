//! In-process REST backend used by store and controller tests.

use crate::model::{NewRecord, Record};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub(crate) struct Backend {
    pub records: Arc<Mutex<Vec<Record>>>,
    pub fail: Arc<AtomicBool>,
}

impl Backend {
    pub fn seeded(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    fn failing(&self) -> bool {
        self.fail.load(Ordering::Relaxed)
    }
}

async fn list(State(b): State<Backend>) -> Result<Json<Vec<Record>>, StatusCode> {
    if b.failing() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(b.records.lock().unwrap().clone()))
}

async fn create(
    State(b): State<Backend>,
    Json(new): Json<NewRecord>,
) -> Result<Json<Record>, StatusCode> {
    if b.failing() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let mut recs = b.records.lock().unwrap();
    let id = recs.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    let rec = new.with_id(id);
    recs.push(rec.clone());
    Ok(Json(rec))
}

async fn update(
    State(b): State<Backend>,
    Path(id): Path<u64>,
    Json(rec): Json<Record>,
) -> Result<Json<Record>, StatusCode> {
    if b.failing() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let mut recs = b.records.lock().unwrap();
    match recs.iter_mut().find(|r| r.id == id) {
        Some(slot) => {
            *slot = rec.clone();
            Ok(Json(rec))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn remove(State(b): State<Backend>, Path(id): Path<u64>) -> StatusCode {
    if b.failing() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut recs = b.records.lock().unwrap();
    let before = recs.len();
    recs.retain(|r| r.id != id);
    if recs.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

/// Serve `backend` under `prefix` (e.g. "/stocks/") and return the collection URL.
pub(crate) async fn spawn_backend(backend: Backend, prefix: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route(prefix, get(list).post(create))
        .route(&format!("{prefix}:id"), put(update).delete(remove))
        .with_state(backend);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}{prefix}")
}
