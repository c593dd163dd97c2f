//! HTTP-level tests for the generic handlers against an in-memory service.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use crudkit::{common_routes, crud_routes, scoped_list_route, with_body_limit, AppError, Column, CrudService, Entity, Pagination, PatchByIdRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize, Validate, PartialEq)]
struct Note {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    board_id: String,
    #[validate(length(min = 1))]
    title: String,
}

const NOTE_COLUMNS: &[Column] = &[
    Column::new("id").primary_key().with_default(),
    Column::new("board_id"),
    Column::new("title"),
];

impl Entity for Note {
    type Id = String;
    const TABLE: &'static str = "notes";

    fn columns() -> &'static [Column] {
        NOTE_COLUMNS
    }

    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn merge(&mut self, incoming: Self) {
        self.title = incoming.title;
    }
}

#[derive(Default)]
struct MemoryNotes {
    rows: Mutex<Vec<Note>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryNotes {
    fn seeded(count: usize) -> Arc<Self> {
        let svc = MemoryNotes::default();
        {
            let mut rows = svc.rows.lock().unwrap();
            for i in 1..=count {
                rows.push(Note {
                    id: Some(format!("n{}", i)),
                    board_id: if i % 2 == 0 { "even".into() } else { "odd".into() },
                    title: format!("note {}", i),
                });
            }
        }
        Arc::new(svc)
    }

    fn page(rows: Vec<Note>, pagination: &Pagination) -> Vec<Note> {
        let (offset, limit) = pagination.offset_limit();
        rows.into_iter().skip(offset as usize).take(limit as usize).collect()
    }
}

#[async_trait]
impl CrudService<Note> for MemoryNotes {
    async fn create(&self, mut entity: Note) -> Result<Note, AppError> {
        let mut rows = self.rows.lock().unwrap();
        entity.id = Some(format!("n{}", rows.len() + 1));
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn create_batch(&self, entities: Vec<Note>) -> Result<Vec<Note>, AppError> {
        let mut out = Vec::new();
        for e in entities {
            out.push(self.create(e).await?);
        }
        Ok(out)
    }

    async fn update_by_id(&self, id: &str, entity: Note) -> Result<Note, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows
            .iter_mut()
            .find(|n| n.id.as_deref() == Some(id))
            .ok_or(AppError::NotUpdated)?;
        existing.merge(entity);
        Ok(existing.clone())
    }

    async fn patch_by_id(&self, patch: PatchByIdRequest) -> Result<Note, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows
            .iter_mut()
            .find(|n| n.id.as_deref() == Some(patch.id.as_str()))
            .ok_or(AppError::NotPatched)?;
        match (patch.column_name.as_str(), patch.patch_value) {
            ("title", Value::String(s)) => existing.title = s,
            _ => return Err(AppError::BadRequest("unknown column".into())),
        }
        Ok(existing.clone())
    }

    async fn get_all(&self, pagination: Pagination) -> Result<Vec<Note>, AppError> {
        // Yield so concurrent list requests interleave.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let rows = self.rows.lock().unwrap().clone();
        Ok(Self::page(rows, &pagination))
    }

    async fn get_all_by_fields(&self, filters: Vec<(String, Value)>, pagination: Pagination) -> Result<Vec<Note>, AppError> {
        let rows: Vec<Note> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| {
                filters
                    .iter()
                    .all(|(k, v)| k == "board_id" && v.as_str() == Some(n.board_id.as_str()))
            })
            .cloned()
            .collect();
        Ok(Self::page(rows, &pagination))
    }

    async fn get_one_by_id(&self, id: &str) -> Result<Option<Note>, AppError> {
        Ok(self.rows.lock().unwrap().iter().find(|n| n.id.as_deref() == Some(id)).cloned())
    }

    async fn get_one_including_deleted_by_id(&self, id: &str) -> Result<Option<Note>, AppError> {
        self.get_one_by_id(id).await
    }

    async fn get_one_by_fields(&self, filters: Vec<(String, Value)>) -> Result<Note, AppError> {
        self.get_all_by_fields(filters, Pagination::default())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("record not found".into()))
    }

    async fn delete_hard_by_id(&self, id: &str) -> Result<u64, AppError> {
        self.delete_softly_by_id(id).await
    }

    async fn delete_softly_by_id(&self, id: &str) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| n.id.as_deref() != Some(id));
        if rows.len() == before {
            return Err(AppError::NotDeleted(format!("no record found with id: {}", id)));
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(1)
    }

    async fn delete_permanently_by_id(&self, id: &str) -> Result<u64, AppError> {
        self.delete_softly_by_id(id).await
    }
}

fn app(svc: Arc<MemoryNotes>) -> Router {
    Router::new()
        .nest("/notes", crud_routes::<Note, _>(svc.clone()))
        .merge(scoped_list_route::<Note, _>("/boards/:boardId/notes", svc))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn create_answers_201_with_the_stored_record() {
    let svc = MemoryNotes::seeded(0);
    let (status, body) = send(app(svc.clone()), "POST", "/notes", Some(json!({"title": "first"}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], 201);
    assert_eq!(body["message"], "successful");
    assert_eq!(body["data"]["result"]["id"], "n1");
    assert_eq!(svc.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn create_rejects_invalid_and_malformed_bodies() {
    let svc = MemoryNotes::seeded(0);

    let (status, body) = send(app(svc.clone()), "POST", "/notes", Some(json!({"title": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["data"]["result"].is_null());

    let (status, _) = send(app(svc.clone()), "POST", "/notes", Some(json!({"nope": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(svc.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn batch_create_validates_every_element() {
    let svc = MemoryNotes::seeded(0);
    let (status, body) = send(
        app(svc.clone()),
        "POST",
        "/notes/batch",
        Some(json!([{"title": "a"}, {"title": "b"}])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["result"].as_array().map(|a| a.len()), Some(2));

    let (status, _) = send(app(svc.clone()), "POST", "/notes/batch", Some(json!([{"title": "c"}, {"title": ""}]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(svc.rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn read_one_found_and_missing() {
    let svc = MemoryNotes::seeded(2);

    let (status, body) = send(app(svc.clone()), "GET", "/notes/n2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"]["title"], "note 2");

    let (status, body) = send(app(svc), "GET", "/notes/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": 404, "message": "not found", "data": {"result": null}}));
}

#[tokio::test]
async fn list_uses_page_and_limit_from_the_query() {
    let svc = MemoryNotes::seeded(25);

    let (status, body) = send(app(svc.clone()), "GET", "/notes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"].as_array().unwrap().len(), 10);

    let (_, body) = send(app(svc.clone()), "GET", "/notes?page=3&limit=10", None).await;
    let ids: Vec<&str> = body["data"]["result"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["n21", "n22", "n23", "n24", "n25"]);

    let (_, body) = send(app(svc), "GET", "/notes?page=zero&limit=-4", None).await;
    assert_eq!(body["data"]["result"][0]["id"], "n1");
}

#[tokio::test]
async fn concurrent_lists_keep_their_own_pagination() {
    let svc = MemoryNotes::seeded(30);
    let router = app(svc);

    let mut handles = Vec::new();
    for page in 1..=3 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let (_, body) = send(router, "GET", &format!("/notes?page={}&limit=10", page), None).await;
            (page, body["data"]["result"][0]["id"].as_str().map(str::to_owned))
        }));
    }
    for h in handles {
        let (page, first) = h.await.unwrap();
        assert_eq!(first, Some(format!("n{}", (page - 1) * 10 + 1)));
    }
}

#[tokio::test]
async fn scoped_list_filters_by_path_parameters() {
    let svc = MemoryNotes::seeded(6);
    let (status, body) = send(app(svc), "GET", "/boards/even/notes", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]["result"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["n2", "n4", "n6"]);
}

#[tokio::test]
async fn update_answers_201_and_missing_record_is_500() {
    let svc = MemoryNotes::seeded(1);

    let (status, body) = send(app(svc.clone()), "PUT", "/notes/n1", Some(json!({"title": "renamed"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["result"]["title"], "renamed");

    let (status, body) = send(app(svc), "PUT", "/notes/n9", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "not updated");
    assert!(body["data"]["result"].is_null());
}

#[tokio::test]
async fn patch_requires_every_field() {
    let svc = MemoryNotes::seeded(1);

    let (status, body) = send(
        app(svc.clone()),
        "PATCH",
        "/notes",
        Some(json!({"id": "n1", "columnName": "title", "patchValue": "patched"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["result"]["title"], "patched");

    let (status, _) = send(app(svc.clone()), "PATCH", "/notes", Some(json!({"id": "n1", "columnName": "title"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        app(svc),
        "PATCH",
        "/notes",
        Some(json!({"id": "n7", "columnName": "title", "patchValue": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "not patched");
}

#[tokio::test]
async fn deletes_report_affected_rows() {
    let svc = MemoryNotes::seeded(2);

    let (status, body) = send(app(svc.clone()), "DELETE", "/notes/n1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], 1);

    let (status, body) = send(app(svc.clone()), "DELETE", "/notes/n2/permanent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], 1);

    let (status, body) = send(app(svc.clone()), "DELETE", "/notes/n1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "no record found with id: n1");
    assert_eq!(*svc.deleted.lock().unwrap(), vec!["n1".to_string(), "n2".to_string()]);
}

#[tokio::test]
async fn oversized_bodies_are_rejected_before_binding() {
    let svc = MemoryNotes::seeded(0);
    let router = with_body_limit(app(svc.clone()), 32);
    let body = json!({"title": "x".repeat(64)}).to_string();
    let req = Request::builder()
        .method("POST")
        .uri("/notes")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(svc.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn health_and_version() {
    let (status, body) = send(common_routes(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": 200, "message": "successful", "data": {"result": {"status": "ok"}}}));

    let (status, body) = send(common_routes(), "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"]["name"], "crudkit");
}
