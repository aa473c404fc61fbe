//! CRUD handlers shared by every entity kind

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::state::{AppState, RepositoryFor};
use crate::api::types::{ApiError, Json};
use crate::domain::storage::{QueryParams, Record, RecordKey};
use crate::domain::{DomainError, EntityRepository};

fn repository<E>(state: &AppState) -> &Arc<dyn EntityRepository<E>>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    <AppState as RepositoryFor<E>>::repository(state)
}

fn parse_id<E: Record>(raw: &str) -> Result<E::Key, ApiError> {
    raw.parse::<E::Key>().map_err(|_| {
        ApiError::from(DomainError::invalid_id(format!(
            "'{}' is not a valid {} id",
            raw,
            E::KIND
        )))
    })
}

fn keyed_body(key: String, value: Value) -> Value {
    let mut body = Map::new();
    body.insert(key, value);
    Value::Object(body)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::from(DomainError::internal(format!("Failed to encode response: {}", e))))
}

/// Routes for one kind under `/<kind>`
pub fn entity_router<E>() -> Router<AppState>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    let base = format!("/{}", E::KIND);

    Router::new()
        .route(&base, post(create_record::<E>))
        .route(&format!("{}/list", base), post(list_records::<E>))
        .route(
            &format!("{}/{{id}}", base),
            get(get_record::<E>)
                .put(update_record::<E>)
                .delete(delete_record::<E>),
        )
}

/// POST /api/v1/<kind>
///
/// Ids of store-assigned kinds are ignored in the body.
pub async fn create_record<E>(
    State(state): State<AppState>,
    Json(mut record): Json<E>,
) -> Result<Json<Value>, ApiError>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    if <E::Key as RecordKey>::STORE_ASSIGNED {
        record.set_id(E::Key::default());
    }

    let id = repository::<E>(&state).create(record).await?;
    debug!(kind = E::KIND, id = %id, "Created record");

    Ok(Json(json!({ "id": to_json(&id)? })))
}

/// DELETE /api/v1/<kind>/{id}
pub async fn delete_record<E>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    let id = parse_id::<E>(&raw_id)?;

    repository::<E>(&state).delete_by_id(&id).await?;
    debug!(kind = E::KIND, id = %id, "Deleted record");

    Ok(Json(json!({ "deleted": true, "id": to_json(&id)? })))
}

/// PUT /api/v1/<kind>/{id}
pub async fn update_record<E>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(patch): Json<E::Patch>,
) -> Result<Json<Value>, ApiError>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    let id = parse_id::<E>(&raw_id)?;

    repository::<E>(&state).update_by_id(&id, &patch).await?;
    debug!(kind = E::KIND, id = %id, "Updated record");

    Ok(Json(json!({ "updated": true, "id": to_json(&id)? })))
}

/// GET /api/v1/<kind>/{id}
pub async fn get_record<E>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    let id = parse_id::<E>(&raw_id)?;
    let record = repository::<E>(&state).get_by_id(&id).await?;

    Ok(Json(keyed_body(E::KIND.to_string(), to_json(&record)?)))
}

/// POST /api/v1/<kind>/list
pub async fn list_records<E>(
    State(state): State<AppState>,
    Json(params): Json<QueryParams>,
) -> Result<Json<Value>, ApiError>
where
    E: Record,
    AppState: RepositoryFor<E>,
{
    let (records, total) = repository::<E>(&state).get_by_columns(&params).await?;
    debug!(kind = E::KIND, count = records.len(), total, "Listed records");

    let mut body = keyed_body(format!("{}s", E::KIND), to_json(&records)?);
    if let Value::Object(fields) = &mut body {
        fields.insert("total".to_string(), json!(total));
    }

    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::domain::traits::MockEntityRepository;
    use crate::domain::{Item, Mob, Room};
    use crate::infrastructure::storage::{RepositoryOptions, StoreBackend, StoreFactory};

    fn state_with_mobs(mobs: MockEntityRepository<Mob>) -> AppState {
        AppState::new(
            Arc::new(mobs),
            Arc::new(MockEntityRepository::<Item>::new()),
            Arc::new(MockEntityRepository::<Room>::new()),
        )
    }

    async fn in_memory_state() -> AppState {
        let backend = StoreBackend::InMemory;
        let options = RepositoryOptions::default();

        AppState::new(
            StoreFactory::create_repository(&backend, &options).await.unwrap(),
            StoreFactory::create_repository(&backend, &options).await.unwrap(),
            StoreFactory::create_repository(&backend, &options).await.unwrap(),
        )
    }

    fn app(state: AppState) -> Router {
        super::super::create_v1_router().with_state(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    #[tokio::test]
    async fn test_get_returns_record_under_kind() {
        let mut mobs = MockEntityRepository::<Mob>::new();
        mobs.expect_get_by_id()
            .withf(|id| *id == 7)
            .returning(|id| Ok(Mob::new("rat", "Rat").with_id(*id)));

        let (status, body) = send(&app(state_with_mobs(mobs)), "GET", "/api/v1/mob/7", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mob"]["id"], 7);
        assert_eq!(body["mob"]["mobID"], "rat");
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let mut mobs = MockEntityRepository::<Mob>::new();
        mobs.expect_get_by_id()
            .returning(|id| Err(DomainError::not_found(format!("mob '{}' not found", id))));

        let (status, body) = send(&app(state_with_mobs(mobs)), "GET", "/api/v1/mob/99", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found_error");
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let mobs = MockEntityRepository::<Mob>::new();

        let (status, body) = send(&app(state_with_mobs(mobs)), "GET", "/api/v1/mob/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["param"], "id");
    }

    #[tokio::test]
    async fn test_create_ignores_body_id_for_store_assigned_kinds() {
        let mut mobs = MockEntityRepository::<Mob>::new();
        mobs.expect_create()
            .withf(|mob| mob.id == 0 && mob.mob_id == "rat")
            .returning(|_| Ok(12));

        let (status, body) = send(
            &app(state_with_mobs(mobs)),
            "POST",
            "/api/v1/mob",
            Some(json!({ "id": 500, "mobID": "rat", "mobName": "Rat" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 12 }));
    }

    #[tokio::test]
    async fn test_storage_failure_is_500_without_details() {
        let mut mobs = MockEntityRepository::<Mob>::new();
        mobs.expect_get_by_id()
            .returning(|_| Err(DomainError::storage("connection refused")));

        let (status, body) = send(&app(state_with_mobs(mobs)), "GET", "/api/v1/mob/1", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let mobs = MockEntityRepository::<Mob>::new();

        let (status, body) = send(
            &app(state_with_mobs(mobs)),
            "PUT",
            "/api/v1/mob/1",
            Some(json!({ "hp": "lots" })),
        )
        .await;

        assert!(status.is_client_error());
        assert_eq!(body["error"]["code"], "json_parse_error");
    }

    #[tokio::test]
    async fn test_room_crud_flow() {
        let app = app(in_memory_state().await);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/room",
            Some(json!({ "id": "hall", "title": "Great Hall" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": "hall" }));

        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/room/hall",
            Some(json!({ "desc": "Long tables" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "updated": true, "id": "hall" }));

        let (_, body) = send(&app, "GET", "/api/v1/room/hall", None).await;
        assert_eq!(body["room"]["title"], "Great Hall");
        assert_eq!(body["room"]["desc"], "Long tables");

        let (status, body) = send(&app, "DELETE", "/api/v1/room/hall", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "deleted": true, "id": "hall" }));

        let (status, _) = send(&app, "GET", "/api/v1/room/hall", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mob_attackable_can_be_reset_to_null() {
        let app = app(in_memory_state().await);

        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/mob",
            Some(json!({ "id": 99, "mobID": "orc", "mobName": "Orc", "attackable": true })),
        )
        .await;
        assert_eq!(body, json!({ "id": 1 }));

        send(&app, "PUT", "/api/v1/mob/1", Some(json!({ "hp": 40 }))).await;
        let (_, body) = send(&app, "GET", "/api/v1/mob/1", None).await;
        assert_eq!(body["mob"]["attackable"], true);
        assert_eq!(body["mob"]["hp"], 40);

        let (status, _) = send(&app, "PUT", "/api/v1/mob/1", Some(json!({ "attackable": null }))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/v1/mob/1", None).await;
        assert_eq!(body["mob"]["attackable"], Value::Null);
        assert_eq!(body["mob"]["hp"], 40);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_404() {
        let app = app(in_memory_state().await);

        let (status, _) = send(&app, "PUT", "/api/v1/item/3", Some(json!({ "hp": 5 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_with_filters_and_total() {
        let app = app(in_memory_state().await);

        for (mob_id, hp) in [("rat", 10), ("wolf", 60), ("bear", 120)] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/v1/mob",
                Some(json!({ "mobID": mob_id, "mobName": mob_id, "hp": hp })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/mob/list",
            Some(json!({
                "page": 0,
                "limit": 10,
                "sort": "-hp",
                "columns": [{ "name": "hp", "exp": ">=", "value": 50 }]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["mobs"][0]["mobID"], "bear");
        assert_eq!(body["mobs"][1]["mobID"], "wolf");
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_column() {
        let app = app(in_memory_state().await);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/item/list",
            Some(json!({ "columns": [{ "name": "password", "value": "x" }] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
