//! Documents API Handlers
//! /api/v1/admin/{brands,clothing,users,sales} エンドポイント
//!
//! 4 コレクションとも同じ CRUD。対象は `?id=` クエリで指定する。

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::Collection;
use crate::AppState;

// ========================================
// Response Types
// ========================================

#[derive(Serialize)]
pub struct MessageResponse {
    pub mensaje: String,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub mensaje: String,
    pub id: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ========================================
// Query Parameters
// ========================================

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

// ========================================
// Router
// ========================================

/// コレクション 1 つ分のルート（GET / POST / PUT / DELETE）
pub fn router(collection: Collection) -> Router<Arc<AppState>> {
    let path = format!("/{}", collection.table());

    Router::new().route(
        &path,
        get(move |State(state): State<Arc<AppState>>, Query(query): Query<IdQuery>| {
            list_or_get(collection, state, query)
        })
        .post(move |State(state): State<Arc<AppState>>, Json(body): Json<Value>| {
            create(collection, state, body)
        })
        .put(
            move |State(state): State<Arc<AppState>>,
                  Query(query): Query<IdQuery>,
                  Json(body): Json<Value>| { update(collection, state, query, body) },
        )
        .delete(move |State(state): State<Arc<AppState>>, Query(query): Query<IdQuery>| {
            delete(collection, state, query)
        }),
    )
}

// ========================================
// Handlers
// ========================================

/// GET /{collection} - 一覧取得、`?id=` があれば 1 件取得
async fn list_or_get(
    collection: Collection,
    state: Arc<AppState>,
    query: IdQuery,
) -> Result<Json<Value>, ApiError> {
    let labels = collection.labels();

    if let Some(id) = query.id {
        let doc = state.store.get(collection, &id).await.map_err(|e| {
            warn!("Failed to load {} id={}: {}", collection, id, e);
            error_response(StatusCode::NOT_FOUND, labels.not_found)
        })?;

        return match doc {
            Some(doc) => Ok(Json(Value::Object(doc))),
            None => Err(error_response(StatusCode::NOT_FOUND, labels.not_found)),
        };
    }

    let docs = state.store.list(collection).await.map_err(|e| {
        warn!("Failed to list {}: {}", collection, e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("DB error: {}", e))
    })?;

    Ok(Json(Value::Array(docs.into_iter().map(Value::Object).collect())))
}

/// POST /{collection} - 作成
async fn create(
    collection: Collection,
    state: Arc<AppState>,
    body: Value,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let labels = collection.labels();

    let id = state.store.insert(collection, body).await.map_err(|e| {
        warn!("Failed to create {} document: {}", collection, e);
        error_response(StatusCode::BAD_REQUEST, labels.create_failed)
    })?;

    info!("{} document created: id={}", collection, id);

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            mensaje: labels.created.to_string(),
            id: id.into_string(),
        }),
    ))
}

/// PUT /{collection}?id= - 更新（トップレベルのキーを上書き）
async fn update(
    collection: Collection,
    state: Arc<AppState>,
    query: IdQuery,
    body: Value,
) -> Result<Json<MessageResponse>, ApiError> {
    let labels = collection.labels();
    let id = query
        .id
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, labels.not_updated))?;

    let modified = state.store.update(collection, &id, body).await.map_err(|e| {
        warn!("Failed to update {} id={}: {}", collection, id, e);
        error_response(StatusCode::BAD_REQUEST, labels.not_updated)
    })?;

    if modified == 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, labels.not_updated));
    }

    info!("{} document updated: id={}", collection, id);
    Ok(Json(MessageResponse { mensaje: labels.updated.to_string() }))
}

/// DELETE /{collection}?id= - 削除
async fn delete(
    collection: Collection,
    state: Arc<AppState>,
    query: IdQuery,
) -> Result<Json<MessageResponse>, ApiError> {
    let labels = collection.labels();
    let id = query
        .id
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, labels.not_deleted))?;

    let deleted = state.store.delete(collection, &id).await.map_err(|e| {
        warn!("Failed to delete {} id={}: {}", collection, id, e);
        error_response(StatusCode::BAD_REQUEST, labels.not_deleted)
    })?;

    if deleted == 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, labels.not_deleted));
    }

    info!("{} document deleted: id={}", collection, id);
    Ok(Json(MessageResponse { mensaje: labels.deleted.to_string() }))
}

// ========================================
// Helper Functions
// ========================================

/// エラーレスポンス生成
fn error_response(status: StatusCode, message: &str) -> ApiError {
    warn!("API Error: {}", message);
    (status, Json(ErrorResponse { error: message.to_string() }))
}
