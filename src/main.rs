mod db;
mod handlers;
mod models;
mod reports;
mod seed;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::db::DocumentStore;
use crate::models::Collection;
use crate::reports::ReportService;

// ========================================
// 設定
// ========================================

#[derive(Debug, Clone)]
struct AppConfig {
    database_path: String,
    bind_addr: String,
    seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "clothing-store.db".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            seed_demo_data: false,
        }
    }
}

impl AppConfig {
    /// 環境変数（.env 含む）と起動引数から読み込む
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), std::env::args())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        mut args: impl Iterator<Item = String>,
    ) -> Self {
        let defaults = Self::default();
        let seed_flag = lookup("SEED_DEMO_DATA")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.seed_demo_data);

        Self {
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            seed_demo_data: seed_flag || args.any(|arg| arg == "--seed"),
        }
    }
}

// ========================================
// アプリケーション状態
// ========================================

pub struct AppState {
    pub store: DocumentStore,
    pub reports: ReportService<DocumentStore>,
}

impl AppState {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            reports: ReportService::new(store.clone()),
            store,
        }
    }
}

// ========================================
// ハンドラ
// ========================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    database: String,
}

/// ヘルスチェック
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = if state.store.health_check().await { "ok" } else { "unavailable" };

    Json(HealthResponse {
        status: "ok".to_string(),
        service: "clothing-admin-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    })
}

// ========================================
// ルーター
// ========================================

fn build_router(state: Arc<AppState>) -> Router {
    let admin = Collection::ALL
        .into_iter()
        .fold(Router::new(), |router, collection| {
            router.merge(handlers::documents::router(collection))
        })
        .merge(handlers::reports::router());

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/v1/admin", admin)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ========================================
// メイン
// ========================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は任意
    let _ = dotenvy::dotenv();

    // ログ初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();

    let pool = db::init_db(&config.database_path).await?;
    let store = DocumentStore::new(pool);

    if config.seed_demo_data {
        if let Err(e) = seed::seed_demo_data(&store).await {
            warn!("⚠️  Demo data seeding failed: {:#}", e);
        }
    }

    let app = build_router(Arc::new(AppState::new(store)));

    info!("🚀 Clothing Admin API listening on {}", config.bind_addr);
    info!("📦 Database: {}", config.database_path);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    async fn app() -> Router {
        let pool = db::init_memory_db().await.unwrap();
        build_router(Arc::new(AppState::new(DocumentStore::new(pool))))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    #[test]
    fn config_reads_overrides_and_seed_flag() {
        let vars: HashMap<&str, &str> = [("DATABASE_PATH", "/tmp/x.db"), ("SEED_DEMO_DATA", "TRUE")].into();
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()), std::iter::empty());
        assert_eq!(config.database_path, "/tmp/x.db");
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert!(config.seed_demo_data);

        let from_arg = AppConfig::from_lookup(|_| None, ["server".to_string(), "--seed".to_string()].into_iter());
        assert!(from_arg.seed_demo_data);
        assert!(!AppConfig::from_lookup(|_| None, std::iter::empty()).seed_demo_data);
    }

    #[tokio::test]
    async fn health_reports_database_status() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], json!("ok"));
    }

    #[tokio::test]
    async fn brand_crud_round_trip() {
        let app = app().await;

        let (status, body) = send(&app, "POST", "/api/v1/admin/brands", Some(json!({"name": "UrbanStyle", "country": "USA"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["mensaje"], json!("Marca creada"));
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", &format!("/api/v1/admin/brands?id={id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_id"], json!(id));
        assert_eq!(body["name"], json!("UrbanStyle"));

        let (status, _) = send(&app, "PUT", &format!("/api/v1/admin/brands?id={id}"), Some(json!({"country": "Costa Rica"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "PUT", &format!("/api/v1/admin/brands?id={id}"), Some(json!({"country": "Costa Rica"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Marca no actualizada"));

        let (status, body) = send(&app, "GET", "/api/v1/admin/brands", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["country"], json!("Costa Rica"));

        let (status, body) = send(&app, "DELETE", &format!("/api/v1/admin/brands?id={id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mensaje"], json!("Marca eliminada"));

        let (status, body) = send(&app, "GET", &format!("/api/v1/admin/brands?id={id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("Marca no encontrada"));

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/admin/brands?id={id}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_non_objects() {
        let app = app().await;

        let (status, _) = send(&app, "POST", "/api/v1/admin/sales", Some(json!({"_id": "sale010", "quantity": 3}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "POST", "/api/v1/admin/sales", Some(json!({"_id": "sale010"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Error al crear venta"));

        let (status, _) = send(&app, "POST", "/api/v1/admin/users", Some(json!("just a string"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_and_delete_without_id_are_rejected() {
        let app = app().await;
        let (status, _) = send(&app, "PUT", "/api/v1/admin/clothing", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, "DELETE", "/api/v1/admin/users", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Usuario no eliminado"));
    }

    #[tokio::test]
    async fn report_endpoints_use_fixed_keys() {
        let app = app().await;
        let docs = [
            ("brands", json!({"_id": "B1", "name": "B1"})),
            ("clothing", json!({"_id": "c1", "name": "Jacket", "brand_id": "B1", "in_stock": 150})),
            ("clothing", json!({"_id": "c2", "name": "Tee", "brand_id": "B1"})),
            ("sales", json!({"clothing_id": "c1", "quantity": 3})),
            ("sales", json!({"clothing_id": "c1", "amount": 2})),
            ("sales", json!({"clothing_id": "c1", "quantity": 5})),
            ("sales", json!({"clothing_id": "ghost", "quantity": 100})),
        ];
        for (collection, doc) in docs {
            let (status, _) = send(&app, "POST", &format!("/api/v1/admin/{collection}"), Some(doc)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/api/v1/admin/reports/marcas", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"brand": "B1", "ventas": 10, "brand_id": "B1"}]));

        let (_, body) = send(&app, "GET", "/api/v1/admin/reports/top5", None).await;
        assert_eq!(body, json!([{"brand": "B1", "ventas": 10}]));

        let (_, body) = send(&app, "GET", "/api/v1/admin/reports/prendas", None).await;
        assert_eq!(
            body,
            json!([
                {"item_id": "c1", "name": "Jacket", "sold": 10, "in_stock": 150, "remaining": 140},
                {"item_id": "c2", "name": "Tee", "sold": 0, "in_stock": null, "remaining": null}
            ])
        );

        let (_, body) = send(&app, "GET", "/api/v1/admin/reports", None).await;
        assert_eq!(body["brands_with_sales"], json!([{"name": "B1", "sales_count": 10, "brand_id": "B1"}]));
        assert_eq!(body["top5_brands"], json!([{"name": "B1", "sales_count": 10}]));
        assert_eq!(body["items_sold"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reports_on_empty_store_are_empty_not_errors() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/admin/reports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"brands_with_sales": [], "items_sold": [], "top5_brands": []}));
    }
}
