//! Reports API Handlers
//! /api/v1/admin/reports エンドポイント
//!
//! 集計が失敗しても常に 200 で空の配列を返す（原因はログに出る）。

use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

use crate::reports::{BrandSales, CombinedReport, ItemStock, TopBrand};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", get(combined_report))
        .route("/reports/marcas", get(brand_sales))
        .route("/reports/prendas", get(items_sold))
        .route("/reports/top5", get(top_brands))
}

/// GET /reports - 3 つのビューをまとめて返す
pub async fn combined_report(State(state): State<Arc<AppState>>) -> Json<CombinedReport> {
    Json(state.reports.combined().await)
}

/// GET /reports/marcas - ブランド別売上
pub async fn brand_sales(State(state): State<Arc<AppState>>) -> Json<Vec<BrandSales>> {
    Json(state.reports.brand_sales().await)
}

/// GET /reports/prendas - 商品別 販売数/在庫
pub async fn items_sold(State(state): State<Arc<AppState>>) -> Json<Vec<ItemStock>> {
    Json(state.reports.items_sold().await)
}

/// GET /reports/top5 - 売上 Top5 ブランド
pub async fn top_brands(State(state): State<Arc<AppState>>) -> Json<Vec<TopBrand>> {
    Json(state.reports.top_brands().await)
}
