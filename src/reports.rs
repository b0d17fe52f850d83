//! Reports
//! sales × clothing × brands のクロス集計
//!
//! 3 つのビュー（ブランド別売上、商品別 販売数/在庫、Top5 ブランド）と、
//! それらをまとめた複合レポートを毎回ゼロから計算する。キャッシュはしない。
//!
//! 集計はメモリ上で行う:
//! 1. 取り込み時に数量 (`quantity`/`amount`) と在庫 (`in_stock`/`stock`) を正規化
//! 2. 参照は全て [`DocId`] に正規化してから突き合わせる
//! 3. lookup 側のインデックスを作ってから group → sort

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::db::{Document, DocumentSource, StoreError};
use crate::models::{Collection, DocId};

/// Top-N ランキングの件数
pub const TOP_BRANDS_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to scan {collection}: {source}")]
    Scan {
        collection: Collection,
        #[source]
        source: StoreError,
    },
}

// ========================================
// Report Records
// ========================================

/// GET /reports/marcas の 1 行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandSales {
    pub brand: Option<Value>,
    pub ventas: i64,
    pub brand_id: String,
}

/// GET /reports/prendas の 1 行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStock {
    pub item_id: String,
    pub name: Option<Value>,
    pub sold: i64,
    pub in_stock: Option<Value>,
    pub remaining: Option<i64>,
}

/// GET /reports/top5 の 1 行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopBrand {
    pub brand: Option<Value>,
    pub ventas: i64,
}

/// 複合レポート内のブランド行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandWithSales {
    pub name: Option<Value>,
    pub sales_count: i64,
    pub brand_id: String,
}

/// 複合レポート内の Top5 行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBrand {
    pub name: Option<Value>,
    pub sales_count: i64,
}

/// GET /reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedReport {
    pub brands_with_sales: Vec<BrandWithSales>,
    pub items_sold: Vec<ItemStock>,
    pub top5_brands: Vec<RankedBrand>,
}

impl From<BrandSales> for BrandWithSales {
    fn from(row: BrandSales) -> Self {
        Self {
            name: row.brand,
            sales_count: row.ventas,
            brand_id: row.brand_id,
        }
    }
}

impl From<TopBrand> for RankedBrand {
    fn from(row: TopBrand) -> Self {
        Self {
            name: row.brand,
            sales_count: row.ventas,
        }
    }
}

// ========================================
// Ingestion
// ========================================

/// 販売数量。整数はそのまま、小数のときだけ f64
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Whole(i64),
    Fractional(f64),
}

/// 数量の合計。整数部分は i64 で正確に足し、小数が混ざったときだけ最後に切り捨てる
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    whole: i64,
    fractional: f64,
}

impl Tally {
    fn add(&mut self, quantity: Quantity) {
        match quantity {
            Quantity::Whole(n) => self.whole = self.whole.saturating_add(n),
            Quantity::Fractional(f) => self.fractional += f,
        }
    }

    /// f64 → i64 の `as` は範囲外で飽和する
    fn total(&self) -> i64 {
        if self.fractional == 0.0 {
            self.whole
        } else {
            (self.whole as f64 + self.fractional).trunc() as i64
        }
    }
}

/// 正規化済みの Sale
#[derive(Debug, Clone, PartialEq)]
pub struct SaleFact {
    pub clothing_id: Option<DocId>,
    pub quantity: Quantity,
}

impl SaleFact {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            clothing_id: doc.get("clothing_id").and_then(DocId::from_value),
            quantity: normalized_quantity(doc),
        }
    }
}

/// 正規化済みの Clothing
#[derive(Debug, Clone, PartialEq)]
pub struct ClothingFact {
    pub id: Option<DocId>,
    pub name: Option<Value>,
    pub brand_id: Option<DocId>,
    pub stock: Option<Value>,
}

impl ClothingFact {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.get("_id").and_then(DocId::from_value),
            name: doc.get("name").filter(|name| !name.is_null()).cloned(),
            brand_id: doc.get("brand_id").and_then(DocId::from_value),
            stock: first_present(doc, &["in_stock", "stock"]).cloned(),
        }
    }
}

/// 正規化済みの Brand
#[derive(Debug, Clone, PartialEq)]
pub struct BrandFact {
    pub id: Option<DocId>,
    pub name: Option<Value>,
}

impl BrandFact {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.get("_id").and_then(DocId::from_value),
            name: doc.get("name").filter(|name| !name.is_null()).cloned(),
        }
    }
}

/// null / 欠損でない最初のフィールド
fn first_present<'a>(doc: &'a Document, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| doc.get(*key))
        .find(|value| !value.is_null())
}

/// `quantity` → `amount` → 0。選ばれた値が数値でなければ 0
fn normalized_quantity(doc: &Document) -> Quantity {
    match first_present(doc, &["quantity", "amount"]) {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(whole) => Quantity::Whole(whole),
            None => Quantity::Fractional(n.as_f64().unwrap_or(0.0)),
        },
        _ => Quantity::Whole(0),
    }
}

/// 在庫値を整数に変換できるか（数値は切り捨て、文字列は整数として解釈）
fn stock_as_int(stock: &Value) -> Option<i64> {
    match stock {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ========================================
// Pipelines
// ========================================

/// ブランド別売上（売上 0 のブランドは含まない）
pub fn brand_sales_summary(sales: &[SaleFact], clothing: &[ClothingFact], brands: &[BrandFact]) -> Vec<BrandSales> {
    let clothing_by_id: HashMap<&DocId, &ClothingFact> = clothing
        .iter()
        .filter_map(|item| item.id.as_ref().map(|id| (id, item)))
        .collect();
    let brands_by_id: HashMap<&DocId, &BrandFact> = brands
        .iter()
        .filter_map(|brand| brand.id.as_ref().map(|id| (id, brand)))
        .collect();

    // sale → clothing → brand_id で集計
    let mut totals: HashMap<&DocId, Tally> = HashMap::new();
    for sale in sales {
        let Some(item) = sale.clothing_id.as_ref().and_then(|id| clothing_by_id.get(id)) else {
            continue;
        };
        let Some(brand_id) = item.brand_id.as_ref() else {
            continue;
        };
        totals.entry(brand_id).or_default().add(sale.quantity);
    }

    let mut rows: Vec<BrandSales> = totals
        .into_iter()
        .filter_map(|(brand_id, total)| {
            let brand = brands_by_id.get(brand_id)?;
            Some(BrandSales {
                brand: brand.name.clone(),
                ventas: total.total(),
                brand_id: brand_id.to_string(),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.ventas.cmp(&a.ventas).then_with(|| a.brand_id.cmp(&b.brand_id)));
    rows
}

/// 商品ごとの販売数と在庫（売れていない商品も含む）
pub fn items_sold_vs_stock(clothing: &[ClothingFact], sales: &[SaleFact]) -> Vec<ItemStock> {
    let mut sold_by_item: HashMap<&DocId, Tally> = HashMap::new();
    for sale in sales {
        if let Some(clothing_id) = sale.clothing_id.as_ref() {
            sold_by_item.entry(clothing_id).or_default().add(sale.quantity);
        }
    }

    let mut rows: Vec<ItemStock> = clothing
        .iter()
        .map(|item| {
            let sold = item
                .id
                .as_ref()
                .and_then(|id| sold_by_item.get(id))
                .map_or(0, Tally::total);

            let remaining = match item.stock.as_ref() {
                Some(stock) => {
                    let remaining = stock_as_int(stock).and_then(|s| s.checked_sub(sold));
                    if remaining.is_none() {
                        debug!("Stock for item {:?} not usable as an integer: {}", item.id, stock);
                    }
                    remaining
                }
                None => None,
            };

            ItemStock {
                item_id: item.id.as_ref().map(DocId::to_string).unwrap_or_default(),
                name: item.name.clone(),
                sold,
                in_stock: item.stock.clone(),
                remaining,
            }
        })
        .collect();

    rows.sort_by(compare_items);
    rows
}

/// sold 降順 → name 昇順 → item_id 昇順
fn compare_items(a: &ItemStock, b: &ItemStock) -> Ordering {
    b.sold
        .cmp(&a.sold)
        .then_with(|| compare_names(a.name.as_ref(), b.name.as_ref()))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// 名前なし → 数値 → 文字列 → その他 の順。同種内は値で比較
fn compare_names(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(name: Option<&Value>) -> u8 {
        match name {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(x), Some(y)) if rank(a) == 3 && rank(b) == 3 => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// ブランド別売上の先頭 N 件（brand_id なし）
pub fn top_brands(summary: &[BrandSales], limit: usize) -> Vec<TopBrand> {
    summary
        .iter()
        .take(limit)
        .map(|row| TopBrand {
            brand: row.brand.clone(),
            ventas: row.ventas,
        })
        .collect()
}

// ========================================
// Service
// ========================================

/// コレクションを読み込んで集計するサービス
///
/// 公開メソッドは失敗しても空の結果を返す（ログには残す）。
/// `try_*` はエラーをそのまま返す。
#[derive(Debug, Clone)]
pub struct ReportService<S> {
    source: S,
}

impl<S: DocumentSource> ReportService<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn brand_sales(&self) -> Vec<BrandSales> {
        contain("brand_sales", self.try_brand_sales().await)
    }

    pub async fn items_sold(&self) -> Vec<ItemStock> {
        contain("items_sold", self.try_items_sold().await)
    }

    pub async fn top_brands(&self) -> Vec<TopBrand> {
        contain("top_brands", self.try_top_brands().await)
    }

    /// 3 つのレポートを個別に計算する。1 つ失敗しても他は影響を受けない
    pub async fn combined(&self) -> CombinedReport {
        CombinedReport {
            brands_with_sales: self.brand_sales().await.into_iter().map(Into::into).collect(),
            items_sold: self.items_sold().await,
            top5_brands: self.top_brands().await.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn try_brand_sales(&self) -> Result<Vec<BrandSales>, ReportError> {
        let sales = self.sale_facts().await?;
        let clothing = self.clothing_facts().await?;
        let brands = self.brand_facts().await?;

        Ok(brand_sales_summary(&sales, &clothing, &brands))
    }

    pub async fn try_items_sold(&self) -> Result<Vec<ItemStock>, ReportError> {
        let clothing = self.clothing_facts().await?;
        let sales = self.sale_facts().await?;

        Ok(items_sold_vs_stock(&clothing, &sales))
    }

    pub async fn try_top_brands(&self) -> Result<Vec<TopBrand>, ReportError> {
        let summary = self.try_brand_sales().await?;

        Ok(top_brands(&summary, TOP_BRANDS_LIMIT))
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Document>, ReportError> {
        self.source
            .scan(collection)
            .await
            .map_err(|source| ReportError::Scan { collection, source })
    }

    async fn sale_facts(&self) -> Result<Vec<SaleFact>, ReportError> {
        let docs = self.scan(Collection::Sales).await?;
        Ok(docs.iter().map(SaleFact::from_document).collect())
    }

    async fn clothing_facts(&self) -> Result<Vec<ClothingFact>, ReportError> {
        let docs = self.scan(Collection::Clothing).await?;
        Ok(docs.iter().map(ClothingFact::from_document).collect())
    }

    async fn brand_facts(&self) -> Result<Vec<BrandFact>, ReportError> {
        let docs = self.scan(Collection::Brands).await?;
        Ok(docs.iter().map(BrandFact::from_document).collect())
    }
}

fn contain<T>(report: &str, result: Result<Vec<T>, ReportError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        error!("Report {} failed, returning empty result: {}", report, e);
        Vec::new()
    })
}
