//! Database Module
//! SQLite を使用した brands/clothing/users/sales ドキュメントの管理
//!
//! 各コレクションは 1 テーブル。行ごとにスキーマレスな JSON ドキュメントを保持する。
//! `_id` は保存時に本文から外し、読み出し時に文字列として戻す。

use std::future::Future;

use anyhow::Result;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Collection, DocId};

/// データベース接続プール
pub type DbPool = Pool<Sqlite>;

/// JSON ドキュメント（トップレベルは必ずオブジェクト）
pub type Document = Map<String, Value>;

// ========================================
// Errors
// ========================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document body must be a JSON object")]
    NotAnObject,

    #[error("unsupported _id value: {0}")]
    InvalidId(Value),

    #[error("duplicate _id in {collection}: {id}")]
    Duplicate { collection: Collection, id: DocId },
}

// ========================================
// Init
// ========================================

/// データベースを初期化
pub async fn init_db(db_path: &str) -> Result<DbPool> {
    // SQLite接続文字列
    let db_url = format!("sqlite:{}?mode=rwc", db_path);

    info!("Initializing database: {}", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // スキーマ作成
    create_schema(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// テスト用インメモリ DB（接続ごとに別 DB になるので 1 接続固定）
#[cfg(test)]
pub async fn init_memory_db() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// スキーマ作成
async fn create_schema(pool: &DbPool) -> Result<()> {
    for collection in Collection::ALL {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )
            "#,
            collection.table()
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}

// ========================================
// Document Store
// ========================================

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    doc: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, StoreError> {
        let mut fields: Document = serde_json::from_str(&self.doc)?;
        fields.insert("_id".to_string(), Value::String(self.id));
        Ok(fields)
    }
}

/// 読み取り専用の全件スキャン（レポート集計が使う）
pub trait DocumentSource {
    fn scan(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

/// コレクション単位の CRUD
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: DbPool,
}

impl DocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// 全件取得（挿入順）
    pub async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let sql = format!("SELECT id, doc FROM {} ORDER BY rowid", collection.table());
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    /// ID 指定で 1 件取得
    pub async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT id, doc FROM {} WHERE id = ?", collection.table());
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    /// 作成。本文に `_id` があればそれを使い、なければ生成する
    pub async fn insert(&self, collection: Collection, body: Value) -> Result<DocId, StoreError> {
        let mut fields = into_fields(body)?;
        let id = match fields.remove("_id") {
            Some(value) => DocId::from_value(&value).ok_or(StoreError::InvalidId(value))?,
            None => DocId::new(Uuid::new_v4().simple().to_string()),
        };
        let now_ms = chrono::Utc::now().timestamp_millis();

        let sql = format!(
            "INSERT INTO {} (id, doc, created_at_ms, updated_at_ms) VALUES (?, ?, ?, ?)",
            collection.table()
        );
        sqlx::query(&sql)
            .bind(id.as_str())
            .bind(serde_json::to_string(&fields)?)
            .bind(now_ms)
            .bind(now_ms)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    StoreError::Duplicate { collection, id: id.clone() }
                }
                other => StoreError::Database(other),
            })?;

        debug!("Inserted {} document: id={}", collection, id);
        Ok(id)
    }

    /// トップレベルのキーを上書き（`$set` 相当）。変更件数を返す
    ///
    /// 本文の `_id` は無視する。結果が元と同じなら 0。
    pub async fn update(&self, collection: Collection, id: &str, body: Value) -> Result<u64, StoreError> {
        let mut changes = into_fields(body)?;
        changes.remove("_id");

        let Some(mut fields) = self.fetch_fields(collection, id).await? else {
            return Ok(0);
        };
        let before = fields.clone();
        fields.extend(changes);
        if fields == before {
            return Ok(0);
        }

        self.write_fields(collection, id, &fields).await
    }

    /// 削除件数を返す
    pub async fn delete(&self, collection: Collection, id: &str) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    /// 既存ならマージ、なければ作成
    pub async fn upsert(&self, collection: Collection, id: &str, body: Value) -> Result<(), StoreError> {
        let mut changes = into_fields(body)?;
        changes.remove("_id");

        let mut fields = self.fetch_fields(collection, id).await?.unwrap_or_default();
        fields.extend(changes);
        let now_ms = chrono::Utc::now().timestamp_millis();

        let sql = format!(
            r#"
            INSERT INTO {} (id, doc, created_at_ms, updated_at_ms) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                doc = excluded.doc,
                updated_at_ms = excluded.updated_at_ms
            "#,
            collection.table()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(serde_json::to_string(&fields)?)
            .bind(now_ms)
            .bind(now_ms)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// 数値フィールドを加算（`$inc` 相当）。フィールドが無ければ delta で作成
    pub async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<u64, StoreError> {
        let Some(mut fields) = self.fetch_fields(collection, id).await? else {
            return Ok(0);
        };

        let next = match fields.get(field) {
            None | Some(Value::Null) => Value::from(delta),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => match i.checked_add(delta) {
                    Some(sum) => Value::from(sum),
                    None => return Ok(0),
                },
                None => Value::from(n.as_f64().unwrap_or_default() + delta as f64),
            },
            Some(_) => return Ok(0),
        };
        fields.insert(field.to_string(), next);

        self.write_fields(collection, id, &fields).await
    }

    /// DB 疎通確認
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn fetch_fields(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE id = ?", collection.table());
        let doc: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match doc {
            Some((doc,)) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn write_fields(&self, collection: Collection, id: &str, fields: &Document) -> Result<u64, StoreError> {
        let sql = format!(
            "UPDATE {} SET doc = ?, updated_at_ms = ? WHERE id = ?",
            collection.table()
        );
        let result = sqlx::query(&sql)
            .bind(serde_json::to_string(fields)?)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl DocumentSource for DocumentStore {
    fn scan(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send {
        self.list(collection)
    }
}

fn into_fields(body: Value) -> Result<Document, StoreError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::NotAnObject),
    }
}
