//! Data Models
//! Brand, Clothing, User, Sale などのデータ構造定義

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ========================================
// Collection
// ========================================

/// ドキュメントコレクション（1 コレクション = 1 テーブル）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Brands,
    Clothing,
    Users,
    Sales,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Brands,
        Collection::Clothing,
        Collection::Users,
        Collection::Sales,
    ];

    /// テーブル名 兼 URL パス
    pub fn table(self) -> &'static str {
        match self {
            Collection::Brands => "brands",
            Collection::Clothing => "clothing",
            Collection::Users => "users",
            Collection::Sales => "sales",
        }
    }

    /// 管理画面向けのメッセージ
    pub fn labels(self) -> &'static Labels {
        match self {
            Collection::Brands => &BRAND_LABELS,
            Collection::Clothing => &CLOTHING_LABELS,
            Collection::Users => &USER_LABELS,
            Collection::Sales => &SALE_LABELS,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// CRUD レスポンスのメッセージ
#[derive(Debug)]
pub struct Labels {
    pub not_found: &'static str,
    pub created: &'static str,
    pub create_failed: &'static str,
    pub updated: &'static str,
    pub not_updated: &'static str,
    pub deleted: &'static str,
    pub not_deleted: &'static str,
}

static BRAND_LABELS: Labels = Labels {
    not_found: "Marca no encontrada",
    created: "Marca creada",
    create_failed: "Error al crear la marca",
    updated: "Marca actualizada",
    not_updated: "Marca no actualizada",
    deleted: "Marca eliminada",
    not_deleted: "Marca no eliminada",
};

static CLOTHING_LABELS: Labels = Labels {
    not_found: "Prenda no encontrada",
    created: "Prenda creada",
    create_failed: "Error al crear prenda",
    updated: "Prenda actualizada",
    not_updated: "Prenda no actualizada",
    deleted: "Prenda eliminada",
    not_deleted: "Prenda no eliminada",
};

static USER_LABELS: Labels = Labels {
    not_found: "Usuario no encontrado",
    created: "Usuario creado",
    create_failed: "Error al crear usuario",
    updated: "Usuario actualizado",
    not_updated: "Usuario no actualizado",
    deleted: "Usuario eliminado",
    not_deleted: "Usuario no eliminado",
};

static SALE_LABELS: Labels = Labels {
    not_found: "Venta no encontrada",
    created: "Venta creada",
    create_failed: "Error al crear venta",
    updated: "Venta actualizada",
    not_updated: "Venta no actualizada",
    deleted: "Venta eliminada",
    not_deleted: "Venta no eliminada",
};

// ========================================
// DocId
// ========================================

/// ドキュメント識別子 / 参照フィールドの値
///
/// 保存形式がバラバラ（文字列、数値、`{"$oid": "..."}`）なので、
/// 取り込み時に必ず文字列へ正規化してから比較する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// JSON 値から識別子を取り出す。解決不能な形なら None
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Object(map) => match map.get("$oid") {
                Some(Value::String(oid)) => Some(Self(oid.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ========================================
// Brand
// ========================================

/// Brand ドキュメント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    pub country: Option<String>,
    pub founded: Option<i32>,
}

// ========================================
// Clothing
// ========================================

/// Clothing ドキュメント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clothing {
    pub name: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub size: Vec<String>,
    pub color: Option<String>,
    pub brand_id: DocId,
    pub in_stock: Option<i64>,
}

// ========================================
// User
// ========================================

/// User ドキュメント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub password: String, // ハッシュ済み（中身は扱わない）
    pub address: Option<Address>,
    #[serde(default)]
    pub orders: Vec<DocId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub country: String,
}

// ========================================
// Sale
// ========================================

/// Sale ドキュメント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub user_id: DocId,
    pub clothing_id: DocId,
    pub quantity: i64,
    pub date: chrono::DateTime<chrono::Utc>,
}
