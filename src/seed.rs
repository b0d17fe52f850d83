//! Demo data
//! 起動時に最小限のサンプルデータを投入する（SEED_DEMO_DATA=true または --seed）

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use crate::db::{DocumentStore, StoreError};
use crate::models::{Address, Brand, Clothing, Collection, DocId, Sale, User};

/// サンプルデータを投入する。何度実行しても同じ状態になる
pub async fn seed_demo_data(store: &DocumentStore) -> Result<()> {
    info!("🌱 Seeding demo data");

    // ブランド
    let brands = [
        ("brand010", Brand { name: "UrbanStyle".into(), country: Some("USA".into()), founded: Some(2018) }),
        ("brand011", Brand { name: "CostaRicaWear".into(), country: Some("Costa Rica".into()), founded: Some(2022) }),
    ];
    for (id, brand) in brands {
        store.upsert(Collection::Brands, id, serde_json::to_value(brand)?).await?;
    }

    if store.delete(Collection::Brands, "brand003").await? == 0 {
        info!("brand003 not found, nothing to delete");
    }

    // 衣料品
    let jacket = Clothing {
        name: "Urban Jacket".into(),
        category: Some("Outerwear".into()),
        price: Some(89.95),
        size: ["S", "M", "L", "XL"].map(String::from).to_vec(),
        color: Some("Black".into()),
        brand_id: DocId::new("brand010"),
        in_stock: Some(150),
    };
    store.upsert(Collection::Clothing, "cloth010", serde_json::to_value(jacket)?).await?;

    // ユーザー
    let user = User {
        name: "Carlos Jiménez".into(),
        email: "carlos.jimenez@example.com".into(),
        password: "hashedcarlos123".into(),
        address: Some(Address { city: "San José".into(), country: "Costa Rica".into() }),
        orders: Vec::new(),
    };
    store.upsert(Collection::Users, "user010", serde_json::to_value(user)?).await?;

    // 販売
    let sale = Sale {
        user_id: DocId::new("user010"),
        clothing_id: DocId::new("cloth010"),
        quantity: 3,
        date: chrono::Utc::now(),
    };
    let mut body = serde_json::to_value(&sale)?;
    body["_id"] = json!("sale010");

    match store.insert(Collection::Sales, body).await {
        Ok(_) => info!("Sale sale010 recorded"),
        Err(StoreError::Duplicate { .. }) => warn!("Sale sale010 already exists"),
        Err(e) => return Err(e.into()),
    }

    // 在庫は毎回 150 に戻してから引くので、再実行しても 147 のまま
    store
        .increment(Collection::Clothing, "cloth010", "in_stock", -sale.quantity)
        .await?;
    info!("cloth010 stock reduced by {}", sale.quantity);

    info!("Demo data ready");
    Ok(())
}
