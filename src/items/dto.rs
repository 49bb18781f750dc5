use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::repo::Category;

use super::repo::{Item, ItemWithOwner};

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub category_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub is_sold: bool,
}

/// `category` is the raw query-string value: absent or empty means all
/// categories.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub categories: Vec<Category>,
    pub items: Vec<Item>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: ItemWithOwner,
    pub related: Vec<Item>,
    pub is_owner: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<Item>,
    pub query: Option<String>,
    pub category: Option<Uuid>,
}
