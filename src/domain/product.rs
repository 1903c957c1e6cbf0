use serde::Serialize;

/// Catalog entry as seen by checkout. Price is in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub price: i64,
}
