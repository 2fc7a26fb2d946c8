//! Product Model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Responsive image URL set for a product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub thumbnail: String,
    pub mobile: String,
    pub tablet: String,
    pub desktop: String,
}

/// Catalog product. Read-only from the ordering path; prices are captured
/// per item at realization time, never at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub image: Image,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_json_shape() {
        let product = Product {
            id: "550e8400-e29b-41d4-a716-446655440000".parse().unwrap(),
            name: "Chicken Waffle".to_string(),
            price: 12.5,
            category: "Waffle".to_string(),
            image: Image::default(),
        };

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(json["name"], "Chicken Waffle");
        assert_eq!(json["price"], 12.5);
        assert_eq!(json["image"]["thumbnail"], "");
    }
}
