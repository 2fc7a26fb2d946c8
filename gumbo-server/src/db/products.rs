//! Catalog queries

use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{Image, Product};

use crate::error::ServiceResult;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    category: String,
    price: f64,
    thumbnail_url: Option<String>,
    mobile_url: Option<String>,
    tablet_url: Option<String>,
    desktop_url: Option<String>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            price: self.price,
            category: self.category,
            image: Image {
                thumbnail: self.thumbnail_url.unwrap_or_default(),
                mobile: self.mobile_url.unwrap_or_default(),
                tablet: self.tablet_url.unwrap_or_default(),
                desktop: self.desktop_url.unwrap_or_default(),
            },
        }
    }
}

/// All catalog products.
pub async fn list(pool: &PgPool) -> ServiceResult<Vec<Product>> {
    let rows: Vec<ProductRow> = sqlx::query_as(
        r#"
        SELECT id, name, category, price, thumbnail_url, mobile_url, tablet_url, desktop_url
        FROM products
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProductRow::into_product).collect())
}

/// Single product by id.
pub async fn find(pool: &PgPool, id: Uuid) -> ServiceResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(
        r#"
        SELECT id, name, category, price, thumbnail_url, mobile_url, tablet_url, desktop_url
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ProductRow::into_product))
}

/// Products for a set of ids, in no particular order. Missing ids are
/// simply absent from the result.
pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> ServiceResult<Vec<Product>> {
    let rows: Vec<ProductRow> = sqlx::query_as(
        r#"
        SELECT id, name, category, price, thumbnail_url, mobile_url, tablet_url, desktop_url
        FROM products
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProductRow::into_product).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_into_product_fills_missing_urls() {
        let row = ProductRow {
            id: Uuid::new_v4(),
            name: "Chicken Waffle".into(),
            category: "Waffle".into(),
            price: 12.5,
            thumbnail_url: Some("https://cdn/thumb.jpg".into()),
            mobile_url: None,
            tablet_url: None,
            desktop_url: None,
        };
        let product = row.into_product();
        assert_eq!(product.image.thumbnail, "https://cdn/thumb.jpg");
        assert_eq!(product.image.mobile, "");
    }
}
