//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Batched resolution of heterogeneous product references
//! - Lookups by canonical id or alternate code
//! - Inserts and stock adjustments (restocking)
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How resolve() Works                                  │
//! │                                                                         │
//! │  refs: [Canonical(65a1…), Alternate(101), Canonical(65a1…), Alt(X)]     │
//! │       │                                                                 │
//! │       ▼  dedupe + split                                                 │
//! │  ┌─────────────────────────┐    ┌─────────────────────────┐             │
//! │  │ WHERE id IN (?)         │    │ WHERE code IN (?, ?)    │  tokio::    │
//! │  │   65a1…                 │    │   101, X                │  join!      │
//! │  └────────────┬────────────┘    └────────────┬────────────┘             │
//! │               └───────────────┬──────────────┘                          │
//! │                               ▼                                         │
//! │  ProductLookup { 65a1… → P1, 101 → P2 }   (X unresolved, absent)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries use the runtime `sqlx::query_as` API with `FromRow`, so the crate
//! builds without a live database or offline query data.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tatylu_core::ids::{new_object_id, ProductLookup, ProductRef};
use tatylu_core::validation::{validate_discount_pct, validate_price_cents, validate_product_name};
use tatylu_core::{CoreError, Product};

/// Columns selected for every `Product` row, in `FromRow` order.
pub(crate) const PRODUCT_COLUMNS: &str =
    "id, code, name, price_cents, discount_pct, stock, category, created_at, updated_at";

/// `?, ?, ?` for `n` bind parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub code: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub discount_pct: f64,
    pub stock: i64,
    pub category: String,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let lookup = repo.resolve(&refs).await?;
/// let product = repo.get_by_code("101").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Resolves a batch of references into a lookup table.
    ///
    /// ## How It Works
    /// 1. Duplicates collapse to one lookup
    /// 2. Canonical ids and alternate codes go to two `IN (...)` queries
    /// 3. Both queries run concurrently
    /// 4. Unresolved references are absent from the result (not an error)
    pub async fn resolve(&self, refs: &[ProductRef]) -> DbResult<ProductLookup> {
        let mut seen = HashSet::new();
        let unique: Vec<&ProductRef> = refs.iter().filter(|r| seen.insert(*r)).collect();

        let ids: Vec<&str> = unique
            .iter()
            .filter(|r| r.is_canonical())
            .map(|r| r.key())
            .collect();
        let codes: Vec<&str> = unique
            .iter()
            .filter(|r| !r.is_canonical())
            .map(|r| r.key())
            .collect();

        debug!(ids = ids.len(), codes = codes.len(), "Resolving product references");

        let (by_id, by_code) = tokio::join!(
            self.fetch_where_in("id", &ids),
            self.fetch_where_in("code", &codes)
        );

        let mut products = by_id?;
        products.extend(by_code?);

        let lookup = ProductLookup::from_products(unique, products);
        debug!(resolved = lookup.len(), requested = seen.len(), "References resolved");
        Ok(lookup)
    }

    async fn fetch_where_in(&self, column: &str, values: &[&str]) -> DbResult<Vec<Product>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM products WHERE {} IN ({})",
            PRODUCT_COLUMNS,
            column,
            placeholders(values.len())
        );
        let mut query = sqlx::query_as::<_, Product>(&sql);
        for value in values {
            query = query.bind(*value);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Gets a product by either reference form.
    pub async fn get(&self, reference: &ProductRef) -> DbResult<Option<Product>> {
        match reference {
            ProductRef::Canonical(id) => self.get_by_id(id).await,
            ProductRef::Alternate(code) => self.get_by_code(code).await,
        }
    }

    /// Gets a product by its canonical ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its alternate code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE code = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists the whole catalog, by name.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products ORDER BY name, id", PRODUCT_COLUMNS);
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed catalog");
        Ok(products)
    }

    /// Inserts a new product with a fresh object id.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::Domain)` - Invalid name, price or discount
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_product_name(&new.name).map_err(CoreError::from)?;
        validate_price_cents(new.price_cents).map_err(CoreError::from)?;
        validate_discount_pct(new.discount_pct).map_err(CoreError::from)?;

        let now = Utc::now();
        let product = Product {
            id: new_object_id(),
            code: new.code.and_then(|c| ProductRef::parse(&c)).map(|r| r.key().to_string()),
            name: new.name.trim().to_string(),
            price_cents: new.price_cents,
            discount_pct: new.discount_pct,
            stock: new.stock,
            category: new.category,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, code = ?product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, price_cents, discount_pct, stock, category,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.discount_pct)
        .bind(product.stock)
        .bind(&product.category)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, product.code.clone().unwrap_or_default())
            }
            other => other,
        })?;

        Ok(product)
    }

    /// Adjusts stock by `delta` (positive to restock).
    ///
    /// ## Delta Update
    /// ```text
    /// UPDATE products SET stock = stock + ?delta WHERE id = ? AND stock + ?delta >= 0
    /// ```
    /// The guard keeps stock non-negative even against a concurrent checkout.
    ///
    /// ## Returns
    /// The new stock level.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<i64> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1 AND stock + ?2 >= 0
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match stock {
            Some(stock) => Ok(stock),
            None => match self.get_by_id(id).await? {
                Some(product) => Err(CoreError::InsufficientStock {
                    product: product.name,
                    available: product.stock,
                    requested: -delta,
                }
                .into()),
                None => Err(DbError::not_found("Product", id)),
            },
        }
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
    }

    fn new_product(code: Option<&str>, name: &str, price_cents: i64, stock: i64) -> NewProduct {
        NewProduct {
            code: code.map(str::to_string),
            name: name.to_string(),
            price_cents,
            discount_pct: 0.0,
            stock,
            category: "ropa".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = setup().await;
        let inserted = repo.insert(new_product(Some("0101"), "Camiseta", 1000, 5)).await.unwrap();

        assert_eq!(inserted.code.as_deref(), Some("101"));
        let by_id = repo.get_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(by_id, inserted);
        let by_code = repo.get_by_code("101").await.unwrap().unwrap();
        assert_eq!(by_code.id, inserted.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let repo = setup().await;
        repo.insert(new_product(Some("7"), "Gorra", 500, 1)).await.unwrap();
        let err = repo.insert(new_product(Some("7"), "Otra", 500, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let repo = setup().await;
        let err = repo.insert(new_product(None, "  ", 500, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let price = tatylu_core::MAX_PRICE_CENTS + 1;
        let err = repo.insert(new_product(None, "Yate", price, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_mixed_references() {
        let repo = setup().await;
        let a = repo.insert(new_product(Some("101"), "Camiseta", 1000, 5)).await.unwrap();
        let b = repo.insert(new_product(Some("CAM-XL"), "Camisa", 2000, 5)).await.unwrap();
        let _c = repo.insert(new_product(None, "Taza", 300, 5)).await.unwrap();

        let refs = vec![
            ProductRef::Canonical(a.id.clone()),
            ProductRef::Alternate("CAM-XL".into()),
            ProductRef::Alternate("101".into()),
            ProductRef::Canonical(a.id.clone()),
            ProductRef::Alternate("nope".into()),
            ProductRef::Canonical("ffffffffffffffffffffffff".into()),
        ];
        let lookup = repo.resolve(&refs).await.unwrap();

        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.get(&refs[0]).unwrap().id, a.id);
        assert_eq!(lookup.get(&refs[1]).unwrap().id, b.id);
        assert_eq!(lookup.get(&refs[2]).unwrap().id, a.id);
        assert!(!lookup.contains(&refs[4]));
        assert!(!lookup.contains(&refs[5]));
    }

    #[tokio::test]
    async fn test_resolve_empty() {
        let repo = setup().await;
        assert!(repo.resolve(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_stock_never_negative() {
        let repo = setup().await;
        let p = repo.insert(new_product(None, "Taza", 300, 2)).await.unwrap();

        assert_eq!(repo.adjust_stock(&p.id, 3).await.unwrap(), 5);
        assert_eq!(repo.adjust_stock(&p.id, -5).await.unwrap(), 0);

        let err = repo.adjust_stock(&p.id, -1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, requested: 1, .. })
        ));

        let err = repo.adjust_stock("ffffffffffffffffffffffff", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_all_sorted_by_name() {
        let repo = setup().await;
        repo.insert(new_product(None, "Zapato", 300, 1)).await.unwrap();
        repo.insert(new_product(None, "Abrigo", 300, 1)).await.unwrap();
        let names: Vec<_> = repo.list_all().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Abrigo", "Zapato"]);
    }
}
