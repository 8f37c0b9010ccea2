//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Catalog CRUD (owner, seed tool)
//! - Atomic stock reservation at checkout
//!
//! ## Stock Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One statement, so it holds across processes sharing the file:         │
//! │                                                                         │
//! │  UPDATE products                                                        │
//! │     SET stock_grams = stock_grams - :qty                                │
//! │   WHERE id = :id AND stock_grams >= :qty                                │
//! │  RETURNING ...                                                          │
//! │                                                                         │
//! │  row returned  ──► Reserved (before = after + qty)                      │
//! │  no row        ──► product exists? Insufficient { available } : NotFound│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::ports::{StockChange, StockUpdate};
use grocer_core::validation::{
    validate_price, validate_product, validate_quantity, validate_search_query,
};
use grocer_core::{Category, Money, Product, Quantity, ValidationError};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: Category,
    price_cents: i64,
    stock_grams: i64,
    threshold_grams: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category: row.category,
            price_per_kg: Money::from_cents(row.price_cents),
            stock: Quantity::from_grams(row.stock_grams),
            threshold: Quantity::from_grams(row.threshold_grams),
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let carrots = repo.search("carrot", 20).await?;
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

    /// Searches products by name (case-insensitive substring).
    ///
    /// An empty query lists the catalog.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", query.to_lowercase());
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, price_cents, stock_grams, threshold_grams
            FROM products
            WHERE lower(name) LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Search returned products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Lists every product, sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, price_cents, stock_grams, threshold_grams
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn list_by_category(&self, category: Category) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, price_cents, stock_grams, threshold_grams
            FROM products
            WHERE category = ?1
            ORDER BY name
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Products at or below their threshold (currently selling at double price).
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, price_cents, stock_grams, threshold_grams
            FROM products
            WHERE stock_grams <= threshold_grams
            ORDER BY stock_grams, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, price_cents, stock_grams, threshold_grams
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::Invalid)` - Name, price or stock rejected
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product(product)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, stock_grams, threshold_grams,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(product.name.trim())
        .bind(product.category)
        .bind(product.price_per_kg.cents())
        .bind(product.stock.grams())
        .bind(product.threshold.grams())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Updates name, category, price and threshold. Stock only moves
    /// through [`restock`](Self::restock), [`reserve`](Self::reserve)
    /// and [`release`](Self::release).
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                category = ?3,
                price_cents = ?4,
                threshold_grams = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(product.name.trim())
        .bind(product.category)
        .bind(product.price_per_kg.cents())
        .bind(product.threshold.grams())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Changes the base price per kilogram.
    pub async fn set_price(&self, id: &str, price: Money) -> DbResult<()> {
        validate_price(price)?;

        let result = sqlx::query(
            "UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, price = %price, "Price updated");
        Ok(())
    }

    /// Adds stock from a delivery to the shop.
    pub async fn restock(&self, id: &str, quantity: Quantity) -> DbResult<Product> {
        validate_quantity(quantity)?;

        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            UPDATE products SET
                stock_grams = stock_grams + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING id, name, category, price_cents, stock_grams, threshold_grams
            "#,
        )
        .bind(id)
        .bind(quantity.grams())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        let product = row
            .map(Product::from)
            .ok_or_else(|| DbError::not_found("Product", id))?;

        debug!(id = %id, stock = %product.stock, "Product restocked");
        Ok(product)
    }

    /// Takes `quantity` off the shelf iff that much is there.
    pub async fn reserve(&self, id: &str, quantity: Quantity) -> DbResult<StockUpdate> {
        require_positive(quantity)?;

        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            UPDATE products SET
                stock_grams = stock_grams - ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_grams >= ?2
            RETURNING id, name, category, price_cents, stock_grams, threshold_grams
            "#,
        )
        .bind(id)
        .bind(quantity.grams())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let product = Product::from(row);
            let before = product.stock + quantity;
            return Ok(StockUpdate::Reserved(StockChange { product, before }));
        }

        let current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        debug!(id = %id, available = %current.stock, requested = %quantity, "Reservation refused");
        Ok(StockUpdate::Insufficient {
            available: current.stock,
        })
    }

    /// Puts reserved stock back.
    pub async fn release(&self, id: &str, quantity: Quantity) -> DbResult<()> {
        require_positive(quantity)?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock_grams = stock_grams + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity.grams())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

/// A zero or negative movement would turn the stock guard around.
fn require_positive(quantity: Quantity) -> DbResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
