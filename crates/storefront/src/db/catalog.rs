//! `PostgreSQL` catalog queries.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgExecutor, QueryBuilder};

use loka_core::catalog::{Category, NewCategory, NewProduct, Product};
use loka_core::{CategoryId, Money, ProductId, Slug};

use super::{CatalogStore, PgStore, ProductFilter, RepositoryError, StockAdjustment};

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: Slug::from_stored(row.slug),
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    slug: String,
    description: String,
    price: Money,
    stock: i32,
    image: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            slug: Slug::from_stored(row.slug),
            description: row.description,
            price: row.price,
            stock: row.stock,
            image: row.image,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, category_id, name, slug, description, price, stock, image, is_active, created_at";

/// Pick a slug not yet used in `table`, suffixing `-1`, `-2`, ... as needed.
async fn unique_slug<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
    name: &str,
) -> Result<Slug, RepositoryError> {
    let base = Slug::from_name(name);
    let taken: HashSet<String> = sqlx::query_scalar(&format!(
        "SELECT slug FROM storefront.{table} WHERE slug = $1 OR slug LIKE $1 || '-%'"
    ))
    .bind(base.as_str())
    .fetch_all(executor)
    .await?
    .into_iter()
    .collect();

    Ok(Slug::unique(&base, |candidate| taken.contains(candidate)))
}

impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, description FROM storefront.category ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn create_category(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let slug = unique_slug(&self.pool, "category", &new.name).await?;
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO storefront.category (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description
            ",
        )
        .bind(new.name.trim())
        .bind(slug.as_str())
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "category"))?;
        Ok(row.into())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE TRUE"
        ));
        if filter.active_only {
            query.push(" AND is_active");
        }
        if filter.with_image_only {
            query.push(" AND image IS NOT NULL AND image <> ''");
        }
        if let Some(category) = filter.category {
            query.push(" AND category_id = ").push_bind(category);
        }
        if let Some(exclude) = filter.exclude {
            query.push(" AND id <> ").push_bind(exclude);
        }
        query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let slug = unique_slug(&self.pool, "product", &new.name).await?;
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO storefront.product
                (category_id, name, slug, description, price, stock, image, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(new.category_id)
        .bind(new.name.trim())
        .bind(slug.as_str())
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(new.image.as_deref())
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "product"))?;
        Ok(row.into())
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE storefront.product SET stock = $2 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stock_levels(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, i32>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<(ProductId, i32)> =
            sqlx::query_as("SELECT id, stock FROM storefront.product WHERE id = ANY($1)")
                .bind(&raw)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<StockAdjustment, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock_on(&mut conn, id, delta).await
    }
}

/// Conditional stock change on an open connection or transaction.
pub(super) async fn adjust_stock_on(
    conn: &mut PgConnection,
    id: ProductId,
    delta: i32,
) -> Result<StockAdjustment, RepositoryError> {
    let remaining: Option<i32> = sqlx::query_scalar(
        r"
        UPDATE storefront.product
        SET stock = stock + $2
        WHERE id = $1 AND stock + $2 >= 0
        RETURNING stock
        ",
    )
    .bind(id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return Ok(StockAdjustment::Applied { remaining });
    }

    let available: Option<i32> =
        sqlx::query_scalar("SELECT stock FROM storefront.product WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(available.map_or(StockAdjustment::Missing, |available| {
        StockAdjustment::Insufficient { available }
    }))
}
