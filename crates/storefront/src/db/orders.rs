//! `PostgreSQL` order queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use loka_core::order::{NewOrder, Order, OrderItem};
use loka_core::{Email, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId};

use super::catalog::adjust_stock_on;
use super::{
    OrderStore, PgStore, RepositoryError, StockAdjustment, quantity_from_db, quantity_to_db,
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: OrderNumber,
    customer_email: Email,
    customer_name: String,
    total_amount: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            total_amount: row.total_amount,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: Money,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, customer_email, customer_name, total_amount, \
                             status, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit_price, quantity";

impl OrderStore for PgStore {
    async fn create_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.customer_order
                (order_number, customer_email, customer_name, total_amount, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&new.order_number)
        .bind(&new.customer.email)
        .bind(&new.customer.name)
        .bind(new.total_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order"))?
        .into();

        for item in &new.items {
            sqlx::query(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, product_name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(quantity_to_db(item.quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping the transaction before this point rolls back the order row.
        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE order_number = $1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn order_items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect()
    }

    async fn orders_for_customer(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM storefront.customer_order
            WHERE customer_email = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM storefront.customer_order
            WHERE ($1::storefront.order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn transition_status(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET status = $3, updated_at = now()
            WHERE order_number = $1 AND status = $2
            ",
        )
        .bind(number)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn transition_with_stock(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
        direction: i32,
    ) -> Result<Option<Vec<(OrderItem, StockAdjustment)>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_id: Option<OrderId> = sqlx::query_scalar(
            r"
            UPDATE storefront.customer_order
            SET status = $3, updated_at = now()
            WHERE order_number = $1 AND status = $2
            RETURNING id
            ",
        )
        .bind(number)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(order_id) = order_id else {
            return Ok(None);
        };

        let items: Vec<OrderItem> = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<_, _>>()?;

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let delta = direction * quantity_to_db(item.quantity)?;
            let outcome = adjust_stock_on(&mut *tx, item.product_id, delta).await?;
            outcomes.push((item, outcome));
        }

        tx.commit().await?;
        Ok(Some(outcomes))
    }
}
