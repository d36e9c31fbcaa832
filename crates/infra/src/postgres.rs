//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed / network / other | N/A | `Unavailable` |
//!
//! ## Order placement
//!
//! `begin()` opens one SQL transaction. Products are read with
//! `FOR SHARE`, so a concurrent price update waits until the order is
//! committed or rolled back. Dropping the transaction rolls it back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use async_trait::async_trait;

use storefront_auth::User;
use storefront_catalog::{Product, ProductSnapshot};
use storefront_core::{DomainError, Entity, Money, OrderId, ProductId, StoreError, UserId};
use storefront_orders::{Order, OrderItem, OrderStatus, OrderUnitOfWork};

use crate::repository::{OrderRepository, OrderTransaction, ProductRepository, UserRepository};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool of at most `max_connections`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id()), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, date_joined)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.date_joined())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, date_joined
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_username", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, date_joined
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[instrument(skip(self), fields(product_count), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, category
            FROM products
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Span::current().record("product_count", rows.len());
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, category
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(product.description())
        .bind(product.price().amount())
        .bind(product.category())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    async fn update_product(&self, product: &Product) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, category = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(product.description())
        .bind(product.price().amount())
        .bind(product.category())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[instrument(skip(self), fields(owner = %owner, order_count), err)]
    async fn list_orders_for(&self, owner: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id, o.user_id, o.total, o.status, o.created_at,
                i.product_id, i.product_name, i.product_description,
                i.product_price, i.product_category, i.quantity
            FROM orders o
            JOIN order_items i ON i.order_id = o.id
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC, i.position ASC
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_for", e))?;

        let orders = orders_from_rows(&rows)?;
        Span::current().record("order_count", orders.len());
        Ok(orders)
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresOrderTransaction { tx }))
    }
}

struct PostgresOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderUnitOfWork for PostgresOrderTransaction {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_for_pricing(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, category
            FROM products
            WHERE id = $1
            FOR SHARE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("product_for_pricing", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id()), err)]
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.owner().as_uuid())
        .bind(order.total().amount())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, item) in order.items().iter().enumerate() {
            let product = item.product();
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, product_id, product_name, product_description,
                    product_price, product_category, quantity
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.amount())
            .bind(&product.category)
            .bind(item.quantity() as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderTransaction for PostgresOrderTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let username: String = row.try_get("username").map_err(corrupt)?;
    let email: String = row.try_get("email").map_err(corrupt)?;
    let password_hash: String = row.try_get("password_hash").map_err(corrupt)?;
    let date_joined: DateTime<Utc> = row.try_get("date_joined").map_err(corrupt)?;
    Ok(User::restore(
        UserId::from_uuid(id),
        username,
        email,
        password_hash,
        date_joined,
    ))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let price: Decimal = row.try_get("price").map_err(corrupt)?;
    let price = Money::new(price).map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))?;
    Product::restore(
        ProductId::from_uuid(id),
        row.try_get("name").map_err(corrupt)?,
        row.try_get("description").map_err(corrupt)?,
        price,
        row.try_get("category").map_err(corrupt)?,
    )
    .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let product_id: Uuid = row.try_get("product_id").map_err(corrupt)?;
    let price: Decimal = row.try_get("product_price").map_err(corrupt)?;
    let quantity: i32 = row.try_get("quantity").map_err(corrupt)?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?;
    let snapshot = ProductSnapshot {
        id: ProductId::from_uuid(product_id),
        name: row.try_get("product_name").map_err(corrupt)?,
        description: row.try_get("product_description").map_err(corrupt)?,
        price: Money::new(price).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        category: row.try_get("product_category").map_err(corrupt)?,
    };
    Ok(OrderItem::new(snapshot, quantity))
}

/// One order's columns plus its items, while folding joined rows.
struct Header {
    id: Uuid,
    owner: Uuid,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    items: Vec<OrderItem>,
}

/// Fold joined order/item rows (grouped by order, items in position order).
fn orders_from_rows(rows: &[PgRow]) -> Result<Vec<Order>, StoreError> {
    let mut headers: Vec<Header> = Vec::new();
    for row in rows {
        let id: Uuid = row.try_get("id").map_err(corrupt)?;
        let item = item_from_row(row)?;
        match headers.last_mut() {
            Some(h) if h.id == id => h.items.push(item),
            _ => headers.push(Header {
                id,
                owner: row.try_get("user_id").map_err(corrupt)?,
                total: row.try_get("total").map_err(corrupt)?,
                status: row.try_get("status").map_err(corrupt)?,
                created_at: row.try_get("created_at").map_err(corrupt)?,
                items: vec![item],
            }),
        }
    }

    headers
        .into_iter()
        .map(|h| {
            let id = h.id;
            order_from_header(h).map_err(|e| StoreError::Corrupt(format!("order {id}: {e}")))
        })
        .collect()
}

fn order_from_header(h: Header) -> Result<Order, DomainError> {
    Order::restore(
        OrderId::from_uuid(h.id),
        UserId::from_uuid(h.owner),
        h.items,
        Money::new(h.total)?,
        h.status.parse::<OrderStatus>()?,
        h.created_at,
    )
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(format!("failed to decode row: {err}"))
}

/// Map SQLx errors to `StoreError` consistently.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique, foreign key, check
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    //! These run against a live database only when `DATABASE_URL` is set.

    use super::*;
    use storefront_auth::Registration;
    use storefront_catalog::NewProduct;
    use storefront_orders::{OrderLineRequest, create_order};

    async fn store() -> Option<PostgresStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PostgresStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    async fn seed(store: &PostgresStore) -> (UserId, ProductId) {
        let name = format!("u{}", Uuid::now_v7().simple());
        let reg = Registration::new(name, "", "pw", "pw");
        let user = User::register(UserId::new(), &reg, "hash".to_string(), Utc::now());
        store.insert_user(&user).await.unwrap();

        let new = NewProduct::new("Test Product", "", Money::parse("10.99").unwrap(), "Test").unwrap();
        let product = Product::create(ProductId::new(), new);
        store.insert_product(&product).await.unwrap();
        (user.id(), product.id())
    }

    #[tokio::test]
    async fn order_round_trip_and_referenced_delete() {
        let Some(store) = store().await else {
            return;
        };
        let (owner, product) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let order = create_order(
            &mut *tx,
            owner,
            &[OrderLineRequest::new(product, Some(2))],
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let listed = store.list_orders_for(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), order.id());
        assert_eq!(listed[0].total().to_string(), "21.98");

        assert!(matches!(
            store.delete_product(product).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn rolled_back_order_leaves_no_rows() {
        let Some(store) = store().await else {
            return;
        };
        let (owner, product) = seed(&store).await;

        {
            let mut tx = store.begin().await.unwrap();
            create_order(
                &mut *tx,
                owner,
                &[OrderLineRequest::new(product, Some(1))],
                Utc::now(),
            )
            .await
            .unwrap();
        }

        assert!(store.list_orders_for(owner).await.unwrap().is_empty());
        assert_eq!(store.delete_product(product).await, Ok(true));
    }

    #[tokio::test]
    async fn duplicate_username_maps_to_constraint() {
        let Some(store) = store().await else {
            return;
        };
        let name = format!("u{}", Uuid::now_v7().simple());
        let reg = Registration::new(name, "", "pw", "pw");
        let first = User::register(UserId::new(), &reg, "hash".to_string(), Utc::now());
        let second = User::register(UserId::new(), &reg, "hash".to_string(), Utc::now());

        store.insert_user(&first).await.unwrap();
        assert!(matches!(
            store.insert_user(&second).await,
            Err(StoreError::Constraint(_))
        ));
    }
}
