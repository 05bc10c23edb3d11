//! Postgres-backed storefront store.
//!
//! Each [`PostgresUnitOfWork`] wraps one database transaction at READ
//! COMMITTED. Products and carts carry a `row_version` column; every update
//! is `... WHERE id = $1 AND row_version = $2` and zero affected rows means
//! another transaction got there first.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation on `shopping_carts.user_id`) | `23505` | `CartConflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / Tls / Other | N/A | `Backend` |
//! | Row decoding failure | N/A | `Corrupt` |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use storefront_alerts::{NewStockAlert, StockAlert};
use storefront_cart::{CartItem, ShoppingCart};
use storefront_catalog::{Product, ProductRecord};
use storefront_core::{
    CartId, CategoryId, Money, OrderId, ProductId, RowVersion, StockAlertId, UserId, Versioned,
};
use storefront_orders::{CheckoutLine, NewOrder, Order, OrderItem, Page, PageRequest};

use super::{
    CartSnapshot, CatalogStore, OrderReadStore, StockAlertStore, Store, StoreError, UnitOfWork,
};

const SCHEMA: &str = include_str!("../../migrations/0001_storefront.sql");

/// Postgres-backed store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; clones share it.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the storefront schema. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

/// One database transaction.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        Ok(PostgresUnitOfWork { tx })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock_quantity, category_id, low_stock_threshold, row_version";

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn load_cart_with_items(&mut self, user_id: &UserId) -> Result<Option<CartSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id           AS cart_id,
                c.row_version  AS cart_version,
                i.product_id   AS line_product_id,
                i.quantity     AS line_quantity,
                p.id, p.name, p.description, p.price, p.stock_quantity,
                p.category_id, p.low_stock_threshold, p.row_version
            FROM shopping_carts c
            LEFT JOIN cart_items i ON i.cart_id = c.id
            LEFT JOIN products p ON p.id = i.product_id
            WHERE c.user_id = $1
            ORDER BY i.position ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_cart_with_items", e))?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let cart_id = CartId::from_raw(get(first, "cart_id")?);
        let cart_version = version_from(get(first, "cart_version")?)?;

        let mut items = Vec::with_capacity(rows.len());
        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(product_id) = get::<Option<i64>>(row, "line_product_id")? else {
                // Cart without lines: the LEFT JOIN yields one all-NULL line.
                continue;
            };
            let item = CartItem {
                product_id: ProductId::from_raw(product_id),
                quantity: get(row, "line_quantity")?,
            };
            let product = match get::<Option<i64>>(row, "id")? {
                Some(_) => Some(product_from_row(row)?),
                None => None,
            };
            items.push(item);
            lines.push(CheckoutLine { item, product });
        }

        let cart = ShoppingCart::restore(cart_id, user_id.clone(), items, cart_version);
        Ok(Some(CartSnapshot { cart, lines }))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn load_product(&mut self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id_typed(), expected_version = %product.row_version()),
        err
    )]
    async fn update_product(&mut self, product: &Product) -> Result<RowVersion, StoreError> {
        let record = product.to_record();
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $3,
                description = $4,
                price = $5,
                stock_quantity = $6,
                category_id = $7,
                low_stock_threshold = $8,
                row_version = row_version + 1
            WHERE id = $1 AND row_version = $2
            RETURNING row_version
            "#,
        )
        .bind(record.id.get())
        .bind(version_to(record.row_version)?)
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.price.amount())
        .bind(record.stock_quantity)
        .bind(record.category_id.get())
        .bind(record.low_stock_threshold)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        match row {
            Some(row) => version_from(get(&row, "row_version")?),
            None => Err(StoreError::ProductConflict {
                product_id: record.id,
            }),
        }
    }

    #[instrument(skip(self, order), fields(user_id = %order.user_id, items = order.items.len()), err)]
    async fn add_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, order_date, total_price)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(order.user_id.as_str())
        .bind(order.order_date)
        .bind(order.total_price.amount())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        let order_id = OrderId::from_raw(get(&row, "id")?);

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id.get())
            .bind(line_no as i32)
            .bind(item.product_id.get())
            .bind(item.quantity)
            .bind(item.unit_price.amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        Ok(order_id)
    }

    #[instrument(skip(self, cart), fields(user_id = %cart.user_id(), lines = cart.items().len()), err)]
    async fn save_cart(&mut self, cart: &ShoppingCart) -> Result<ShoppingCart, StoreError> {
        let user_id = cart.user_id().clone();

        let (cart_id, new_version) = match cart.id() {
            None => {
                let row = sqlx::query(
                    "INSERT INTO shopping_carts (user_id, row_version) VALUES ($1, 1) RETURNING id, row_version",
                )
                .bind(user_id.as_str())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::CartConflict {
                            user_id: user_id.clone(),
                        }
                    } else {
                        map_sqlx_error("insert_cart", e)
                    }
                })?;
                (
                    CartId::from_raw(get(&row, "id")?),
                    version_from(get(&row, "row_version")?)?,
                )
            }
            Some(id) => {
                let row = sqlx::query(
                    r#"
                    UPDATE shopping_carts
                    SET row_version = row_version + 1
                    WHERE id = $1 AND user_id = $2 AND row_version = $3
                    RETURNING row_version
                    "#,
                )
                .bind(id.get())
                .bind(user_id.as_str())
                .bind(version_to(cart.row_version())?)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("update_cart", e))?;

                let Some(row) = row else {
                    return Err(StoreError::CartConflict { user_id });
                };

                sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                    .bind(id.get())
                    .execute(&mut *self.tx)
                    .await
                    .map_err(|e| map_sqlx_error("clear_cart_items", e))?;

                (id, version_from(get(&row, "row_version")?)?)
            }
        };

        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, position, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(cart_id.get())
            .bind(position as i32)
            .bind(item.product_id.get())
            .bind(item.quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_cart_item", e))?;
        }

        Ok(cart.clone().persisted(cart_id, new_version))
    }

    #[instrument(skip(self, alert), fields(product_id = %alert.product_id), err)]
    async fn add_stock_alert(&mut self, alert: &NewStockAlert) -> Result<StockAlertId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_alerts (product_id, product_name, quantity_at_trigger, triggered_at, is_acknowledged)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id
            "#,
        )
        .bind(alert.product_id.get())
        .bind(&alert.product_name)
        .bind(alert.quantity_at_trigger)
        .bind(alert.triggered_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_alert", e))?;

        Ok(StockAlertId::from_raw(get(&row, "id")?))
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn put_product(&self, product: &Product) -> Result<Product, StoreError> {
        let record = product.to_record();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price, stock_quantity, category_id, low_stock_threshold, row_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock_quantity = EXCLUDED.stock_quantity,
                category_id = EXCLUDED.category_id,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                row_version = products.row_version + 1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(record.id.get())
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.price.amount())
        .bind(record.stock_quantity)
        .bind(record.category_id.get())
        .bind(record.low_stock_threshold)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_product", e))?;

        product_from_row(&row)
    }
}

#[async_trait]
impl OrderReadStore for PostgresStore {
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, user_id, order_date, total_price FROM orders WHERE id = $1")
            .bind(order_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, page = page.page()), err)]
    async fn list_orders_by_user(&self, user_id: &UserId, page: PageRequest) -> Result<Page<Order>, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, order_date, total_price
            FROM orders
            WHERE user_id = $1
            ORDER BY order_date DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id.as_str())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_by_user", e))?;

        Ok(Page {
            total_count: u64::try_from(total).unwrap_or(0),
            items: self.attach_items(rows).await?,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, order_date, total_price FROM orders ORDER BY order_date DESC, id DESC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_all_orders", e))?;

        self.attach_items(rows).await
    }
}

impl PostgresStore {
    /// Load the lines of the given order rows and rehydrate them, keeping row order.
    async fn attach_items(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids = rows
            .iter()
            .map(|r| get::<i64>(r, "id"))
            .collect::<Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order_items", e))?;

        let mut items: BTreeMap<i64, Vec<OrderItem>> = BTreeMap::new();
        for row in &item_rows {
            items.entry(get(row, "order_id")?).or_default().push(OrderItem {
                product_id: ProductId::from_raw(get(row, "product_id")?),
                quantity: get(row, "quantity")?,
                unit_price: money_from(get(row, "unit_price")?)?,
            });
        }

        rows.iter()
            .map(|row| {
                let id: i64 = get(row, "id")?;
                let user_id = UserId::parse(get::<String>(row, "user_id")?)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                let order_date: DateTime<Utc> = get(row, "order_date")?;
                let total_price = money_from(get(row, "total_price")?)?;
                Order::restore(
                    OrderId::from_raw(id),
                    user_id,
                    order_date,
                    total_price,
                    items.remove(&id).unwrap_or_default(),
                )
                .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }
}

const ALERT_COLUMNS: &str = "id, product_id, product_name, quantity_at_trigger, triggered_at, is_acknowledged";

#[async_trait]
impl StockAlertStore for PostgresStore {
    async fn list_alerts(&self) -> Result<Vec<StockAlert>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ALERT_COLUMNS} FROM stock_alerts ORDER BY triggered_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_alerts", e))?;

        rows.iter().map(alert_from_row).collect()
    }

    async fn get_alert(&self, alert_id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ALERT_COLUMNS} FROM stock_alerts WHERE id = $1"))
            .bind(alert_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_alert", e))?;

        row.as_ref().map(alert_from_row).transpose()
    }

    async fn count_unacknowledged(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_alerts WHERE NOT is_acknowledged")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_unacknowledged", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self), fields(alert_id = %alert_id), err)]
    async fn acknowledge_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE stock_alerts SET is_acknowledged = TRUE WHERE id = $1")
            .bind(alert_id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("acknowledge_alert", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(alert_id = %alert_id), err)]
    async fn delete_alert(&self, alert_id: StockAlertId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM stock_alerts WHERE id = $1")
            .bind(alert_id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_alert", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// Row decoding

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn version_from(raw: i64) -> Result<RowVersion, StoreError> {
    u64::try_from(raw)
        .map(RowVersion::new)
        .map_err(|_| StoreError::Corrupt(format!("negative row_version {raw}")))
}

fn version_to(version: RowVersion) -> Result<i64, StoreError> {
    i64::try_from(version.get())
        .map_err(|_| StoreError::Backend(format!("row_version {version} out of range")))
}

fn money_from(amount: Decimal) -> Result<Money, StoreError> {
    Money::new(amount).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let record = ProductRecord {
        id: ProductId::from_raw(get(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        price: money_from(get(row, "price")?)?,
        stock_quantity: get(row, "stock_quantity")?,
        category_id: CategoryId::from_raw(get(row, "category_id")?),
        low_stock_threshold: get(row, "low_stock_threshold")?,
        row_version: version_from(get(row, "row_version")?)?,
    };
    Product::from_record(record).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn alert_from_row(row: &PgRow) -> Result<StockAlert, StoreError> {
    Ok(StockAlert::restore(
        StockAlertId::from_raw(get(row, "id")?),
        ProductId::from_raw(get(row, "product_id")?),
        get(row, "product_name")?,
        get(row, "quantity_at_trigger")?,
        get(row, "triggered_at")?,
        get(row, "is_acknowledged")?,
    ))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {} ({}): {}",
                operation,
                code,
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        sqlx::Error::PoolTimedOut => StoreError::Backend(format!("connection pool timed out in {}", operation)),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("failed to decode column {} in {}: {}", index, operation, source))
        }
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

/// Check if a SQLx error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
