//! Postgres implementation of the booking store traits.
//!
//! The exclusive row lock is a real `SELECT ... FOR UPDATE` on the products
//! row; `SET LOCAL lock_timeout` bounds the wait so a parked transaction
//! surfaces as `LockTimeout` instead of blocking forever.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;
use uuid::Uuid;

use booking_core::{
    BookingError, BookingStore, BookingTx, DateSpan, LineItem, Order, Product, Reservation,
    ReservationReader, ReservationStatus,
};

use crate::models::{NewBookingRow, NewLineItemRow, NewOrderRow, ProductRow};
use crate::schema::{order_items, orders, products, rental_bookings};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl PgStoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
        }
    }

    /// Reads `DATABASE_URL`, the same knob the rest of the deployment uses.
    pub fn from_env() -> Result<Self, BookingError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| BookingError::Internal(anyhow!("DATABASE_URL is not set")))?;
        Ok(Self::new(url))
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    pub async fn connect(config: &PgStoreConfig) -> Result<Self, BookingError> {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .await
            .map_err(|e| BookingError::Internal(anyhow!("failed to build pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Bring the booking tables up to date. Runs on the blocking pool since
    /// the migration harness drives a synchronous connection.
    pub async fn run_migrations(database_url: &str) -> Result<(), BookingError> {
        let database_url = database_url.to_string();
        tokio::task::spawn_blocking(move || {
            use diesel::Connection;
            use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;

            let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
                .map_err(|e| anyhow!("failed to connect for migrations: {e}"))?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| anyhow!("migration error: {e}"))?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .map_err(|e| BookingError::Internal(anyhow!("migration task panicked: {e}")))?
        .map_err(BookingError::Internal)?;
        info!("booking migrations up to date");
        Ok(())
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, BookingError> {
        self.pool
            .get()
            .await
            .map_err(|e| BookingError::Internal(anyhow!("failed to check out connection: {e}")))
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn reader<'a>(&'a self) -> Result<Box<dyn ReservationReader + Send + 'a>, BookingError> {
        let conn = self.conn().await?;
        Ok(Box::new(PgReader { conn }))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn BookingTx + 'a>, BookingError> {
        let mut conn = self.conn().await?;
        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(internal)?;
        Ok(Box::new(PgTx { conn }))
    }
}

struct PgReader<'a> {
    conn: PooledConnection<'a, AsyncPgConnection>,
}

#[async_trait]
impl ReservationReader for PgReader<'_> {
    async fn load_product(&mut self, product_id: Uuid) -> Result<Option<Product>, BookingError> {
        load_product(&mut self.conn, product_id).await
    }

    async fn count_overlapping(
        &mut self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<i64, BookingError> {
        count_overlapping(&mut self.conn, product_id, size, span).await
    }

    async fn reservation_spans(
        &mut self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<DateSpan>, BookingError> {
        reservation_spans(&mut self.conn, product_id, size).await
    }
}

struct PgTx<'a> {
    conn: PooledConnection<'a, AsyncPgConnection>,
}

#[async_trait]
impl ReservationReader for PgTx<'_> {
    async fn load_product(&mut self, product_id: Uuid) -> Result<Option<Product>, BookingError> {
        load_product(&mut self.conn, product_id).await
    }

    async fn count_overlapping(
        &mut self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<i64, BookingError> {
        count_overlapping(&mut self.conn, product_id, size, span).await
    }

    async fn reservation_spans(
        &mut self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<DateSpan>, BookingError> {
        reservation_spans(&mut self.conn, product_id, size).await
    }
}

#[async_trait]
impl BookingTx for PgTx<'_> {
    async fn lock_product(
        &mut self,
        product_id: Uuid,
        timeout: Duration,
    ) -> Result<Product, BookingError> {
        // SET LOCAL scopes the timeout to this transaction.
        diesel::sql_query(format!("SET LOCAL lock_timeout = {}", timeout.as_millis()))
            .execute(&mut *self.conn)
            .await
            .map_err(internal)?;

        let row = products::table
            .find(product_id)
            .for_update()
            .first::<ProductRow>(&mut *self.conn)
            .await
            .optional()
            .map_err(|err| lock_error(err, product_id))?;

        row.map(Product::from)
            .filter(|p| p.active)
            .ok_or(BookingError::NotFound(product_id))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BookingError> {
        diesel::insert_into(orders::table)
            .values(NewOrderRow::from(order))
            .execute(&mut *self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), BookingError> {
        diesel::insert_into(order_items::table)
            .values(NewLineItemRow::from(item))
            .execute(&mut *self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), BookingError> {
        diesel::insert_into(rental_bookings::table)
            .values(NewBookingRow::from(reservation))
            .execute(&mut *self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), BookingError> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)
            .await
            .map_err(internal)
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), BookingError> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)
            .await
            .map_err(internal)
    }
}

async fn load_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
) -> Result<Option<Product>, BookingError> {
    let row = products::table
        .find(product_id)
        .first::<ProductRow>(conn)
        .await
        .optional()
        .map_err(internal)?;
    Ok(row.map(Product::from))
}

async fn count_overlapping(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    size: &str,
    span: DateSpan,
) -> Result<i64, BookingError> {
    rental_bookings::table
        .filter(rental_bookings::product_id.eq(product_id))
        .filter(rental_bookings::size.eq(size))
        .filter(rental_bookings::status.ne(ReservationStatus::Cancelled.as_str()))
        .filter(rental_bookings::start_date.le(span.end()))
        .filter(rental_bookings::end_date.ge(span.start()))
        .count()
        .get_result(conn)
        .await
        .map_err(internal)
}

async fn reservation_spans(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    size: &str,
) -> Result<Vec<DateSpan>, BookingError> {
    let rows: Vec<(NaiveDate, NaiveDate)> = rental_bookings::table
        .filter(rental_bookings::product_id.eq(product_id))
        .filter(rental_bookings::size.eq(size))
        .filter(rental_bookings::status.ne(ReservationStatus::Cancelled.as_str()))
        .select((rental_bookings::start_date, rental_bookings::end_date))
        .load(conn)
        .await
        .map_err(internal)?;

    rows.into_iter()
        .map(|(start, end)| DateSpan::new(start, end))
        .collect()
}

fn internal(err: diesel::result::Error) -> BookingError {
    BookingError::Internal(anyhow::Error::new(err))
}

/// Postgres reports an expired `lock_timeout` as SQLSTATE 55P03
/// ("canceling statement due to lock timeout").
fn lock_error(err: diesel::result::Error, product_id: Uuid) -> BookingError {
    if let diesel::result::Error::DatabaseError(_, ref info) = err {
        if info.message().contains("lock timeout") {
            return BookingError::LockTimeout(product_id);
        }
    }
    internal(err)
}
