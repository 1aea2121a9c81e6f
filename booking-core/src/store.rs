//! Persistence seam of the booking core.
//!
//! The coordinator drives these traits directly so that the lock / re-check /
//! insert / commit protocol lives in one place, independent of whether the
//! backing store is Postgres or the in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{DateSpan, LineItem, Order, Product, Reservation};

/// Read-side operations, available both on an unlocked connection and inside
/// an open transaction.
#[async_trait]
pub trait ReservationReader {
    async fn load_product(&mut self, product_id: Uuid) -> Result<Option<Product>, BookingError>;

    /// Count reservations for (product, size) whose status still holds
    /// capacity and whose span overlaps `span`.
    async fn count_overlapping(
        &mut self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<i64, BookingError>;

    /// Spans of every capacity-holding reservation for (product, size).
    async fn reservation_spans(
        &mut self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<DateSpan>, BookingError>;
}

/// An open transaction. Dropping it without calling `commit` must behave
/// like `rollback`.
#[async_trait]
pub trait BookingTx: ReservationReader + Send {
    /// Acquire the exclusive row lock on the product and return the locked
    /// row. Blocks competing transactions until commit or rollback; a
    /// missing or inactive product is `NotFound`, an expired wait is
    /// `LockTimeout`.
    async fn lock_product(
        &mut self,
        product_id: Uuid,
        timeout: Duration,
    ) -> Result<Product, BookingError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), BookingError>;

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), BookingError>;

    async fn insert_reservation(&mut self, reservation: &Reservation)
        -> Result<(), BookingError>;

    async fn commit(self: Box<Self>) -> Result<(), BookingError>;

    async fn rollback(self: Box<Self>) -> Result<(), BookingError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Unlocked reader for fast-path and display queries. Results can go
    /// stale immediately; anything feeding a write must be re-read inside a
    /// transaction.
    async fn reader<'a>(&'a self) -> Result<Box<dyn ReservationReader + Send + 'a>, BookingError>;

    async fn begin<'a>(&'a self) -> Result<Box<dyn BookingTx + 'a>, BookingError>;
}
