//! In-memory implementation of the store traits.
//!
//! Used by the test suite and by hosts that embed the core without Postgres.
//! The exclusive row lock is emulated with one `tokio::sync::Mutex` per
//! product, which preserves the "at most N concurrent successes" guarantee:
//! writes are staged while the product lock is held and only become visible
//! to other transactions at commit, before the lock is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{DateSpan, LineItem, Order, Product, Reservation, ReservationStatus};
use crate::store::{BookingStore, BookingTx, ReservationReader};

/// Insert step that can be armed to fail once, for rollback tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    InsertOrder,
    InsertLineItem,
    InsertReservation,
}

#[derive(Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    line_items: HashMap<Uuid, LineItem>,
    reservations: Vec<Reservation>,
}

impl MemoryState {
    fn count_overlapping(&self, product_id: Uuid, size: &str, span: DateSpan) -> i64 {
        self.reservations
            .iter()
            .filter(|r| {
                r.product_id == product_id
                    && r.size == size
                    && r.status.holds_capacity()
                    && r.span.overlaps(&span)
            })
            .count() as i64
    }

    fn reservation_spans(&self, product_id: Uuid, size: &str) -> Vec<DateSpan> {
        self.reservations
            .iter()
            .filter(|r| r.product_id == product_id && r.size == size && r.status.holds_capacity())
            .map(|r| r.span)
            .collect()
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    row_locks: Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
    fault: Arc<StdMutex<Option<FaultPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            row_locks: Arc::new(StdMutex::new(HashMap::new())),
            fault: Arc::new(StdMutex::new(None)),
        }
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }

    pub async fn order(&self, order_id: Uuid) -> Option<Order> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.read().await.orders.values().cloned().collect()
    }

    pub async fn line_items(&self) -> Vec<LineItem> {
        self.state.read().await.line_items.values().cloned().collect()
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.read().await.reservations.clone()
    }

    /// Status transition hook for the downstream order lifecycle, which is
    /// outside this core. Cancelling frees capacity.
    pub async fn set_reservation_status(&self, reservation_id: Uuid, status: ReservationStatus) {
        let mut state = self.state.write().await;
        if let Some(r) = state
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation_id)
        {
            r.status = status;
        }
    }

    /// Arm the next matching insert to fail with an internal error.
    pub fn inject_fault(&self, point: FaultPoint) {
        *self.fault.lock().expect("fault mutex poisoned") = Some(point);
    }

    fn row_lock(&self, product_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().expect("row lock table poisoned");
        Arc::clone(locks.entry(product_id).or_default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn reader<'a>(&'a self) -> Result<Box<dyn ReservationReader + Send + 'a>, BookingError> {
        Ok(Box::new(MemReader {
            state: Arc::clone(&self.state),
        }))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn BookingTx + 'a>, BookingError> {
        Ok(Box::new(MemTx {
            store: self.clone(),
            guard: None,
            staged: Staged::default(),
        }))
    }
}

struct MemReader {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl ReservationReader for MemReader {
    async fn load_product(&mut self, product_id: Uuid) -> Result<Option<Product>, BookingError> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn count_overlapping(
        &mut self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<i64, BookingError> {
        Ok(self
            .state
            .read()
            .await
            .count_overlapping(product_id, size, span))
    }

    async fn reservation_spans(
        &mut self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<DateSpan>, BookingError> {
        Ok(self.state.read().await.reservation_spans(product_id, size))
    }
}

#[derive(Default)]
struct Staged {
    orders: Vec<Order>,
    line_items: Vec<LineItem>,
    reservations: Vec<Reservation>,
}

struct MemTx {
    store: MemoryStore,
    guard: Option<OwnedMutexGuard<()>>,
    staged: Staged,
}

impl MemTx {
    fn take_fault(&self, point: FaultPoint) -> bool {
        let mut slot = self.store.fault.lock().expect("fault mutex poisoned");
        if *slot == Some(point) {
            *slot = None;
            return true;
        }
        false
    }
}

#[async_trait]
impl ReservationReader for MemTx {
    async fn load_product(&mut self, product_id: Uuid) -> Result<Option<Product>, BookingError> {
        Ok(self
            .store
            .state
            .read()
            .await
            .products
            .get(&product_id)
            .cloned())
    }

    async fn count_overlapping(
        &mut self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<i64, BookingError> {
        let committed = self
            .store
            .state
            .read()
            .await
            .count_overlapping(product_id, size, span);
        let staged = self
            .staged
            .reservations
            .iter()
            .filter(|r| {
                r.product_id == product_id
                    && r.size == size
                    && r.status.holds_capacity()
                    && r.span.overlaps(&span)
            })
            .count() as i64;
        Ok(committed + staged)
    }

    async fn reservation_spans(
        &mut self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<DateSpan>, BookingError> {
        Ok(self
            .store
            .state
            .read()
            .await
            .reservation_spans(product_id, size))
    }
}

#[async_trait]
impl BookingTx for MemTx {
    async fn lock_product(
        &mut self,
        product_id: Uuid,
        timeout: Duration,
    ) -> Result<Product, BookingError> {
        let lock = self.store.row_lock(product_id);
        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| BookingError::LockTimeout(product_id))?;
        self.guard = Some(guard);

        self.store
            .state
            .read()
            .await
            .products
            .get(&product_id)
            .filter(|p| p.active)
            .cloned()
            .ok_or(BookingError::NotFound(product_id))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BookingError> {
        if self.take_fault(FaultPoint::InsertOrder) {
            return Err(BookingError::Internal(anyhow!("injected order insert fault")));
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<(), BookingError> {
        if self.take_fault(FaultPoint::InsertLineItem) {
            return Err(BookingError::Internal(anyhow!(
                "injected line item insert fault"
            )));
        }
        self.staged.line_items.push(item.clone());
        Ok(())
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), BookingError> {
        if self.take_fault(FaultPoint::InsertReservation) {
            return Err(BookingError::Internal(anyhow!(
                "injected reservation insert fault"
            )));
        }
        self.staged.reservations.push(reservation.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), BookingError> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut state = self.store.state.write().await;
            for order in staged.orders {
                state.orders.insert(order.id, order);
            }
            for item in staged.line_items {
                state.line_items.insert(item.id, item);
            }
            state.reservations.extend(staged.reservations);
        }
        // Row lock released only after the writes are visible.
        self.guard.take();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), BookingError> {
        self.staged = Staged::default();
        self.guard.take();
        Ok(())
    }
}
