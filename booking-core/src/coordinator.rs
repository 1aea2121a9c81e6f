//! The only write path that creates a reservation.

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::{check_capacity, AvailabilityOracle};
use crate::error::BookingError;
use crate::models::{
    BookingRequest, ConfirmedBooking, LineItem, Order, OrderStatus, Reservation,
    ReservationStatus,
};
use crate::notifier::{NotificationEvent, Notifier};
use crate::store::{BookingStore, BookingTx};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Budget for acquiring the product row lock before the attempt is
    /// abandoned with `LockTimeout`.
    pub lock_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Serializes concurrent booking attempts per product through the store's
/// exclusive row lock and guarantees that no two overlapping reservations
/// beyond capacity are ever both committed.
pub struct ReservationCoordinator {
    store: Arc<dyn BookingStore>,
    oracle: AvailabilityOracle,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(store, notifier, CoordinatorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        config: CoordinatorConfig,
    ) -> Self {
        let oracle = AvailabilityOracle::new(Arc::clone(&store));
        Self {
            store,
            oracle,
            notifier,
            config,
        }
    }

    /// Check-then-commit under the product row lock.
    ///
    /// Two availability checks run on purpose: the first, unlocked, rejects
    /// doomed requests without paying for a transaction; the second runs
    /// after `lock_product` and is the one that counts, since a competing
    /// transaction may have committed in between. Not idempotent: identical
    /// requests create separate reservations while capacity lasts.
    pub async fn create_reservation(
        &self,
        request: BookingRequest,
    ) -> Result<ConfirmedBooking, BookingError> {
        if !self
            .oracle
            .is_available(request.product_id, &request.size, request.span)
            .await?
        {
            return Err(BookingError::Conflict);
        }

        let mut tx = self.store.begin().await?;
        let booked = match self.reserve_in_tx(tx.as_mut(), &request).await {
            Ok(booked) => booked,
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "rollback failed after aborted reservation");
                }
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(
            order_id = %booked.order.id,
            product_id = %request.product_id,
            size = %request.size,
            "reservation committed"
        );
        // Fire-and-forget; a lost notification must never unwind a committed
        // reservation.
        self.notifier
            .notify(NotificationEvent::BookingConfirmed, booked.order.id);

        Ok(booked)
    }

    async fn reserve_in_tx<T>(
        &self,
        tx: &mut T,
        request: &BookingRequest,
    ) -> Result<ConfirmedBooking, BookingError>
    where
        T: BookingTx + ?Sized,
    {
        let product = tx
            .lock_product(request.product_id, self.config.lock_timeout)
            .await?;

        if !check_capacity(&mut *tx, &product, &request.size, request.span).await? {
            return Err(BookingError::Conflict);
        }

        let duration = request.span.days();
        let total_price = product.rent_price.clone() * BigDecimal::from(duration);
        let now = Utc::now();

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            status: OrderStatus::Pending,
            total_price,
            deposit_total: product.security_deposit.clone(),
            address: request.delivery_address.clone(),
            created_at: now,
        };
        tx.insert_order(&order).await?;

        let item = LineItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: product.id,
            quantity: 1,
            price: product.rent_price.clone(),
            size: request.size.clone(),
        };
        tx.insert_line_item(&item).await?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            line_item_id: item.id,
            product_id: product.id,
            size: request.size.clone(),
            span: request.span,
            status: ReservationStatus::Active,
            created_at: now,
        };
        tx.insert_reservation(&reservation).await?;

        Ok(ConfirmedBooking { order, reservation })
    }
}
