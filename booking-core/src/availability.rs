//! Read-side availability computation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{DateSpan, Product};
use crate::store::{BookingStore, ReservationReader};

/// Answers "can size S of product P be reserved for this span?" by counting
/// overlapping capacity-holding reservations against the product's stock.
///
/// Safe to call without locking for informational reads; the coordinator
/// re-runs the same check under the product row lock before committing,
/// because an unlocked answer can go stale between check and write.
pub struct AvailabilityOracle {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityOracle {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Missing or inactive product is `NotFound`; a size the product is not
    /// configured with is simply unavailable, not an error.
    pub async fn is_available(
        &self,
        product_id: Uuid,
        size: &str,
        span: DateSpan,
    ) -> Result<bool, BookingError> {
        let mut reader = self.store.reader().await?;
        let product = reader
            .load_product(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(BookingError::NotFound(product_id))?;
        check_capacity(reader.as_mut(), &product, size, span).await
    }

    /// Every calendar day covered by a capacity-holding reservation for
    /// (product, size), deduplicated, ascending. Unknown products yield an
    /// empty list; staleness is acceptable for calendar rendering.
    pub async fn booked_dates(
        &self,
        product_id: Uuid,
        size: &str,
    ) -> Result<Vec<NaiveDate>, BookingError> {
        let mut reader = self.store.reader().await?;
        let spans = reader.reservation_spans(product_id, size).await?;

        let mut days = BTreeSet::new();
        for span in spans {
            days.extend(span.iter_days());
        }
        Ok(days.into_iter().collect())
    }
}

/// Capacity rule shared by the unlocked fast path and the in-transaction
/// re-check: available iff fewer than `total_quantity` capacity-holding
/// reservations overlap the span. Overlap counting is scoped by size while
/// the quantity is product-wide; see DESIGN.md for why that asymmetry is
/// kept.
pub(crate) async fn check_capacity<R>(
    reader: &mut R,
    product: &Product,
    size: &str,
    span: DateSpan,
) -> Result<bool, BookingError>
where
    R: ReservationReader + Send + ?Sized,
{
    if !product.has_size(size) {
        return Ok(false);
    }
    let overlapping = reader.count_overlapping(product.id, size, span).await?;
    Ok(overlapping < i64::from(product.total_quantity))
}
