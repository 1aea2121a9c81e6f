use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy of the booking core. `Conflict` must stay
/// distinguishable from `Internal` end to end so callers can render
/// "fully booked" differently from "try again later".
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("product {0} not found")]
    NotFound(Uuid),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("product not available for the selected dates and size")]
    Conflict,

    #[error("could not lock product {0} within the timeout")]
    LockTimeout(Uuid),

    /// Unexpected datastore failure. The transaction is guaranteed rolled
    /// back before this surfaces.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, BookingError::Conflict)
    }
}
