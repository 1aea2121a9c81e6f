//! Booking-conflict resolution core of the rental platform.
//!
//! Two components share a transactional store: [`AvailabilityOracle`]
//! answers read-side "is this span bookable?" queries, and
//! [`ReservationCoordinator`] is the only path that creates a reservation,
//! serializing concurrent attempts per product through an exclusive row
//! lock so that overlapping reservations never exceed capacity.
//!
//! The surrounding application (HTTP, auth, catalog CRUD, mail delivery) is
//! out of scope; it calls this crate in-process and plugs in a store
//! implementation ([`MemoryStore`] here, `booking-pg` in production) and a
//! [`Notifier`].

pub mod availability;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod models;
pub mod notifier;
pub mod store;

pub use availability::AvailabilityOracle;
pub use coordinator::{CoordinatorConfig, ReservationCoordinator};
pub use error::BookingError;
pub use memory::{FaultPoint, MemoryStore};
pub use models::{
    BookingRequest, ConfirmedBooking, DateSpan, LineItem, Order, OrderStatus, Product,
    Reservation, ReservationStatus,
};
pub use notifier::{
    BookingNotification, ChannelNotifier, NotificationEvent, NotificationWorker, Notifier,
};
pub use store::{BookingStore, BookingTx, ReservationReader};
