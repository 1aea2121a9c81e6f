#![allow(dead_code)]

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use booking_core::{
    BookingNotification, BookingRequest, BookingStore, ChannelNotifier, DateSpan, MemoryStore,
    Product, ReservationCoordinator,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn span(a: (i32, u32, u32), b: (i32, u32, u32)) -> DateSpan {
    DateSpan::new(date(a.0, a.1, a.2), date(b.0, b.1, b.2)).unwrap()
}

pub fn gown(total_quantity: i32, sizes: &[&str]) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: "silk wedding gown".to_string(),
        rent_price: BigDecimal::from(100),
        security_deposit: BigDecimal::from(50),
        total_quantity,
        sizes: sizes.iter().map(|s| s.to_string()).collect(),
        active: true,
    }
}

pub fn request(product_id: Uuid, size: &str, span: DateSpan) -> BookingRequest {
    BookingRequest {
        product_id,
        size: size.to_string(),
        span,
        customer_id: Uuid::new_v4(),
        delivery_address: "123 Production Lane".to_string(),
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub coordinator: ReservationCoordinator,
    pub notifications: UnboundedReceiver<BookingNotification>,
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let (notifier, notifications) = ChannelNotifier::new();
    let coordinator = ReservationCoordinator::new(
        Arc::new(store.clone()) as Arc<dyn BookingStore>,
        Arc::new(notifier),
    );
    Harness {
        store,
        coordinator,
        notifications,
    }
}
