mod common;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use booking_core::{
    AvailabilityOracle, BookingError, BookingStore, FaultPoint, NotificationEvent, OrderStatus,
    ReservationStatus,
};

use common::{date, gown, harness, request, span};

fn oracle(store: &booking_core::MemoryStore) -> AvailabilityOracle {
    AvailabilityOracle::new(Arc::new(store.clone()) as Arc<dyn BookingStore>)
}

#[tokio::test]
async fn end_to_end_booking_scenario() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    // A: 2026-06-01..03 succeeds.
    let a = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .expect("reservation A should succeed");
    assert_eq!(a.order.status, OrderStatus::Pending);
    assert_eq!(a.reservation.status, ReservationStatus::Active);

    // B: 2026-06-05..07 is disjoint from A and succeeds.
    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 5), (2026, 6, 7))))
        .await
        .expect("reservation B should succeed");

    // C: 2026-06-02..04 overlaps A.
    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 2), (2026, 6, 4))))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {err:?}");

    let booked = oracle(&h.store).booked_dates(product_id, "M").await.unwrap();
    assert_eq!(
        booked,
        vec![
            date(2026, 6, 1),
            date(2026, 6, 2),
            date(2026, 6, 3),
            date(2026, 6, 5),
            date(2026, 6, 6),
            date(2026, 6, 7),
        ]
    );
}

#[tokio::test]
async fn overlapping_ranges_conflict_on_single_unit() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap();
    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 2), (2026, 6, 4))))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    assert_eq!(h.store.reservations().await.len(), 1);
    assert_eq!(h.store.orders().await.len(), 1);
}

#[tokio::test]
async fn touching_ranges_conflict_on_single_unit() {
    // Inclusive-day semantics: a rental ending on the 3rd blocks one
    // starting on the 3rd.
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap();
    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 3), (2026, 6, 5))))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn disjoint_sizes_do_not_contend() {
    // Overlap counting is scoped by size even though the quantity is
    // product-wide, so a one-unit product still takes one booking per size.
    let h = harness();
    let product = gown(1, &["M", "L"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let dates = span((2026, 6, 1), (2026, 6, 3));
    h.coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .expect("size M should book");
    h.coordinator
        .create_reservation(request(product_id, "L", dates))
        .await
        .expect("size L should book despite identical dates");
}

#[tokio::test]
async fn capacity_above_one_allows_overlapping_bookings() {
    let h = harness();
    let product = gown(2, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let dates = span((2026, 6, 1), (2026, 6, 3));
    h.coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .unwrap();
    h.coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .expect("second unit should absorb the second booking");
    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn unknown_size_is_unavailable_not_an_error() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let dates = span((2026, 6, 1), (2026, 6, 3));
    assert!(!oracle(&h.store)
        .is_available(product_id, "XXL", dates)
        .await
        .unwrap());

    let err = h
        .coordinator
        .create_reservation(request(product_id, "XXL", dates))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn missing_product_is_not_found() {
    let h = harness();
    let ghost = Uuid::new_v4();
    let dates = span((2026, 6, 1), (2026, 6, 3));

    let err = oracle(&h.store)
        .is_available(ghost, "M", dates)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(id) if id == ghost));

    let err = h
        .coordinator
        .create_reservation(request(ghost, "M", dates))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn inactive_product_is_not_found() {
    let h = harness();
    let mut product = gown(1, &["M"]);
    product.active = false;
    let product_id = product.id;
    h.store.insert_product(product).await;

    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn pricing_is_rent_price_times_inclusive_days() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let booked = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap();

    // 3 inclusive days at 100 rent, 50 deposit.
    assert_eq!(booked.order.total_price, BigDecimal::from(300));
    assert_eq!(booked.order.deposit_total, BigDecimal::from(50));

    let items = h.store.line_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].order_id, booked.order.id);
    assert_eq!(items[0].quantity, 1);
    assert_eq!(items[0].price, BigDecimal::from(100));
    assert_eq!(booked.reservation.line_item_id, items[0].id);
}

#[tokio::test]
async fn failed_reservation_insert_rolls_back_the_whole_order() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    h.store.inject_fault(FaultPoint::InsertReservation);
    let err = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Internal(_)));

    // No partial rows may survive the abort.
    assert!(h.store.orders().await.is_empty());
    assert!(h.store.line_items().await.is_empty());
    assert!(h.store.reservations().await.is_empty());

    // The row lock was released on rollback, so the retry goes through.
    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .expect("retry after rollback should succeed");
}

#[tokio::test]
async fn notification_fires_only_for_committed_reservations() {
    let mut h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let booked = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap();
    let note = h.notifications.try_recv().expect("one notification");
    assert_eq!(note.event, NotificationEvent::BookingConfirmed);
    assert_eq!(note.order_id, booked.order.id);

    let _ = h
        .coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 3))))
        .await
        .unwrap_err();
    assert!(h.notifications.try_recv().is_err(), "no event for a conflict");
}

#[tokio::test]
async fn cancelled_reservations_free_capacity() {
    let h = harness();
    let product = gown(1, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    let dates = span((2026, 6, 1), (2026, 6, 3));
    let booked = h
        .coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .unwrap();

    h.store
        .set_reservation_status(booked.reservation.id, ReservationStatus::Cancelled)
        .await;

    assert!(oracle(&h.store)
        .is_available(product_id, "M", dates)
        .await
        .unwrap());
    h.coordinator
        .create_reservation(request(product_id, "M", dates))
        .await
        .expect("cancelled booking no longer blocks the span");

    let booked_dates = oracle(&h.store).booked_dates(product_id, "M").await.unwrap();
    assert_eq!(booked_dates.len(), 3, "cancelled spans are not listed twice");
}

#[tokio::test]
async fn booked_dates_deduplicates_across_units() {
    let h = harness();
    let product = gown(2, &["M"]);
    let product_id = product.id;
    h.store.insert_product(product).await;

    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 1), (2026, 6, 4))))
        .await
        .unwrap();
    h.coordinator
        .create_reservation(request(product_id, "M", span((2026, 6, 3), (2026, 6, 6))))
        .await
        .unwrap();

    let booked = oracle(&h.store).booked_dates(product_id, "M").await.unwrap();
    let expected: Vec<_> = span((2026, 6, 1), (2026, 6, 6)).iter_days().collect();
    assert_eq!(booked, expected);

    // Other sizes and unknown products stay empty.
    assert!(oracle(&h.store)
        .booked_dates(product_id, "L")
        .await
        .unwrap()
        .is_empty());
    assert!(oracle(&h.store)
        .booked_dates(Uuid::new_v4(), "M")
        .await
        .unwrap()
        .is_empty());
}
