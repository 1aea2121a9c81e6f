use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use booking_core::{LineItem, Order, Product, Reservation};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub rent_price: BigDecimal,
    pub security_deposit: BigDecimal,
    pub total_quantity: i32,
    pub sizes: Vec<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            rent_price: row.rent_price,
            security_deposit: row.security_deposit,
            total_quantity: row.total_quantity,
            sizes: row.sizes,
            active: row.active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrderRow<'a> {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: &'a str,
    pub total_price: &'a BigDecimal,
    pub deposit_total: &'a BigDecimal,
    pub address: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a Order> for NewOrderRow<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status.as_str(),
            total_price: &order.total_price,
            deposit_total: &order.deposit_total,
            address: &order.address,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewLineItemRow<'a> {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: &'a BigDecimal,
    pub size: &'a str,
}

impl<'a> From<&'a LineItem> for NewLineItemRow<'a> {
    fn from(item: &'a LineItem) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: &item.price,
            size: &item.size,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::rental_bookings)]
pub struct NewBookingRow<'a> {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub product_id: Uuid,
    pub size: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a Reservation> for NewBookingRow<'a> {
    fn from(reservation: &'a Reservation) -> Self {
        Self {
            id: reservation.id,
            order_item_id: reservation.line_item_id,
            product_id: reservation.product_id,
            size: &reservation.size,
            start_date: reservation.span.start(),
            end_date: reservation.span.end(),
            status: reservation.status.as_str(),
            created_at: reservation.created_at,
        }
    }
}
