diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        rent_price -> Numeric,
        security_deposit -> Numeric,
        total_quantity -> Int4,
        sizes -> Array<Text>,
        active -> Bool,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        customer_id -> Uuid,
        status -> Varchar,
        total_price -> Numeric,
        deposit_total -> Numeric,
        address -> Text,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        product_id -> Uuid,
        quantity -> Int4,
        price -> Numeric,
        size -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    rental_bookings (id) {
        id -> Uuid,
        order_item_id -> Uuid,
        product_id -> Uuid,
        size -> Varchar,
        start_date -> Date,
        end_date -> Date,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_items -> products (product_id));
diesel::joinable!(rental_bookings -> order_items (order_item_id));
diesel::joinable!(rental_bookings -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(products, orders, order_items, rental_bookings,);
