diesel::table! {
    customers (id) {
        id -> Uuid,
        name -> Varchar,
        district -> Nullable<Varchar>,
        wallet_balance -> Numeric,
        active_units -> Int4,
        home_stock_ml -> Int8,
        order_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    zones (district, name) {
        district -> Varchar,
        name -> Varchar,
        postal_codes -> Array<Text>,
        landmarks -> Array<Text>,
        active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    staff (id) {
        id -> Uuid,
        name -> Varchar,
        role -> Varchar,
        district -> Varchar,
        zones -> Array<Text>,
        active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        customer_id -> Uuid,
        items -> Jsonb,
        subtotal -> Numeric,
        delivery_fee -> Numeric,
        deposit_fee -> Numeric,
        discount -> Numeric,
        total_amount -> Numeric,
        status -> Varchar,
        delivery_date -> Date,
        district -> Varchar,
        state -> Nullable<Varchar>,
        city -> Nullable<Varchar>,
        address_line -> Text,
        postal_code -> Nullable<Varchar>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        payment_method -> Varchar,
        returned_units -> Int4,
        assigned_agent_id -> Nullable<Uuid>,
        zone_name -> Nullable<Varchar>,
        created_at -> Timestamptz,
        shipped_at -> Nullable<Timestamptz>,
        delivered_at -> Nullable<Timestamptz>,
        cancelled_at -> Nullable<Timestamptz>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    return_requests (id) {
        id -> Uuid,
        customer_id -> Uuid,
        district -> Varchar,
        address_line -> Text,
        city -> Nullable<Varchar>,
        state -> Nullable<Varchar>,
        postal_code -> Nullable<Varchar>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        pickup_date -> Date,
        unit_count -> Int4,
        refund_amount -> Numeric,
        status -> Varchar,
        zone_name -> Nullable<Varchar>,
        assigned_agent_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        refunded_at -> Nullable<Timestamptz>,
        cancelled_at -> Nullable<Timestamptz>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    outbox_events (id) {
        id -> Uuid,
        aggregate -> Varchar,
        aggregate_id -> Uuid,
        event_type -> Varchar,
        event_data -> Jsonb,
        processed -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    customers,
    orders,
    outbox_events,
    return_requests,
    staff,
    zones,
);
