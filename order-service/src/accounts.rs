use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::{AccountDelta, CustomerAccount, LedgerError};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::DbCustomer;
use crate::schema::customers;

/// Load and row-lock a customer for the rest of the transaction.
pub async fn lock_customer(conn: &mut AsyncPgConnection, customer_id: Uuid) -> Result<CustomerAccount, ServiceError> {
    let row = customers::table
        .find(customer_id)
        .for_update()
        .first::<DbCustomer>(conn)
        .await
        .optional()?
        .ok_or_else(|| LedgerError::customer_not_found(customer_id))?;
    Ok(row.into())
}

/// Apply a ledger delta with in-database arithmetic, so concurrent
/// transitions for the same customer never overwrite each other.
pub async fn apply_delta(
    conn: &mut AsyncPgConnection,
    customer_id: Uuid,
    delta: &AccountDelta,
) -> Result<(), ServiceError> {
    if delta.is_empty() {
        return Ok(());
    }

    let updated = diesel::update(customers::table.find(customer_id))
        .set((
            customers::wallet_balance.eq(customers::wallet_balance + delta.wallet.clone()),
            customers::active_units.eq(customers::active_units + delta.active_units),
            customers::home_stock_ml.eq(customers::home_stock_ml + delta.home_stock_ml),
            customers::order_count.eq(customers::order_count + delta.order_count),
            customers::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

    // a missing customer must abort the surrounding transition
    if updated == 0 {
        return Err(LedgerError::customer_not_found(customer_id).into());
    }
    Ok(())
}
