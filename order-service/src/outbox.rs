use anyhow::Result;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use rdkafka::producer::{FutureProducer, FutureRecord};
use shared::OutboxEvent;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

use crate::error::ServiceError;
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

/// Record an event inside the caller's transaction.
pub async fn record(conn: &mut AsyncPgConnection, event: OutboxEvent) -> Result<(), ServiceError> {
    diesel::insert_into(outbox_events::table)
        .values(&DbOutboxEvent::from(event))
        .execute(conn)
        .await?;
    Ok(())
}

/// Ships recorded ledger events to Kafka and marks them processed.
pub struct OutboxProcessor {
    pool: DbPool,
    producer: FutureProducer,
    poll_interval: Duration,
}

impl OutboxProcessor {
    pub fn new(pool: DbPool, producer: FutureProducer, poll_interval: Duration) -> Self {
        Self {
            pool,
            producer,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.process_outbox_events().await {
                error!("Error processing outbox events: {}", e);
            }
        }
    }

    async fn process_outbox_events(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;

        let unprocessed_events = outbox_events::table
            .filter(outbox_events::processed.eq(false))
            .order(outbox_events::created_at.asc())
            .limit(100)
            .load::<DbOutboxEvent>(&mut conn)
            .await?;

        for event in unprocessed_events {
            if let Err(e) = self.publish_event(&event).await {
                error!(event_id = %event.id, "Failed to publish event: {}", e);
                continue;
            }

            diesel::update(outbox_events::table.filter(outbox_events::id.eq(event.id)))
                .set(outbox_events::processed.eq(true))
                .execute(&mut conn)
                .await?;

            info!(event_id = %event.id, event_type = %event.event_type, "Published outbox event");
        }

        Ok(())
    }

    async fn publish_event(&self, event: &DbOutboxEvent) -> Result<()> {
        let topic = match event.aggregate.as_str() {
            "order" => "order-events",
            "return" => "return-events",
            _ => "domain-events",
        };

        let json = serde_json::to_string(&serde_json::json!({
            "id": event.id,
            "type": event.event_type,
            "aggregate_id": event.aggregate_id,
            "data": event.event_data,
            "created_at": event.created_at,
        }))?;
        let key = event.aggregate_id.to_string();
        let record = FutureRecord::to(topic).payload(&json).key(&key);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to publish event: {}", e))?;

        Ok(())
    }
}
