//! PostgreSQL canonical store
//!
//! Each instance is its own table (`processed_observations_blue`,
//! `processed_observations_green`); the `active_instance` table holds a
//! single row naming the active one. Observations are stored as JSONB
//! documents keyed by observation id, with a sequence column preserving
//! first-write order for readers.

use async_trait::async_trait;
use sos_common::Page;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

use crate::framework::storage::{
    Instance, ObservationReader, ObservationSink, ProviderDataAdmin, StoreError,
};
use crate::processor::ProcessedObservation;
use crate::providers::ProviderId;

fn table(instance: Instance) -> &'static str {
    match instance {
        Instance::Blue => "processed_observations_blue",
        Instance::Green => "processed_observations_green",
    }
}

fn provider_key(provider_id: ProviderId) -> Result<i32, StoreError> {
    i32::try_from(provider_id.0)
        .map_err(|_| StoreError::Permanent(format!("Provider id {} out of range", provider_id)))
}

fn parse_instance(name: &str) -> Result<Instance, StoreError> {
    match name {
        "blue" => Ok(Instance::Blue),
        "green" => Ok(Instance::Green),
        other => Err(StoreError::Permanent(format!("Unknown instance name: {}", other))),
    }
}

#[derive(Clone)]
pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Permanent(format!("Migration failed: {}", e)))?;

        info!("Connected to observation store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ObservationSink for PgObservationStore {
    async fn write_many(
        &self,
        instance: Instance,
        provider_id: ProviderId,
        observations: &[ProcessedObservation],
    ) -> Result<usize, StoreError> {
        let provider = provider_key(provider_id)?;
        let statement = format!(
            r#"
            INSERT INTO {} (id, provider_id, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                provider_id = excluded.provider_id,
                document = excluded.document
            "#,
            table(instance)
        );

        let mut tx = self.pool.begin().await?;
        for observation in observations {
            sqlx::query(&statement)
                .bind(&observation.id)
                .bind(provider)
                .bind(Json(observation))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(instance = %instance, provider_id = %provider_id, rows = observations.len(), "Wrote observations");
        Ok(observations.len())
    }
}

#[async_trait]
impl ProviderDataAdmin for PgObservationStore {
    async fn active_instance(&self) -> Result<Instance, StoreError> {
        let row = sqlx::query("SELECT instance FROM active_instance WHERE singleton")
            .fetch_one(&self.pool)
            .await?;
        let name: String = row.try_get("instance")?;
        parse_instance(&name)
    }

    async fn copy_provider_data(
        &self,
        provider_id: ProviderId,
        from: Instance,
        to: Instance,
    ) -> Result<u64, StoreError> {
        let provider = provider_key(provider_id)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE provider_id = $1", table(to)))
            .bind(provider)
            .execute(&mut *tx)
            .await?;

        let copied = sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, provider_id, document)
            SELECT id, provider_id, document FROM {}
            WHERE provider_id = $1
            ORDER BY seq
            "#,
            table(to),
            table(from)
        ))
        .bind(provider)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(copied)
    }

    async fn delete_provider_data(
        &self,
        provider_id: ProviderId,
        instance: Instance,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE provider_id = $1", table(instance)))
            .bind(provider_key(provider_id)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn provider_ids(&self, instance: Instance) -> Result<Vec<ProviderId>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT DISTINCT provider_id FROM {} ORDER BY provider_id",
            table(instance)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: i32 = row.try_get("provider_id")?;
                u32::try_from(id)
                    .map(ProviderId)
                    .map_err(|_| StoreError::Permanent(format!("Negative provider id {}", id)))
            })
            .collect()
    }

    async fn activate_instance(&self, instance: Instance) -> Result<(), StoreError> {
        sqlx::query("UPDATE active_instance SET instance = $1, activated_at = NOW() WHERE singleton")
            .bind(instance.as_str())
            .execute(&self.pool)
            .await?;
        info!(instance = %instance, "Activated instance");
        Ok(())
    }
}

#[async_trait]
impl ObservationReader for PgObservationStore {
    async fn get_processed_batch(
        &self,
        instance: Instance,
        page: Page,
    ) -> Result<Vec<ProcessedObservation>, StoreError> {
        let offset = i64::try_from(page.skip).unwrap_or(i64::MAX);
        let limit = i64::try_from(page.take).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT document FROM {} ORDER BY provider_id, seq OFFSET $1 LIMIT $2",
            table(instance)
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let Json(observation): Json<ProcessedObservation> = row.try_get("document")?;
                Ok(observation)
            })
            .collect()
    }
}
