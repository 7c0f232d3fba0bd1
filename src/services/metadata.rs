use crate::errors::ToolError;
use crate::services::custom_fields::{EntityKind, FieldDefinition, FieldValueSnapshot};
use crate::services::logger::Logger;
use crate::services::transport::CrmTransport;
use std::sync::Arc;

/// Snapshot and catalog fetched together for one batch.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub snapshot: FieldValueSnapshot,
    pub catalog: Vec<FieldDefinition>,
}

#[derive(Clone)]
pub struct MetadataFetcher {
    logger: Logger,
    transport: Arc<dyn CrmTransport>,
}

impl MetadataFetcher {
    pub fn new(logger: Logger, transport: Arc<dyn CrmTransport>) -> Self {
        Self {
            logger: logger.child("metadata"),
            transport,
        }
    }

    pub async fn snapshot(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<FieldValueSnapshot, ToolError> {
        let snapshot = self
            .transport
            .fetch_entity_fields(kind, entity_id)
            .await
            .map_err(|err| {
                self.logger.warn(
                    "Snapshot fetch failed",
                    Some(&serde_json::json!({
                        "entity": kind,
                        "entity_id": entity_id,
                        "error": err.to_string(),
                    })),
                );
                ToolError::from(err)
            })?;
        self.logger.debug(
            "Snapshot fetched",
            Some(&serde_json::json!({
                "entity": kind,
                "entity_id": entity_id,
                "populated_fields": snapshot.len(),
            })),
        );
        Ok(snapshot)
    }

    pub async fn catalog(&self, kind: EntityKind) -> Result<Vec<FieldDefinition>, ToolError> {
        let catalog = self
            .transport
            .fetch_field_catalog(kind)
            .await
            .map_err(|err| {
                self.logger.warn(
                    "Catalog fetch failed",
                    Some(&serde_json::json!({"entity": kind, "error": err.to_string()})),
                );
                ToolError::from(err)
            })?;
        self.logger.debug(
            "Catalog fetched",
            Some(&serde_json::json!({"entity": kind, "definitions": catalog.len()})),
        );
        Ok(catalog)
    }

    /// One snapshot read and one catalog read, in that order.
    pub async fn batch_inputs(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<BatchInputs, ToolError> {
        let snapshot = self.snapshot(kind, entity_id).await?;
        let catalog = self.catalog(kind).await?;
        Ok(BatchInputs { snapshot, catalog })
    }
}
