//! Custom field updates addressed by name, code or id.
//!
//! The flow per call is read, decide, write: fetch the entity snapshot and the
//! field catalog once, resolve and match every entry without side effects, then
//! send at most one batched update.

mod builder;
mod matcher;
mod model;
mod resolver;

pub use builder::{build, BatchPlan, FieldDecision, FieldIdOrigin};
pub use matcher::{
    cascade, find_definition, match_in_definition, match_option, normalize_text, CascadeStep,
    MatchRule, MatchedOption, OptionMatch,
};
pub use model::{
    BatchUpdateOutcome, EntityKind, EnumOption, FieldDefinition, FieldEntry, FieldError,
    FieldInput, FieldKey, FieldUpdate, FieldValueSnapshot, PopulatedField, ResolutionSource,
    ResolvedField, StoredValue, UpdateReport, UpdateValue,
};
pub use resolver::{parse_literal_id, resolve};

use crate::constants::limits::MAX_FIELDS_PER_BATCH;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::metadata::MetadataFetcher;
use crate::services::transport::CrmTransport;
use serde::Serialize;
use std::sync::Arc;

/// Dry-run result: what `update` would send, without sending it.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub entity: EntityKind,
    pub entity_id: i64,
    pub would_update: usize,
    pub payload: Vec<FieldUpdate>,
    pub decisions: Vec<FieldDecision>,
    pub errors: Vec<FieldError>,
    pub populated_fields: usize,
    pub catalog_fields: usize,
}

#[derive(Clone)]
pub struct CustomFieldService {
    logger: Logger,
    metadata: MetadataFetcher,
    transport: Arc<dyn CrmTransport>,
}

impl CustomFieldService {
    pub fn new(logger: Logger, transport: Arc<dyn CrmTransport>) -> Self {
        let logger = logger.child("custom_fields");
        Self {
            metadata: MetadataFetcher::new(logger.clone(), transport.clone()),
            logger,
            transport,
        }
    }

    pub fn metadata(&self) -> &MetadataFetcher {
        &self.metadata
    }

    /// Updates custom fields of one entity, keyed by name, code or id.
    ///
    /// Fields that cannot be resolved or matched are reported per key and do
    /// not stop the others from being written. If the write itself fails the
    /// report says nothing was updated.
    pub async fn update_fields_by_name_or_id(
        &self,
        kind: EntityKind,
        entity_id: i64,
        entries: &[FieldEntry],
    ) -> Result<UpdateReport, ToolError> {
        validate_request(entity_id, entries)?;
        let plan = self.plan(kind, entity_id, entries).await?;

        if plan.payload.is_empty() {
            self.logger.info(
                "No fields resolved; update skipped",
                Some(&serde_json::json!({
                    "entity": kind,
                    "entity_id": entity_id,
                    "errors": plan.outcome.errors().len(),
                })),
            );
            return Ok(UpdateReport {
                success: false,
                updated_fields: 0,
                errors: plan.outcome.into_errors(),
                error: Some("None of the requested fields could be resolved".to_string()),
            });
        }

        match self
            .transport
            .apply_field_update(kind, entity_id, &plan.payload)
            .await
        {
            Ok(()) => {
                let updated = plan.outcome.resolved_count();
                self.logger.info(
                    "Custom fields updated",
                    Some(&serde_json::json!({
                        "entity": kind,
                        "entity_id": entity_id,
                        "updated": updated,
                        "errors": plan.outcome.errors().len(),
                    })),
                );
                Ok(UpdateReport {
                    success: true,
                    updated_fields: updated,
                    errors: plan.outcome.into_errors(),
                    error: None,
                })
            }
            Err(err) => {
                let failure = ToolError::from(err);
                self.logger.error(
                    "Custom field update rejected",
                    Some(&serde_json::json!({
                        "entity": kind,
                        "entity_id": entity_id,
                        "code": failure.code,
                        "error": failure.message,
                    })),
                );
                let mut errors = plan.outcome.errors().to_vec();
                for decision in &plan.decisions {
                    errors.push(FieldError::new(
                        decision.field.clone(),
                        format!("Update not applied: {}", failure.message),
                    ));
                }
                Ok(UpdateReport {
                    success: false,
                    updated_fields: 0,
                    errors,
                    error: Some(failure.message),
                })
            }
        }
    }

    /// Same resolution as an update, but never writes.
    pub async fn preview(
        &self,
        kind: EntityKind,
        entity_id: i64,
        entries: &[FieldEntry],
    ) -> Result<PreviewReport, ToolError> {
        validate_request(entity_id, entries)?;
        let inputs = self.metadata.batch_inputs(kind, entity_id).await?;
        let plan = build(entries, &inputs.snapshot, &inputs.catalog);
        Ok(PreviewReport {
            entity: kind,
            entity_id,
            would_update: plan.outcome.resolved_count(),
            errors: plan.outcome.errors().to_vec(),
            payload: plan.payload,
            decisions: plan.decisions,
            populated_fields: inputs.snapshot.len(),
            catalog_fields: inputs.catalog.len(),
        })
    }

    async fn plan(
        &self,
        kind: EntityKind,
        entity_id: i64,
        entries: &[FieldEntry],
    ) -> Result<BatchPlan, ToolError> {
        let inputs = self.metadata.batch_inputs(kind, entity_id).await?;
        let plan = build(entries, &inputs.snapshot, &inputs.catalog);
        for decision in &plan.decisions {
            self.logger.debug(
                "Field resolved",
                Some(&serde_json::json!({
                    "field": decision.field,
                    "field_id": decision.field_id,
                    "origin": decision.origin,
                    "match_rule": decision.match_rule,
                })),
            );
        }
        for error in plan.outcome.errors() {
            self.logger.debug(
                "Field skipped",
                Some(&serde_json::json!({"field": error.field, "reason": error.message})),
            );
        }
        Ok(plan)
    }
}

fn validate_request(entity_id: i64, entries: &[FieldEntry]) -> Result<(), ToolError> {
    if entity_id <= 0 {
        return Err(ToolError::invalid_params(
            "entity_id must be a positive integer",
        ));
    }
    if entries.is_empty() {
        return Err(ToolError::invalid_params("fields must contain at least one entry")
            .with_hint("Example: { fields: { \"City\": \"Bogotá\", \"123456\": \"text\" } }"));
    }
    if entries.len() > MAX_FIELDS_PER_BATCH {
        return Err(ToolError::invalid_params(format!(
            "fields accepts at most {} entries per call, got {}",
            MAX_FIELDS_PER_BATCH,
            entries.len()
        )));
    }
    if let Some(blank) = entries
        .iter()
        .position(|entry| matches!(&entry.key, FieldKey::Text(text) if text.trim().is_empty()))
    {
        return Err(ToolError::invalid_params(format!(
            "fields entry #{} has an empty field name",
            blank + 1
        )));
    }
    if let Some(empty) = entries
        .iter()
        .find(|entry| matches!(&entry.value, FieldInput::List(items) if items.is_empty()))
    {
        return Err(ToolError::invalid_params(format!(
            "fields value for '{}' must not be an empty array",
            empty.key
        )));
    }
    Ok(())
}
