use crate::errors::CrmError;
use crate::services::custom_fields::{EntityKind, FieldDefinition, FieldUpdate, FieldValueSnapshot};
use async_trait::async_trait;

/// The three CRM calls the custom-field engine depends on.
#[async_trait]
pub trait CrmTransport: Send + Sync {
    /// Populated custom fields of one entity. Idempotent.
    async fn fetch_entity_fields(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<FieldValueSnapshot, CrmError>;

    /// Every custom field definition of an entity kind. Idempotent.
    async fn fetch_field_catalog(&self, kind: EntityKind)
        -> Result<Vec<FieldDefinition>, CrmError>;

    /// Writes one batch of custom field values. Not idempotent; callers issue
    /// it at most once per batch.
    async fn apply_field_update(
        &self,
        kind: EntityKind,
        entity_id: i64,
        payload: &[FieldUpdate],
    ) -> Result<(), CrmError>;
}
