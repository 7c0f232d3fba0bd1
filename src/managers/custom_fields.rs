use crate::errors::ToolError;
use crate::services::custom_fields::CustomFieldService;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const CUSTOM_FIELD_ACTIONS: &[&str] = &["update", "preview", "catalog", "snapshot"];

#[derive(Clone)]
pub struct CustomFieldManager {
    logger: Logger,
    validation: Validation,
    service: Arc<CustomFieldService>,
}

impl CustomFieldManager {
    pub fn new(logger: Logger, validation: Validation, service: Arc<CustomFieldService>) -> Self {
        Self {
            logger: logger.child("custom_fields"),
            validation,
            service,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "update" => self.update(&args).await,
            "preview" => self.preview(&args).await,
            "catalog" => self.catalog(&args).await,
            "snapshot" => self.snapshot(&args).await,
            _ => Err(unknown_action_error(
                "kommo_custom_fields",
                action,
                CUSTOM_FIELD_ACTIONS,
            )),
        }
    }

    async fn update(&self, args: &Value) -> Result<Value, ToolError> {
        let kind = self.validation.ensure_entity_kind(args.get("entity"))?;
        let entity_id = self
            .validation
            .ensure_positive_id(args.get("entity_id"), "entity_id")?;
        let entries = self.validation.ensure_field_entries(args.get("fields"))?;
        let report = self
            .service
            .update_fields_by_name_or_id(kind, entity_id, &entries)
            .await?;
        to_value(&report)
    }

    async fn preview(&self, args: &Value) -> Result<Value, ToolError> {
        let kind = self.validation.ensure_entity_kind(args.get("entity"))?;
        let entity_id = self
            .validation
            .ensure_positive_id(args.get("entity_id"), "entity_id")?;
        let entries = self.validation.ensure_field_entries(args.get("fields"))?;
        let report = self.service.preview(kind, entity_id, &entries).await?;
        to_value(&report)
    }

    async fn catalog(&self, args: &Value) -> Result<Value, ToolError> {
        let kind = self.validation.ensure_entity_kind(args.get("entity"))?;
        let only_enumerated = self.validation.ensure_optional_bool(
            args.get("only_enumerated"),
            "only_enumerated",
            false,
        )?;
        let definitions: Vec<_> = self
            .service
            .metadata()
            .catalog(kind)
            .await?
            .into_iter()
            .filter(|definition| !only_enumerated || definition.is_enumerated())
            .collect();
        Ok(serde_json::json!({
            "entity": kind,
            "count": definitions.len(),
            "fields": definitions,
        }))
    }

    async fn snapshot(&self, args: &Value) -> Result<Value, ToolError> {
        let kind = self.validation.ensure_entity_kind(args.get("entity"))?;
        let entity_id = self
            .validation
            .ensure_positive_id(args.get("entity_id"), "entity_id")?;
        let snapshot = self.service.metadata().snapshot(kind, entity_id).await?;
        Ok(serde_json::json!({
            "entity": kind,
            "entity_id": entity_id,
            "count": snapshot.len(),
            "fields": snapshot.fields(),
        }))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|err| ToolError::internal(format!("Failed to serialize result: {}", err)))
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for CustomFieldManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
