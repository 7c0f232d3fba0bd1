use crate::errors::ToolError;
use crate::managers;
use crate::mcp::catalog::tool_catalog;
use crate::services::custom_fields::CustomFieldService;
use crate::services::kommo_client::KommoClient;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::transport::CrmTransport;
use crate::services::validation::Validation;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
    pub custom_fields: Arc<CustomFieldService>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
        alias_map: &HashMap<String, String>,
    ) -> Result<(), ToolError> {
        let mut missing = Vec::new();
        for tool in tool_catalog().iter() {
            if handlers.contains_key(&tool.name) {
                continue;
            }
            if alias_map.contains_key(&tool.name) {
                continue;
            }
            missing.push(tool.name.clone());
        }
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete").with_hint(
            "This is a server wiring bug: every tool in tool_catalog.json must have a handler or an alias_map entry."
                .to_string(),
        )
        .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("kommo");
        let settings = Settings::from_env()?;
        if !settings.is_configured() {
            logger.warn(
                "Kommo credentials are not configured; tool calls will fail until KOMMO_ACCESS_TOKEN and KOMMO_BASE_URL or KOMMO_SUBDOMAIN are set",
                None,
            );
        }
        let client = KommoClient::new(logger.clone(), settings).map_err(ToolError::from)?;
        Self::with_transport(logger, Arc::new(client))
    }

    /// Wires every tool on top of an arbitrary CRM transport.
    pub fn with_transport(
        logger: Logger,
        transport: Arc<dyn CrmTransport>,
    ) -> Result<Self, ToolError> {
        let validation = Validation::new();
        let custom_fields = Arc::new(CustomFieldService::new(logger.clone(), transport));
        let custom_field_manager = Arc::new(managers::custom_fields::CustomFieldManager::new(
            logger.clone(),
            validation,
            custom_fields.clone(),
        ));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("kommo_custom_fields".to_string(), custom_field_manager);

        let alias_map = crate::mcp::aliases::builtin_tool_alias_map_owned();

        Self::validate_tool_wiring(&handlers, &alias_map)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers, alias_map));

        Ok(Self {
            logger,
            tool_executor,
            custom_fields,
        })
    }
}
