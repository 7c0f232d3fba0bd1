use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

use serde_json::Value;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
    alias_map: HashMap<String, String>,
}

#[derive(Clone)]
pub(crate) struct ToolCallMeta {
    pub started_at: i64,
    pub trace_id: String,
    pub span_id: String,
    pub invoked_as: Option<String>,
}

impl ToolExecutor {
    pub fn new(
        logger: Logger,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
        alias_map: HashMap<String, String>,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
            alias_map,
        }
    }

    fn resolve_alias(&self, tool: &str) -> (String, Option<String>) {
        if self.handlers.contains_key(tool) {
            return (tool.to_string(), None);
        }
        if let Some(mapped) = self.alias_map.get(tool) {
            return (mapped.clone(), Some(tool.to_string()));
        }
        (tool.to_string(), None)
    }

    fn strip_args_for_handler(&self, args: &Value) -> Value {
        let mut cleaned = args.clone();
        if let Value::Object(map) = &mut cleaned {
            map.remove("trace_id");
            map.remove("span_id");
        }
        cleaned
    }

    pub(crate) fn wrap_result(&self, tool: &str, args: &Value, result: Value, meta: ToolCallMeta) -> Value {
        let ToolCallMeta {
            started_at,
            trace_id,
            span_id,
            invoked_as,
        } = meta;
        serde_json::json!({
            "ok": true,
            "result": result,
            "meta": {
                "tool": tool,
                "action": args.get("action").cloned().unwrap_or(Value::Null),
                "trace_id": trace_id,
                "span_id": span_id,
                "duration_ms": chrono::Utc::now().timestamp_millis() - started_at,
                "invoked_as": invoked_as,
            },
        })
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let started_at = chrono::Utc::now().timestamp_millis();
        let (resolved_tool, invoked_as) = self.resolve_alias(tool);
        let Some(handler) = self.handlers.get(&resolved_tool) else {
            let candidates: Vec<String> = self
                .handlers
                .keys()
                .cloned()
                .chain(self.alias_map.keys().cloned())
                .collect();
            let suggestions = suggest(tool, &candidates, 6);
            let hint = if suggestions.is_empty() {
                "Call tools/list to see available tools".to_string()
            } else {
                format!("Did you mean: {}", suggestions.join(", "))
            };
            return Err(
                ToolError::invalid_params(format!("Unknown tool: {}", tool)).with_hint(hint)
            );
        };

        let trace_id = args
            .get("trace_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span_id = args
            .get("span_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.logger.debug(
            "Tool call",
            Some(&serde_json::json!({
                "tool": resolved_tool,
                "action": args.get("action"),
                "trace_id": trace_id,
                "invoked_as": invoked_as,
            })),
        );

        let result = handler.handle(self.strip_args_for_handler(&args)).await?;
        Ok(self.wrap_result(
            &resolved_tool,
            &args,
            result,
            ToolCallMeta {
                started_at,
                trace_id,
                span_id,
                invoked_as,
            },
        ))
    }
}
