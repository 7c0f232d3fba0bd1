use crate::errors::ToolError;
use crate::utils::suggest::suggest;
use serde_json::Value;

/// Error for an `action` the tool does not implement, with close matches.
pub fn unknown_action_error(tool: &str, action: Option<&Value>, known_actions: &[&str]) -> ToolError {
    let action_value = action
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let known: Vec<String> = known_actions.iter().map(|s| s.to_string()).collect();
    let suggestions = suggest(&action_value, &known, 3);

    let mut hint = format!("Use one of: {}.", known.join(", "));
    if !suggestions.is_empty() {
        hint = format!("Did you mean: {}? {}", suggestions.join(", "), hint);
    }

    let message = if action_value.is_empty() {
        format!("{} requires an action", tool)
    } else {
        format!("Unknown {} action: {}", tool, action_value)
    };
    ToolError::invalid_params(message)
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_actions": known,
            "did_you_mean": suggestions,
        }))
}
