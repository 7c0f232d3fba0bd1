pub mod custom_fields;
pub mod kommo_client;
pub mod logger;
pub mod metadata;
pub mod settings;
pub mod tool_executor;
pub mod transport;
pub mod validation;
