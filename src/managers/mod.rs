pub mod custom_fields;
