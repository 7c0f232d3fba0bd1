#![allow(dead_code)]

use async_trait::async_trait;
use kommo_mcp::errors::CrmError;
use kommo_mcp::services::custom_fields::{
    EntityKind, EnumOption, FieldDefinition, FieldUpdate, FieldValueSnapshot, PopulatedField,
};
use kommo_mcp::services::transport::CrmTransport;
use once_cell::sync::Lazy;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Snapshot(EntityKind, i64),
    Catalog(EntityKind),
    Update(EntityKind, i64, Vec<FieldUpdate>),
}

/// In-memory CRM that records every call it receives.
pub struct FakeTransport {
    snapshot: FieldValueSnapshot,
    catalog: Vec<FieldDefinition>,
    reject_update_with: Option<u16>,
    calls: StdMutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new(snapshot: FieldValueSnapshot, catalog: Vec<FieldDefinition>) -> Self {
        Self {
            snapshot,
            catalog,
            reject_update_with: None,
            calls: StdMutex::new(Vec::new()),
        }
    }

    pub fn lead_fixture() -> Self {
        Self::new(lead_snapshot(), lead_catalog())
    }

    pub fn rejecting_updates(mut self, status: u16) -> Self {
        self.reject_update_with = Some(status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn updates(&self) -> Vec<Vec<FieldUpdate>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update(_, _, payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn catalog_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Catalog(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl CrmTransport for FakeTransport {
    async fn fetch_entity_fields(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<FieldValueSnapshot, CrmError> {
        self.record(Call::Snapshot(kind, entity_id));
        Ok(self.snapshot.clone())
    }

    async fn fetch_field_catalog(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<FieldDefinition>, CrmError> {
        self.record(Call::Catalog(kind));
        Ok(self.catalog.clone())
    }

    async fn apply_field_update(
        &self,
        kind: EntityKind,
        entity_id: i64,
        payload: &[FieldUpdate],
    ) -> Result<(), CrmError> {
        self.record(Call::Update(kind, entity_id, payload.to_vec()));
        match self.reject_update_with {
            Some(status) => Err(CrmError::Status {
                status,
                method: "PATCH".to_string(),
                path: format!("/{}/{}", kind, entity_id),
                detail: "Request validation failed".to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub fn populated(field_id: i64, name: &str, field_type: &str) -> PopulatedField {
    PopulatedField {
        field_id,
        field_name: Some(name.to_string()),
        field_code: None,
        field_type: Some(field_type.to_string()),
        values: Vec::new(),
    }
}

pub fn option(enum_id: i64, value: &str, sort_order: i64) -> EnumOption {
    EnumOption {
        enum_id,
        value: value.to_string(),
        sort_order,
    }
}

pub fn definition(
    id: i64,
    name: &str,
    field_type: &str,
    options: Vec<EnumOption>,
) -> FieldDefinition {
    FieldDefinition {
        id,
        name: name.to_string(),
        code: None,
        field_type: field_type.to_string(),
        enum_options: options,
    }
}

/// Lead with "Nombre" and "City" set; "Interests" exists but was never set.
pub fn lead_snapshot() -> FieldValueSnapshot {
    FieldValueSnapshot::new(vec![
        populated(100, "Nombre", "text"),
        populated(501, "City", "select"),
    ])
}

pub fn lead_catalog() -> Vec<FieldDefinition> {
    vec![
        definition(100, "Nombre", "text", Vec::new()),
        definition(
            501,
            "City",
            "select",
            vec![
                option(1001, "Bogotá", 10),
                option(1002, "Medellín", 20),
                option(1003, "Cali", 30),
            ],
        ),
        definition(
            700,
            "Interests",
            "multiselect",
            vec![option(7001, "Real estate", 1), option(7002, "Insurance", 2)],
        ),
    ]
}
