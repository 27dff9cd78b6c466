//! Entity synchronization commands

use anyhow::{Context, Result};
use connector_lib::{
    ConnectorConfig, CustomerGateway, EntityId, EntityStore, EventSink, Gateway, MemoryStore,
    SyncEntity,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{color_outcome, print_success, print_table, print_warning, OutputFormat};

/// Row for the push results table
#[derive(Debug, Tabled, Serialize)]
struct PushRow {
    #[tabled(rename = "Entity")]
    entity: EntityId,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Remote ID")]
    remote_id: String,
}

fn select_customers(store: &MemoryStore, ids: &[EntityId]) -> Result<Vec<SyncEntity>> {
    if ids.is_empty() {
        return Ok(store.entities_of_type("customer"));
    }
    ids.iter()
        .map(|id| {
            store
                .get(*id)
                .with_context(|| format!("Entity {} is not in the store", id))
        })
        .collect()
}

/// Push customers from a store snapshot file
pub async fn push(
    config: &ConnectorConfig,
    events: Arc<dyn EventSink>,
    store_path: &Path,
    ids: &[EntityId],
    save: bool,
    format: OutputFormat,
) -> Result<()> {
    let store = Arc::new(
        MemoryStore::load(store_path)
            .with_context(|| format!("Failed to load store {}", store_path.display()))?,
    );
    let entities = select_customers(&store, ids)?;

    let mut gateway = CustomerGateway::from_config(config, store.clone(), events);
    gateway.init("customer").await?;

    let mut rows = Vec::with_capacity(entities.len());
    let mut failures = 0;
    for entity in &entities {
        let existing = store.local_id(gateway.node(), entity)?;
        let attributes = entity.attribute_names();
        let pushed = gateway.write_updates(entity, &attributes).await?;
        let remote_id = store.local_id(gateway.node(), entity)?;

        let outcome = match (pushed, existing.is_some()) {
            (false, _) => "failed",
            (true, true) => "updated",
            (true, false) => "created",
        };
        if !pushed {
            failures += 1;
        }
        rows.push(PushRow {
            entity: entity.id,
            email: entity.unique_id.clone(),
            outcome: match format {
                OutputFormat::Table => color_outcome(outcome),
                OutputFormat::Json => outcome.to_string(),
            },
            remote_id: remote_id.unwrap_or_default(),
        });
    }

    print_table(&rows, format);

    if save {
        store
            .save(store_path)
            .with_context(|| format!("Failed to save store {}", store_path.display()))?;
    }

    if let OutputFormat::Table = format {
        if failures > 0 {
            print_warning(&format!(
                "{} of {} pushes failed, see the log for details",
                failures,
                rows.len()
            ));
        } else if !rows.is_empty() {
            print_success(&format!("{} customers pushed", rows.len()));
        }
        if save {
            print_success(&format!("Linkages saved to {}", store_path.display()));
        }
    }

    Ok(())
}

/// Run the pull direction for customers
pub async fn retrieve(
    config: &ConnectorConfig,
    events: Arc<dyn EventSink>,
    format: OutputFormat,
) -> Result<()> {
    let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
    let mut gateway = CustomerGateway::from_config(config, store, events);
    gateway.init("customer").await?;
    let count = gateway.retrieve_entities().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "retrieved": count })),
        OutputFormat::Table => print_success(&format!("{} customers retrieved", count)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(SyncEntity::new(1, "customer", "a@example.com")).unwrap();
        store.insert(SyncEntity::new(2, "address", "addr")).unwrap();
        store.insert(SyncEntity::new(3, "customer", "b@example.com")).unwrap();
        store
    }

    #[test]
    fn test_select_all_customers_by_default() {
        let selected = select_customers(&store(), &[]).unwrap();
        let ids: Vec<_> = selected.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_select_explicit_ids() {
        let selected = select_customers(&store(), &[3]).unwrap();
        assert_eq!(selected[0].unique_id, "b@example.com");
        assert!(select_customers(&store(), &[42]).is_err());
    }
}
