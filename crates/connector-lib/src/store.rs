//! Entity store boundary and an in-memory implementation

use crate::error::{ConnectorError, ConnectorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

/// Local node (connector instance) identifier
pub type NodeId = u32;

/// Local entity identifier
pub type EntityId = u64;

/// A local record being synchronized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Natural key, e.g. the customer's email address
    pub unique_id: String,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Relation name -> related entity id
    #[serde(default)]
    pub relations: BTreeMap<String, EntityId>,
    #[serde(default)]
    pub parent: Option<EntityId>,
}

impl SyncEntity {
    pub fn new(id: EntityId, entity_type: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            unique_id: unique_id.into(),
            data: BTreeMap::new(),
            relations: BTreeMap::new(),
            parent: None,
        }
    }

    pub fn with_data(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(attribute.into(), value.into());
        self
    }

    pub fn with_relation(mut self, relation: impl Into<String>, target: EntityId) -> Self {
        self.relations.insert(relation.into(), target);
        self
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attribute value; missing attributes and JSON null are both absent
    pub fn get_data(&self, attribute: &str) -> Option<&Value> {
        self.data.get(attribute).filter(|v| !v.is_null())
    }

    /// Attribute rendered as text, absent when missing, null or empty
    pub fn get_string(&self, attribute: &str) -> Option<String> {
        let text = match self.get_data(attribute)? {
            Value::String(s) => s.clone(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            other => other.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Names of every attribute carrying a value
    pub fn attribute_names(&self) -> Vec<String> {
        self.data
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Storage and linkage services consumed by the gateways
pub trait EntityStore: Send + Sync {
    /// Follow a named relation; at most one record per relation name
    fn resolve(&self, entity: &SyncEntity, relation: &str, target_type: &str) -> Option<SyncEntity>;

    /// Parent of a sub-entity, if it has one
    fn parent(&self, entity: &SyncEntity) -> Option<SyncEntity>;

    /// Remote identifier linked to the entity on the given node
    fn local_id(&self, node: NodeId, entity: &SyncEntity) -> ConnectorResult<Option<String>>;

    /// Record the remote identifier for the entity on the given node
    fn link_entity(
        &self,
        node: NodeId,
        entity: &SyncEntity,
        remote_id: &str,
    ) -> ConnectorResult<()>;
}

/// Persisted linkage row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub node: NodeId,
    pub entity: EntityId,
    pub remote_id: String,
}

/// On-disk form of a [`MemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub entities: Vec<SyncEntity>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// In-memory entity store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<EntityId, SyncEntity>>,
    links: RwLock<HashMap<(NodeId, EntityId), String>>,
}

fn poisoned<T>(_: T) -> ConnectorError {
    ConnectorError::Store("entity store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let entities = snapshot.entities.into_iter().map(|e| (e.id, e)).collect();
        let links = snapshot
            .links
            .into_iter()
            .map(|l| ((l.node, l.entity), l.remote_id))
            .collect();
        Self {
            entities: RwLock::new(entities),
            links: RwLock::new(links),
        }
    }

    pub fn snapshot(&self) -> ConnectorResult<StoreSnapshot> {
        let entities = self.entities.read().map_err(poisoned)?.values().cloned().collect();
        let mut links: Vec<Link> = self
            .links
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|(&(node, entity), remote_id)| Link {
                node,
                entity,
                remote_id: remote_id.clone(),
            })
            .collect();
        links.sort_by_key(|l| (l.node, l.entity));
        Ok(StoreSnapshot { entities, links })
    }

    /// Load a store from a JSON snapshot file
    pub fn load(path: &Path) -> ConnectorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store back as a JSON snapshot file
    pub fn save(&self, path: &Path) -> ConnectorResult<()> {
        let content = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn insert(&self, entity: SyncEntity) -> ConnectorResult<()> {
        self.entities.write().map_err(poisoned)?.insert(entity.id, entity);
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Option<SyncEntity> {
        self.entities.read().ok()?.get(&id).cloned()
    }

    /// Every entity of the given type, in id order
    pub fn entities_of_type(&self, entity_type: &str) -> Vec<SyncEntity> {
        self.entities
            .read()
            .map(|entities| {
                entities
                    .values()
                    .filter(|e| e.entity_type == entity_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn link_count(&self) -> usize {
        self.links.read().map(|l| l.len()).unwrap_or(0)
    }
}

impl EntityStore for MemoryStore {
    fn resolve(
        &self,
        entity: &SyncEntity,
        relation: &str,
        target_type: &str,
    ) -> Option<SyncEntity> {
        let target = entity.relations.get(relation)?;
        self.get(*target).filter(|e| e.entity_type == target_type)
    }

    fn parent(&self, entity: &SyncEntity) -> Option<SyncEntity> {
        entity.parent.and_then(|id| self.get(id))
    }

    fn local_id(&self, node: NodeId, entity: &SyncEntity) -> ConnectorResult<Option<String>> {
        Ok(self
            .links
            .read()
            .map_err(poisoned)?
            .get(&(node, entity.id))
            .cloned())
    }

    fn link_entity(
        &self,
        node: NodeId,
        entity: &SyncEntity,
        remote_id: &str,
    ) -> ConnectorResult<()> {
        if remote_id.is_empty() {
            return Err(ConnectorError::Store(format!(
                "refusing to link entity {} to an empty remote id",
                entity.id
            )));
        }
        self.links
            .write()
            .map_err(poisoned)?
            .insert((node, entity.id), remote_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                SyncEntity::new(1, "customer", "jane@example.com")
                    .with_data("first_name", "Jane")
                    .with_data("middle_name", Value::Null)
                    .with_relation("billing_address", 2)
                    .with_relation("shipping_address", 3),
            )
            .unwrap();
        store
            .insert(SyncEntity::new(2, "address", "addr-2").with_parent(1))
            .unwrap();
        store
            .insert(SyncEntity::new(3, "order", "order-3"))
            .unwrap();
        store
    }

    #[test]
    fn test_get_data_treats_null_as_absent() {
        let entity = store().get(1).unwrap();
        assert_eq!(entity.get_data("first_name"), Some(&json!("Jane")));
        assert!(entity.get_data("middle_name").is_none());
        assert!(entity.get_data("missing").is_none());
        assert_eq!(entity.attribute_names(), vec!["first_name".to_string()]);
    }

    #[test]
    fn test_get_string_renders_scalars() {
        let entity = SyncEntity::new(9, "customer", "x")
            .with_data("n", 5)
            .with_data("b", true)
            .with_data("e", "");
        assert_eq!(entity.get_string("n").as_deref(), Some("5"));
        assert_eq!(entity.get_string("b").as_deref(), Some("1"));
        assert!(entity.get_string("e").is_none());
    }

    #[test]
    fn test_resolve_checks_target_type() {
        let store = store();
        let customer = store.get(1).unwrap();

        assert_eq!(store.resolve(&customer, "billing_address", "address").unwrap().id, 2);
        assert!(store.resolve(&customer, "shipping_address", "address").is_none());
        assert!(store.resolve(&customer, "unknown", "address").is_none());
    }

    #[test]
    fn test_parent_is_optional() {
        let store = store();
        assert_eq!(store.parent(&store.get(2).unwrap()).unwrap().id, 1);
        assert!(store.parent(&store.get(1).unwrap()).is_none());

        let orphan = SyncEntity::new(4, "address", "orphan").with_parent(99);
        assert!(store.parent(&orphan).is_none());
    }

    #[test]
    fn test_linkage_one_remote_id_per_pair() {
        let store = store();
        let customer = store.get(1).unwrap();

        assert!(store.local_id(1, &customer).unwrap().is_none());
        store.link_entity(1, &customer, "100").unwrap();
        store.link_entity(1, &customer, "101").unwrap();
        store.link_entity(2, &customer, "200").unwrap();

        assert_eq!(store.local_id(1, &customer).unwrap().as_deref(), Some("101"));
        assert_eq!(store.local_id(2, &customer).unwrap().as_deref(), Some("200"));
        assert_eq!(store.link_count(), 2);
        assert!(store.link_entity(1, &customer, "").is_err());
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = store();
        store.link_entity(1, &store.get(1).unwrap(), "77").unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.entities_of_type("customer").len(), 1);
        assert_eq!(
            loaded.local_id(1, &loaded.get(1).unwrap()).unwrap().as_deref(),
            Some("77")
        );
    }

    #[test]
    fn test_snapshot_accepts_minimal_json() {
        let snapshot: StoreSnapshot = serde_json::from_value(json!({
            "entities": [{"id": 5, "type": "customer", "unique_id": "a@b.c"}]
        }))
        .unwrap();
        let store = MemoryStore::from_snapshot(snapshot);
        assert_eq!(store.get(5).unwrap().unique_id, "a@b.c");
        assert_eq!(store.link_count(), 0);
    }
}
