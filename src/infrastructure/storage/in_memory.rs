//! In-memory store implementation

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::storage::query::compare_json;
use crate::domain::storage::{
    key_from_sequence, merge_fields, QueryParams, Record, RecordKey, RecordPatch, Store,
};
use crate::domain::DomainError;

/// Write staged inside an [`InMemoryTx`]
#[derive(Debug, Clone)]
enum StagedWrite<E: Record> {
    Create(E),
    Delete(E::Key),
    Update(E::Key, E::Patch),
}

/// Transaction handle for [`InMemoryStore`]
///
/// Writes are staged and only become visible on [`InMemoryStore::commit`];
/// dropping the handle discards them.
#[derive(Debug)]
pub struct InMemoryTx<E: Record> {
    staged: Vec<StagedWrite<E>>,
}

impl<E: Record> InMemoryTx<E> {
    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Distinct keys written by the staged operations, in key order
    pub fn keys(&self) -> Vec<E::Key> {
        self.staged
            .iter()
            .map(|write| match write {
                StagedWrite::Create(record) => record.id().clone(),
                StagedWrite::Delete(id) | StagedWrite::Update(id, _) => id.clone(),
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Thread-safe in-memory store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStore<E>
where
    E: Record,
{
    records: RwLock<BTreeMap<E::Key, E>>,
    sequence: AtomicU64,
}

impl<E> Default for InMemoryStore<E>
where
    E: Record,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStore<E>
where
    E: Record,
{
    /// Creates a new empty in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a store pre-populated with records
    ///
    /// The sequence continues after the highest integer key seen.
    pub fn with_records(records: Vec<E>) -> Self {
        let store = Self::new();
        let mut highest = 0;

        if let Ok(mut map) = store.records.write() {
            for record in records {
                if let Ok(value) = record.id().to_string().parse::<u64>() {
                    highest = highest.max(value);
                }
                map.insert(record.id().clone(), record);
            }
        }

        store.sequence.store(highest, Ordering::SeqCst);
        store
    }

    /// Opens a transaction
    pub fn begin(&self) -> InMemoryTx<E> {
        InMemoryTx { staged: Vec::new() }
    }

    /// Applies every staged write atomically, or none of them
    pub fn commit(&self, tx: InMemoryTx<E>) -> Result<(), DomainError> {
        let mut records = self.records.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let mut working = records.clone();

        for write in tx.staged {
            match write {
                StagedWrite::Create(record) => insert_new(&mut working, record)?,
                StagedWrite::Delete(id) => {
                    working.remove(&id);
                }
                StagedWrite::Update(id, patch) => apply_patch(&mut working, &id, &patch)?,
            }
        }

        *records = working;
        Ok(())
    }

    /// Discards a transaction's staged writes
    pub fn rollback(&self, tx: InMemoryTx<E>) {
        drop(tx);
    }

    /// Integer kinds always take the next sequence value; any id the caller
    /// put on the record is discarded.
    fn assign_key(&self, mut record: E) -> Result<E, DomainError> {
        if E::Key::STORE_ASSIGNED {
            let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let key = key_from_sequence::<E::Key>(next)
                .ok_or_else(|| DomainError::internal(format!("Invalid {} sequence value", E::KIND)))?;
            record.set_id(key);
        }

        if record.id().is_unset() {
            return Err(DomainError::validation(format!("{} id is required", E::KIND)));
        }

        Ok(record)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<E::Key, E>>, DomainError> {
        self.records
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<E::Key, E>>, DomainError> {
        self.records
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

fn insert_new<E: Record>(records: &mut BTreeMap<E::Key, E>, record: E) -> Result<(), DomainError> {
    let key = record.id().clone();

    if records.contains_key(&key) {
        return Err(DomainError::conflict(format!(
            "{} '{}' already exists",
            E::KIND,
            key
        )));
    }

    records.insert(key, record);
    Ok(())
}

fn apply_patch<E: Record>(
    records: &mut BTreeMap<E::Key, E>,
    id: &E::Key,
    patch: &E::Patch,
) -> Result<(), DomainError> {
    let fields = patch.to_fields()?;
    let current = records
        .get(id)
        .ok_or_else(|| DomainError::not_found(format!("{} '{}' not found", E::KIND, id)))?;

    let updated = merge_fields(current, &fields)?;
    records.insert(id.clone(), updated);
    Ok(())
}

fn field<'a>(value: &'a Value, column: &str) -> &'a Value {
    value.get(column).unwrap_or(&Value::Null)
}

#[async_trait]
impl<E> Store<E> for InMemoryStore<E>
where
    E: Record,
{
    type Tx = InMemoryTx<E>;

    async fn create(&self, record: E) -> Result<E::Key, DomainError> {
        let record = self.assign_key(record)?;
        let key = record.id().clone();

        insert_new(&mut *self.write()?, record)?;
        Ok(key)
    }

    async fn delete_by_id(&self, id: &E::Key) -> Result<(), DomainError> {
        self.write()?.remove(id);
        Ok(())
    }

    async fn update_by_id(&self, id: &E::Key, patch: &E::Patch) -> Result<(), DomainError> {
        apply_patch(&mut *self.write()?, id, patch)
    }

    async fn get_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn get_by_columns(&self, params: &QueryParams) -> Result<(Vec<E>, u64), DomainError> {
        params.validate(E::COLUMNS)?;

        let matcher = params.matcher();
        let mut matching: Vec<(Value, E)> = Vec::new();
        for record in self.read()?.values() {
            let value = serde_json::to_value(record).map_err(|e| {
                DomainError::storage(format!("Failed to serialize {}: {}", E::KIND, e))
            })?;

            if matcher.matches(&value) {
                matching.push((value, record.clone()));
            }
        }

        let total = if params.counts_total() {
            let total = matching.len() as u64;
            if total == 0 {
                return Ok((Vec::new(), 0));
            }
            total
        } else {
            0
        };

        let sort_keys = params.sort_keys();
        matching.sort_by(|(a, _), (b, _)| {
            for key in &sort_keys {
                let ordering = compare_json(field(a, &key.column), field(b, &key.column))
                    .unwrap_or(CmpOrdering::Equal);
                let ordering = if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                };

                if ordering != CmpOrdering::Equal {
                    return ordering;
                }
            }
            CmpOrdering::Equal
        });

        let page = matching
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit as usize)
            .map(|(_, record)| record)
            .collect();

        Ok((page, total))
    }

    async fn create_by_tx(&self, tx: &mut InMemoryTx<E>, record: E) -> Result<E::Key, DomainError> {
        let record = self.assign_key(record)?;
        let key = record.id().clone();

        tx.staged.push(StagedWrite::Create(record));
        Ok(key)
    }

    async fn delete_by_tx(&self, tx: &mut InMemoryTx<E>, id: &E::Key) -> Result<(), DomainError> {
        tx.staged.push(StagedWrite::Delete(id.clone()));
        Ok(())
    }

    async fn update_by_tx(
        &self,
        tx: &mut InMemoryTx<E>,
        id: &E::Key,
        patch: &E::Patch,
    ) -> Result<(), DomainError> {
        tx.staged.push(StagedWrite::Update(id.clone(), patch.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::{ColumnFilter, Operator};
    use crate::domain::{Item, Mob, MobPatch, Room};
    use serde_json::json;

    fn bestiary() -> InMemoryStore<Mob> {
        InMemoryStore::with_records(vec![
            Mob::new("rat", "Rat").with_id(1).with_hp(10),
            Mob::new("wolf", "Wolf").with_id(2).with_hp(60),
            Mob::new("orc", "Orc").with_id(3).with_hp(120),
            Mob::new("troll", "Troll").with_id(4).with_hp(300),
        ])
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store: InMemoryStore<Item> = InMemoryStore::new();

        let first = store.create(Item::new("sword", "Sword")).await.unwrap();
        let second = store.create(Item::new("shield", "Shield")).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.get_by_id(&2).await.unwrap().unwrap().item_id, "shield");
    }

    #[tokio::test]
    async fn test_sequence_continues_after_seeded_records() {
        let store = bestiary();

        let id = store.create(Mob::new("bat", "Bat")).await.unwrap();
        assert_eq!(id, 5);
    }

    #[tokio::test]
    async fn test_store_assigned_kinds_ignore_supplied_id() {
        let store: InMemoryStore<Mob> = InMemoryStore::new();

        let id = store.create(Mob::new("rat", "Rat").with_id(5)).await.unwrap();
        assert_eq!(id, 1);
        assert!(store.get_by_id(&5).await.unwrap().is_none());

        let mut tx = store.begin();
        let staged = store
            .create_by_tx(&mut tx, Mob::new("bat", "Bat").with_id(1))
            .await
            .unwrap();
        assert_eq!(staged, 2);

        store.commit(tx).unwrap();
        assert_eq!(store.get_by_id(&1).await.unwrap().unwrap().mob_id, "rat");
        assert_eq!(store.get_by_id(&2).await.unwrap().unwrap().mob_id, "bat");
    }

    #[tokio::test]
    async fn test_caller_assigned_keys() {
        let store: InMemoryStore<Room> = InMemoryStore::new();

        let id = store.create(Room::new("room-1", "Start")).await.unwrap();
        assert_eq!(id, "room-1");

        let duplicate = store.create(Room::new("room-1", "Again")).await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        let unnamed = store.create(Room::new("", "Nowhere")).await;
        assert!(matches!(unnamed, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_update_applies_only_set_fields() {
        let store = bestiary();
        let patch = MobPatch {
            hp: Some(0),
            mob_desc: Some("A tired rat".to_string()),
            ..MobPatch::default()
        };

        store.update_by_id(&1, &patch).await.unwrap();

        let rat = store.get_by_id(&1).await.unwrap().unwrap();
        assert_eq!(rat.hp, 0);
        assert_eq!(rat.mob_desc, "A tired rat");
        assert_eq!(rat.mob_name, "Rat");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = bestiary();

        let result = store.update_by_id(&99, &MobPatch::default()).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = bestiary();

        store.delete_by_id(&1).await.unwrap();
        store.delete_by_id(&1).await.unwrap();
        assert!(store.get_by_id(&1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = bestiary();
        let params = QueryParams::default()
            .with_column(ColumnFilter::new("hp", Operator::Gte, 50))
            .with_sort("-hp")
            .with_page(0, 2);

        let (mobs, total) = store.get_by_columns(&params).await.unwrap();

        assert_eq!(total, 3);
        let names: Vec<_> = mobs.iter().map(|m| m.mob_name.as_str()).collect();
        assert_eq!(names, vec!["Troll", "Orc"]);

        let (next, _) = store.get_by_columns(&params.with_page(1, 2)).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].mob_name, "Wolf");
    }

    #[tokio::test]
    async fn test_list_or_filters() {
        let store = bestiary();
        let params = QueryParams::default()
            .with_column(ColumnFilter::equals("mobID", "rat"))
            .with_column(ColumnFilter::equals("mobID", "troll").or())
            .with_sort("id");

        let (mobs, total) = store.get_by_columns(&params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(mobs[0].id, 1);
        assert_eq!(mobs[1].id, 4);
    }

    #[tokio::test]
    async fn test_list_ignore_count() {
        let store = bestiary();
        let params = QueryParams::default().with_sort("ignore count");

        let (mobs, total) = store.get_by_columns(&params).await.unwrap();
        assert_eq!(mobs.len(), 4);
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_list_empty_result() {
        let store = bestiary();
        let params = QueryParams::default()
            .with_column(ColumnFilter::new("mobName", Operator::Like, json!("%dragon%")));

        let (mobs, total) = store.get_by_columns(&params).await.unwrap();
        assert!(mobs.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_column() {
        let store = bestiary();
        let params = QueryParams::default().with_column(ColumnFilter::equals("secret", 1));

        let result = store.get_by_columns(&params).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_tx_commit_applies_all_writes() {
        let store = bestiary();
        let mut tx = store.begin();

        let id = store
            .create_by_tx(&mut tx, Mob::new("bat", "Bat"))
            .await
            .unwrap();
        store.delete_by_tx(&mut tx, &1).await.unwrap();
        store
            .update_by_tx(
                &mut tx,
                &2,
                &MobPatch {
                    hp: Some(70),
                    ..MobPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(tx.len(), 3);
        assert_eq!(tx.keys(), vec![1, 2, id]);
        assert!(store.get_by_id(&id).await.unwrap().is_none());

        store.commit(tx).unwrap();

        assert_eq!(store.get_by_id(&id).await.unwrap().unwrap().mob_id, "bat");
        assert!(store.get_by_id(&1).await.unwrap().is_none());
        assert_eq!(store.get_by_id(&2).await.unwrap().unwrap().hp, 70);
    }

    #[tokio::test]
    async fn test_tx_failure_applies_nothing() {
        let store = bestiary();
        let mut tx = store.begin();

        store.delete_by_tx(&mut tx, &1).await.unwrap();
        store
            .update_by_tx(&mut tx, &99, &MobPatch::default())
            .await
            .unwrap();

        assert!(store.commit(tx).unwrap_err().is_not_found());
        assert!(store.get_by_id(&1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tx_rollback_discards() {
        let store = bestiary();
        let mut tx = store.begin();

        store.delete_by_tx(&mut tx, &1).await.unwrap();
        store.rollback(tx);

        assert!(store.get_by_id(&1).await.unwrap().is_some());
    }
}
