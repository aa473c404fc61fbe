//! Record traits shared by every persisted entity kind

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Trait for types that can be used as record primary keys
///
/// The `Display` form is the canonical string used in cache keys and in
/// string-keyed storage backends (decimal for integers).
pub trait RecordKey:
    Clone
    + Debug
    + Default
    + Display
    + FromStr
    + Eq
    + Hash
    + Ord
    + Send
    + Sync
    + Serialize
    + DeserializeOwned
    + 'static
{
    /// Whether the store generates this key on create
    const STORE_ASSIGNED: bool;

    /// True for the zero/empty key, which identifies no record
    fn is_unset(&self) -> bool;
}

impl RecordKey for u64 {
    const STORE_ASSIGNED: bool = true;

    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl RecordKey for String {
    const STORE_ASSIGNED: bool = false;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Parses a store sequence value into a key type
pub fn key_from_sequence<K: RecordKey>(value: u64) -> Option<K> {
    value.to_string().parse().ok()
}

/// Sparse update for a record
///
/// Implementors mark every field `Option` and skip `None` when serializing,
/// so the serialized object holds exactly the fields to change.
pub trait RecordPatch:
    Clone + Debug + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Returns the fields this patch sets; the primary key is never included
    fn to_fields(&self) -> Result<Map<String, Value>, DomainError> {
        let value = serde_json::to_value(self)
            .map_err(|e| DomainError::validation(format!("Failed to serialize patch: {}", e)))?;

        match value {
            Value::Object(mut fields) => {
                fields.remove("id");
                Ok(fields)
            }
            _ => Err(DomainError::validation("Patch must serialize to a JSON object")),
        }
    }

    /// True when no field is set
    fn is_empty(&self) -> bool {
        self.to_fields().map(|f| f.is_empty()).unwrap_or(true)
    }
}

/// Trait for persisted entities
pub trait Record: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Primary key type
    type Key: RecordKey;

    /// Sparse update type
    type Patch: RecordPatch;

    /// Entity kind name, also used for table names and log fields
    const KIND: &'static str;

    /// Cache key namespace, must end with a colon
    const CACHE_PREFIX: &'static str;

    /// Default lifetime of a positive cache entry
    const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

    /// Columns that may appear in list filters and sort expressions
    const COLUMNS: &'static [&'static str];

    /// Returns the record's primary key
    fn id(&self) -> &Self::Key;

    /// Overwrites the primary key, used when the store assigns it
    fn set_id(&mut self, id: Self::Key);
}

/// Deserializes a present patch field as `Some`, an explicit `null` included
///
/// With `#[serde(default)]` on an `Option<Option<T>>` field, an absent field
/// stays `None` and `null` becomes `Some(None)`, which clears the column.
pub fn present_field<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Applies a set of patch fields on top of a record's JSON form
pub fn merge_fields<E: Record>(record: &E, fields: &Map<String, Value>) -> Result<E, DomainError> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| DomainError::storage(format!("Failed to serialize {}: {}", E::KIND, e)))?;

    if let Value::Object(object) = &mut value {
        for (name, field) in fields {
            if name != "id" {
                object.insert(name.clone(), field.clone());
            }
        }
    }

    serde_json::from_value(value)
        .map_err(|e| DomainError::validation(format!("Invalid {} patch: {}", E::KIND, e)))
}
