//! The key/value state store the bridge publishes to and takes user
//! commands from.
//!
//! The real store belongs to the host platform; the core only sees the
//! [`StateStore`] trait. [`MemoryStore`] is a complete in-process
//! implementation used by the bridge binary and the tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

// ── Values ───────────────────────────────────────────────────────

/// A state value as seen by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl StateValue {
    /// Interpret console/user input: `true`/`false`, integers, else text.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => input
                .parse()
                .map(Self::Number)
                .unwrap_or_else(|_| Self::Text(input.to_string())),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(t) if t == "true" => Some(true),
            Self::Text(t) if t == "false" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ── Object metadata ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    String,
    Number,
}

/// Presentation hint for the store's UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Media,
    Indicator,
    Button,
}

/// Descriptive metadata attached to a state node when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub description: String,
    pub value_type: ValueType,
    pub role: Role,
}

/// A change notification from the store.
///
/// `ack == false` marks a user request that has not been carried out yet;
/// `ack == true` marks a confirmed device state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: String,
    pub value: StateValue,
    pub ack: bool,
}

// ── StateStore ───────────────────────────────────────────────────

#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Option<StateValue>;

    async fn set(&self, key: &str, value: StateValue, ack: bool);

    async fn define_object(&self, key: &str, meta: ObjectMeta);

    /// Every change made after the call, in order.
    fn subscribe(&self) -> BoxStream<'static, StateChange>;
}

// ── MemoryStore ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, StateValue>,
    objects: HashMap<String, ObjectMeta>,
}

/// In-process store backed by a map and a broadcast channel.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    changes: broadcast::Sender<StateChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::default(),
            changes,
        }
    }

    /// Metadata of a defined object.
    pub fn object(&self, key: &str) -> Option<ObjectMeta> {
        self.read().objects.get(key).cloned()
    }

    /// All keys with a value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.read().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<StateValue> {
        self.read().values.get(key).cloned()
    }

    async fn set(&self, key: &str, value: StateValue, ack: bool) {
        self.write().values.insert(key.to_string(), value.clone());
        // no subscribers is fine
        let _ = self.changes.send(StateChange {
            key: key.to_string(),
            value,
            ack,
        });
    }

    async fn define_object(&self, key: &str, meta: ObjectMeta) {
        self.write().objects.insert(key.to_string(), meta);
    }

    fn subscribe(&self) -> BoxStream<'static, StateChange> {
        BroadcastStream::new(self.changes.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(change) => Some(change),
                    Err(e) => {
                        warn!("state subscriber fell behind: {e}");
                        None
                    }
                }
            })
            .boxed()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values() {
        assert_eq!(StateValue::parse("true"), StateValue::Bool(true));
        assert_eq!(StateValue::parse(" 42 "), StateValue::Number(42));
        assert_eq!(StateValue::parse("hdmi1"), StateValue::from("hdmi1"));
    }

    #[test]
    fn as_bool_accepts_strings() {
        assert_eq!(StateValue::from("false").as_bool(), Some(false));
        assert_eq!(StateValue::Bool(true).as_bool(), Some(true));
        assert_eq!(StateValue::Number(1).as_bool(), None);
    }

    #[test]
    fn untagged_serde() {
        let v: StateValue = serde_json::from_str("17").unwrap();
        assert_eq!(v, StateValue::Number(17));
        assert_eq!(serde_json::to_string(&StateValue::Bool(false)).unwrap(), "false");
    }

    #[tokio::test]
    async fn set_get_and_notify() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();

        assert!(store.get("power").await.is_none());
        store.set("power", true.into(), true).await;
        assert_eq!(store.get("power").await, Some(StateValue::Bool(true)));

        let change = changes.next().await.unwrap();
        assert_eq!(change.key, "power");
        assert!(change.ack);
        assert_eq!(store.keys(), vec!["power".to_string()]);
    }

    #[tokio::test]
    async fn define_object_records_meta() {
        let store = MemoryStore::new();
        let meta = ObjectMeta {
            name: "Power".into(),
            description: "Power".into(),
            value_type: ValueType::Boolean,
            role: Role::Media,
        };
        store.define_object("power", meta.clone()).await;
        assert_eq!(store.object("power"), Some(meta));
    }
}
