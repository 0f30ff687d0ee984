use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ChannelError;

/// Key of a channel entry: the producing task and the logical key it used.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ChannelKey {
  pub producer: String,
  pub key: String,
}

impl ChannelKey {
  pub fn new(producer: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      producer: producer.into(),
      key: key.into(),
    }
  }
}

/// In-memory, run-scoped key-value store shared by all tasks of a run.
///
/// Cloning is cheap and every clone sees the same entries. The channel does
/// not enforce write-once semantics: the last write wins.
#[derive(Debug, Clone, Default)]
pub struct DataChannel {
  entries: Arc<RwLock<HashMap<ChannelKey, Value>>>,
}

impl DataChannel {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store `value` under `(producer, key)`, replacing any previous value.
  pub fn put(&self, producer: &str, key: &str, value: impl Into<Value>) {
    let value = value.into();
    debug!(producer = %producer, key = %key, "channel put");
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.insert(ChannelKey::new(producer, key), value);
  }

  /// Read the latest value stored under `(producer, key)`.
  ///
  /// A stored `null` or empty string is returned as-is; only a key that was
  /// never written yields [`ChannelError::NotFound`].
  pub fn get(&self, producer: &str, key: &str) -> Result<Value, ChannelError> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries
      .get(&ChannelKey::new(producer, key))
      .cloned()
      .ok_or_else(|| ChannelError::NotFound {
        producer: producer.to_string(),
        key: key.to_string(),
      })
  }

  /// Read and decode a value into `T`.
  pub fn get_as<T: DeserializeOwned>(&self, producer: &str, key: &str) -> Result<T, ChannelError> {
    let value = self.get(producer, key)?;
    serde_json::from_value(value).map_err(|e| ChannelError::Decode {
      producer: producer.to_string(),
      key: key.to_string(),
      message: e.to_string(),
    })
  }

  /// Create a handle that publishes under `producer`.
  pub fn handle(&self, producer: impl Into<String>) -> ChannelHandle {
    ChannelHandle {
      producer: producer.into(),
      channel: self.clone(),
    }
  }

  /// Number of stored entries.
  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy of all entries, for inspection after a run.
  pub fn snapshot(&self) -> HashMap<ChannelKey, Value> {
    self
      .entries
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }
}

/// A task's view of the data channel.
///
/// Writes are always attributed to the owning task; reads name the producer
/// explicitly.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
  producer: String,
  channel: DataChannel,
}

impl ChannelHandle {
  /// The task id this handle publishes under.
  pub fn producer(&self) -> &str {
    &self.producer
  }

  pub fn put(&self, key: &str, value: impl Into<Value>) {
    self.channel.put(&self.producer, key, value);
  }

  pub fn get(&self, producer: &str, key: &str) -> Result<Value, ChannelError> {
    self.channel.get(producer, key)
  }

  pub fn get_as<T: DeserializeOwned>(&self, producer: &str, key: &str) -> Result<T, ChannelError> {
    self.channel.get_as(producer, key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_put_then_get() {
    let channel = DataChannel::new();
    channel.put("fetch", "body", "hello world");

    assert_eq!(channel.get("fetch", "body").unwrap(), json!("hello world"));
  }

  #[test]
  fn test_missing_key_is_not_found() {
    let channel = DataChannel::new();

    let err = channel.get("fetch", "body").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
      err,
      ChannelError::NotFound {
        producer: "fetch".to_string(),
        key: "body".to_string(),
      }
    );
  }

  #[test]
  fn test_empty_values_are_not_missing() {
    let channel = DataChannel::new();
    channel.put("a", "empty", "");
    channel.put("a", "null", Value::Null);

    assert_eq!(channel.get("a", "empty").unwrap(), json!(""));
    assert_eq!(channel.get("a", "null").unwrap(), Value::Null);
  }

  #[test]
  fn test_keys_are_scoped_by_producer() {
    let channel = DataChannel::new();
    channel.put("a", "out", 1);

    assert!(channel.get("b", "out").unwrap_err().is_not_found());
  }

  #[test]
  fn test_last_write_wins() {
    let channel = DataChannel::new();
    channel.put("a", "out", 1);
    channel.put("a", "out", 2);

    assert_eq!(channel.get("a", "out").unwrap(), json!(2));
    assert_eq!(channel.len(), 1);
  }

  #[test]
  fn test_handle_writes_under_its_producer() {
    let channel = DataChannel::new();
    let handle = channel.handle("fetch");
    handle.put("status", 200);

    assert_eq!(handle.producer(), "fetch");
    assert_eq!(channel.get("fetch", "status").unwrap(), json!(200));
    assert_eq!(handle.get("fetch", "status").unwrap(), json!(200));
  }

  #[test]
  fn test_get_as_decodes_and_reports_shape_errors() {
    let channel = DataChannel::new();
    channel.put("a", "words", json!(["x", "y"]));

    let words: Vec<String> = channel.get_as("a", "words").unwrap();
    assert_eq!(words, vec!["x", "y"]);

    let err = channel.get_as::<u32>("a", "words").unwrap_err();
    assert!(matches!(err, ChannelError::Decode { .. }));
  }

  #[test]
  fn test_clones_share_entries() {
    let channel = DataChannel::new();
    let other = channel.clone();
    other.put("a", "k", "v");

    assert!(!channel.is_empty());
    assert_eq!(
      channel.snapshot().get(&ChannelKey::new("a", "k")),
      Some(&json!("v"))
    );
  }
}
