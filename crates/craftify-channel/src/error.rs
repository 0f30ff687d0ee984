use thiserror::Error;

/// Errors returned when reading from the data channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
  /// Nothing was ever published under this key by this producer.
  #[error("no value for key '{key}' from producer '{producer}'")]
  NotFound { producer: String, key: String },

  /// A value exists but does not decode into the requested type.
  #[error("value for key '{key}' from producer '{producer}' has unexpected shape: {message}")]
  Decode {
    producer: String,
    key: String,
    message: String,
  },
}

impl ChannelError {
  /// Whether the key was simply never written.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}
