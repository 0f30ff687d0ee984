//! Craftify Channel
//!
//! The data channel is the only sanctioned way for tasks of a run to share
//! values. Entries are keyed by the producing task and a logical key, so two
//! tasks can publish `response_body` without clobbering each other.
//!
//! A [`DataChannel`] lives for exactly one run. Tasks never see it directly;
//! each task body gets a [`ChannelHandle`] that writes under the task's own id
//! and can read from any producer.

mod channel;
mod error;

pub use channel::{ChannelHandle, ChannelKey, DataChannel};
pub use error::ChannelError;
