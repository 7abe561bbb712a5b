//! Functional core for groupchat.
//!
//! Domain types and validation live in [`chat`], the single-table storage
//! model (keys, codec, query routing, transactional writes) in [`storage`],
//! and transient group notifications in [`events`]. Backends are plugged in
//! through the [`storage::ItemStore`] and [`events::ChatPubSub`] traits.

pub mod chat;
pub mod events;
pub mod serde;
pub mod storage;
