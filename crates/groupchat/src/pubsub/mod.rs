//! Event fan-out implementations of [`groupchat_core::events::ChatPubSub`].

pub mod memory;

pub use memory::MemoryPubSub;
