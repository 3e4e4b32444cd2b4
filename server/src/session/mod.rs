//! Session management for the relay
//!
//! Sessions carry the per-browser conversation between requests. Storage sits
//! behind the `SessionStore` trait so the signed-cookie default can be swapped
//! for server-side storage without touching the chat handlers.

pub mod adapters;
pub mod cookie;
pub mod store;

pub use adapters::{InMemorySessionStore, SignedCookieSessionStore};
pub use store::{Session, SessionStore, SessionStoreError, SessionStoreRef};
