//! HTTP front end of the chat relay: sessions, chat orchestration and routes.

pub mod coordinator;
pub mod history;
pub mod http_server;
pub mod page;
pub mod session;
