//! Clients for the hosted relational + storage service and its realtime socket.

pub mod query;
pub mod realtime;
pub mod rest;

pub use query::{HistoryQuery, ADMIN_USER};
pub use realtime::RealtimeChannel;
pub use rest::SupabaseClient;
