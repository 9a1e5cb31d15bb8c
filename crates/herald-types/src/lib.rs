pub mod api;
pub mod models;

pub use models::{Connection, Server, ServerKind, Status};
