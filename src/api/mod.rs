//! Read-only HTTP surface over the snapshot store

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

pub use routes::create_router;
pub use server::serve;
pub use state::AppState;
