//! mixdown-server: REST surface over the composition engine.
//!
//! Exposed as a library so integration tests can build the router in-process
//! with mock collaborators.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
