pub mod export;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod stories;

// Re-export the pieces the server binary wires together.
pub use rest::ApiDoc;
pub use state::{AppState, SessionStore};
