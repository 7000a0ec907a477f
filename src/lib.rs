pub mod backend;
pub mod commands;
pub mod config;
pub mod session;

pub use backend::{Backend, BackendError, HttpBackend};
pub use config::ClientConfig;
pub use session::{SessionController, SessionState, Trigger};
