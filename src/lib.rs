//! Sprocket API: configuration-driven REST backend with a paginated query engine.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{builtin_config, load_from_path, resolve, FullConfig, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use query::{ListParams, Page, QueryExecutor};
pub use routes::app;
pub use service::CrudService;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, RecordStore};
