//! Readsync engine: HTTP calls against the reading backend and durable files.
mod client;
mod engine;
mod persist;
mod types;

pub use client::{ApiClient, ApiSettings, MutationCall, ReqwestApiClient};
pub use engine::EngineHandle;
pub use persist::{PersistError, StateDir};
pub use types::{ApiCall, EngineEvent, FailureKind, FetchError, RequestId};
