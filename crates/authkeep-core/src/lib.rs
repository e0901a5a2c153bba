pub mod config;
pub mod error;
pub mod key;
pub mod manager;
pub mod persistence;
pub mod user;

pub use config::{BackendKind, StoreConfig};
pub use error::{ReviveError, Result, StoreError};
pub use key::{compose_key, AppCoordinates, LogicalKey};
pub use manager::{redirect_persistence_type, SessionStore};
pub use persistence::{
    BackendType, FilePersistence, InMemoryPersistence, Persistence, SharedPersistence,
};
pub use user::{User, UserMetadata, UserSnapshot};
