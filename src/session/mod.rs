pub mod state;
pub mod store;

pub use state::{Cookie, LocalStorageEntry, OriginStorage, StorageState};
pub use store::{SessionSnapshot, SessionStore};
