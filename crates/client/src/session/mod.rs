//! Session state, its persistence, and its lifecycle.

mod persistence;
mod service;
mod store;

pub use persistence::{
    FilePersistence, MemoryPersistence, PersistenceError, SessionPersistence, TOKEN_KEY, USER_KEY,
};
pub use service::{Credentials, InitOutcome, Registration, SessionService};
pub use store::SessionStore;
