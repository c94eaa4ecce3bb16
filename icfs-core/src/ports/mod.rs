//! Store ports (interfaces) the services are written against.
//!
//! Transactional stores take the unit of work's context as an explicit
//! argument, so every call made while serving one request lands in the same
//! transaction. Implementations live under `infrastructure`.

pub mod accounts;
pub mod contents;
pub mod sessions;
pub mod work;

pub use accounts::{AccountFields, AccountStore};
pub use contents::{ContentStore, ReviewUpdate};
pub use sessions::SessionStore;
pub use work::{UnitOfWork, WorkContext, bounded};
