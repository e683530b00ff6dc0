pub mod application;
pub mod domain;
pub mod storage;

pub use application::{Completion, LedgerError, LedgerService, Subscription};
pub use domain::*;
pub use storage::Repository;
