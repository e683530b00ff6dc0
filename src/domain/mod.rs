mod amount;
mod person;
mod transaction;

pub use amount::*;
pub use person::*;
pub use transaction::*;
