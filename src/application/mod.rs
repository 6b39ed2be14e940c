// Application layer - use cases and orchestration over the repository.

pub mod error;
pub mod ledger;
pub mod loans;
pub mod planning;

pub use error::*;
pub use ledger::*;
pub use loans::*;
pub use planning::*;
