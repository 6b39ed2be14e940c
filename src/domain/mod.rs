mod account;
mod budget;
mod loan;
mod money;
mod transaction;

pub use account::*;
pub use budget::*;
pub use loan::*;
pub use money::*;
pub use transaction::*;
