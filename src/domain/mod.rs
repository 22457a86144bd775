mod business;
mod customer;
mod ledger;
mod money;
mod state;
mod transaction;

pub use business::*;
pub use customer::*;
pub use ledger::*;
pub use money::*;
pub use state::*;
pub use transaction::*;
