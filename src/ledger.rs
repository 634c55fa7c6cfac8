// Thin re-export module: the ledger is split into block structure, transaction
// types, validation rules, genesis construction and the state machine itself.

pub mod block;
pub mod chain;
pub mod genesis;
pub mod transaction;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use genesis::*;
pub use transaction::*;
