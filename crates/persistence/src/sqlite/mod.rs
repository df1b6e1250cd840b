//! SQLite-backed document store (users, rewards, redemptions, code pool)
//!
//! Every stock and point mutation is a single conditional UPDATE; the
//! `rows_affected` count is the "condition failed" signal the ledger
//! relies on. Nothing in this module does read-modify-write on those
//! fields.

mod codes;
mod connection;
mod redemptions;
mod rewards;
mod users;

pub use codes::*;
pub use connection::Database;
pub use redemptions::*;
pub use rewards::*;
pub use users::*;
