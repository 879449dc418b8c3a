//! Provides types that represent the user's inventory: credentials, servers, and queries over them.

pub mod auth;
pub mod inventory;
pub mod query;
pub mod server;

#[doc(inline)]
pub use auth::Auth;

#[doc(inline)]
pub use inventory::Inventory;

#[doc(inline)]
pub use query::Query;

#[doc(inline)]
pub use server::{IpFamily, ServerRecord, Target};
