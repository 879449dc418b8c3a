//! Run shell commands on many SSH servers at once.
//!
//! # Inventory
//!
//! The inventory is a YAML file listing credentials (`auths`) and servers (`servers`). Servers
//! carry an optional id and any number of tags, and either an inline credential or a reference to
//! one in the `auths` table. See [config] for where the file is looked for and how it is checked.
//!
//! # Program flow
//!
//! 1. The user selects servers by id, by tag, or all of them. [core::Inventory::matching] turns
//!    the selection into a list of [core::Target]s, each with its credential resolved.
//!
//! 2. [run::Runner] starts one [run::session::Session] task per target and command. All of them
//!    run at once.
//!
//! 3. Every session shares one terminal. Keyboard-interactive prompts, their answers, and remote
//!    output are all funneled through one [queue::SerialQueue], so the operator sees one prompt at
//!    a time and output blocks never interleave.
//!
//! 4. A session that fails is reported and forgotten. The others carry on.

pub mod cli;
pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod queue;
pub mod run;

#[doc(inline)]
pub use run::Runner;
