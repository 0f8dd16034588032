/// driftmail - temporary e-mail account provisioning
///
/// Signup tokens gate account creation: each token carries a usage quota,
/// an address prefix, and the lifetime granted to accounts it creates.
/// Expired accounts are pruned and the postfix/dovecot virtual-user files
/// regenerated from the database.
pub mod account;
pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod prune;
pub mod qr;
pub mod server;
pub mod sysfiles;
pub mod token;
pub mod util;

pub use context::AppContext;
pub use error::{Error, Result};
