/// Account management module.
mod manager;

pub use manager::AccountManager;

use crate::db::models::Account;

/// A freshly provisioned account together with its cleartext password.
///
/// The database only ever holds the hash; this struct is the single place
/// the cleartext exists, handed to the caller exactly once.
#[derive(Debug)]
pub struct CreatedAccount {
    pub account: Account,
    pub password: String,
}
