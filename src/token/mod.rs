/// Token management system
///
/// Handles issuing, editing, deleting and resolving the signup tokens that
/// gate account creation.
mod manager;

pub use manager::TokenManager;

/// Partial update for [`TokenManager::modify_token`]; `None` leaves a
/// field unchanged. The token name and secret value are immutable.
#[derive(Debug, Clone, Default)]
pub struct TokenUpdate {
    pub expiry_secs: Option<i64>,
    pub prefix: Option<String>,
    pub max_use: Option<i64>,
}
