/// Server configuration stored in the database.
///
/// The single config row is written once by `init` and read thereafter;
/// nothing else mutates it. The database path itself is not part of this
/// record; it arrives as an explicit CLI/env argument and is threaded
/// through constructors, never looked up ambiently.
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;

/// The one-row configuration record (`config` table, `id = 1`).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MailConfig {
    /// Mail domain new addresses are created under.
    pub mail_domain: String,
    /// External URL serving account-creation requests (`?t=<token>`).
    pub web_endpoint: String,
    /// System user owning virtual mail delivery (dovecot/postfix side).
    pub vmail_user: String,
    /// Output path for the postfix virtual-mailbox map.
    pub path_virtual_mailboxes: String,
    /// Output path for the dovecot passwd-style users file.
    pub path_dovecot_users: String,
}

impl MailConfig {
    /// Assemble the config row for `init`, placing the generated files next
    /// to the database unless the operator overrides their paths.
    pub fn new(
        db_path: &Path,
        mail_domain: String,
        web_endpoint: String,
        vmail_user: String,
        path_virtual_mailboxes: Option<String>,
        path_dovecot_users: Option<String>,
    ) -> Self {
        let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        let sibling = |file: &str| dir.join(file).to_string_lossy().into_owned();
        Self {
            mail_domain,
            web_endpoint,
            vmail_user,
            path_virtual_mailboxes: path_virtual_mailboxes
                .unwrap_or_else(|| sibling("virtual_mailboxes")),
            path_dovecot_users: path_dovecot_users.unwrap_or_else(|| sibling("dovecot_users")),
        }
    }

    /// Maildir location for an address, relative to the vmail base
    /// directory (the value side of the postfix virtual-mailbox map).
    pub fn maildir(&self, addr: &str) -> String {
        let localpart = addr.split_once('@').map(|(l, _)| l).unwrap_or(addr);
        format!("{}/{}/", self.mail_domain, localpart)
    }

    /// Home directory for an address under the vmail user.
    pub fn vmail_home(&self, addr: &str) -> String {
        format!("/home/{}/mail/{}", self.vmail_user, self.maildir(addr))
    }
}
