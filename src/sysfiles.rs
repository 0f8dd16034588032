/// Postfix/Dovecot virtual-user file generation.
use crate::config::MailConfig;
use crate::db::{self, models::Account};
use crate::error::Result;
use sqlx::SqlitePool;

/// Render the postfix `virtual_mailboxes` map: one `addr maildir` line per
/// account, ordered by address.
pub fn render_virtual_mailboxes(accounts: &[Account], config: &MailConfig) -> String {
    let mut out = String::new();
    for account in accounts {
        out.push_str(&account.addr);
        out.push(' ');
        out.push_str(&config.maildir(&account.addr));
        out.push('\n');
    }
    out
}

/// Render the dovecot passwd-file. Fields follow passwd order
/// (user:password:uid:gid:gecos:home:shell), with the PHC hash carried under
/// an explicit scheme prefix and uid/gid given as the vmail user name.
pub fn render_dovecot_users(accounts: &[Account], config: &MailConfig) -> String {
    let mut out = String::new();
    for account in accounts {
        out.push_str(&format!(
            "{}:{{ARGON2ID}}{}:{}:{}::{}::\n",
            account.addr,
            account.password_hash,
            config.vmail_user,
            config.vmail_user,
            config.vmail_home(&account.addr),
        ));
    }
    out
}

/// Rewrite both virtual-user files from the current account set.
///
/// Called after every account mutation so the MTA view never lags the
/// database by more than one operation.
pub async fn regenerate(db: &SqlitePool) -> Result<()> {
    let config = db::config(db).await?;

    let accounts = sqlx::query_as::<_, Account>(
        "SELECT addr, password_hash, token_name, created_at, ttl_secs
         FROM accounts ORDER BY addr",
    )
    .fetch_all(db)
    .await?;

    tokio::fs::write(
        &config.path_virtual_mailboxes,
        render_virtual_mailboxes(&accounts, &config),
    )
    .await?;

    tokio::fs::write(
        &config.path_dovecot_users,
        render_dovecot_users(&accounts, &config),
    )
    .await?;

    // The dovecot file carries password hashes; keep it group-readable at
    // most.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(
            &config.path_dovecot_users,
            std::fs::Permissions::from_mode(0o640),
        )
        .await?;
    }

    tracing::debug!(
        "Regenerated virtual-user files for {} accounts",
        accounts.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MailConfig {
        MailConfig {
            mail_domain: "x.org".to_string(),
            web_endpoint: "https://x.org/new_email".to_string(),
            vmail_user: "vmail".to_string(),
            path_virtual_mailboxes: "/tmp/virtual_mailboxes".to_string(),
            path_dovecot_users: "/tmp/dovecot_users".to_string(),
        }
    }

    fn account(addr: &str, hash: &str) -> Account {
        Account {
            addr: addr.to_string(),
            password_hash: hash.to_string(),
            token_name: "promo".to_string(),
            created_at: 0,
            ttl_secs: 86400,
        }
    }

    #[test]
    fn virtual_mailboxes_lines() {
        let config = test_config();
        let accounts = vec![
            account("tmp.abc@x.org", "h1"),
            account("tmp.def@x.org", "h2"),
        ];
        let rendered = render_virtual_mailboxes(&accounts, &config);
        assert_eq!(
            rendered,
            "tmp.abc@x.org x.org/tmp.abc/\ntmp.def@x.org x.org/tmp.def/\n"
        );
    }

    #[test]
    fn dovecot_users_lines() {
        let config = test_config();
        let accounts = vec![account("tmp.abc@x.org", "$argon2id$v=19$m=19456$abc")];
        let rendered = render_dovecot_users(&accounts, &config);
        assert_eq!(
            rendered,
            "tmp.abc@x.org:{ARGON2ID}$argon2id$v=19$m=19456$abc:vmail:vmail::/home/vmail/mail/x.org/tmp.abc/::\n"
        );
    }

    #[test]
    fn empty_account_set_renders_empty_files() {
        let config = test_config();
        assert_eq!(render_virtual_mailboxes(&[], &config), "");
        assert_eq!(render_dovecot_users(&[], &config), "");
    }
}
