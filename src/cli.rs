/// Command-line interface.
///
/// Commands mirror the admin workflow: `init` once, token management,
/// account management, `prune`, and `serve` for the web adapter. Every
/// account-set change ends with a virtual-user file regeneration so postfix
/// and dovecot stay in sync.
use crate::{
    config::MailConfig,
    context::AppContext,
    db,
    db::models::Token,
    prune, qr, sysfiles,
    token::TokenUpdate,
    util,
};
use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::Duration;

#[derive(Parser)]
#[command(
    name = "driftmail",
    about = "Temporary e-mail account provisioning gated by signup tokens",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the SQLite database
    #[arg(
        long,
        env = "DRIFTMAIL_DB",
        default_value = "driftmail.db",
        global = true
    )]
    pub db: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the database and store the server configuration.
    ///
    /// Generated-file paths default to siblings of the database file.
    /// Re-running fails unless --force is given.
    Init {
        /// Mail domain new addresses are created under
        #[arg(long)]
        mail_domain: String,
        /// External URL for account-creation requests
        /// (default: https://<mail-domain>/new_email)
        #[arg(long)]
        web_endpoint: Option<String>,
        /// System user owning virtual mail delivery
        #[arg(long, default_value = "vmail")]
        vmail_user: String,
        /// Output path for the postfix virtual-mailbox map
        #[arg(long)]
        path_virtual_mailboxes: Option<String>,
        /// Output path for the dovecot users file
        #[arg(long)]
        path_dovecot_users: Option<String>,
        /// Replace an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Show the stored configuration.
    Config,
    /// Add a new token for generating e-mail accounts.
    AddToken {
        name: String,
        /// Account lifetime granted by this token, e.g. 1w 3d 30m
        #[arg(long, default_value = "1d")]
        expiry: String,
        /// Maximum number of accounts this token can create
        #[arg(long, default_value = "50")]
        maxuse: i64,
        /// Required prefix for all addresses created through this token
        #[arg(long, default_value = "tmp.")]
        prefix: String,
        /// Explicit token secret (default: generated)
        #[arg(long)]
        token: Option<String>,
    },
    /// Modify an existing token. Lifetime changes affect future accounts
    /// only.
    ModToken {
        name: String,
        /// New account lifetime, e.g. 1w 3d 30m
        #[arg(long)]
        expiry: Option<String>,
        /// New address prefix
        #[arg(long)]
        prefix: Option<String>,
        /// New creation ceiling
        #[arg(long)]
        maxuse: Option<i64>,
    },
    /// Delete a token. Refused while accounts created through it exist.
    DelToken { name: String },
    /// List all tokens.
    ListTokens,
    /// Write a QR code image for a token's redemption URL.
    GenQr { name: String },
    /// Add a managed e-mail account.
    AddUser {
        addr: String,
        /// Password (default: generated)
        #[arg(long)]
        password: Option<String>,
        /// Token name (default: resolved from the address prefix)
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove an e-mail account.
    DelUser { addr: String },
    /// List accounts.
    ListUsers {
        /// Only accounts created through this token
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove expired accounts and rewrite the virtual-user files.
    Prune {
        /// Report what would be removed without deleting anything
        #[arg(long, short = 'n')]
        dry_run: bool,
    },
    /// Run the redemption web API with periodic pruning.
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port
        #[arg(long, default_value = "3961")]
        port: u16,
        /// Seconds between prune cycles
        #[arg(long, default_value = "600")]
        prune_interval: u64,
    },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(&cli.db).await?;

    if let Command::Init {
        mail_domain,
        web_endpoint,
        vmail_user,
        path_virtual_mailboxes,
        path_dovecot_users,
        force,
    } = cli.command
    {
        let web_endpoint =
            web_endpoint.unwrap_or_else(|| format!("https://{}/new_email", mail_domain));
        let config = MailConfig::new(
            &cli.db,
            mail_domain,
            web_endpoint,
            vmail_user,
            path_virtual_mailboxes,
            path_dovecot_users,
        );
        db::init_config(&ctx.db, &config, force).await?;
        println!("initialized {}", cli.db.display());
        print_config(&config);
        return Ok(());
    }

    // Everything past init needs the stored configuration.
    let config = db::config(&ctx.db).await?;

    match cli.command {
        Command::Init { .. } => unreachable!("handled above"),

        Command::Config => print_config(&config),

        Command::AddToken {
            name,
            expiry,
            maxuse,
            prefix,
            token,
        } => {
            let expiry_secs = util::parse_duration(&expiry)?;
            let created = ctx
                .tokens
                .add_token(&name, token, expiry_secs, &prefix, maxuse)
                .await?;
            print_token(&created, &config);
        }

        Command::ModToken {
            name,
            expiry,
            prefix,
            maxuse,
        } => {
            let expiry_secs = expiry.as_deref().map(util::parse_duration).transpose()?;
            let update = TokenUpdate {
                expiry_secs,
                prefix,
                max_use: maxuse,
            };
            let token = ctx.tokens.modify_token(&name, update).await?;
            print_token(&token, &config);
        }

        Command::DelToken { name } => {
            ctx.tokens.delete_token(&name).await?;
            println!("deleted token: {}", name);
        }

        Command::ListTokens => {
            for token in ctx.tokens.list_tokens().await? {
                print_token(&token, &config);
            }
        }

        Command::GenQr { name } => {
            let token = ctx.tokens.get_token(&name).await?;
            let out = PathBuf::from(format!(
                "driftmail-{}-{}.png",
                config.mail_domain, token.name
            ));
            qr::write_qr(&token.web_url(&config.web_endpoint), &out)?;
            println!("{} written for token '{}'", out.display(), token.name);
        }

        Command::AddUser {
            addr,
            password,
            token,
        } => {
            let token_name = match token {
                Some(name) => ctx.tokens.get_token(&name).await?.name,
                None => ctx.tokens.get_token_for_addr(&addr).await?.name,
            };
            let created = ctx
                .accounts
                .create_account(&token_name, Some(&addr), password.as_deref())
                .await?;
            sysfiles::regenerate(&ctx.db).await?;
            println!("added {} (token {})", created.account.addr, token_name);
            println!("  password = {}", created.password);
        }

        Command::DelUser { addr } => {
            ctx.accounts.delete_account(&addr).await?;
            sysfiles::regenerate(&ctx.db).await?;
            println!("deleted {}", addr);
        }

        Command::ListUsers { token } => {
            for account in ctx.accounts.list_accounts(token.as_deref()).await? {
                let when = match account.expires_at_utc() {
                    Some(t) => t.to_rfc3339(),
                    None => account.expires_at().to_string(),
                };
                println!(
                    "{} [token={}] expires {}",
                    account.addr, account.token_name, when
                );
            }
        }

        Command::Prune { dry_run } => {
            let report = prune::prune(&ctx.db, util::unix_now(), dry_run).await?;
            if report.pruned.is_empty() && report.failed.is_empty() {
                println!("nothing to prune");
                return Ok(());
            }
            for account in &report.pruned {
                if dry_run {
                    println!("would prune {} [{}]", account.addr, account.token_name);
                } else {
                    println!("pruned {} [{}]", account.addr, account.token_name);
                }
            }
            for (addr, reason) in &report.failed {
                eprintln!("failed to prune {}: {}", addr, reason);
            }
            if !dry_run {
                sysfiles::regenerate(&ctx.db).await?;
            }
            if !report.failed.is_empty() {
                bail!("{} accounts could not be pruned", report.failed.len());
            }
        }

        Command::Serve {
            host,
            port,
            prune_interval,
        } => {
            crate::server::serve(ctx, &host, port, Duration::from_secs(prune_interval)).await?;
        }
    }

    Ok(())
}

fn print_config(config: &MailConfig) {
    println!("mail_domain            = {}", config.mail_domain);
    println!("web_endpoint           = {}", config.web_endpoint);
    println!("vmail_user             = {}", config.vmail_user);
    println!("path_virtual_mailboxes = {}", config.path_virtual_mailboxes);
    println!("path_dovecot_users     = {}", config.path_dovecot_users);
}

fn print_token(token: &Token, config: &MailConfig) {
    println!("token:{}", token.name);
    println!("  prefix = {}", token.prefix);
    println!("  expiry = {}", util::format_duration(token.expiry_secs));
    println!("  maxuse = {}", token.max_use);
    println!("  usecount = {}", token.use_count);
    println!("  token  = {}", token.token);
    println!("  {}", token.web_url(&config.web_endpoint));
}
