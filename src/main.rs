/// driftmail - temporary e-mail account provisioning
///
/// Tokens gate account creation with usage quotas and expiry windows;
/// expired accounts are pruned and the postfix/dovecot virtual-user files
/// regenerated to match.
use clap::Parser;
use driftmail::cli::{self, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftmail=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run(Cli::parse()).await
}
