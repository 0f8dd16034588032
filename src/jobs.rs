/// Background jobs.
use crate::{context::AppContext, prune, sysfiles, util};
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Spawn the periodic prune job.
///
/// Each tick removes accounts whose lifetime has elapsed and rewrites the
/// virtual-user files when anything changed. Ticks are independent: a
/// failed sweep is retried from scratch on the next interval.
pub fn spawn_prune_job(ctx: AppContext, every: Duration) {
    info!("Starting prune job (every {}s)", every.as_secs());

    tokio::spawn(async move {
        let mut interval = interval(every);

        loop {
            interval.tick().await;

            match prune::prune(&ctx.db, util::unix_now(), false).await {
                Ok(report) => {
                    if report.pruned.is_empty() && report.failed.is_empty() {
                        // Silent when there was nothing to do
                        continue;
                    }
                    info!(
                        "Prune cycle: {} removed, {} failed",
                        report.pruned.len(),
                        report.failed.len()
                    );
                    if let Err(e) = sysfiles::regenerate(&ctx.db).await {
                        error!("Failed to regenerate virtual-user files: {}", e);
                    }
                }
                Err(e) => error!("Prune cycle failed: {}", e),
            }
        }
    });
}
