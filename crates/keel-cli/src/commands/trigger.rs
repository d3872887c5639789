//! `keel trigger` - phase 2
//!
//! Confirms the old backend released each migrated workload and
//! redeploys it on the new one. With `--until-complete` the phase is
//! re-run for the workloads still waiting on the old backend until none
//! are left.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use keel_migrate::{MigrationRequest, MigrationResponse, MigrationStatus};

use super::{build_migrator, cancel_on_ctrl_c, report, SelectionArgs};
use crate::{Error, Result};

/// Finish a migration started with `keel migrate`
#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Re-run until no workload is waiting on its old backend
    #[arg(long)]
    pub until_complete: bool,

    /// Seconds between runs with --until-complete
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    /// Give up polling after this many seconds
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,
}

pub async fn run(args: TriggerArgs, config: &Path, database_url: &str) -> Result<()> {
    let migrator = build_migrator(config, database_url, args.selection.concurrency).await?;
    let request = args.selection.request();
    let cancel = cancel_on_ctrl_c();

    let response = if args.until_complete {
        let (migrator, cancel) = (&migrator, &cancel);
        poll(
            request,
            cancel,
            Duration::from_secs(args.interval),
            Duration::from_secs(args.timeout),
            |req| async move {
                migrator
                    .trigger_after_migration(&req, cancel)
                    .await
                    .map_err(Error::from)
            },
        )
        .await?
    } else {
        migrator.trigger_after_migration(&request, &cancel).await?
    };
    report(&response)
}

/// Run phase 2 until nothing is pending, the deadline passes or the
/// operator interrupts.
///
/// Every pass after the first is narrowed to the workloads the previous
/// pass left pending, so a workload is redeployed at most once. Settled
/// outcomes from earlier passes are carried into the returned response.
async fn poll<F, Fut>(
    mut request: MigrationRequest,
    cancel: &CancellationToken,
    interval: Duration,
    timeout: Duration,
    mut trigger: F,
) -> Result<MigrationResponse>
where
    F: FnMut(MigrationRequest) -> Fut,
    Fut: Future<Output = Result<MigrationResponse>>,
{
    let deadline = Instant::now() + timeout;
    let mut settled = MigrationResponse::empty(request.environment_id, request.desired_backend);
    let mut attempt = 1u32;

    loop {
        let response = trigger(request.clone()).await?;
        let pending = response.pending();
        if pending.is_empty() {
            return Ok(merge(settled, response));
        }
        if Instant::now() + interval > deadline {
            warn!(?pending, "Timed out waiting for old backend to release workloads");
            return Ok(merge(settled, response));
        }

        info!(attempt, ?pending, "Workloads not yet deleted, retrying in {:?}", interval);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(merge(settled, response)),
            _ = tokio::time::sleep(interval) => {}
        }

        settled
            .successful_workloads
            .extend(response.successful_workloads);
        settled.failed_workloads.extend(
            response
                .failed_workloads
                .into_iter()
                .filter(|c| c.status != MigrationStatus::NotYetDeleted),
        );
        request.include_workload_ids = pending;
        attempt += 1;
    }
}

/// Outcomes of earlier passes plus the latest one, ordered by workload
fn merge(mut settled: MigrationResponse, last: MigrationResponse) -> MigrationResponse {
    settled.successful_workloads.extend(last.successful_workloads);
    settled.failed_workloads.extend(last.failed_workloads);
    settled.successful_workloads.sort_by_key(|c| c.workload_id);
    settled.failed_workloads.sort_by_key(|c| c.workload_id);
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use keel_migrate::{ChangeStatus, DeploymentBackend};

    fn change(id: i64, status: MigrationStatus) -> ChangeStatus {
        ChangeStatus {
            workload_id: id,
            app_id: 100 + id,
            app_name: format!("svc{}", id),
            environment_id: 7,
            environment_name: "prod".to_string(),
            error: String::new(),
            status,
        }
    }

    fn pass(ok: &[i64], failed: &[(i64, MigrationStatus)]) -> MigrationResponse {
        MigrationResponse {
            environment_id: 7,
            desired_backend: DeploymentBackend::GitOpsController,
            successful_workloads: ok
                .iter()
                .map(|id| change(*id, MigrationStatus::Success))
                .collect(),
            failed_workloads: failed.iter().map(|(id, s)| change(*id, *s)).collect(),
        }
    }

    /// Replays `passes` in order and records the include list of each call
    fn scripted(
        passes: Vec<MigrationResponse>,
    ) -> (
        Arc<Mutex<Vec<Vec<i64>>>>,
        impl FnMut(MigrationRequest) -> std::future::Ready<Result<MigrationResponse>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let mut passes = VecDeque::from(passes);
        let trigger = move |req: MigrationRequest| {
            recorded.lock().unwrap().push(req.include_workload_ids.clone());
            std::future::ready(Ok(passes.pop_front().expect("unexpected extra pass")))
        };
        (calls, trigger)
    }

    #[tokio::test]
    async fn later_passes_only_retry_pending_workloads() {
        let (calls, trigger) = scripted(vec![
            pass(
                &[1],
                &[
                    (2, MigrationStatus::NotYetDeleted),
                    (3, MigrationStatus::PermissionDenied),
                ],
            ),
            pass(&[], &[(2, MigrationStatus::NotYetDeleted)]),
            pass(&[2], &[]),
        ]);

        let response = poll(
            MigrationRequest::new(7, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
            Duration::ZERO,
            Duration::from_secs(60),
            trigger,
        )
        .await
        .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![vec![], vec![2], vec![2]]);
        let ok: Vec<i64> = response
            .successful_workloads
            .iter()
            .map(|c| c.workload_id)
            .collect();
        assert_eq!(ok, vec![1, 2]);
        assert_eq!(response.failed_workloads.len(), 1);
        assert_eq!(response.failed_workloads[0].workload_id, 3);
        assert!(response.pending().is_empty());
    }

    #[tokio::test]
    async fn deadline_reports_what_is_still_pending() {
        let (calls, trigger) = scripted(vec![pass(&[1], &[(2, MigrationStatus::NotYetDeleted)])]);

        let response = poll(
            MigrationRequest::new(7, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
            Duration::from_secs(30),
            Duration::from_secs(1),
            trigger,
        )
        .await
        .unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(response.successful_workloads.len(), 1);
        assert_eq!(response.pending(), vec![2]);
    }

    #[test]
    fn merge_orders_by_workload() {
        let merged = merge(pass(&[4], &[]), pass(&[2], &[(1, MigrationStatus::Failed)]));
        let ok: Vec<i64> = merged
            .successful_workloads
            .iter()
            .map(|c| c.workload_id)
            .collect();
        assert_eq!(ok, vec![2, 4]);
        assert_eq!(merged.failed_workloads[0].workload_id, 1);
    }
}
