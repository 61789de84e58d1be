//! Timberlake - follow MapReduce jobs from a job-tracker dashboard server.

mod report;

use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use timberlake_cli::Args;
use timberlake_http::HttpJobSource;
use timberlake_state::{Job, JobState, SyncService, ViewSpec};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type Service = SyncService<HttpJobSource>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let source = HttpJobSource::new(args.url.as_str()).into_diagnostic()?;
    let mut service = SyncService::new(source, args.sync_config());

    if let Some(id) = &args.kill {
        service.kill_job(id).await.into_diagnostic()?;
        println!("Kill request for {} accepted", id);
        return Ok(());
    }

    if let Some(id) = &args.job {
        focus_job(&service, &args, id).await?;
    }

    if args.once {
        if args.job.is_none() {
            service.refresh_list().await.into_diagnostic()?;
        }
        service.flush().await;
        print_report(&service, &args).await?;
        return Ok(());
    }

    follow(&mut service, &args).await
}

/// Pin `id` and fetch its detail. Only `--once` gives up on a failed fetch;
/// a follow keeps the job focused so stream updates still fill it in.
async fn focus_job(service: &Service, args: &Args, id: &str) -> Result<()> {
    let focused = service.focus(id).await;
    if args.once {
        focused.into_diagnostic()?;
    }
    Ok(())
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reprint after every model change until the tick limit or Ctrl-C.
async fn follow(service: &mut Service, args: &Args) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = service
        .subscribe(Box::new(move |jobs: &[Job]| {
            let _ = tx.send(jobs.len());
        }))
        .await;
    service.start();

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(count) = update else { break };
                ticks += 1;
                tracing::debug!("Model changed ({} jobs)", count);
                print_report(service, args).await?;
                if args.watch_ticks.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    service.unsubscribe(subscription).await;
    service.shutdown();
    Ok(())
}

async fn print_report(service: &Service, args: &Args) -> Result<()> {
    let now = Utc::now();

    if let Some(id) = &args.job {
        match service.job_detail(id).await {
            Some(detail) => println!("{}\n", report::render_detail(&detail, now)),
            None if args.once => return Err(miette::miette!("Job {} is not loaded", id)),
            None => tracing::warn!("Job {} is not loaded yet", id),
        }
        return Ok(());
    }

    let running_spec = args.running_view();
    let finished_spec = args.finished_view();
    let running = service.get_view(&running_spec).await;
    let finished = service.get_view(&finished_spec).await;
    let summary = service.cluster_summary().await;
    let waiting = service
        .get_view(&ViewSpec::new(JobState::PENDING))
        .await
        .total_count;
    println!(
        "{}\n",
        report::render_tables(
            (&summary, waiting),
            (running_spec.sort, &running),
            (finished_spec.sort, &finished),
            now
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_service() -> Service {
        let source = HttpJobSource::new("http://127.0.0.1:1").unwrap();
        SyncService::new(source, Default::default())
    }

    #[tokio::test]
    async fn test_failed_focus_keeps_following() {
        let service = unreachable_service();
        let args = Args::parse_from(["timberlake", "--job", "application_1_0001"]);

        assert!(focus_job(&service, &args, "application_1_0001").await.is_ok());
        assert_eq!(service.store().lock().await.focused(), Some("job_1_0001"));
    }

    #[tokio::test]
    async fn test_failed_focus_ends_single_shot() {
        let service = unreachable_service();
        let args = Args::parse_from(["timberlake", "--job", "job_1_0001", "--once"]);

        assert!(focus_job(&service, &args, "job_1_0001").await.is_err());
    }
}
