use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use jobstate_core::app::{
    HandlerRegistry, JobCounts, JobQuery, JobService, JobSort, WorkerGroup,
};
use jobstate_core::config;
use jobstate_core::domain::{JobRequest, JobResponse};
use jobstate_core::impls::InMemoryClaimStore;
use jobstate_core::ports::JobConfigSource;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

mod cli;
mod demo;
mod logging;

use demo::DemoHandler;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("jobstate error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let sort = JobSort::parse(&args.sort).context("parsing --sort")?;

    let service_config = config::load_from_path(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;
    let configs = Arc::new(service_config.job_configs()?);
    let service = Arc::new(JobService::new(
        Arc::new(InMemoryClaimStore::new()),
        configs.clone(),
    ));

    // one handler per distinct task name
    let mut registry = HandlerRegistry::new();
    let mut registered = HashSet::new();
    for job in &service_config.jobs {
        for task in &job.tasks {
            if registered.insert(task.name.clone()) {
                let handler = Arc::new(DemoHandler::new(args.fail_first));
                registry.register(task.name.clone(), handler)?;
            }
        }
    }
    let registry = Arc::new(registry);

    for job_name in configs.job_names() {
        for i in 0..args.jobs_per_type {
            let request = JobRequest::default().with_description(format!("demo #{i}"));
            service.create_job(&job_name, request).await?;
        }
    }

    let settings = service_config.worker.settings();
    let groups: Vec<WorkerGroup> = configs
        .job_names()
        .into_iter()
        .map(|job_name| {
            WorkerGroup::spawn(
                service_config.worker.workers,
                job_name,
                Arc::clone(&service),
                Arc::clone(&registry),
                settings.clone(),
            )
        })
        .collect();
    info!(
        groups = groups.len(),
        workers = service_config.worker.workers,
        "workers running"
    );

    let settled = tokio::select! {
        settled = wait_until_settled(&service, Duration::from_secs(args.timeout_secs)) => settled?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            warn!("interrupted");
            false
        }
    };

    for group in groups {
        group.shutdown_and_join().await;
    }
    if !settled {
        warn!("stopped before every job settled");
    }

    print_summary(&service, configs.as_ref(), sort).await
}

async fn wait_until_settled(service: &JobService, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let jobs = service.get_jobs(&JobQuery::all()).await?;
        if JobCounts::tally(&jobs).is_settled() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn print_summary(
    service: &JobService,
    configs: &dyn JobConfigSource,
    sort: JobSort,
) -> Result<()> {
    for job_name in configs.job_names() {
        let query = JobQuery::by_name(job_name.clone()).sorted_by(sort.clone());
        let jobs = service.get_jobs(&query).await?;
        let counts = JobCounts::tally(&jobs);
        println!(
            "{job_name}: total={} completed={} error={} processing={} ready={}",
            counts.total(),
            counts.completed,
            counts.error,
            counts.processing,
            counts.ready
        );
        for job in &jobs {
            let response = JobResponse::from(job);
            println!("{}", serde_json::to_string(&response)?);
        }
    }
    Ok(())
}
