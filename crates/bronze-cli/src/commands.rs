use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use bronze_core::{LoadOrchestrator, RunReport};
use bronze_ingest::discover_datasets;
use bronze_model::{LoadConfig, LoadError};
use bronze_warehouse::{PostgresWarehouse, RunRecord};

use crate::cli::{ConfigArgs, LoadArgs};
use bronze_cli::summary::dataset_table;

fn load_config(args: &ConfigArgs) -> Result<LoadConfig> {
    match &args.config {
        Some(path) => LoadConfig::load(path)
            .with_context(|| format!("load configuration from {}", path.display())),
        None => Ok(LoadConfig::survivor_defaults()),
    }
}

pub fn run_datasets(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    println!("{}", dataset_table(&config));
    Ok(())
}

pub fn run_load(args: &LoadArgs) -> Result<RunReport> {
    let config = load_config(&args.config)?;
    let names = selected_datasets(&config, &args.datasets)?;
    let discovered = discover_datasets(&args.data_dir, names.iter().map(String::as_str))
        .with_context(|| format!("scan {}", args.data_dir.display()))?;
    if discovered.is_empty() {
        bail!(
            "no dataset files found in {} for the configured datasets",
            args.data_dir.display()
        );
    }

    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let span = info_span!("run", run_id = %run_id);
    let _guard = span.enter();
    let started = Instant::now();

    let warehouse = PostgresWarehouse::connect(&args.database_url).context("connect to warehouse")?;
    let mut orchestrator = LoadOrchestrator::new(warehouse, config, run_id.as_str());
    if let Some(dir) = &args.report_dir {
        orchestrator = orchestrator.with_report_dir(dir);
    }

    let mut record = RunRecord::new(run_id.as_str());
    if let Some(environment) = &args.environment {
        record = record.with_environment(environment);
    }
    if let Some(source_url) = &args.source_url {
        record = record.with_source_url(source_url);
    }
    orchestrator.start(&record).context("register ingestion run")?;

    info!(datasets = discovered.len(), "starting load");
    for dataset in &discovered {
        let loaded = match dataset.read() {
            Ok(frame) => orchestrator.load_dataset(frame).map(|_| ()),
            Err(err) => {
                let error = LoadError::Ingest {
                    dataset: dataset.name.clone(),
                    message: err.to_string(),
                };
                orchestrator.record_failure(&dataset.name, &error);
                Err(error)
            }
        };
        if loaded.is_err() && !args.continue_on_error {
            warn!(dataset = %dataset.name, "stopping after failed dataset");
            break;
        }
    }

    let report = orchestrator.finish().context("finish ingestion run")?;
    info!(
        status = %report.status,
        elapsed_ms = started.elapsed().as_millis(),
        "load finished"
    );
    Ok(report)
}

/// Configured dataset names, optionally narrowed to `requested`.
fn selected_datasets(config: &LoadConfig, requested: &[String]) -> Result<Vec<String>> {
    if let Some(unknown) = requested
        .iter()
        .find(|name| config.dataset(name.as_str()).is_none())
    {
        bail!("dataset {unknown} is not configured");
    }
    Ok(config
        .dataset_names()
        .filter(|name| requested.is_empty() || requested.iter().any(|wanted| wanted == name))
        .map(str::to_string)
        .collect())
}
