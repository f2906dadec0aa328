mod bootstrap;

use std::sync::Arc;

use anyhow::{Context, Result};
use ccbench_core::display::DisplayConfig;
use ccbench_core::settings::Settings;
use ccbench_data::aggregator::Aggregator;
use ccbench_data::analysis::{ingest_results, IngestReport};
use ccbench_data::exporter::{write_normalized_table, CsvDirectorySink, RenderSink, SummaryExporter};
use ccbench_runtime::orchestrator::AggregationOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;
    tracing::info!("ccbench v{} starting", env!("CARGO_PKG_VERSION"));

    let display_path = settings.display_config_path();
    if settings.write_display_config {
        DisplayConfig::default()
            .save_to(&display_path)
            .with_context(|| format!("writing {}", display_path.display()))?;
        tracing::info!("Wrote default display config to {}", display_path.display());
    }
    let display = DisplayConfig::load_from(&display_path);

    bootstrap::ensure_output_dirs(&settings)?;

    let (store, report) = ingest_results(&settings.results_dir, &settings.log_name)?;

    if let Some(dir) = &settings.normalized_dir {
        for trial in store.iter_trials() {
            write_normalized_table(dir, trial)?;
        }
        tracing::info!("Wrote {} normalized tables to {}", store.len(), dir.display());
    }

    let store = Arc::new(store);
    let overview = Aggregator::new(&store).algorithm_overview();

    let orchestrator = AggregationOrchestrator::new(Arc::clone(&store), usize::from(settings.workers));
    let (mut rx, handle) = orchestrator.start();

    let mut reports = Vec::new();
    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(condition_report) => reports.push(condition_report),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; stopping aggregation");
                handle.abort();
                return Ok(());
            }
        }
    }
    reports.sort_by(|a, b| a.condition.cmp(&b.condition));

    let exporter = SummaryExporter::new(display);
    let mut sink = CsvDirectorySink::new(&settings.output_dir);
    for condition_report in reports {
        exporter.export(&mut sink, condition_report)?;
    }
    sink.finish(&overview)?;
    tracing::info!(
        "Wrote {} files under {}",
        sink.written().len(),
        settings.output_dir.display()
    );

    print_report(&report);
    Ok(())
}

/// Per-condition ingested/skipped table on stdout.
fn print_report(report: &IngestReport) {
    let rows = report.per_condition();
    let width = rows
        .iter()
        .map(|r| r.condition.as_ref().map_or(10, |c| c.to_string().len()))
        .max()
        .unwrap_or(10)
        .max("condition".len());

    println!("{:<width$}  {:>8}  {:>7}", "condition", "ingested", "skipped");
    for row in &rows {
        let name = row
            .condition
            .as_ref()
            .map_or_else(|| "unlabelled".to_string(), ToString::to_string);
        println!("{:<width$}  {:>8}  {:>7}", name, row.ingested, row.skipped);
    }
    println!(
        "{:<width$}  {:>8}  {:>7}",
        "total",
        report.total_ingested(),
        report.total_skipped()
    );
}
