use std::path::PathBuf;

use clap::Parser;

use wfexport::{export, monitoring, telemetry};

/// Export Parsl monitoring data as WfCommons interchange documents.
#[derive(Parser)]
#[command(name = "wfexport", version, about, long_about = None)]
struct Cli {
    /// Directory containing the monitoring database (default: ./runinfo)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Monitoring database filename (default: monitoring.db)
    #[arg(short, long)]
    input: Option<String>,

    /// Export only this run; every run in the store otherwise
    #[arg(short, long)]
    runid: Option<String>,

    /// Output JSON file, used as a `<base>_<run_id><ext>` template when
    /// exporting every run
    #[arg(short, long)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    telemetry::init();
    miette::set_panic_hook();

    let cli = Cli::parse();
    let data = monitoring::load(cli.path.as_deref(), cli.input.as_deref()).await?;

    match cli.runid {
        Some(run_id) => export::export_run(&data, &run_id, &cli.output)?,
        None => {
            let written = export::export_all(&data, &cli.output)?;
            tracing::info!(written, "export complete");
        }
    }
    Ok(())
}
