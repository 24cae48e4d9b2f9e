use std::{process::ExitCode, sync::Arc};
use tracing::error;
use tracing_subscriber::EnvFilter;

use dynamite::{
    cli::{Cli, parse_args},
    config::load_settings,
    error::NsmError,
    executor::SystemExecutor,
    install::HttpFetcher,
    process::{ProcessControl, SystemProcesses},
    profile::SystemInventory,
    prompt::LinePrompter,
    status::{self, StatusReport},
    strategy::ResultFormat,
};
use serde_json::Value;

fn main() -> ExitCode {
    let args = parse_args();
    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_clean_exit() => {
            match err.root_cause() {
                NsmError::Declined => println!("Exiting"),
                cause => println!("{cause}"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<(), NsmError> {
    let settings = load_settings(args.config.as_deref(), args.root.as_deref())?;
    let layout = settings.layout(args.root.as_deref());
    let control: Arc<dyn ProcessControl> = Arc::new(SystemProcesses);

    let inventory = SystemInventory::new(layout.clone(), settings.clone(), control.clone());
    let strategy = args.command.plan(&layout, &inventory);

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&strategy)?);
        return Ok(());
    }

    let mut executor = SystemExecutor::new(
        layout,
        settings.clone(),
        control,
        Box::new(HttpFetcher::new(settings.download.timeout)),
        Box::new(LinePrompter::stdio()),
    );
    let report = strategy.execute(&mut executor)?;

    let reports_json = strategy
        .steps()
        .iter()
        .any(|step| step.format == ResultFormat::Json);
    if !reports_json {
        return Ok(());
    }

    if args.command.wants_table() {
        let report: StatusReport = serde_json::from_value(Value::Object(report))?;
        print!("{}", status::render_table(&report, chrono::Utc::now()));
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
