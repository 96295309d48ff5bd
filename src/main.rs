mod clock;
mod diagnostics;
mod display;
mod state;
mod template;
mod time_zone;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::clock::{Clock, DEFAULT_INTERVAL_MS};
use crate::state::container::StateContainer;
use crate::state::persist::FileStore;
use crate::template::Mustache;
use crate::time_zone::{ChronoTzFormatter, Locale, ZoneFormatter, detect_viewer_time_zone};
use crate::ui::app::RunOptions;
use crate::ui::render::render_screen;

#[derive(Parser, Debug)]
#[command(
    name = "worldclock",
    version,
    about = "Terminal world clock: your time next to any number of time zones"
)]
struct Cli {
    #[arg(long, default_value = "worldclock.json")]
    store: PathBuf,

    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS as i64, allow_negative_numbers = true)]
    interval_ms: i64,

    #[arg(long)]
    locale: Option<String>,

    #[arg(long)]
    time_zone: Option<String>,

    #[arg(long = "add", value_name = "ZONE")]
    add: Vec<String>,

    #[arg(long = "rename", value_name = "INDEX=LABEL", value_parser = parse_rename)]
    rename: Vec<(usize, String)>,

    #[arg(long = "delete", value_name = "INDEX")]
    delete: Vec<usize>,

    #[arg(long)]
    user_label: Option<String>,

    #[arg(long)]
    message_format: Option<String>,

    #[arg(long = "custom-datetime", value_name = "ISO")]
    custom_date_time: Option<String>,

    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    #[arg(long)]
    once: bool,

    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    #[arg(long)]
    diagnostics: bool,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let locale = cli
        .locale
        .as_deref()
        .map(Locale::parse)
        .unwrap_or_else(Locale::detect);
    let formatter: Arc<dyn ZoneFormatter> = Arc::new(ChronoTzFormatter::new(locale));

    if let Some(query) = &cli.search {
        for name in formatter.search(query) {
            println!("{name}");
        }
        return Ok(());
    }

    if cli.diagnostics {
        let clock = Clock::with_interval_ms(cli.interval_ms);
        return diagnostics::run_diagnostics(&clock);
    }

    let viewer_zone = match &cli.time_zone {
        Some(zone) => formatter.resolve(zone)?,
        None => detect_viewer_time_zone(),
    };
    debug!(locale = %formatter.locale().tag(), "starting");

    let store = FileStore::new(&cli.store);
    let store_label = store.path().display().to_string();
    let mut container = StateContainer::new(Box::new(store), Arc::clone(&formatter), viewer_zone)
        .with_context(|| format!("failed to load {store_label}"))?;
    apply_mutations(&cli, &mut container, formatter.as_ref())?;
    debug!(
        store = %store_label,
        time_zones = container.state().time_zones.len(),
        viewer_zone = %container.viewer_zone(),
        now_ms = container.now_ms(),
        "state ready"
    );
    if let Err(err) = container.view() {
        debug!(error = %err, "current state cannot be fully displayed");
    }

    let renderer = Mustache;
    if cli.once {
        print!(
            "{}",
            render_screen(&container.snapshot(), formatter.as_ref(), &renderer)
        );
        return Ok(());
    }

    let clock = Arc::new(Clock::with_interval_ms(cli.interval_ms));
    let result = ui::app::run(
        &clock,
        container,
        &renderer,
        RunOptions {
            max_ticks: cli.ticks,
        },
    );
    clock.stop();
    result
}

fn apply_mutations(
    cli: &Cli,
    container: &mut StateContainer,
    formatter: &dyn ZoneFormatter,
) -> Result<()> {
    if let Some(label) = &cli.user_label {
        container.set_user_label(label.as_str())?;
    }
    if let Some(format) = &cli.message_format {
        container.set_message_format(format.as_str())?;
    }
    for (index, label) in &cli.rename {
        container.rename_entry(*index, label.as_str())?;
    }
    for index in &cli.delete {
        container.delete_entry(*index)?;
    }
    for zone in &cli.add {
        let name = formatter.resolve(zone)?;
        container.add_time_zone(&name)?;
    }
    if let Some(value) = &cli.custom_date_time {
        container.set_custom_date_time(true, Some(value.clone()))?;
    }
    Ok(())
}

fn parse_rename(raw: &str) -> Result<(usize, String)> {
    let (index, label) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected INDEX=LABEL, got '{raw}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid index '{}'", index.trim()))?;
    Ok((index, label.to_string()))
}
