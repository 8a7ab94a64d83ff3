use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use rtsnap::builder::SnapshotBuilder;
use rtsnap::config::{self, Config, load_config, load_config_from_path};
use rtsnap::logging;
use rtsnap::sections::Section;
use rtsnap::system::host::HostProvider;

#[derive(Parser)]
#[command(
    name = "rtsnap",
    about = "Print a JSON snapshot of a process's runtime state"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process to inspect (defaults to rtsnap itself)
    #[arg(long)]
    pid: Option<u32>,

    /// Section to include, in output order; repeatable
    #[arg(long = "section", value_enum)]
    sections: Vec<Section>,

    /// Maximum stack frames per thread
    #[arg(long)]
    stack_depth: Option<usize>,

    /// Include per-pool memory detail
    #[arg(long, default_value_t = false)]
    pools: bool,

    /// Single-line output
    #[arg(long, default_value_t = false)]
    compact: bool,

    /// Every section: memory with pools, runtime, threads, class loading
    #[arg(long, default_value_t = false, conflicts_with_all = ["sections", "pools"])]
    full: bool,

    /// Log filter, e.g. `debug` or `rtsnap=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init(&config.logging)?;

    let provider = match cli.pid {
        Some(pid) => HostProvider::for_pid(pid),
        None => HostProvider::current(),
    }
    .wrap_err("failed to attach to process")?
    .with_search_path_var(config.host.search_path_var.clone());

    let builder = build_snapshot(provider, &cli, &config.snapshot)?;
    let rendered = if config.snapshot.pretty {
        builder.render_pretty()?
    } else {
        builder.render_compact()?
    };
    println!("{rendered}");

    Ok(())
}

fn build_snapshot(
    provider: HostProvider,
    cli: &Cli,
    snapshot: &config::SnapshotConfig,
) -> Result<SnapshotBuilder<HostProvider>> {
    tracing::info!(
        pid = provider.pid(),
        sections = ?snapshot.sections,
        depth = snapshot.stack_trace_depth,
        "capturing snapshot"
    );

    if cli.full {
        return SnapshotBuilder::full(provider, snapshot.stack_trace_depth)
            .wrap_err("failed to capture full snapshot");
    }

    let mut builder = SnapshotBuilder::new(provider);
    for &section in &snapshot.sections {
        let added = match section {
            Section::Runtime => builder.add_runtime_section(),
            Section::Thread => builder.add_thread_section_with_depth(snapshot.stack_trace_depth),
            Section::Memory => builder.add_memory_section_with_pools(snapshot.include_pools),
            Section::ClassLoading => builder.add_class_loading_section(),
        };
        added.wrap_err_with(|| format!("failed to capture `{}` section", section.key()))?;
    }
    Ok(builder)
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if !cli.sections.is_empty() {
        config.snapshot.sections = cli.sections.clone();
    }
    if let Some(depth) = cli.stack_depth {
        config.snapshot.stack_trace_depth = depth;
    }
    if cli.pools {
        config.snapshot.include_pools = true;
    }
    if cli.compact {
        config.snapshot.pretty = false;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    config
}
