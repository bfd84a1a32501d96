use clap::Parser;
use config::{Config, RestartMode};
use needrestart_rs::cli::Cli;
use needrestart_rs::output::{self, TermProgress};
use scanner::{
    Collaborators, HookRunner, NoopHookRunner, NoopInterpreterProber, NoopProgress, Progress,
    ScanEngine, ShellHookRunner, SystemctlProbe,
};
use tracing::{debug, info, trace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The verbosity flag takes precedence over the environment variable
    // for log control; `NEEDRESTART_LOG` can still set per-crate levels.
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::builder()
        .with_env_var("NEEDRESTART_LOG")
        .from_env()?
        .add_directive(level.parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    let config = load_config(&cli)?;
    debug!(?config, ?cli);

    let hooks: Box<dyn HookRunner> = match ShellHookRunner::new(&config.scan.hook_dir) {
        Ok(runner) => Box::new(runner),
        Err(err) if cli.batch => {
            debug!(%err, "hook directory unavailable, continuing without hooks");
            Box::new(NoopHookRunner)
        }
        Err(err) => return Err(err.into()),
    };

    let progress: Box<dyn Progress> = if cli.batch {
        Box::new(NoopProgress)
    } else {
        Box::new(TermProgress::new(cli.verbose > 0))
    };

    let collab = Collaborators {
        hooks,
        interp: Box::new(NoopInterpreterProber),
        service_manager: Box::new(SystemctlProbe),
        progress,
    };

    let mut engine = ScanEngine::new(config.clone(), cli.verbose > 0, collab)?;
    let report = engine.run()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if cli.batch {
        report.write_batch(&mut out, env!("CARGO_PKG_VERSION"))?;
    } else {
        if config.ui.restart_mode != RestartMode::List {
            info!(mode = ?config.ui.restart_mode, "restart execution is left to the caller; listing only");
        }
        output::render_list(&mut out, &report, &config)?;
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let paths = cli.resolve_config_paths()?;
    trace!(?paths, "config file candidates");
    let mut config = Config::load_multiple(paths)?;
    cli.apply_overrides(&mut config)?;
    Ok(config)
}
