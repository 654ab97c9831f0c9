mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_COMMAND_FAILED, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use corral_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "corral",
    version,
    about = "Drive container lifecycles over SSH or a local shell"
)]
struct Cli {
    /// Settings file. Defaults to ./corral.toml when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding per-container lock files.
    #[arg(long, global = true)]
    lock_dir: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the configuration files generated for a container.
    ShowConfig {
        /// Container name (defaults to containers.default_container_name).
        #[arg(long)]
        name: Option<String>,
    },
    /// Run one command in a transient application container.
    Exec {
        /// Container name (defaults to containers.default_container_name).
        #[arg(long)]
        name: Option<String>,
        /// Where commands are issued from.
        #[arg(long, default_value = "host_to_container")]
        ref_point: String,
        /// Record the commands instead of issuing them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Give up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
        /// Treat the command as finished once this text is printed.
        #[arg(long)]
        prompt: Option<String>,
        /// Command and arguments to run.
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Create and start a container, then stop, destroy and clean it.
    Cycle {
        /// Container name (defaults to containers.default_container_name).
        #[arg(long)]
        name: Option<String>,
        /// Where commands are issued from.
        #[arg(long, default_value = "host_to_container")]
        ref_point: String,
        /// Keep the container running this many seconds before teardown.
        #[arg(long, default_value_t = 0)]
        hold: u64,
        /// Record the commands instead of issuing them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CORRAL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let json_output = cli.json;
    let lock_dir = cli
        .lock_dir
        .unwrap_or_else(|| std::env::temp_dir().join("corral-locks"));

    let result = commands::load_settings(cli.config.as_deref()).and_then(|settings| {
        match cli.command {
            Commands::ShowConfig { name } => {
                commands::show_config::run(&settings, name.as_deref(), json_output)
            }
            Commands::Exec {
                name,
                ref_point,
                dry_run,
                timeout,
                prompt,
                command,
            } => commands::exec::run(
                &settings,
                &commands::Target {
                    name: name.as_deref(),
                    ref_point: &ref_point,
                    dry_run,
                    lock_dir: &lock_dir,
                },
                &command,
                commands::exec::Limits {
                    timeout,
                    prompt: prompt.as_deref(),
                },
                json_output,
            ),
            Commands::Cycle {
                name,
                ref_point,
                hold,
                dry_run,
            } => commands::cycle::run(
                &settings,
                &commands::Target {
                    name: name.as_deref(),
                    ref_point: &ref_point,
                    dry_run,
                    lock_dir: &lock_dir,
                },
                hold,
                json_output,
            ),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("settings error:")
                || msg.starts_with("failed to read settings")
                || msg.starts_with("failed to parse settings")
                || msg.starts_with("invalid settings")
                || msg.starts_with("config value for")
                || msg.starts_with("unknown ")
                || msg.starts_with("missing setting:")
                || msg.starts_with("no lxc client")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("command failed:") {
                EXIT_COMMAND_FAILED
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
