pub mod cycle;
pub mod exec;
pub mod show_config;

use corral_core::{
    connect, ClientFactory, ContainerLock, LifecycleState, ReferencePoint, StepOutcome,
};
use corral_runtime::{Connection, RecordingConnection};
use corral_schema::{parse_settings_file, ContainerName, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_COMMAND_FAILED: u8 = 3;

const DEFAULT_SETTINGS_FILE: &str = "corral.toml";

/// Container selection shared by the lifecycle commands.
pub struct Target<'a> {
    pub name: Option<&'a str>,
    pub ref_point: &'a str,
    pub dry_run: bool,
    pub lock_dir: &'a Path,
}

/// Everything a lifecycle command needs before it issues anything.
pub struct Prepared {
    pub factory: ClientFactory,
    pub name: ContainerName,
    pub connection: Arc<dyn Connection>,
    /// Set for `--dry-run`: the transport that recorded every command.
    pub recorder: Option<Arc<RecordingConnection>>,
    pub lock: ContainerLock,
}

impl Target<'_> {
    pub fn prepare(&self, settings: &Settings) -> Result<Prepared, String> {
        let reference_point: ReferencePoint =
            self.ref_point.parse().map_err(|e: corral_core::CoreError| e.to_string())?;
        let factory =
            ClientFactory::from_settings(settings, reference_point).map_err(|e| e.to_string())?;
        let name = factory
            .container_name(self.name)
            .map_err(|e| e.to_string())?;
        let recorder = self.dry_run.then(|| Arc::new(RecordingConnection::new()));
        let connection: Arc<dyn Connection> = match &recorder {
            Some(recorder) => recorder.clone(),
            None => connect(&settings.containers, reference_point).map_err(|e| e.to_string())?,
        };
        let lock = ContainerLock::try_acquire(self.lock_dir, name.as_str())
            .map_err(|e| format!("container lock: {e}"))?
            .ok_or_else(|| format!("container lock: {name} is in use by another corral process"))?;
        Ok(Prepared {
            factory,
            name,
            connection,
            recorder,
            lock,
        })
    }
}

/// Settings from `path`, or from `./corral.toml` when it exists, or defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => parse_settings_file(path).map_err(|e| e.to_string()),
        None => {
            let default = Path::new(DEFAULT_SETTINGS_FILE);
            if default.exists() {
                parse_settings_file(default).map_err(|e| e.to_string())
            } else {
                Ok(Settings::default())
            }
        }
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: LifecycleState) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        LifecycleState::Running => Style::new().cyan().bold().apply_to(text).to_string(),
        LifecycleState::Created | LifecycleState::Started => {
            Style::new().yellow().apply_to(text).to_string()
        }
        LifecycleState::Stopped => Style::new().blue().apply_to(text).to_string(),
        LifecycleState::Destroyed => Style::new().dim().apply_to(text).to_string(),
        LifecycleState::Initial => text,
    }
}

/// Commands a dry run would have issued, one per line.
pub fn print_recorded(recorder: &RecordingConnection) {
    for command in recorder.commands() {
        println!("  $ {command}");
    }
}

/// One human-readable line per step.
pub fn format_outcome(outcome: &StepOutcome) -> String {
    use console::Style;
    if outcome.skipped {
        return format!("  {} {} (skipped)", Style::new().dim().apply_to("-"), outcome.step);
    }
    if let Some(error) = &outcome.error {
        return format!("  {} {}: {error}", Style::new().red().apply_to("✗"), outcome.step);
    }
    match &outcome.result {
        Some(result) if result.is_synthetic() => {
            format!("  {} {} (nothing to do)", Style::new().green().apply_to("✓"), outcome.step)
        }
        Some(result) if result.success() => {
            format!("  {} {}", Style::new().green().apply_to("✓"), outcome.step)
        }
        Some(result) => format!(
            "  {} {}: exit status {}",
            Style::new().red().apply_to("✗"),
            outcome.step,
            result.exit_status()
        ),
        None => format!("  {} {}", Style::new().green().apply_to("✓"), outcome.step),
    }
}
