use super::{json_pretty, print_recorded, Prepared, Target, EXIT_COMMAND_FAILED, EXIT_SUCCESS};
use corral_core::ExecOptions;
use corral_runtime::shell_quote;
use corral_schema::Settings;
use std::time::Duration;
use tracing::debug;

pub struct Limits<'a> {
    pub timeout: Option<u64>,
    pub prompt: Option<&'a str>,
}

/// Command line for the remote shell, keeping each argument a single word.
fn join_argv(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run(
    settings: &Settings,
    target: &Target<'_>,
    command: &[String],
    limits: Limits<'_>,
    json: bool,
) -> Result<u8, String> {
    let Prepared {
        factory,
        name,
        connection,
        recorder,
        lock,
    } = target.prepare(settings)?;
    debug!("holding {}", lock.path().display());

    let mut client = factory
        .build(Some(name.as_str()), connection)
        .map_err(|e| e.to_string())?;
    let options = ExecOptions {
        prompt: limits.prompt.map(str::to_owned),
        timeout: limits.timeout.map(Duration::from_secs),
    };

    let outcome = client.execute(&join_argv(command), &options);
    let cleaned = client.clean();
    let result = outcome.map_err(|e| format!("command failed: {e}"))?;
    cleaned.map_err(|e| format!("cleanup of {name} failed: {e}"))?;

    if json {
        let payload = serde_json::json!({
            "name": name.as_str(),
            "dry_run": target.dry_run,
            "result": result,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if let Some(recorder) = &recorder {
            print_recorded(recorder);
        }
        print!("{}", result.output_lossy());
    }

    if result.success() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(u8::try_from(result.exit_status()).unwrap_or(EXIT_COMMAND_FAILED))
    }
}
