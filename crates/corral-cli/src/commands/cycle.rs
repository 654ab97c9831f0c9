use super::{
    colorize_state, format_outcome, json_pretty, print_recorded, spin_fail, spin_ok, spinner,
    Prepared, Target, EXIT_SUCCESS,
};
use corral_core::{shutdown_requested, ContainerClient, LifecycleScope, StepOutcome};
use corral_schema::Settings;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const HOLD_POLL: Duration = Duration::from_millis(100);

/// Sleep for `hold`, waking early when Ctrl-C is pressed.
fn hold_running(hold: Duration) {
    let deadline = Instant::now() + hold;
    while Instant::now() < deadline && !shutdown_requested() {
        thread::sleep(HOLD_POLL.min(deadline.saturating_duration_since(Instant::now())));
    }
}

fn print_steps(title: &str, outcomes: &[StepOutcome]) {
    println!("{title}:");
    for outcome in outcomes {
        println!("{}", format_outcome(outcome));
    }
}

pub fn run(settings: &Settings, target: &Target<'_>, hold: u64, json: bool) -> Result<u8, String> {
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

    let pb = (!json).then(|| spinner(&format!("starting container {name}...")));
    let scope = match LifecycleScope::enter(&mut client) {
        Ok(scope) => scope,
        Err(setup) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("container {name} failed to start"));
            }
            if json {
                let payload = serde_json::json!({
                    "name": name.as_str(),
                    "failed_step": setup.step,
                    "setup": setup.outcomes,
                    "teardown": setup.teardown.outcomes,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                print_steps("setup", &setup.outcomes);
                print_steps("teardown", &setup.teardown.outcomes);
            }
            return Err(format!("command failed: {setup}"));
        }
    };
    if let Some(pb) = &pb {
        spin_ok(pb, &format!("container {name} is running"));
    }

    if hold > 0 {
        hold_running(Duration::from_secs(hold));
    }

    let setup = scope.setup_outcomes().to_vec();
    let report = scope.exit();
    let final_state = client.state();

    if json {
        let payload = serde_json::json!({
            "name": name.as_str(),
            "reference_point": factory.reference_point(),
            "dry_run": target.dry_run,
            "setup": setup,
            "teardown": report.outcomes,
            "state": final_state,
            "commands": recorder.as_ref().map(|r| r.commands()),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_steps("setup", &setup);
        print_steps("teardown", &report.outcomes);
        if let Some(recorder) = &recorder {
            println!("commands:");
            print_recorded(recorder);
        }
        println!("container {name} is {}", colorize_state(final_state));
    }

    if report.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Err(format!("command failed: {report}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hold_returns_immediately() {
        let start = Instant::now();
        hold_running(Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn short_hold_waits() {
        let start = Instant::now();
        hold_running(Duration::from_millis(150));
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
