//! CLI subprocess integration tests.
//!
//! These tests invoke the `corral` binary as a subprocess and verify exit
//! codes, stdout content, and JSON output. Lifecycle commands run against
//! stand-in `lxc-*` scripts placed first on `PATH`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fs::create_dir_all(sandbox.bin()).unwrap();
        fs::create_dir_all(sandbox.tmp()).unwrap();
        for tool in [
            "lxc-create",
            "lxc-start",
            "lxc-execute",
            "lxc-wait",
            "lxc-stop",
            "lxc-destroy",
        ] {
            sandbox.script(tool, "exit 0");
        }
        sandbox
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn bin(&self) -> PathBuf {
        self.root().join("bin")
    }

    fn tmp(&self) -> PathBuf {
        self.root().join("tmp")
    }

    fn log(&self) -> PathBuf {
        self.root().join("calls.log")
    }

    fn script(&self, tool: &str, body: &str) {
        let path = self.bin().join(tool);
        fs::write(
            &path,
            format!(
                "#!/bin/sh\necho \"$(basename \"$0\") $*\" >> '{}'\n{body}\n",
                self.log().display()
            ),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn write_settings(&self, content: &str) -> PathBuf {
        let path = self.root().join("corral.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn corral(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_corral"));
        let path = format!(
            "{}:{}",
            self.bin().display(),
            std::env::var("PATH").unwrap_or_default()
        );
        cmd.current_dir(self.root())
            .env("PATH", path)
            .env("TMPDIR", self.tmp())
            .env_remove("CORRAL_LOG")
            .arg("--lock-dir")
            .arg(self.root().join("locks"));
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.corral().args(args).output().unwrap()
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn scratch_dirs(&self) -> usize {
        fs::read_dir(self.tmp())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".lxc-corral"))
            .count()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("corral"));
}

#[test]
fn show_config_prints_defaults() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["show-config", "--name", "web"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("LXC web config:"));
    assert!(text.contains("lxc.utsname = web"));
    assert!(text.contains("lxc.network.type = empty"));
    assert_eq!(sandbox.scratch_dirs(), 0);
}

#[test]
fn show_config_json_includes_seccomp_policy() {
    let sandbox = Sandbox::new();
    sandbox.write_settings(
        r#"
[containers]
default_container_name = "db"

[lxc]
syscall_allowlist = ["read", "write"]

[lxc.options]
"lxc.cap.drop" = ["sys_admin", "mac_admin"]
"#,
    );
    let output = sandbox.run(&["--json", "show-config"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["name"], "db");
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["file"], "syscall_whitelist");
    assert_eq!(files[0]["content"], "1\nwhitelist\n0\nread\nwrite\n");
    let config = files[1]["content"].as_str().unwrap();
    assert!(config.contains("lxc.cap.drop = sys_admin, mac_admin"));
    assert!(config.contains("lxc.seccomp = "));
}

#[test]
fn show_config_removes_scratch_even_with_no_cleanup() {
    let sandbox = Sandbox::new();
    sandbox.write_settings("[containers]\nno_cleanup = true\n");
    let output = sandbox.run(&["show-config", "--name", "web"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(sandbox.scratch_dirs(), 0);
}

#[test]
fn missing_container_name_is_config_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["show-config"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("default_container_name"));
}

#[test]
fn invalid_settings_file_is_config_error() {
    let sandbox = Sandbox::new();
    let path = sandbox.write_settings("[containers]\nbogus = 1\n");
    let output = sandbox.run(&["--config", path.to_str().unwrap(), "show-config"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn non_string_lxc_option_is_config_error() {
    let sandbox = Sandbox::new();
    sandbox.write_settings("[lxc.options]\n\"lxc.tty\" = 4\n");
    let output = sandbox.run(&["show-config", "--name", "web"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("lxc.tty"));
}

#[test]
fn unknown_reference_point_is_config_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["cycle", "--name", "web", "--ref-point", "moon"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown reference point"));
}

#[test]
fn unregistered_reference_point_is_config_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[
        "cycle",
        "--name",
        "web",
        "--ref-point",
        "container",
        "--dry-run",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("no lxc client"));
}

#[test]
fn dry_run_cycle_reports_every_command() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--json", "cycle", "--name", "web", "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["state"], "destroyed");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["setup"].as_array().unwrap().len(), 4);
    let commands: Vec<String> = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_owned())
        .filter(|c| c.starts_with("lxc-"))
        .collect();
    assert_eq!(commands.len(), 7);
    assert!(commands[0].starts_with("lxc-create -n web -f "));
    assert_eq!(commands[6], "lxc-destroy -n web");
    assert!(sandbox.calls().is_empty());
}

#[test]
fn local_cycle_runs_fake_lxc_tools() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["cycle", "--name", "web", "--ref-point", "local_host"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let tools: Vec<String> = sandbox
        .calls()
        .iter()
        .map(|l| l.split_whitespace().next().unwrap().to_owned())
        .collect();
    assert_eq!(
        tools,
        vec![
            "lxc-create",
            "lxc-wait",
            "lxc-start",
            "lxc-wait",
            "lxc-stop",
            "lxc-wait",
            "lxc-destroy"
        ]
    );
    assert!(stdout(&output).contains("container web is"));
    assert_eq!(sandbox.scratch_dirs(), 0);
}

#[test]
fn failed_start_exits_with_command_failure() {
    let sandbox = Sandbox::new();
    sandbox.script("lxc-start", "echo 'no rootfs' >&2; exit 1");
    let output = sandbox.run(&["cycle", "--name", "web", "--ref-point", "local_host"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("setup failed at start"));
    assert!(sandbox.calls().iter().any(|c| c.starts_with("lxc-destroy")));
    assert_eq!(sandbox.scratch_dirs(), 0);
}

#[test]
fn exec_prints_output_and_mirrors_status() {
    let sandbox = Sandbox::new();
    sandbox.script("lxc-execute", "shift 5; echo \"args: $*\"; exit 5");
    let output = sandbox.run(&[
        "exec",
        "--name",
        "job",
        "--ref-point",
        "local_host",
        "--",
        "echo",
        "two words",
    ]);
    assert_eq!(output.status.code(), Some(5));
    assert_eq!(stdout(&output), "args: echo two words\n");
    assert_eq!(sandbox.scratch_dirs(), 0);
}

#[test]
fn exec_json_carries_result() {
    let sandbox = Sandbox::new();
    sandbox.script("lxc-execute", "echo ok");
    let output = sandbox.run(&[
        "--json",
        "exec",
        "--name",
        "job",
        "--ref-point",
        "local_host",
        "--",
        "true",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["result"]["exit_status"], 0);
    assert_eq!(json["result"]["output"], "ok\n");
}

#[test]
fn exec_requires_a_command() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["exec", "--name", "job"]);
    assert!(!output.status.success());
}
