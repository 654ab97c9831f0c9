use crate::CoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the syscall policy inside the scratch directory.
pub const SECCOMP_FILE_NAME: &str = "syscall_whitelist";

// Policy format version 1, allowlist mode, default action 0.
const POLICY_HEADER: &str = "1\nwhitelist\n0\n";

/// Allowlist policy text: the header followed by one syscall per line.
pub fn render_seccomp_policy(syscalls: &[String]) -> String {
    let mut policy = String::from(POLICY_HEADER);
    for syscall in syscalls {
        policy.push_str(syscall);
        policy.push('\n');
    }
    policy
}

pub fn write_seccomp_policy(dir: &Path, syscalls: &[String]) -> Result<PathBuf, CoreError> {
    let path = dir.join(SECCOMP_FILE_NAME);
    fs::write(&path, render_seccomp_policy(syscalls))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_starts_with_header() {
        let policy = render_seccomp_policy(&["read".to_owned(), "write".to_owned()]);
        assert_eq!(policy, "1\nwhitelist\n0\nread\nwrite\n");
    }

    #[test]
    fn empty_allowlist_is_header_only() {
        assert_eq!(render_seccomp_policy(&[]), "1\nwhitelist\n0\n");
    }

    #[test]
    fn written_under_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_seccomp_policy(dir.path(), &["exit_group".to_owned()]).unwrap();
        assert_eq!(path.file_name().unwrap(), SECCOMP_FILE_NAME);
        assert!(fs::read_to_string(path).unwrap().ends_with("exit_group\n"));
    }
}
