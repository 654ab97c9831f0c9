use std::path::Path;

/// Single-quote `s` for a POSIX shell: replace `'` with `'\''` then wrap in `'`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Shell-escape a path for safe interpolation.
pub fn shell_quote_path(p: &Path) -> String {
    shell_quote(&p.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandRunner;

    #[test]
    fn quotes_plain_strings() {
        assert_eq!(shell_quote("abc"), "'abc'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn quoted_text_survives_the_shell() {
        let nasty = "a b; $(echo pwned) `id` \"q\" 'single'\nline2";
        let result = CommandRunner::run(&format!("printf '%s' {}", shell_quote(nasty)), None, None)
            .unwrap();
        assert_eq!(result.output_lossy(), nasty);
    }

    #[test]
    fn quotes_paths() {
        assert_eq!(shell_quote_path(Path::new("/tmp/a b")), "'/tmp/a b'");
    }
}
