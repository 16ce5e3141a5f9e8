use std::path::{Path, PathBuf};

// ── Home / workspace discovery ────────────────────────────────────────────────

/// Returns the current user's home directory in a cross-platform way.
/// - Unix/macOS: `$HOME`
/// - Windows: `$USERPROFILE`, then `$HOMEDRIVE$HOMEPATH`
pub fn home_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        return Some(PathBuf::from(home));
    }
    if cfg!(target_os = "windows") {
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            return Some(PathBuf::from(profile));
        }
        if let (Some(drive), Some(path)) =
            (std::env::var_os("HOMEDRIVE"), std::env::var_os("HOMEPATH"))
        {
            let mut p = PathBuf::from(drive);
            p.push(path);
            return Some(p);
        }
    }
    None
}

/// MoaBot user config directory: `~/.moabot/`
pub fn moabot_home_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".moabot")
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Runtime configuration. Resolution order: built-in defaults, then
/// `~/.moabot/config.toml`, then environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// OpenAI-compatible completion endpoint of the brain (router/integrator) model.
    pub brain_url: String,
    pub brain_model: String,
    /// Endpoint of the code/math specialist model.
    pub reasoner_url: String,
    pub reasoner_model: String,
    /// Sandbox root all file-producing workers write into.
    pub workspace: PathBuf,
    /// Parallel runner pool size.
    pub max_workers: usize,
    /// Bidirectional translation wrapper toggle.
    pub translation_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brain_url: "http://127.0.0.1:8080".to_string(),
            brain_model: "lfm-brain".to_string(),
            reasoner_url: "http://127.0.0.1:8081".to_string(),
            reasoner_model: "falcon-reasoner".to_string(),
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_workers: 4,
            translation_enabled: true,
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let mut s = Settings::default();
        if let Ok(text) = std::fs::read_to_string(moabot_home_dir().join("config.toml")) {
            s.apply_toml(&text);
        }
        s.apply_env();
        s
    }

    fn apply_toml(&mut self, text: &str) {
        let Ok(doc) = text.parse::<toml::Value>() else {
            return;
        };
        let get_str = |key: &str| doc.get(key).and_then(|v| v.as_str()).map(str::to_string);
        if let Some(v) = get_str("brain_url") {
            self.brain_url = v;
        }
        if let Some(v) = get_str("brain_model") {
            self.brain_model = v;
        }
        if let Some(v) = get_str("reasoner_url") {
            self.reasoner_url = v;
        }
        if let Some(v) = get_str("reasoner_model") {
            self.reasoner_model = v;
        }
        if let Some(v) = get_str("workspace") {
            self.workspace = PathBuf::from(v);
        }
        if let Some(v) = doc.get("max_workers").and_then(|v| v.as_integer())
            && v > 0
        {
            self.max_workers = v as usize;
        }
        if let Some(v) = doc.get("translation").and_then(|v| v.as_bool()) {
            self.translation_enabled = v;
        }
    }

    fn apply_env(&mut self) {
        let env_str = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = env_str("MOA_BRAIN_URL") {
            self.brain_url = v;
        }
        if let Some(v) = env_str("MOA_BRAIN_MODEL") {
            self.brain_model = v;
        }
        if let Some(v) = env_str("MOA_REASONER_URL") {
            self.reasoner_url = v;
        }
        if let Some(v) = env_str("MOA_REASONER_MODEL") {
            self.reasoner_model = v;
        }
        if let Some(v) = env_str("MOA_WORKSPACE") {
            self.workspace = canonical_or_raw(&v);
        }
        if let Some(v) = env_str("MOA_MAX_WORKERS")
            && let Ok(n) = v.parse::<usize>()
            && n > 0
        {
            self.max_workers = n;
        }
        if let Some(v) = env_str("MOA_TRANSLATION") {
            self.translation_enabled = !matches!(v.as_str(), "0" | "false" | "off");
        }
    }
}

fn canonical_or_raw(p: &str) -> PathBuf {
    std::fs::canonicalize(Path::new(p)).unwrap_or_else(|_| PathBuf::from(p))
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn toml_overrides_defaults() {
        let mut s = Settings::default();
        s.apply_toml("brain_url = \"http://10.0.0.2:9000\"\nmax_workers = 2\ntranslation = false\n");
        assert_eq!(s.brain_url, "http://10.0.0.2:9000");
        assert_eq!(s.max_workers, 2);
        assert!(!s.translation_enabled);
    }

    #[test]
    fn invalid_toml_is_ignored() {
        let mut s = Settings::default();
        let before = s.brain_url.clone();
        s.apply_toml("not [ valid");
        assert_eq!(s.brain_url, before);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut s = Settings::default();
        s.apply_toml("max_workers = 0");
        assert_eq!(s.max_workers, 4);
    }
}
