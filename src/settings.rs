use std::path::{Path, PathBuf};

/// Settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Maximum number of undo steps per project
    pub max_undo_steps: usize,
    /// History memory cap in megabytes (0 = unlimited)
    pub max_history_mb: usize,
    /// Rhai operation budget per script run
    pub script_max_operations: u64,
    /// Write the session log file
    pub log_to_file: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            max_history_mb: 64,
            script_max_operations: 1_000_000,
            log_to_file: true,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/layerdoc/layerdoc_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\LayerDoc\layerdoc_settings.cfg
    /// On macOS:   ~/Library/Application Support/LayerDoc/layerdoc_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("layerdoc");
            return Some(config_dir.join("layerdoc_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("LayerDoc").join("layerdoc_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("LayerDoc")
                    .join("layerdoc_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("layerdoc_settings.cfg")))
        }
    }

    /// History memory cap in bytes, `None` when unlimited.
    pub fn history_memory_limit(&self) -> Option<usize> {
        match self.max_history_mb {
            0 => None,
            mb => Some(mb * 1024 * 1024),
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             max_history_mb={}\n\
             script_max_operations={}\n\
             log_to_file={}\n",
            self.max_undo_steps, self.max_history_mb, self.script_max_operations, self.log_to_file,
        )
    }

    /// Parse `key=value` lines over the defaults. Unknown keys and malformed
    /// values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse() {
                        s.max_undo_steps = v;
                    }
                }
                "max_history_mb" => {
                    if let Ok(v) = val.parse() {
                        s.max_history_mb = v;
                    }
                }
                "script_max_operations" => {
                    if let Ok(v) = val.parse() {
                        s.script_max_operations = v;
                    }
                }
                "log_to_file" => {
                    s.log_to_file = val == "true";
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from disk (returns default if file missing or unreadable)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Write the defaults on first run so there is a file to edit.
    pub fn ensure_file(&self) -> std::io::Result<()> {
        match Self::settings_path() {
            Some(path) if !path.exists() => self.save(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_gives_defaults() {
        assert_eq!(Settings::parse(""), Settings::default());
    }

    #[test]
    fn known_keys_override_and_junk_is_skipped() {
        let s = Settings::parse(
            "# comment\nmax_undo_steps = 12\nmax_history_mb=0\nscript_max_operations=abc\nnonsense\nlog_to_file=false\ncolour=blue\n",
        );
        assert_eq!(s.max_undo_steps, 12);
        assert_eq!(s.history_memory_limit(), None);
        assert_eq!(s.script_max_operations, 1_000_000);
        assert!(!s.log_to_file);
    }

    #[test]
    fn config_string_parses_back() {
        let s = Settings {
            max_undo_steps: 7,
            max_history_mb: 3,
            script_max_operations: 42,
            log_to_file: false,
        };
        assert_eq!(Settings::parse(&s.to_config_string()), s);
        assert_eq!(s.history_memory_limit(), Some(3 * 1024 * 1024));
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("layerdoc_settings.cfg");
        assert_eq!(Settings::load_from(&path), Settings::default());

        let s = Settings {
            max_undo_steps: 9,
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }
}
