use std::{
    fs,
    io::ErrorKind,
    path::Path,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub compile_url: String,
    pub compile_timeout_secs: u64,
    pub reconcile_delay_ms: u64,
    pub runner_command: Vec<String>,
    pub focus_console_on_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compile_url: "http://127.0.0.1:8082/api/compile".into(),
            compile_timeout_secs: 60,
            reconcile_delay_ms: 1000,
            runner_command: vec!["node".into()],
            focus_console_on_run: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    compile_url: Option<String>,
    compile_timeout_secs: Option<u64>,
    reconcile_delay_ms: Option<u64>,
    runner_command: Option<Vec<String>>,
    focus_console_on_run: Option<bool>,
}

impl Settings {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.compile_url)
            .with_context(|| format!("invalid compile_url '{}'", self.compile_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("compile_url must use http or https, got '{}'", url.scheme());
        }
        if self.compile_timeout_secs == 0 {
            bail!("compile_timeout_secs must be greater than zero");
        }
        if self.runner_command.is_empty() {
            bail!("runner_command must name a program");
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.compile_url {
            self.compile_url = v;
        }
        if let Some(v) = file.compile_timeout_secs {
            self.compile_timeout_secs = v;
        }
        if let Some(v) = file.reconcile_delay_ms {
            self.reconcile_delay_ms = v;
        }
        if let Some(v) = file.runner_command {
            self.runner_command = v;
        }
        if let Some(v) = file.focus_console_on_run {
            self.focus_console_on_run = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("EMBED_COMPILE_URL") {
            self.compile_url = v;
        }
        if let Some(v) = var("APP__COMPILE_URL") {
            self.compile_url = v;
        }

        if let Some(v) = var("APP__COMPILE_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.compile_timeout_secs = parsed;
            }
        }

        if let Some(v) = var("APP__RECONCILE_DELAY_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.reconcile_delay_ms = parsed;
            }
        }

        if let Some(v) = var("APP__RUNNER_COMMAND") {
            self.runner_command = v.split_whitespace().map(str::to_string).collect();
        }

        if let Some(v) = var("APP__FOCUS_CONSOLE_ON_RUN") {
            if let Ok(parsed) = v.parse::<bool>() {
                self.focus_console_on_run = parsed;
            }
        }
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
            settings.apply_file(file_cfg);
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    settings.apply_env(var);
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
