use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::{
    args::ParsedArgs,
    error::{Error, Result},
    reader::ReaderOptions,
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Settings {
    pub logfile: String,
    pub templates: String,
    pub overflow: String,
    pub poll_interval_ms: u64,
    pub idle_delay_ms: u64,
}

// Every key optional, so a user file only needs the keys it changes.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SettingsFromYaml {
    #[serde(default)]
    pub logfile: Option<String>,
    #[serde(default)]
    pub templates: Option<String>,
    #[serde(default)]
    pub overflow: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub idle_delay_ms: Option<u64>,
}

impl Settings {
    /// Embedded defaults, then `~/.config/tailscribe/settings.yaml` if it
    /// exists.
    pub fn new() -> Result<Settings> {
        let mut settings = Settings::default();

        settings.read_from_string(Self::default_settings_yaml_data())?;

        if let Some(filename) = Self::local_settings_filename() {
            if filename.exists() {
                log::debug!("Reading settings from {}", filename.display());
                settings.read_from_yaml(&filename)?;
            }
        }

        Ok(settings)
    }

    pub fn default_settings_yaml_data() -> &'static str {
        include_str!("../settings.yaml")
    }

    #[cfg(unix)]
    pub fn local_settings_filename() -> Option<PathBuf> {
        let xdg = xdg::BaseDirectories::with_prefix("tailscribe").ok()?;
        xdg.find_config_file("settings.yaml")
    }

    #[cfg(not(unix))]
    pub fn local_settings_filename() -> Option<PathBuf> {
        None
    }

    pub fn read_from_yaml(&mut self, filename: &std::path::Path) -> Result<()> {
        let file = std::fs::File::open(filename)?;
        let reader = std::io::BufReader::new(file);
        let settings: SettingsFromYaml =
            serde_yaml::from_reader(reader).map_err(|source| Error::Settings {
                path: filename.display().to_string(),
                source,
            })?;

        self.merge_with(settings);

        Ok(())
    }

    pub fn read_from_string(&mut self, s: &str) -> Result<()> {
        let settings: SettingsFromYaml =
            serde_yaml::from_str(s).map_err(|source| Error::Settings {
                path: "<string>".into(),
                source,
            })?;
        self.merge_with(settings);

        Ok(())
    }

    pub fn merge_with(&mut self, other: SettingsFromYaml) {
        if let Some(logfile) = other.logfile {
            self.logfile = logfile;
        }
        if let Some(templates) = other.templates {
            self.templates = templates;
        }
        if let Some(overflow) = other.overflow {
            self.overflow = overflow;
        }
        if let Some(poll_interval_ms) = other.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
        if let Some(idle_delay_ms) = other.idle_delay_ms {
            self.idle_delay_ms = idle_delay_ms;
        }
    }

    pub fn apply_args(&mut self, args: &ParsedArgs) {
        self.merge_with(SettingsFromYaml {
            logfile: args.logfile.clone(),
            templates: args.templates.clone(),
            overflow: args.overflow.clone(),
            poll_interval_ms: args.poll_ms,
            idle_delay_ms: args.idle_ms,
        });
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            idle_delay: Duration::from_millis(self.idle_delay_ms),
        }
    }
}
