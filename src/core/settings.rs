//! Settings module
//!
//! This module contains user-configurable settings for pstop, stored as
//! `key=value` lines in `$XDG_CONFIG_HOME/pstop/pstoprc`.

use anyhow::Context;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use super::process::SortKey;

/// List tab shown by the interactive view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    All,
    Top,
    Dev,
}

impl Tab {
    pub fn name(self) -> &'static str {
        match self {
            Tab::All => "all",
            Tab::Top => "top",
            Tab::Dev => "dev",
        }
    }

    /// Label shown in the tab bar
    pub fn title(self) -> &'static str {
        match self {
            Tab::All => "All",
            Tab::Top => "Top",
            Tab::Dev => "Dev",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn all() -> &'static [Tab] {
        &[Tab::All, Tab::Top, Tab::Dev]
    }

    /// Next tab in the All -> Top -> Dev cycle
    pub fn next(self) -> Self {
        match self {
            Tab::All => Tab::Top,
            Tab::Top => Tab::Dev,
            Tab::Dev => Tab::All,
        }
    }
}

/// User settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub filename: Option<PathBuf>,
    pub changed: bool,
    pub readonly: bool,

    /// Refresh interval in tenths of a second
    pub delay: u32,
    pub sort_key: SortKey,
    pub tree_view: bool,
    /// Number of processes in the Top tab
    pub top_count: usize,
    pub start_tab: Tab,
    pub color: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Settings {
            filename: Self::default_config_path(),
            changed: false,
            readonly: false,
            delay: 20, // 2 seconds
            sort_key: SortKey::Cpu,
            tree_view: false,
            top_count: 20,
            start_tab: Tab::All,
            color: true,
            log_file: None,
        }
    }

    /// Refresh interval as a duration
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay as u64 * 100)
    }

    /// `pstop/pstoprc` under the platform config directory, or under
    /// `~/.config` when there is none
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .map(|dir| dir.join("pstop").join("pstoprc"))
    }

    /// Load settings from the config file
    pub fn load(&mut self) -> anyhow::Result<()> {
        let path = match &self.filename {
            Some(p) => p.clone(),
            None => return Ok(()),
        };

        if !path.exists() {
            return Ok(());
        }

        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                self.parse_setting(key.trim(), value.trim());
            }
        }

        Ok(())
    }

    /// Parse a single setting line
    fn parse_setting(&mut self, key: &str, value: &str) {
        match key {
            "delay" => {
                if let Ok(v) = value.parse::<u32>() {
                    self.delay = v.clamp(1, 100);
                }
            }
            "sort_key" => {
                if let Some(k) = SortKey::from_name(value) {
                    self.sort_key = k;
                }
            }
            "tree_view" => {
                self.tree_view = value == "1";
            }
            "top_count" => {
                if let Ok(v) = value.parse::<usize>() {
                    self.top_count = v.max(1);
                }
            }
            "start_tab" => {
                if let Some(t) = Tab::from_name(value) {
                    self.start_tab = t;
                }
            }
            "color" => {
                self.color = value == "1";
            }
            "log_file" => {
                self.log_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => {}
        }
    }

    /// Write settings to the config file
    pub fn write(&self) -> anyhow::Result<()> {
        if self.readonly {
            return Ok(());
        }

        let path = match &self.filename {
            Some(p) => p.clone(),
            None => return Ok(()),
        };

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writeln!(file, "# pstop configuration file")?;
        writeln!(file, "# Automatically generated by pstop")?;
        writeln!(file)?;

        writeln!(file, "delay={}", self.delay)?;
        writeln!(file, "sort_key={}", self.sort_key.name())?;
        writeln!(file, "tree_view={}", if self.tree_view { 1 } else { 0 })?;
        writeln!(file, "top_count={}", self.top_count)?;
        writeln!(file, "start_tab={}", self.start_tab.name())?;
        writeln!(file, "color={}", if self.color { 1 } else { 0 })?;
        if let Some(log_file) = &self.log_file {
            writeln!(file, "log_file={}", log_file.display())?;
        }

        Ok(())
    }
}
