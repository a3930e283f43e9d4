// src/config.rs

//! Configuration for the viewer.
//!
//! Values come from, in increasing precedence: built-in defaults, a JSON file
//! (`$RAWVIEW_CONFIG`, else `$XDG_CONFIG_HOME/rawview/config.json`, else
//! `~/.config/rawview/config.json`), `RAWVIEW_*` environment variables, and
//! the first command-line argument, which names the input file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::color::Palette;
use crate::graph::GraphKind;

pub const ENV_CONFIG: &str = "RAWVIEW_CONFIG";
pub const ENV_GRAPH: &str = "RAWVIEW_GRAPH";
pub const ENV_OFFSET: &str = "RAWVIEW_OFFSET";
pub const ENV_BLOCK_SIZE: &str = "RAWVIEW_BLOCK_SIZE";
pub const ENV_AUTOSCROLL: &str = "RAWVIEW_AUTOSCROLL";
pub const ENV_DEBUG: &str = "RAWVIEW_DEBUG";

/// Window size used when none is configured and the input size is unknown.
pub const DEFAULT_BLOCK_SIZE: u64 = 1024;

/// The configuration of this process, resolved on first use.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(config) => config,
    Err(e) => {
        // The logger is configured from this value, so it is not up yet.
        eprintln!("rawview: {:#}; using defaults", e);
        Config::default()
    }
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub view: ViewConfig,
    pub appearance: AppearanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// File to view; standard input when absent.
    pub path: Option<PathBuf>,
    /// Offset of the first window.
    pub offset: i64,
    /// Window size in bytes. 0 means the size of the input, when it can be
    /// determined.
    pub block_size: u64,
    /// Amount the window grows or shrinks by.
    pub block_step: u64,
    /// Largest single read.
    pub read_chunk: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            path: None,
            offset: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            block_step: 1024,
            read_chunk: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub graph: GraphKind,
    pub autoscroll: bool,
    pub autoscroll_interval_ms: u64,
    /// Upper bound on synchronized views per process, the process itself
    /// included.
    pub max_views: usize,
    /// 0 logs at info, 1 at debug, 2 and more at trace.
    pub debug: u8,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            graph: GraphKind::Conti,
            autoscroll: false,
            autoscroll_interval_ms: 50,
            max_views: 7,
            debug: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Space between the window edge and the graph/status areas.
    pub padding: u32,
    /// Gap between the graph and the status area.
    pub status_padding: u32,
    pub status_height: u32,
    pub border_width: u32,
    pub palette: Palette,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        AppearanceConfig {
            padding: 5,
            status_padding: 3,
            status_height: 32,
            border_width: 2,
            palette: Palette::default(),
        }
    }
}

impl Config {
    /// Builds the configuration of this process from the file, the
    /// environment and the command line.
    pub fn load() -> Result<Config> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => Config::from_file(&path)?,
            _ => Config::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        if let Some(path) = std::env::args_os().nth(1) {
            config.input.path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Config::from_json(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Config> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies `RAWVIEW_*` variables as returned by `lookup`. Unparsable
    /// values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(ENV_GRAPH).and_then(|v| GraphKind::from_name(&v)) {
            self.view.graph = kind;
        }
        if let Some(offset) = lookup(ENV_OFFSET).and_then(|v| parse_number(&v)) {
            self.input.offset = offset;
        }
        if let Some(size) = lookup(ENV_BLOCK_SIZE)
            .and_then(|v| parse_number(&v))
            .and_then(|n| u64::try_from(n).ok())
        {
            self.input.block_size = size;
        }
        if let Some(flag) = lookup(ENV_AUTOSCROLL).and_then(|v| parse_flag(&v)) {
            self.view.autoscroll = flag;
        }
        if let Some(level) = lookup(ENV_DEBUG).and_then(|v| v.trim().parse::<u8>().ok()) {
            self.view.debug = level;
        }
    }

    /// `env_logger` filter matching the debug verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.view.debug {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;
    Some(base.join("rawview").join("config.json"))
}

/// Parses a decimal, `0x` hexadecimal or `0` octal integer.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_follow_the_viewer() {
        let config = Config::default();
        assert_eq!(config.input.block_size, 1024);
        assert_eq!(config.input.block_step, 1024);
        assert_eq!(config.view.graph, GraphKind::Conti);
        assert_eq!(config.view.autoscroll_interval_ms, 50);
        assert_eq!(config.appearance.status_height, 32);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            Config::from_json(r#"{ "view": { "graph": "bytemap", "debug": 2 } }"#).unwrap();
        assert_eq!(config.view.graph, GraphKind::Bytemap);
        assert_eq!(config.view.max_views, 7);
        assert_eq!(config.input.read_chunk, 8192);
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Config::from_json(r#"{ "view": { "graph": "pie" } }"#).is_err());
    }

    #[test]
    fn environment_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_GRAPH, "Bytes"),
            (ENV_OFFSET, "0x400"),
            (ENV_BLOCK_SIZE, "0"),
            (ENV_AUTOSCROLL, "yes"),
            (ENV_DEBUG, "nope"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.view.graph, GraphKind::Bytes);
        assert_eq!(config.input.offset, 0x400);
        assert_eq!(config.input.block_size, 0);
        assert!(config.view.autoscroll);
        assert_eq!(config.view.debug, 0);
    }

    #[test]
    fn numbers_in_several_bases() {
        assert_eq!(parse_number("4096"), Some(4096));
        assert_eq!(parse_number("0x10"), Some(16));
        assert_eq!(parse_number("010"), Some(8));
        assert_eq!(parse_number("-2"), Some(-2));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("ten"), None);
    }
}
