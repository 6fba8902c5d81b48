// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label pipeline configuration.
//
// Read from the Home Assistant add-on `options.json`, then overridden by
// environment variables so the binary can run outside the supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StocktagError};
use crate::types::{LabelLayout, LabelStock, PrinterConfig, non_blank};

/// Where the supervisor mounts add-on options.
pub const ADDON_OPTIONS_PATH: &str = "/data/options.json";

/// Safety limit for copies triggered from the UI.
pub const DEFAULT_MAX_COPIES: u32 = 25;

/// Bounds for the printer reachability check. A print request waits on it.
pub const MIN_PROBE_TIMEOUT_MS: u64 = 100;
pub const MAX_PROBE_TIMEOUT_MS: u64 = 5_000;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

/// Settings consumed by the label pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Public base URL override for QR links (e.g. `http://192.168.1.10:8099`).
    pub base_url: Option<String>,
    /// Printer host, optionally with `:port`.
    pub ipp_host: Option<String>,
    /// CUPS queue name.
    pub ipp_printer: Option<String>,
    pub max_label_copies: u32,
    pub label_stock: LabelStock,
    /// Upper bound for the printer reachability check.
    pub probe_timeout_ms: u64,
    /// Also ask the printer over IPP whether it accepts jobs.
    pub probe_ipp: bool,
    pub qr_level: QrLevel,
    /// Directory searched for DejaVu fonts before the system locations.
    pub font_dir: Option<PathBuf>,
    pub layout: LabelLayout,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            ipp_host: None,
            ipp_printer: None,
            max_label_copies: DEFAULT_MAX_COPIES,
            label_stock: LabelStock::Address,
            probe_timeout_ms: 2_000,
            probe_ipp: true,
            qr_level: QrLevel::M,
            font_dir: None,
            layout: LabelLayout::default(),
        }
    }
}

impl LabelConfig {
    /// Load options from `path` (missing file means defaults) and apply
    /// overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(ADDON_OPTIONS_PATH));
        let mut config = Self::from_options_file(path)?;
        config.apply_env_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Read an `options.json`. A missing file is not an error: running
    /// locally there is no supervisor.
    pub fn from_options_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                info!(path = %path.display(), "loaded add-on options");
                Ok(serde_json::from_str(&data)?)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no add-on options, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Environment wins over `options.json`. Empty values clear a setting.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "BASE_URL" => self.base_url = optional(&value),
                "IPP_HOST" => self.ipp_host = optional(&value),
                "IPP_PRINTER" => self.ipp_printer = optional(&value),
                "MAX_LABEL_COPIES" => {
                    self.max_label_copies = parse_env(&key, &value)?;
                }
                "LABEL_STOCK" => self.label_stock = value.parse()?,
                "PROBE_TIMEOUT_MS" => self.probe_timeout_ms = parse_env(&key, &value)?,
                "FONT_DIR" => self.font_dir = optional(&value).map(PathBuf::from),
                _ => {}
            }
        }
        Ok(())
    }

    /// The configured printer, `None` in preview-only mode.
    pub fn printer(&self) -> Result<Option<PrinterConfig>> {
        PrinterConfig::from_settings(self.ipp_host.as_deref(), self.ipp_printer.as_deref())
    }

    /// Base URL override with blanks treated as unset.
    pub fn base_url(&self) -> Option<&str> {
        non_blank(self.base_url.as_deref())
    }

    /// Reachability deadline, clamped to
    /// `MIN_PROBE_TIMEOUT_MS..=MAX_PROBE_TIMEOUT_MS`.
    pub fn probe_timeout(&self) -> Duration {
        let ms = self
            .probe_timeout_ms
            .clamp(MIN_PROBE_TIMEOUT_MS, MAX_PROBE_TIMEOUT_MS);
        if ms != self.probe_timeout_ms {
            warn!(
                configured_ms = self.probe_timeout_ms,
                used_ms = ms,
                "probe timeout out of range; clamped"
            );
        }
        Duration::from_millis(ms)
    }

    pub fn max_copies(&self) -> u32 {
        self.max_label_copies.max(1)
    }
}

fn optional(value: &str) -> Option<String> {
    non_blank(Some(value)).map(str::to_string)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StocktagError::Configuration(format!("{key}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_options_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LabelConfig::from_options_file(&dir.path().join("options.json")).unwrap();
        assert_eq!(config.max_label_copies, DEFAULT_MAX_COPIES);
        assert!(config.printer().unwrap().is_none());
    }

    #[test]
    fn options_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(
            &path,
            r#"{"base_url": "http://192.168.1.10:8099", "ipp_host": "cups:631",
                "ipp_printer": "dymo", "label_stock": "shipping", "serial_prefix": "X-"}"#,
        )
        .unwrap();

        let config = LabelConfig::from_options_file(&path).unwrap();
        assert_eq!(config.base_url(), Some("http://192.168.1.10:8099"));
        assert_eq!(config.label_stock, LabelStock::Shipping);
        let printer = config.printer().unwrap().unwrap();
        assert_eq!(printer.queue, "dymo");
    }

    #[test]
    fn environment_overrides_options() {
        let mut config = LabelConfig {
            base_url: Some("http://old".into()),
            ..LabelConfig::default()
        };
        config
            .apply_env_overrides(vars(&[
                ("BASE_URL", ""),
                ("IPP_HOST", "printer.lan"),
                ("IPP_PRINTER", "labels"),
                ("MAX_LABEL_COPIES", "10"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert!(config.base_url().is_none());
        assert_eq!(config.max_copies(), 10);
        assert!(config.printer().unwrap().is_some());
    }

    #[test]
    fn reachability_timeout_is_bounded() {
        let mut config = LabelConfig::default();
        config
            .apply_env_overrides(vars(&[("PROBE_TIMEOUT_MS", "600000")]))
            .unwrap();
        assert_eq!(config.probe_timeout_ms, 600_000);
        assert_eq!(config.probe_timeout(), Duration::from_millis(MAX_PROBE_TIMEOUT_MS));

        config.probe_timeout_ms = 0;
        assert_eq!(config.probe_timeout(), Duration::from_millis(MIN_PROBE_TIMEOUT_MS));

        config.probe_timeout_ms = 750;
        assert_eq!(config.probe_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn malformed_env_value_is_a_configuration_error() {
        let mut config = LabelConfig::default();
        let err = config
            .apply_env_overrides(vars(&[("PROBE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, StocktagError::Configuration(_)));
    }
}
