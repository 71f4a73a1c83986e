//! INI file configuration adapter.
//!
//! Only `#` starts a comment so that `;` can separate clauses inside a
//! logic group value.

use crate::domain::error::FastTradeError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    fn ini() -> Ini {
        let mut config = Ini::new();
        config.set_comment_symbols(&['#']);
        config
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FastTradeError> {
        let path = path.as_ref();
        let mut config = Self::ini();
        config.load(path).map_err(|reason| FastTradeError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, FastTradeError> {
        let mut config = Self::ini();
        config
            .read(content.to_string())
            .map_err(|reason| FastTradeError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }

    fn has_section(&self, section: &str) -> bool {
        self.config
            .sections()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn semicolons_survive_in_values() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nenter = close > sma_20; rsi_14 < 30 [2]\n# a comment\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_string("backtest", "enter"),
            Some("close > sma_20; rsi_14 < 30 [2]".to_string())
        );
    }

    #[test]
    fn numeric_getters_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nbase_balance = 2500.5\nlookback = 3\ncommission = lots\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("backtest", "base_balance", 0.0), 2500.5);
        assert_eq!(adapter.get_int("backtest", "lookback", 0), 3);
        assert_eq!(adapter.get_double("backtest", "commission", 0.25), 0.25);
        assert_eq!(adapter.get_double("backtest", "missing", 9.5), 9.5);
    }

    #[test]
    fn bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\na = true\nb = no\nc = 1\nd = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("backtest", "a", false));
        assert!(!adapter.get_bool("backtest", "b", true));
        assert!(adapter.get_bool("backtest", "c", false));
        assert!(adapter.get_bool("backtest", "d", true));
        assert!(!adapter.get_bool("backtest", "missing", false));
    }

    #[test]
    fn sections_are_detected() {
        let adapter = FileConfigAdapter::from_string("[Backtest]\nname = x\n").unwrap();
        assert!(adapter.has_section("backtest"));
        assert!(!adapter.has_section("report"));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\nname = sma cross\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "name"),
            Some("sma cross".to_string())
        );
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/strategy.ini").err().unwrap();
        assert!(matches!(err, FastTradeError::ConfigParse { file, .. } if file.contains("strategy.ini")));
    }
}
