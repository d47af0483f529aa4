use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::portfolio::OiConcentrationConfig;
use crate::strategy::{
    ContinuousBreakthroughsConfig, CpvConfig, DailyRumiConfig, ExtremeValueFollowConfig,
    MaObvConfig, OiBasedConfig, RumiConfig, TrendModelSysConfig,
};
use crate::Result;

/// Prefix of environment overrides, e.g. `CTALAB__REPLAY__WARMUP=false`
pub const ENV_PREFIX: &str = "CTALAB";

/// Typed settings of one strategy class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "class_name", content = "setting")]
pub enum StrategySetting {
    #[serde(rename = "ContinuousBreakthroughsStrategy")]
    ContinuousBreakthroughs(ContinuousBreakthroughsConfig),
    #[serde(rename = "ExtremeValueFollowStrategy")]
    ExtremeValueFollow(ExtremeValueFollowConfig),
    #[serde(rename = "CpvStrategy")]
    Cpv(CpvConfig),
    #[serde(rename = "OiBasedStrategy")]
    OiBased(OiBasedConfig),
    #[serde(rename = "TrendModelSysStrategy")]
    TrendModelSys(TrendModelSysConfig),
    #[serde(rename = "RumiStrategy")]
    Rumi(RumiConfig),
    #[serde(rename = "DailyRumiStrategy")]
    DailyRumi(DailyRumiConfig),
    #[serde(rename = "MaObvStrategy")]
    MaObv(MaObvConfig),
}

impl StrategySetting {
    pub fn validate(&self) -> Result<()> {
        match self {
            StrategySetting::ContinuousBreakthroughs(c) => c.validate(),
            StrategySetting::ExtremeValueFollow(c) => c.validate(),
            StrategySetting::Cpv(c) => c.validate(),
            StrategySetting::OiBased(c) => c.validate(),
            StrategySetting::TrendModelSys(c) => c.validate(),
            StrategySetting::Rumi(c) => c.validate(),
            StrategySetting::DailyRumi(c) => c.validate(),
            StrategySetting::MaObv(c) => c.validate(),
        }
    }
}

/// One configured single-instrument strategy instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyDefinition {
    pub strategy_name: String,
    pub vt_symbol: String,
    #[serde(flatten)]
    pub setting: StrategySetting,
}

/// One configured portfolio strategy instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioDefinition {
    pub strategy_name: String,
    pub vt_symbols: Vec<String>,
    pub rank_data_dir: PathBuf,
    #[serde(default)]
    pub setting: OiConcentrationConfig,
}

/// Replay options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub warmup: bool, // Replay the requested history with trading disabled
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { warmup: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub strategies: Vec<StrategyDefinition>,
    #[serde(default)]
    pub portfolios: Vec<PortfolioDefinition>,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        for definition in &self.strategies {
            definition.setting.validate()?;
        }
        for definition in &self.portfolios {
            definition.setting.validate()?;
        }
        Ok(())
    }
}

/// Load settings from a TOML file, then apply `CTALAB__*` environment overrides
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    load_config_with_prefix(path, ENV_PREFIX)
}

fn load_config_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(config::Environment::with_prefix(env_prefix).separator("__"))
        .build()?;

    let app: AppConfig = settings.try_deserialize()?;
    app.validate()?;

    tracing::info!(
        path = %path.as_ref().display(),
        strategies = app.strategies.len(),
        portfolios = app.portfolios.len(),
        "configuration loaded"
    );

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use std::fs;

    const SAMPLE: &str = r#"
[[strategies]]
strategy_name = "rb_breakout"
vt_symbol = "RB888.SHFE"
class_name = "ContinuousBreakthroughsStrategy"

[strategies.setting]
n1 = 3
window = 15

[[strategies]]
strategy_name = "rb_rumi"
vt_symbol = "RB888.SHFE"
class_name = "RumiStrategy"

[strategies.setting]
risk_level = 2000

[[portfolios]]
strategy_name = "oi_top"
vt_symbols = ["RB888.SHFE", "CU888.SHFE"]
rank_data_dir = "processed_data"

[portfolios.setting]
R = 7
"#;

    fn write_config(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ctalab.toml"), body).unwrap();
        dir
    }

    #[test]
    fn test_load_sample_config() {
        let dir = write_config(SAMPLE);
        let app = load_config(dir.path().join("ctalab.toml")).unwrap();

        assert_eq!(app.strategies.len(), 2);
        assert!(app.replay.warmup);

        let first = &app.strategies[0];
        assert_eq!(first.strategy_name, "rb_breakout");
        match &first.setting {
            StrategySetting::ContinuousBreakthroughs(c) => {
                assert_eq!(c.n1, 3);
                assert_eq!(c.window, 15);
                // Unset fields keep their defaults
                assert_eq!(c.count, 6);
            }
            other => panic!("unexpected setting {other:?}"),
        }

        match &app.strategies[1].setting {
            StrategySetting::Rumi(c) => assert_eq!(c.risk_level, 2000.0),
            other => panic!("unexpected setting {other:?}"),
        }

        assert_eq!(app.portfolios[0].setting.r, 7);
        assert_eq!(app.portfolios[0].vt_symbols.len(), 2);
    }

    #[test]
    fn test_invalid_setting_rejected() {
        let dir = write_config(
            r#"
[[strategies]]
strategy_name = "bad"
vt_symbol = "RB888.SHFE"
class_name = "OiBasedStrategy"

[strategies.setting]
k = 2.0
"#,
        );

        let err = load_config(dir.path().join("ctalab.toml")).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParameter { name: "k", .. }));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = write_config(SAMPLE);

        // Own prefix so parallel tests reading the real one are unaffected
        std::env::set_var("CTALAB_ENVTEST__REPLAY__WARMUP", "false");
        let app = load_config_with_prefix(dir.path().join("ctalab.toml"), "CTALAB_ENVTEST");
        std::env::remove_var("CTALAB_ENVTEST__REPLAY__WARMUP");

        let app = app.unwrap();
        assert!(!app.replay.warmup);
        assert_eq!(app.strategies.len(), 2);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config("/nonexistent/ctalab.toml").unwrap_err();
        assert!(matches!(err, StrategyError::Config(_)));
    }
}
