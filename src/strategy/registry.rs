use super::{
    ContinuousBreakthroughsStrategy, CpvStrategy, CtaStrategy, DailyRumiStrategy,
    ExtremeValueFollowStrategy, MaObvStrategy, OiBasedStrategy, RumiStrategy,
    TrendModelSysStrategy,
};
use crate::config::{StrategyDefinition, StrategySetting};
use crate::error::StrategyError;
use crate::Result;

/// Class names accepted in `class_name`
pub const STRATEGY_CLASSES: &[&str] = &[
    "ContinuousBreakthroughsStrategy",
    "ExtremeValueFollowStrategy",
    "CpvStrategy",
    "OiBasedStrategy",
    "TrendModelSysStrategy",
    "RumiStrategy",
    "DailyRumiStrategy",
    "MaObvStrategy",
    "OiConcentrationStrategy",
];

/// Construct the strategy a definition describes
pub fn build_strategy(definition: &StrategyDefinition) -> Result<Box<dyn CtaStrategy>> {
    let name = definition.strategy_name.clone();

    let strategy: Box<dyn CtaStrategy> = match &definition.setting {
        StrategySetting::ContinuousBreakthroughs(c) => {
            Box::new(ContinuousBreakthroughsStrategy::new(name, c.clone())?)
        }
        StrategySetting::ExtremeValueFollow(c) => {
            Box::new(ExtremeValueFollowStrategy::new(name, c.clone())?)
        }
        StrategySetting::Cpv(c) => Box::new(CpvStrategy::new(name, c.clone())?),
        StrategySetting::OiBased(c) => Box::new(OiBasedStrategy::new(name, c.clone())?),
        StrategySetting::TrendModelSys(c) => Box::new(TrendModelSysStrategy::new(name, c.clone())?),
        StrategySetting::Rumi(c) => Box::new(RumiStrategy::new(name, c.clone())?),
        StrategySetting::DailyRumi(c) => Box::new(DailyRumiStrategy::new(name, c.clone())?),
        StrategySetting::MaObv(c) => Box::new(MaObvStrategy::new(name, c.clone())?),
    };

    tracing::debug!(
        strategy = %definition.strategy_name,
        class = strategy.class_name(),
        symbol = %definition.vt_symbol,
        "strategy built"
    );

    Ok(strategy)
}

/// Default settings for a class name
pub fn default_setting(class_name: &str) -> Result<StrategySetting> {
    let setting = match class_name {
        "ContinuousBreakthroughsStrategy" => {
            StrategySetting::ContinuousBreakthroughs(Default::default())
        }
        "ExtremeValueFollowStrategy" => StrategySetting::ExtremeValueFollow(Default::default()),
        "CpvStrategy" => StrategySetting::Cpv(Default::default()),
        "OiBasedStrategy" => StrategySetting::OiBased(Default::default()),
        "TrendModelSysStrategy" => StrategySetting::TrendModelSys(Default::default()),
        "RumiStrategy" => StrategySetting::Rumi(Default::default()),
        "DailyRumiStrategy" => StrategySetting::DailyRumi(Default::default()),
        "MaObvStrategy" => StrategySetting::MaObv(Default::default()),
        other => return Err(StrategyError::UnknownStrategy(other.to_string())),
    };
    Ok(setting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_single_instrument_class_builds() {
        for class_name in STRATEGY_CLASSES
            .iter()
            .filter(|c| **c != "OiConcentrationStrategy")
        {
            let definition = StrategyDefinition {
                strategy_name: format!("{class_name}_test"),
                vt_symbol: "RB888.SHFE".to_string(),
                setting: default_setting(class_name).unwrap(),
            };

            let strategy = build_strategy(&definition).unwrap();
            assert_eq!(strategy.class_name(), *class_name);
            assert_eq!(strategy.name(), definition.strategy_name);
        }
    }

    #[test]
    fn test_unknown_class() {
        assert!(matches!(
            default_setting("TurtleStrategy"),
            Err(StrategyError::UnknownStrategy(_))
        ));
        // Portfolio strategies are not built here
        assert!(default_setting("OiConcentrationStrategy").is_err());
    }

    #[test]
    fn test_invalid_setting_fails_build() {
        let mut config = crate::strategy::RumiConfig::default();
        config.diff_window = 0;
        let definition = StrategyDefinition {
            strategy_name: "bad".to_string(),
            vt_symbol: "RB888.SHFE".to_string(),
            setting: StrategySetting::Rumi(config),
        };

        assert!(build_strategy(&definition).is_err());
    }
}
