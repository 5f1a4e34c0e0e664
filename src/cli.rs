use crate::config::BakeOverrides;
use crate::integrator::IntegrationStrategy;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    sources: Vec<PathBuf>,
    output: Option<PathBuf>,
    strategy: Option<IntegrationStrategy>,
    seed: Option<u64>,
    glossiness: Option<f32>,
    fail_fast: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "source" => overrides.sources.push(PathBuf::from(value)),
                "output" => overrides.output = Some(PathBuf::from(value)),
                "strategy" => overrides.strategy = Some(parse_strategy(&value)?),
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "glossiness" => {
                    overrides.glossiness =
                        Some(value.parse::<f32>().with_context(|| format!("Invalid glossiness '{value}'"))?);
                }
                "fail-fast" => overrides.fail_fast = Some(parse_bool_flag("fail-fast", &value)?),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --source, --output, --strategy, --seed, \
                     --glossiness, --fail-fast."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn into_bake_overrides(self) -> BakeOverrides {
        BakeOverrides {
            sources: self.sources,
            output_dir: self.output,
            strategy: self.strategy,
            seed: self.seed,
            glossiness: self.glossiness,
            fail_fast: self.fail_fast,
        }
    }
}

fn parse_strategy(value: &str) -> Result<IntegrationStrategy> {
    match value.to_ascii_lowercase().as_str() {
        "stochastic" | "sampled" => Ok(IntegrationStrategy::Stochastic),
        "convolution" | "exhaustive" => Ok(IntegrationStrategy::Convolution),
        other => bail!("Invalid strategy '{other}'. Use stochastic or convolution."),
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_strategy_and_seed() {
        let args = [
            "bake", "--source", "a.tga", "--source", "b.tga", "--strategy", "convolution", "--seed", "77",
        ];
        let overrides = CliOverrides::parse(args).expect("parse overrides").into_bake_overrides();
        assert_eq!(overrides.sources, vec![PathBuf::from("a.tga"), PathBuf::from("b.tga")]);
        assert_eq!(overrides.strategy, Some(IntegrationStrategy::Convolution));
        assert_eq!(overrides.seed, Some(77));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["bake", "--glossiness", "20", "--glossiness", "90", "--fail-fast", "on", "--fail-fast", "off"];
        let overrides = CliOverrides::parse(args).expect("parse overrides").into_bake_overrides();
        assert_eq!(overrides.glossiness, Some(90.0));
        assert_eq!(overrides.fail_fast, Some(false));
    }

    #[test]
    fn config_path_is_kept_separately() {
        let overrides = CliOverrides::parse(["bake", "--config", "bake.json"]).expect("parse overrides");
        assert_eq!(overrides.config_path(), Some(&PathBuf::from("bake.json")));
        assert!(overrides.into_bake_overrides().is_empty());
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["bake", "--seed"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_strategies() {
        let err = CliOverrides::parse(["bake", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["bake", "--strategy", "magic"]).unwrap_err();
        assert!(err.to_string().contains("Invalid strategy"));
    }
}
