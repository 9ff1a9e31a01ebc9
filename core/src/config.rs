use crate::{
    scorer::LogitCoefficients,
    types::{TimingDays, DEFAULT_TOP_N, MAX_TIMING_DAYS, MAX_TOP_N, MIN_TOP_N},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct EngineConfigFile {
    default_top_n: usize,
    parallel_min_population: usize,
    recommend_timings: Vec<TimingDays>,
    scenario_timings: Vec<TimingDays>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// top_n used when a batch request does not name one.
    pub default_top_n: usize,
    /// Population size at which scoring fans out across the rayon pool.
    pub parallel_min_population: usize,
    /// Lead times tried when recommending a best action.
    pub recommend_timings: Vec<TimingDays>,
    /// Lead times swept by the scenario grid.
    pub scenario_timings: Vec<TimingDays>,
    pub logit_scorer: LogitCoefficients,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let engine_path = format!("{data_dir}/engine/engine_config.json");
        let engine_content = std::fs::read_to_string(&engine_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {engine_path}: {e}"))?;
        let engine_file: EngineConfigFile = serde_json::from_str(&engine_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {engine_path}: {e}"))?;

        let scorer_path = format!("{data_dir}/scorer/logit_scorer.json");
        let scorer_content = std::fs::read_to_string(&scorer_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {scorer_path}: {e}"))?;
        let logit_scorer: LogitCoefficients = serde_json::from_str(&scorer_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {scorer_path}: {e}"))?;

        let config = Self {
            default_top_n: engine_file.default_top_n,
            parallel_min_population: engine_file.parallel_min_population,
            recommend_timings: engine_file.recommend_timings,
            scenario_timings: engine_file.scenario_timings,
            logit_scorer,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&self.default_top_n) {
            anyhow::bail!(
                "default_top_n={} outside {MIN_TOP_N}..={MAX_TOP_N}",
                self.default_top_n
            );
        }
        for &t in self.recommend_timings.iter().chain(&self.scenario_timings) {
            if !(0..=MAX_TIMING_DAYS).contains(&t) {
                anyhow::bail!("timing grid entry {t} outside 0..={MAX_TIMING_DAYS}");
            }
        }
        if self.recommend_timings.is_empty() {
            anyhow::bail!("recommend_timings must not be empty");
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            default_top_n: DEFAULT_TOP_N,
            parallel_min_population: 256,
            recommend_timings: vec![7, 14, 30, 60],
            scenario_timings: vec![0, 7, 14, 30],
            logit_scorer: LogitCoefficients::default(),
        }
    }
}
