//! Environment-driven configuration.
//!
//! Every knob has a `SHELFSCAN_` prefixed variable; unset variables fall
//! back to the library defaults, unparsable values are rejected at
//! startup rather than silently defaulted.

use std::time::Duration;

use shelfscan_core::config::PipelineConfig;
use shelfscan_core::grouping::infrastructure::engine_factory::GroupingStrategy;

#[derive(Clone, Debug)]
pub struct Settings {
    pub addr: String,
    pub strategy: GroupingStrategy,
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
            strategy: GroupingStrategy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let mut settings = Settings::default();

        if let Some(addr) = read("SHELFSCAN_ADDR")? {
            settings.addr = addr;
        }
        if let Some(raw) = read("SHELFSCAN_STRATEGY")? {
            settings.strategy = raw.parse()?;
        }

        let pipeline = &mut settings.pipeline;
        if let Some(url) = read("SHELFSCAN_DETECTOR_URL")? {
            pipeline.detector_url = url;
        }
        if let Some(secs) = parse("SHELFSCAN_DETECTOR_TIMEOUT_SECS")? {
            pipeline.detector_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse("SHELFSCAN_MERGE_IOU_THRESHOLD")? {
            pipeline.merge_iou_threshold = threshold;
        }

        let grouping = &mut pipeline.grouping;
        if let Some(url) = read("SHELFSCAN_EMBEDDER_URL")? {
            grouping.embedder_url = url;
        }
        if let Some(secs) = parse("SHELFSCAN_EMBEDDER_TIMEOUT_SECS")? {
            grouping.embedder_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse("SHELFSCAN_MIN_CLUSTER_SIZE")? {
            grouping.min_cluster_size = size;
        }
        if let Some(samples) = parse("SHELFSCAN_MIN_SAMPLES")? {
            grouping.min_samples = samples;
        }
        if let Some(eps) = parse("SHELFSCAN_DBSCAN_EPS")? {
            grouping.dbscan_eps = eps;
        }
        if let Some(res) = parse("SHELFSCAN_DOWNSAMPLE_RESOLUTION")? {
            grouping.downsample_resolution = res;
        }
        if let Some(flag) = parse("SHELFSCAN_NORMALIZE_LUMINANCE")? {
            grouping.normalize_luminance = flag;
        }

        Ok(settings)
    }
}

fn read(name: &str) -> Result<Option<String>, String> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(format!("{name} is not valid UTF-8")),
    }
}

fn parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match read(name)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} has invalid value '{raw}'")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var mutation is process-wide, so each test uses its own
    // variable names via the helpers rather than from_env.

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::default();
        assert_eq!(settings.addr, "0.0.0.0:5000");
        assert_eq!(settings.strategy, GroupingStrategy::Pixel);
    }

    #[test]
    fn test_parse_helper_rejects_garbage() {
        std::env::set_var("SHELFSCAN_TEST_BAD_NUMBER", "not-a-number");
        let result: Result<Option<u64>, String> = parse("SHELFSCAN_TEST_BAD_NUMBER");
        assert!(result.is_err());
        std::env::remove_var("SHELFSCAN_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_parse_helper_reads_value() {
        std::env::set_var("SHELFSCAN_TEST_GOOD_NUMBER", "42");
        let result: Option<u64> = parse("SHELFSCAN_TEST_GOOD_NUMBER").unwrap();
        assert_eq!(result, Some(42));
        std::env::remove_var("SHELFSCAN_TEST_GOOD_NUMBER");
    }

    #[test]
    fn test_missing_variable_is_none() {
        let result: Option<f64> = parse("SHELFSCAN_TEST_ABSENT").unwrap();
        assert!(result.is_none());
    }
}
