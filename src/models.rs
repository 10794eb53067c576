//! Data models for extracted articles and environment runs.
//!
//! - [`ArticleRecord`]: one processed article node
//! - [`EnvironmentConfig`]: one browser/OS/device combination to run under
//! - [`EnvironmentResult`]: the outcome of running one environment
//!
//! Sentinel strings stand in for fields that could not be extracted so a
//! record is always complete, even when the page markup is not.

use crate::pipeline::PipelineOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Title placeholder when the article has no heading.
pub const TITLE_NOT_FOUND: &str = "Title not found";

/// Summary placeholder when every summary selector came up empty.
pub const SUMMARY_NOT_SCRAPED: &str = "Content summary not easily scraped from this section.";

/// Translated title placeholder when the translation collaborator failed.
pub const TRANSLATION_FAILED: &str = "Translation failed";

/// A single article as extracted from the section page.
///
/// Built once per processed node by the pipeline and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRecord {
    /// 1-based ordinal of the node within the batch.
    pub position: usize,
    /// Headline in the page language, or [`TITLE_NOT_FOUND`].
    pub title: String,
    /// Abstract text, or [`SUMMARY_NOT_SCRAPED`].
    pub summary: String,
    /// Absolute http(s) URL of the cover image, when one was resolved.
    pub image_url: Option<String>,
    /// Where the cover image was written, when the download succeeded.
    pub image_path: Option<PathBuf>,
    /// Headline in the target language, or [`TRANSLATION_FAILED`].
    pub translated_title: Option<String>,
}

/// Where an environment's session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Local,
    #[default]
    Remote,
}

/// One browser/OS/device combination.
///
/// Capability keys follow the matrix file format: `browserName`,
/// `browserVersion`, `os`, `os_version`, `device`, `realMobile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
}

impl EnvironmentConfig {
    pub fn capability(&self, key: &str) -> Option<&str> {
        self.capabilities.get(key).map(String::as_str)
    }

    pub fn browser_name(&self) -> &str {
        self.capability("browserName").unwrap_or("chrome")
    }

    /// Human label such as `chrome (Windows 10)` or `safari (iPhone 14 Pro)`.
    pub fn label(&self) -> String {
        let platform = match (self.capability("device"), self.capability("os")) {
            (Some(device), _) => device.to_string(),
            (None, Some(os)) => match self.capability("os_version") {
                Some(version) => format!("{os} {version}"),
                None => os.to_string(),
            },
            (None, None) => "Desktop".to_string(),
        };
        format!("{} ({})", self.browser_name(), platform)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage of a session run, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Acquiring,
    Running,
}

/// Outcome of one environment run. Created once by the session runner.
#[derive(Debug, Clone)]
pub struct EnvironmentResult {
    pub config: EnvironmentConfig,
    pub status: Status,
    pub reason: Option<String>,
    pub failed_stage: Option<Stage>,
    pub output: Option<PipelineOutput>,
    pub elapsed: Duration,
}

impl EnvironmentResult {
    pub fn passed(config: EnvironmentConfig, output: PipelineOutput, elapsed: Duration) -> Self {
        Self {
            config,
            status: Status::Passed,
            reason: None,
            failed_stage: None,
            output: Some(output),
            elapsed,
        }
    }

    pub fn failed(
        config: EnvironmentConfig,
        stage: Stage,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            config,
            status: Status::Failed,
            reason: Some(reason.into()),
            failed_stage: Some(stage),
            output: None,
            elapsed,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == Status::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> EnvironmentConfig {
        EnvironmentConfig {
            name: "env".to_string(),
            target: Target::Remote,
            capabilities: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_label_prefers_device() {
        let cfg = config(&[
            ("browserName", "safari"),
            ("device", "iPhone 14 Pro"),
            ("os", "ios"),
        ]);
        assert_eq!(cfg.label(), "safari (iPhone 14 Pro)");
    }

    #[test]
    fn test_label_with_os_version() {
        let cfg = config(&[("browserName", "edge"), ("os", "Windows"), ("os_version", "10")]);
        assert_eq!(cfg.label(), "edge (Windows 10)");
    }

    #[test]
    fn test_label_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.label(), "chrome (Desktop)");
    }

    #[test]
    fn test_target_deserializes_lowercase_and_defaults_remote() {
        let yaml = "name: a\ncapabilities:\n  browserName: firefox\n";
        let cfg: EnvironmentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.target, Target::Remote);

        let yaml = "name: b\ntarget: local\n";
        let cfg: EnvironmentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.target, Target::Local);
        assert!(cfg.capabilities.is_empty());
    }

    #[test]
    fn test_failed_result_shape() {
        let result = EnvironmentResult::failed(
            config(&[]),
            Stage::Acquiring,
            "grid unreachable",
            Duration::from_millis(3),
        );
        assert!(!result.is_passed());
        assert_eq!(result.status.to_string(), "failed");
        assert_eq!(result.failed_stage, Some(Stage::Acquiring));
        assert!(result.output.is_none());
    }
}
