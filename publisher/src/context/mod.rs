//! The finished build, as seen by the publisher
//!
//! The CI host is an external collaborator. All the publisher needs from it is
//! the read-only [`BuildContext`] query interface. [`BuildRecord`] is a plain
//! serde implementation used by the binary (read from a JSON file) and by
//! tests.

pub mod reports;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use reports::*;

/// Final result of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    #[default]
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Failure => "FAILURE",
            BuildResult::NotBuilt => "NOT_BUILT",
            BuildResult::Aborted => "ABORTED",
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            BuildResult::Success => 0,
            BuildResult::Unstable => 1,
            BuildResult::Failure => 2,
            BuildResult::NotBuilt => 3,
            BuildResult::Aborted => 4,
        }
    }
}

/// Upstream plugins a generator can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Junit,
    Cobertura,
    Jacoco,
    CodeCoverageApi,
    Performance,
    RobotFramework,
    Git,
    SonarQube,
    Metrics,
}

/// Read-only view of one completed build
pub trait BuildContext: Send + Sync {
    /// Short job name
    fn job_name(&self) -> &str;

    /// Full job path, e.g. `folder/sub/job`
    fn job_path(&self) -> &str;

    fn build_number(&self) -> u64;

    /// Epoch milliseconds when the build started
    fn start_time_ms(&self) -> i64;

    /// Epoch milliseconds when the build was scheduled
    fn scheduled_time_ms(&self) -> i64;

    /// Milliseconds, zero while the build is still finishing
    fn duration_ms(&self) -> u64;

    fn result(&self) -> BuildResult;

    /// Human readable status summary, e.g. "stable" or "broken since #4"
    fn status_message(&self) -> &str;

    /// Job health score, 0..=100
    fn health_score(&self) -> i64;

    fn last_successful_build(&self) -> Option<u64>;

    fn last_stable_build(&self) -> Option<u64>;

    fn causes(&self) -> &[String];

    fn user(&self) -> Option<&str>;

    fn branch(&self) -> Option<&str>;

    /// Agents the build ran on. Classic jobs have one, pipelines may have many.
    fn agents(&self) -> &[Agent];

    /// `None` when this build type does not expose SCM changesets at all
    fn change_sets(&self) -> Option<&[ChangeSetEntry]>;

    fn environment(&self) -> &HashMap<String, String>;

    /// Full console log text
    fn log(&self) -> &str;

    fn actions(&self) -> &Actions;

    /// Whether the upstream plugin is installed on the host at all
    fn plugin_installed(&self, plugin: Upstream) -> bool;
}

/// Serializable build snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRecord {
    pub job_name: String,
    pub job_path: String,
    pub build_number: u64,
    pub start_time_ms: i64,
    pub scheduled_time_ms: i64,
    pub duration_ms: u64,
    pub result: BuildResult,
    pub status_message: String,
    pub health_score: i64,
    pub last_successful_build: Option<u64>,
    pub last_stable_build: Option<u64>,
    pub causes: Vec<String>,
    pub user: Option<String>,
    pub branch: Option<String>,
    pub agents: Vec<Agent>,
    pub change_sets: Option<Vec<ChangeSetEntry>>,
    pub environment: HashMap<String, String>,
    pub log: String,
    pub actions: Actions,
    /// `None` means every upstream plugin is installed
    pub installed_plugins: Option<Vec<Upstream>>,
}

impl BuildRecord {
    /// Minimal successful build of `job_path`; the job name is its last segment
    pub fn new(job_path: impl Into<String>, build_number: u64) -> Self {
        let job_path = job_path.into();
        let job_name = job_path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            job_name,
            job_path,
            build_number,
            health_score: 100,
            status_message: "stable".to_string(),
            ..Default::default()
        }
    }
}

impl BuildContext for BuildRecord {
    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn job_path(&self) -> &str {
        &self.job_path
    }

    fn build_number(&self) -> u64 {
        self.build_number
    }

    fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    fn scheduled_time_ms(&self) -> i64 {
        self.scheduled_time_ms
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn result(&self) -> BuildResult {
        self.result
    }

    fn status_message(&self) -> &str {
        &self.status_message
    }

    fn health_score(&self) -> i64 {
        self.health_score
    }

    fn last_successful_build(&self) -> Option<u64> {
        self.last_successful_build
    }

    fn last_stable_build(&self) -> Option<u64> {
        self.last_stable_build
    }

    fn causes(&self) -> &[String] {
        &self.causes
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn agents(&self) -> &[Agent] {
        &self.agents
    }

    fn change_sets(&self) -> Option<&[ChangeSetEntry]> {
        self.change_sets.as_deref()
    }

    fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    fn log(&self) -> &str {
        &self.log
    }

    fn actions(&self) -> &Actions {
        &self.actions
    }

    fn plugin_installed(&self, plugin: Upstream) -> bool {
        self.installed_plugins
            .as_ref()
            .is_none_or(|installed| installed.contains(&plugin))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new_derives_job_name() {
        let build = BuildRecord::new("folder/influxdb-test-job", 1);
        assert_eq!(build.job_name(), "influxdb-test-job");
        assert_eq!(build.job_path(), "folder/influxdb-test-job");
        assert_eq!(build.result(), BuildResult::Success);
    }

    #[test]
    fn test_installed_plugins_default_to_all() {
        let mut build = BuildRecord::new("job", 1);
        assert!(build.plugin_installed(Upstream::Jacoco));
        build.installed_plugins = Some(vec![Upstream::Junit]);
        assert!(build.plugin_installed(Upstream::Junit));
        assert!(!build.plugin_installed(Upstream::Jacoco));
    }

    #[test]
    fn test_record_from_json() {
        let json = r#"{
            "job_name": "app",
            "job_path": "team/app",
            "build_number": 7,
            "result": "UNSTABLE",
            "actions": {"test_results": {"failed": 1, "total": 3}}
        }"#;
        let build: BuildRecord = serde_json::from_str(json).unwrap();
        assert_eq!(build.result(), BuildResult::Unstable);
        assert_eq!(build.actions().test_results.as_ref().unwrap().failed, 1);
        assert!(build.change_sets().is_none());
    }
}
