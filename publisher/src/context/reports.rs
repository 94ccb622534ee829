//! Already-parsed upstream reports attached to a build
//!
//! Each struct is the shape one upstream plugin exposes on a finished build.
//! Most numeric members are optional: a report may be only partly populated
//! and generators skip what is missing.

use serde::{Deserialize, Serialize};

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Skipped,
    Failed,
    Fixed,
    Regression,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Failed => "FAILED",
            TestStatus::Fixed => "FIXED",
            TestStatus::Regression => "REGRESSION",
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            TestStatus::Passed => 0,
            TestStatus::Skipped => 1,
            TestStatus::Failed => 2,
            TestStatus::Fixed => 3,
            TestStatus::Regression => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub suites: Vec<TestSuite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub class_name: String,
    pub status: TestStatus,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
}

/// Cobertura coverage, rates in percent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoberturaResult {
    pub package_coverage_rate: Option<f64>,
    pub class_coverage_rate: Option<f64>,
    pub line_coverage_rate: Option<f64>,
    pub branch_coverage_rate: Option<f64>,
    pub number_of_packages: Option<u64>,
    pub number_of_source_files: Option<u64>,
    pub number_of_classes: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoverageRatio {
    pub covered: u64,
    pub missed: u64,
}

impl CoverageRatio {
    pub fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// Covered share in percent, `None` when nothing was measured
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.covered as f64 * 100.0 / total as f64)
    }
}

/// JaCoCo counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JacocoResult {
    pub instruction: Option<CoverageRatio>,
    pub branch: Option<CoverageRatio>,
    pub complexity: Option<CoverageRatio>,
    pub line: Option<CoverageRatio>,
    pub method: Option<CoverageRatio>,
    pub class: Option<CoverageRatio>,
}

/// Code coverage API result, one entry per granularity (report, package,
/// file, class, method, line, conditional, instruction)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageResult {
    #[serde(default)]
    pub elements: Vec<CoverageElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageElement {
    pub name: String,
    pub covered: u64,
    pub missed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub name: String,
    pub error_percent: Option<f64>,
    pub error_count: Option<u64>,
    pub average: Option<u64>,
    pub max: Option<u64>,
    pub min: Option<u64>,
    pub median: Option<u64>,
    pub percentile_90: Option<u64>,
    pub total_traffic_kb: Option<f64>,
    pub size: Option<u64>,
}

/// Robot Framework run, suites nest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotResult {
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub critical_passed: u64,
    #[serde(default)]
    pub critical_failed: u64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub suites: Vec<RobotSuite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotSuite {
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub cases: Vec<RobotCase>,
    #[serde(default)]
    pub suites: Vec<RobotSuite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotCase {
    pub name: String,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScmRevision {
    pub repository_url: String,
    #[serde(default)]
    pub reference: String,
    pub revision: String,
}

/// Queue timing breakdown, durations in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueTiming {
    pub blocked_ms: Option<u64>,
    pub buildable_ms: Option<u64>,
    pub building_ms: Option<u64>,
    pub executing_ms: Option<u64>,
    pub queuing_ms: Option<u64>,
    pub waiting_ms: Option<u64>,
    pub total_duration_ms: Option<u64>,
    pub executor_utilization: Option<f64>,
    pub subtask_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSetEntry {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub affected_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// The named actions of a build, one slot per upstream report type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actions {
    pub test_results: Option<TestResults>,
    pub cobertura: Option<CoberturaResult>,
    pub jacoco: Option<JacocoResult>,
    pub coverage: Option<CoverageResult>,
    #[serde(default)]
    pub performance: Vec<PerformanceReport>,
    pub robot: Option<RobotResult>,
    #[serde(default)]
    pub scm_revisions: Vec<ScmRevision>,
    pub queue_timing: Option<QueueTiming>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_percentage() {
        let r = CoverageRatio {
            covered: 3,
            missed: 1,
        };
        assert_eq!(r.percentage(), Some(75.0));
        assert_eq!(CoverageRatio::default().percentage(), None);
    }

    #[test]
    fn test_status_ordinals() {
        assert_eq!(TestStatus::Passed.ordinal(), 0);
        assert_eq!(TestStatus::Regression.ordinal(), 4);
        assert_eq!(TestStatus::Failed.as_str(), "FAILED");
    }
}
