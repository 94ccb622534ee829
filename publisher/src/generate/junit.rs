//! Per test case results
//!
//! Test suites can be large, so this generator only runs when the build
//! environment opts in with `LOG_JUNIT_RESULTS=true`.

use crate::context::{BuildContext, Upstream};
use crate::error::GeneratorError;
use crate::generate::{Deduplicator, GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;

const MEASUREMENT: &str = "junit_data";

/// Environment variable gating this generator
pub const LOG_JUNIT_RESULTS: &str = "LOG_JUNIT_RESULTS";

/// One point per test case
pub struct JUnitPointGenerator;

fn enabled(build: &dyn BuildContext) -> bool {
    build
        .environment()
        .get(LOG_JUNIT_RESULTS)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[async_trait]
impl PointGenerator for JUnitPointGenerator {
    fn name(&self) -> &'static str {
        "junit"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Junit)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        enabled(build) && build.actions().test_results.is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(results) = &build.actions().test_results else {
            return Ok(Vec::new());
        };

        let mut seen = Deduplicator::new();
        let mut points = Vec::new();
        for suite in &results.suites {
            for case in &suite.cases {
                if !seen.check((suite.name.as_str(), case.class_name.as_str(), case.name.as_str())) {
                    continue;
                }
                let status = case.status.as_str();
                let mut point = ctx.point(MEASUREMENT, build);
                point
                    .add_field("suite_name", suite.name.as_str())
                    .add_field("test_name", case.name.as_str())
                    .add_field("test_class_full_name", case.class_name.as_str())
                    .add_field("test_status", status)
                    .add_field("test_status_ordinal", case.status.ordinal())
                    .add_field("test_duration", case.duration)
                    .add_tag("suite_name", suite.name.as_str())
                    .add_tag("test_name", case.name.as_str())
                    .add_tag("test_status", status);
                points.push(point.build()?);
            }
        }
        Ok(points)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::{BuildRecord, TestCase, TestResults, TestStatus, TestSuite};
    use crate::generate::testing::context;
    use crate::options::PublishOptions;
    use crate::point::FieldValue;

    fn case(name: &str, status: TestStatus) -> TestCase {
        TestCase {
            name: name.into(),
            class_name: "com.acme.ParserTest".into(),
            status,
            duration: 0.25,
        }
    }

    fn build_with_results() -> BuildRecord {
        let mut build = BuildRecord::new("app", 1);
        build.actions.test_results = Some(TestResults {
            failed: 1,
            skipped: 0,
            total: 2,
            suites: vec![TestSuite {
                name: "parser".into(),
                cases: vec![
                    case("parses_empty", TestStatus::Passed),
                    case("parses_nested", TestStatus::Failed),
                    case("parses_empty", TestStatus::Passed),
                ],
            }],
        });
        build
    }

    #[tokio::test]
    async fn test_gated_by_environment() {
        let mut build = build_with_results();
        let ctx = context(&build, PublishOptions::default());
        assert!(!JUnitPointGenerator.has_report(&build, &ctx));

        build.environment.insert(LOG_JUNIT_RESULTS.into(), "false".into());
        assert!(!JUnitPointGenerator.has_report(&build, &ctx));

        build.environment.insert(LOG_JUNIT_RESULTS.into(), "true".into());
        assert!(JUnitPointGenerator.has_report(&build, &ctx));
    }

    #[tokio::test]
    async fn test_flag_without_results() {
        let mut build = BuildRecord::new("app", 1);
        build.environment.insert(LOG_JUNIT_RESULTS.into(), "true".into());
        let ctx = context(&build, PublishOptions::default());
        assert!(!JUnitPointGenerator.has_report(&build, &ctx));
    }

    #[tokio::test]
    async fn test_point_per_distinct_case() {
        let mut build = build_with_results();
        build.environment.insert(LOG_JUNIT_RESULTS.into(), "true".into());
        let ctx = context(&build, PublishOptions::default());

        let points = JUnitPointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points.len(), 2);

        let failed = &points[1];
        assert_eq!(failed.measurement(), MEASUREMENT);
        assert_eq!(failed.tag("test_status"), Some("FAILED"));
        assert_eq!(failed.tag("suite_name"), Some("parser"));
        assert_eq!(
            failed.field("test_status_ordinal"),
            Some(&FieldValue::Integer(2))
        );
        assert_eq!(failed.field("test_duration"), Some(&FieldValue::Float(0.25)));
    }
}
