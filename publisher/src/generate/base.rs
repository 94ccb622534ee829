//! Base job point, emitted for every build

use crate::context::BuildContext;
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::options::resolve_env_parameters;
use crate::point::Point;
use async_trait::async_trait;

pub const BUILD_TIME: &str = "build_time";

/// One point describing the job and its outcome
pub struct BasePointGenerator;

#[async_trait]
impl PointGenerator for BasePointGenerator {
    fn name(&self) -> &'static str {
        "base"
    }

    fn has_report(&self, _build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        true
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let now_ms = ctx.clock.now_ns() / 1_000_000;
        let result = build.result();

        let mut point = ctx.point(ctx.options.measurement_name(), build);
        point
            .add_field(BUILD_TIME, build_time_ms(build, now_ms))
            .add_field("build_scheduled_time", build.scheduled_time_ms())
            .add_field("build_exec_time", build.start_time_ms())
            .add_field("build_measured_time", now_ms)
            .add_field(
                "time_in_queue",
                (build.start_time_ms() - build.scheduled_time_ms()).max(0),
            )
            .add_field("build_status_message", build.status_message())
            .add_field("build_result", result.as_str())
            .add_field("build_result_ordinal", result.ordinal())
            .add_field("build_successful", result.ordinal() == 0)
            .add_field("project_build_health", build.health_score())
            .add_field(
                "build_agent_name",
                build.agents().first().map(|a| a.name.as_str()).unwrap_or(""),
            )
            .add_field("build_branch_name", build.branch().unwrap_or(""))
            .add_field("build_cause", build.causes().join(", "))
            .add_field("build_user", build.user().unwrap_or(""))
            .add_tag("build_result", result.as_str());

        if let Some(number) = build.last_successful_build() {
            point.add_field("last_successful_build", number);
        }
        if let Some(number) = build.last_stable_build() {
            point.add_field("last_stable_build", number);
        }
        if let Some((namespace, _)) = build.job_path().rsplit_once('/') {
            point.add_tag("project_namespace", namespace);
        }
        if let Some(tests) = &build.actions().test_results {
            point
                .add_field("tests_failed", tests.failed)
                .add_field("tests_skipped", tests.skipped)
                .add_field("tests_total", tests.total);
        }
        if let Some(text) = ctx.options.env_parameter_fields.as_deref() {
            for (key, value) in resolve_env_parameters(text, build.environment()) {
                point.add_field(key, value);
            }
        }

        Ok(vec![point.build()?])
    }
}

/// Duration of a finished build, or the time elapsed so far while the host is
/// still finalizing it
pub(crate) fn build_time_ms(build: &dyn BuildContext, now_ms: i64) -> i64 {
    match build.duration_ms() {
        0 => (now_ms - build.start_time_ms()).max(0),
        duration => i64::try_from(duration).unwrap_or(i64::MAX),
    }
}
