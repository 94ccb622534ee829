//! Load test reports

use crate::context::{BuildContext, PerformanceReport, Upstream};
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::point::{Point, PointBuilder};
use async_trait::async_trait;

const MEASUREMENT: &str = "performance_data";

/// One point per performance report, tagged with the report name
pub struct PerformancePointGenerator;

impl PerformancePointGenerator {
    fn fill(point: &mut PointBuilder, report: &PerformanceReport) {
        let counters = [
            ("error_count", report.error_count),
            ("average", report.average),
            ("max", report.max),
            ("min", report.min),
            ("median", report.median),
            ("90Percentile", report.percentile_90),
            ("size", report.size),
        ];
        for (name, value) in counters {
            if let Some(value) = value {
                point.add_field(name, value);
            }
        }
        if let Some(percent) = report.error_percent {
            point.add_field("error_percent", percent);
        }
        if let Some(traffic) = report.total_traffic_kb {
            point.add_field("total_traffic", traffic);
        }
    }
}

#[async_trait]
impl PointGenerator for PerformancePointGenerator {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Performance)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        !build.actions().performance.is_empty()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let reports = &build.actions().performance;
        let mut points = Vec::with_capacity(reports.len());
        for report in reports {
            let mut point = ctx.point(MEASUREMENT, build);
            point.add_tag("performance_report", report.name.as_str());
            Self::fill(&mut point, report);
            points.push(point.build()?);
        }
        Ok(points)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::BuildRecord;
    use crate::generate::testing::context;
    use crate::options::PublishOptions;
    use crate::point::FieldValue;

    #[tokio::test]
    async fn test_one_point_per_report() {
        let mut build = BuildRecord::new("app", 3);
        build.actions.performance = vec![
            PerformanceReport {
                name: "login.jtl".into(),
                error_percent: Some(1.5),
                average: Some(120),
                percentile_90: Some(300),
                ..Default::default()
            },
            PerformanceReport {
                name: "search.jtl".into(),
                total_traffic_kb: Some(2048.0),
                ..Default::default()
            },
        ];
        let ctx = context(&build, PublishOptions::default());

        assert!(PerformancePointGenerator.has_report(&build, &ctx));
        let points = PerformancePointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points.len(), 2);

        let login = &points[0];
        assert_eq!(login.measurement(), MEASUREMENT);
        assert_eq!(login.tag("performance_report"), Some("login.jtl"));
        assert_eq!(login.field("90Percentile"), Some(&FieldValue::Integer(300)));
        assert_eq!(login.field("error_percent"), Some(&FieldValue::Float(1.5)));
        assert!(login.field("median").is_none());

        assert_eq!(
            points[1].field("total_traffic"),
            Some(&FieldValue::Float(2048.0))
        );
    }

    #[tokio::test]
    async fn test_no_reports() {
        let build = BuildRecord::new("app", 3);
        let ctx = context(&build, PublishOptions::default());
        assert!(!PerformancePointGenerator.has_report(&build, &ctx));
    }
}
