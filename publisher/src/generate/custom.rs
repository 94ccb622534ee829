//! Caller supplied custom data
//!
//! Two shapes: a flat key/value bag producing one point, and a map of named
//! series producing one point per series.

use crate::context::BuildContext;
use crate::error::GeneratorError;
use crate::generate::base::{BUILD_TIME, build_time_ms};
use crate::generate::{GeneratorContext, PointGenerator};
use crate::options::DEFAULT_MEASUREMENT;
use crate::point::{FieldValue, Point, PointBuilder, normalize_measurement};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Measurement for custom data given the base measurement name.
///
/// The default base name maps to `jenkins_custom_data`, anything else to
/// `custom_<name>`, so custom points never land in the base schema.
pub fn custom_measurement(base: &str) -> String {
    let base = normalize_measurement(base);
    if base == DEFAULT_MEASUREMENT {
        "jenkins_custom_data".to_string()
    } else {
        format!("custom_{base}")
    }
}

fn merge_fields(point: &mut PointBuilder, data: &BTreeMap<String, serde_json::Value>) {
    for (key, value) in data {
        match FieldValue::try_from(value) {
            Ok(field) => {
                point.add_field(key.as_str(), field);
            }
            Err(()) => {
                tracing::debug!(field = %key, "skipping non-scalar custom field");
            }
        }
    }
}

/// Flat custom data, one point
pub struct CustomDataPointGenerator;

#[async_trait]
impl PointGenerator for CustomDataPointGenerator {
    fn name(&self) -> &'static str {
        "custom_data"
    }

    fn has_report(&self, _build: &dyn BuildContext, ctx: &GeneratorContext) -> bool {
        !ctx.options.custom_data.is_empty()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let measurement = custom_measurement(ctx.options.measurement_name());
        let now_ms = ctx.clock.now_ns() / 1_000_000;

        let mut point = ctx.point(&measurement, build);
        point.add_field(BUILD_TIME, build_time_ms(build, now_ms));
        merge_fields(&mut point, &ctx.options.custom_data);
        point.add_tags(ctx.options.custom_data_tags.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        Ok(vec![point.build()?])
    }
}

/// Named series of custom data, one point per series
pub struct CustomDataMapPointGenerator;

#[async_trait]
impl PointGenerator for CustomDataMapPointGenerator {
    fn name(&self) -> &'static str {
        "custom_data_map"
    }

    fn has_report(&self, _build: &dyn BuildContext, ctx: &GeneratorContext) -> bool {
        ctx.options.custom_data_map.values().any(|series| !series.is_empty())
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let base = normalize_measurement(ctx.options.measurement_name());
        let now_ms = ctx.clock.now_ns() / 1_000_000;
        let build_time = build_time_ms(build, now_ms);

        let mut points = Vec::with_capacity(ctx.options.custom_data_map.len());
        for (series, data) in &ctx.options.custom_data_map {
            if data.is_empty() {
                continue;
            }
            let measurement = if normalize_measurement(series) == base {
                custom_measurement(&base)
            } else {
                series.clone()
            };

            let mut point = ctx.point(&measurement, build);
            point.add_field(BUILD_TIME, build_time);
            merge_fields(&mut point, data);
            if let Some(tags) = ctx.options.custom_data_map_tags.get(series) {
                point.add_tags(tags.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            }
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
    use serde_json::json;

    #[test]
    fn test_custom_measurement_alias() {
        assert_eq!(custom_measurement("jenkins_data"), "jenkins_custom_data");
        assert_eq!(custom_measurement("ci_data"), "custom_ci_data");
        assert_eq!(custom_measurement("my-data"), "custom_my_data");
    }

    #[tokio::test]
    async fn test_no_custom_data_means_no_report() {
        let build = BuildRecord::new("app", 1);
        let ctx = context(&build, PublishOptions::default());
        assert!(!CustomDataPointGenerator.has_report(&build, &ctx));
        assert!(!CustomDataMapPointGenerator.has_report(&build, &ctx));
    }

    #[tokio::test]
    async fn test_flat_custom_data() {
        let build = BuildRecord::new("app", 1);
        let options = PublishOptions {
            custom_data: BTreeMap::from([
                ("artifact_size".to_string(), json!(1024)),
                ("flaky".to_string(), json!(false)),
                ("nested".to_string(), json!({"x": 1})),
            ]),
            custom_data_tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            ..Default::default()
        };
        let ctx = context(&build, options);

        assert!(CustomDataPointGenerator.has_report(&build, &ctx));
        let points = CustomDataPointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points.len(), 1);
        let p = &points[0];
        assert_eq!(p.measurement(), "jenkins_custom_data");
        assert_eq!(p.field("artifact_size"), Some(&FieldValue::Integer(1024)));
        assert_eq!(p.field("flaky"), Some(&FieldValue::Boolean(false)));
        assert!(p.field("nested").is_none());
        assert!(p.field(BUILD_TIME).is_some());
        assert_eq!(p.tag("env"), Some("prod"));
    }

    #[tokio::test]
    async fn test_flat_custom_data_with_custom_measurement() {
        let build = BuildRecord::new("app", 1);
        let options = PublishOptions {
            measurement_name: Some("pipeline".into()),
            custom_data: BTreeMap::from([("x".to_string(), json!(1.5))]),
            ..Default::default()
        };
        let ctx = context(&build, options);

        let points = CustomDataPointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points[0].measurement(), "custom_pipeline");
    }

    #[tokio::test]
    async fn test_custom_data_map_series() {
        let build = BuildRecord::new("app", 1);
        let options = PublishOptions {
            custom_data_map: BTreeMap::from([
                (
                    "series_1".to_string(),
                    BTreeMap::from([("test_1".to_string(), json!(102))]),
                ),
                (
                    "jenkins_data".to_string(),
                    BTreeMap::from([("clash".to_string(), json!("yes"))]),
                ),
                ("empty".to_string(), BTreeMap::new()),
            ]),
            custom_data_map_tags: BTreeMap::from([(
                "series_1".to_string(),
                BTreeMap::from([("stage".to_string(), "deploy".to_string())]),
            )]),
            ..Default::default()
        };
        let ctx = context(&build, options);

        let points = CustomDataMapPointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points.len(), 2);

        let clash = points.iter().find(|p| p.field("clash").is_some()).unwrap();
        assert_eq!(clash.measurement(), "jenkins_custom_data");

        let series = points.iter().find(|p| p.measurement() == "series_1").unwrap();
        assert_eq!(series.field("test_1"), Some(&FieldValue::Integer(102)));
        assert_eq!(series.tag("stage"), Some("deploy"));
        assert!(series.field(BUILD_TIME).is_some());
    }
}
