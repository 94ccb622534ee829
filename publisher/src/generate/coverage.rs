//! Coverage tool integrations
//!
//! One generator per tool, each emitting a single point of percentage rates.

use crate::context::{BuildContext, CoverageRatio, Upstream};
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::point::{Point, PointBuilder};
use async_trait::async_trait;

fn add_rate(point: &mut PointBuilder, name: &str, rate: Option<f64>) {
    if let Some(rate) = rate {
        point.add_field(name, rate);
    }
}

fn add_count(point: &mut PointBuilder, name: &str, count: Option<u64>) {
    if let Some(count) = count {
        point.add_field(name, count);
    }
}

/// `cobertura_data`
pub struct CoberturaPointGenerator;

#[async_trait]
impl PointGenerator for CoberturaPointGenerator {
    fn name(&self) -> &'static str {
        "cobertura"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Cobertura)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.actions().cobertura.is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(result) = &build.actions().cobertura else {
            return Ok(Vec::new());
        };

        let mut point = ctx.point("cobertura_data", build);
        add_rate(&mut point, "cobertura_package_coverage_rate", result.package_coverage_rate);
        add_rate(&mut point, "cobertura_class_coverage_rate", result.class_coverage_rate);
        add_rate(&mut point, "cobertura_line_coverage_rate", result.line_coverage_rate);
        add_rate(&mut point, "cobertura_branch_coverage_rate", result.branch_coverage_rate);
        add_count(&mut point, "cobertura_number_of_packages", result.number_of_packages);
        add_count(&mut point, "cobertura_number_of_sourcefiles", result.number_of_source_files);
        add_count(&mut point, "cobertura_number_of_classes", result.number_of_classes);

        Ok(vec![point.build()?])
    }
}

/// `jacoco_data`
pub struct JacocoPointGenerator;

impl JacocoPointGenerator {
    fn add_ratio(point: &mut PointBuilder, name: &str, ratio: Option<&CoverageRatio>) {
        let Some(ratio) = ratio else { return };
        if let Some(percentage) = ratio.percentage() {
            point.add_field(format!("jacoco_{name}_coverage_rate"), percentage);
        }
        point
            .add_field(format!("jacoco_{name}_covered"), ratio.covered)
            .add_field(format!("jacoco_{name}_missed"), ratio.missed);
    }
}

#[async_trait]
impl PointGenerator for JacocoPointGenerator {
    fn name(&self) -> &'static str {
        "jacoco"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Jacoco)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.actions().jacoco.is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(result) = &build.actions().jacoco else {
            return Ok(Vec::new());
        };

        let mut point = ctx.point("jacoco_data", build);
        Self::add_ratio(&mut point, "instruction", result.instruction.as_ref());
        Self::add_ratio(&mut point, "branch", result.branch.as_ref());
        Self::add_ratio(&mut point, "complexity", result.complexity.as_ref());
        Self::add_ratio(&mut point, "line", result.line.as_ref());
        Self::add_ratio(&mut point, "method", result.method.as_ref());
        Self::add_ratio(&mut point, "class", result.class.as_ref());

        Ok(vec![point.build()?])
    }
}

/// `coverage_data`, from the code coverage API
pub struct CodeCoveragePointGenerator;

#[async_trait]
impl PointGenerator for CodeCoveragePointGenerator {
    fn name(&self) -> &'static str {
        "code_coverage"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::CodeCoverageApi)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build
            .actions()
            .coverage
            .as_ref()
            .is_some_and(|c| !c.elements.is_empty())
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(result) = &build.actions().coverage else {
            return Ok(Vec::new());
        };

        let mut point = ctx.point("coverage_data", build);
        for element in &result.elements {
            let name = element.name.trim().to_lowercase().replace(' ', "_");
            if name.is_empty() {
                continue;
            }
            let ratio = CoverageRatio {
                covered: element.covered,
                missed: element.missed,
            };
            point
                .add_field(format!("{name}_covered"), ratio.covered)
                .add_field(format!("{name}_missed"), ratio.missed);
            if let Some(percentage) = ratio.percentage() {
                point.add_field(format!("{name}_coverage_rate"), percentage);
            }
        }

        Ok(vec![point.build()?])
    }
}
