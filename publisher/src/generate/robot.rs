//! Robot Framework results
//!
//! Emits the run summary, then walks the suite tree depth first: each suite
//! point is followed by its test cases, and each case by the tags it is the
//! first to carry. Every point gets its own timestamp from a
//! [`TimestampSequence`] so the hierarchy reads back in emission order.

use crate::context::{BuildContext, RobotCase, RobotResult, RobotSuite, Upstream};
use crate::error::GeneratorError;
use crate::generate::{Deduplicator, GeneratorContext, PointGenerator, TimestampSequence};
use crate::point::{Point, PointBuilder, Precision};
use async_trait::async_trait;
use std::collections::HashMap;

const RESULTS: &str = "rf_results";
const SUITE: &str = "suite_result";
const CASE: &str = "testcase_point";
const TAG: &str = "tag_point";

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    passed: u64,
    failed: u64,
    skipped: u64,
    critical_passed: u64,
    critical_failed: u64,
    duration_ms: u64,
}

impl Tally {
    fn record(&mut self, case: &RobotCase) {
        if case.skipped {
            self.skipped += 1;
        } else if case.passed {
            self.passed += 1;
            if case.critical {
                self.critical_passed += 1;
            }
        } else {
            self.failed += 1;
            if case.critical {
                self.critical_failed += 1;
            }
        }
        self.duration_ms += case.duration_ms;
    }

    fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }

    fn of_suite(suite: &RobotSuite) -> Self {
        let mut tally = Tally::default();
        for case in distinct_cases(suite) {
            tally.record(case);
        }
        for child in &suite.suites {
            let sub = Tally::of_suite(child);
            tally.passed += sub.passed;
            tally.failed += sub.failed;
            tally.skipped += sub.skipped;
            tally.critical_passed += sub.critical_passed;
            tally.critical_failed += sub.critical_failed;
        }
        tally
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Dotted path of a suite below `parent`, the identity cases are keyed on
fn suite_path(parent: &str, suite: &RobotSuite) -> String {
    if parent.is_empty() {
        suite.name.clone()
    } else {
        format!("{parent}.{}", suite.name)
    }
}

/// Cases of one suite with repeats of the same name removed
fn distinct_cases(suite: &RobotSuite) -> impl Iterator<Item = &RobotCase> {
    let mut seen = Deduplicator::new();
    suite.cases.iter().filter(move |c| seen.check(c.name.as_str()))
}

/// Tag statistics across the whole run, each case counted once
fn tag_tallies(result: &RobotResult) -> HashMap<&str, Tally> {
    fn walk<'a>(
        parent: &str,
        suite: &'a RobotSuite,
        seen: &mut Deduplicator<(String, &'a str)>,
        tallies: &mut HashMap<&'a str, Tally>,
    ) {
        let path = suite_path(parent, suite);
        for case in &suite.cases {
            if !seen.check((path.clone(), case.name.as_str())) {
                continue;
            }
            for tag in &case.tags {
                tallies.entry(tag.as_str()).or_default().record(case);
            }
        }
        for child in &suite.suites {
            walk(&path, child, seen, tallies);
        }
    }

    let mut seen = Deduplicator::new();
    let mut tallies = HashMap::new();
    for suite in &result.suites {
        walk("", suite, &mut seen, &mut tallies);
    }
    tallies
}

struct Walk<'a> {
    build: &'a dyn BuildContext,
    ctx: &'a GeneratorContext,
    timestamps: TimestampSequence<'a>,
    cases: Deduplicator<(String, &'a str)>,
    tags: Deduplicator<&'a str>,
    tag_tallies: HashMap<&'a str, Tally>,
    points: Vec<Point>,
}

impl<'a> Walk<'a> {
    fn start(&mut self, measurement: &str) -> PointBuilder {
        let mut point = self.ctx.point(measurement, self.build);
        point.set_timestamp(self.timestamps.next(), Precision::Nanoseconds);
        point
    }

    fn results(&mut self, result: &RobotResult) -> Result<(), GeneratorError> {
        let total = result.passed + result.failed + result.skipped;
        let critical_total = result.critical_passed + result.critical_failed;

        let mut point = self.start(RESULTS);
        point
            .add_field("rf_passed", result.passed)
            .add_field("rf_failed", result.failed)
            .add_field("rf_skipped", result.skipped)
            .add_field("rf_total", total)
            .add_field("rf_critical_passed", result.critical_passed)
            .add_field("rf_critical_failed", result.critical_failed)
            .add_field("rf_pass_percentage", percentage(result.passed, total))
            .add_field(
                "rf_critical_pass_percentage",
                percentage(result.critical_passed, critical_total),
            )
            .add_field("rf_duration", result.duration_ms)
            .add_field("rf_suites", result.suites.len());
        self.points.push(point.build()?);
        Ok(())
    }

    fn suite(&mut self, parent: &str, suite: &'a RobotSuite) -> Result<(), GeneratorError> {
        let path = suite_path(parent, suite);
        let tally = Tally::of_suite(suite);

        let mut point = self.start(SUITE);
        point
            .add_field("suite_name", suite.name.as_str())
            .add_field("rf_passed", tally.passed)
            .add_field("rf_failed", tally.failed)
            .add_field("rf_skipped", tally.skipped)
            .add_field("rf_total", tally.total())
            .add_field("rf_critical_passed", tally.critical_passed)
            .add_field("rf_critical_failed", tally.critical_failed)
            .add_field("rf_testcases", distinct_cases(suite).count())
            .add_field("rf_duration", suite.duration_ms)
            .add_tag("suite_name", suite.name.as_str());
        self.points.push(point.build()?);

        for case in &suite.cases {
            self.case(&path, suite, case)?;
        }
        for child in &suite.suites {
            self.suite(&path, child)?;
        }
        Ok(())
    }

    fn case(
        &mut self,
        path: &str,
        suite: &'a RobotSuite,
        case: &'a RobotCase,
    ) -> Result<(), GeneratorError> {
        if !self.cases.check((path.to_string(), case.name.as_str())) {
            return Ok(());
        }
        let mut tally = Tally::default();
        tally.record(case);

        let mut point = self.start(CASE);
        point
            .add_field("rf_name", case.name.as_str())
            .add_field("rf_suite_name", suite.name.as_str())
            .add_field("rf_passed", tally.passed)
            .add_field("rf_failed", tally.failed)
            .add_field("rf_skipped", tally.skipped)
            .add_field("rf_critical_passed", tally.critical_passed)
            .add_field("rf_critical_failed", tally.critical_failed)
            .add_field("rf_duration", case.duration_ms)
            .add_field("rf_tags", case.tags.join(","))
            .add_tag("testcase_name", case.name.as_str())
            .add_tag("suite_name", suite.name.as_str());
        self.points.push(point.build()?);

        for tag in &case.tags {
            self.tag(tag)?;
        }
        Ok(())
    }

    fn tag(&mut self, tag: &'a str) -> Result<(), GeneratorError> {
        if !self.tags.check(tag) {
            return Ok(());
        }
        let tally = self.tag_tallies.get(tag).copied().unwrap_or_default();

        let mut point = self.start(TAG);
        point
            .add_field("rf_tag_name", tag)
            .add_field("rf_passed", tally.passed)
            .add_field("rf_failed", tally.failed)
            .add_field("rf_skipped", tally.skipped)
            .add_field("rf_total", tally.total())
            .add_field("rf_critical_passed", tally.critical_passed)
            .add_field("rf_critical_failed", tally.critical_failed)
            .add_field("rf_duration", tally.duration_ms)
            .add_tag("tag_name", tag);
        self.points.push(point.build()?);
        Ok(())
    }
}

/// Robot Framework run summary, suites, cases and tags
pub struct RobotFrameworkPointGenerator;

#[async_trait]
impl PointGenerator for RobotFrameworkPointGenerator {
    fn name(&self) -> &'static str {
        "robot_framework"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::RobotFramework)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.actions().robot.is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(result) = &build.actions().robot else {
            return Ok(Vec::new());
        };

        let mut walk = Walk {
            build,
            ctx,
            timestamps: TimestampSequence::new(ctx.clock.as_ref(), ctx.timestamp_ns),
            cases: Deduplicator::new(),
            tags: Deduplicator::new(),
            tag_tallies: tag_tallies(result),
            points: Vec::new(),
        };
        walk.results(result)?;
        for suite in &result.suites {
            walk.suite("", suite)?;
        }
        Ok(walk.points)
    }
}
