//! Both dialects read back to the same point, whatever the tag values hold

#![allow(clippy::unwrap_used)]

mod support;

use buildflux::point::{FieldValue, Point, Precision};
use buildflux::{LineProtocol, line_protocol};
use support::parse_line;

fn workspace_point(workspace: &str) -> Point {
    let mut b = Point::builder("jenkins_data");
    b.add_tag("project_name", "my job")
        .add_tag("workspace", workspace)
        .add_field("project_name", "my \"job\"")
        .add_field("build_number", 7i64)
        .add_field("build_successful", true)
        .add_field("build_time", 12.5)
        .add_field("workspace_path", workspace)
        .set_timestamp(1_700_000_000, Precision::Seconds);
    b.build().unwrap()
}

#[test]
fn test_dialects_carry_the_same_content() {
    let point = workspace_point("/var/lib/ci/ws,1=2");
    let legacy = parse_line(&point.to_line_protocol(LineProtocol::Legacy).unwrap()).unwrap();
    let current = parse_line(&point.to_line_protocol(LineProtocol::Current).unwrap()).unwrap();

    assert_eq!(legacy.measurement, current.measurement);
    assert_eq!(legacy.tags, current.tags);
    assert_eq!(legacy.fields, current.fields);
    assert_eq!(legacy.timestamp, Some(1_700_000_000));
    assert_eq!(current.timestamp, Some(1_700_000_000_000_000_000));
    assert_eq!(
        legacy.tags.get("workspace").map(String::as_str),
        Some("/var/lib/ci/ws,1=2")
    );
    assert_eq!(
        legacy.fields.get("project_name"),
        Some(&FieldValue::String("my \"job\"".into()))
    );
}

#[test]
fn test_trailing_backslash_tag_stays_one_parseable_line() {
    let point = workspace_point("C:\\ws\\");
    for dialect in [LineProtocol::Legacy, LineProtocol::Current] {
        let line = point.to_line_protocol(dialect).unwrap();
        let parsed = parse_line(&line).unwrap();
        assert_eq!(parsed.tags.get("workspace").map(String::as_str), Some("C:\\ws"));
        assert_eq!(
            parsed.tags.get("project_name").map(String::as_str),
            Some("my job")
        );
        // string fields keep the original value
        assert_eq!(
            parsed.fields.get("workspace_path"),
            Some(&FieldValue::String("C:\\ws\\".into()))
        );
    }
}

#[test]
fn test_newline_in_tag_does_not_split_the_batch() {
    let mut b = Point::builder("agent_data");
    b.add_tag("agent_label", "linux\r\narm64")
        .add_field("agent_name", "builder-1")
        .set_timestamp(1_700_000_000, Precision::Seconds);
    let points = vec![b.build().unwrap(), workspace_point("plain")];
    let body = line_protocol::render_batch(&points, LineProtocol::Legacy).unwrap();

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    let parsed = parse_line(lines[0]).unwrap();
    assert_eq!(
        parsed.tags.get("agent_label").map(String::as_str),
        Some("linux  arm64")
    );
    assert_eq!(parse_line(lines[1]).unwrap().measurement, "jenkins_data");
}
