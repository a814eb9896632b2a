//! Wire-format rendering for the collector protocol.
//!
//! One frame is one LF-terminated ASCII line. The collector uses spaces as field delimiters and
//! `.` as a hierarchical namespace separator, so caller-supplied names and values must be
//! transliterated into protocol-safe text before they reach the wire. Everything in this module
//! is pure and total; byte-identical output is a wire-compatibility requirement.

/// The kind of a metric sample.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricKind {
    /// A point-in-time measurement, averaged with other samples in the same interval.
    Gauge,

    /// A point-in-time measurement that replaces other samples in the same interval.
    GaugeAbsolute,

    /// A count to be added to other samples in the same interval.
    Increment,
}

impl MetricKind {
    /// Returns the protocol keyword for this kind.
    pub fn protocol_key(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::GaugeAbsolute => "gauge_absolute",
            MetricKind::Increment => "increment",
        }
    }
}

/// Transliterates a metric or notice name into protocol-safe text.
///
/// Three passes, in order: each `", "` becomes `"-"`, each run of parenthesis characters becomes
/// `"__"`, and every remaining character outside `[A-Za-z0-9_\-.]` becomes `"."`. The ordering
/// is load bearing: the generic filter would otherwise eat the replacement characters produced
/// by the first two passes. The net effect is that human-readable identifiers like function
/// signatures (`"foo(a, b)"`) become safe, still-informative names rather than being rejected.
pub(crate) fn sanitize_name(name: &str) -> String {
    let collapsed = name.replace(", ", "-");

    let mut out = String::with_capacity(collapsed.len());
    let mut in_parens = false;
    for c in collapsed.chars() {
        if c == '(' || c == ')' {
            if !in_parens {
                out.push_str("__");
                in_parens = true;
            }
        } else {
            in_parens = false;
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                out.push(c);
            } else {
                out.push('.');
            }
        }
    }
    out
}

/// Collapses each run of whitespace in a metric value into a single `"."`.
///
/// Values are normally numeric text already; this is defensive.
pub(crate) fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('.');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            out.push(c);
        }
    }
    out
}

/// Renders one metric frame: `<keyword> <name> <value> <epoch seconds>`, LF-terminated.
pub(crate) fn render_metric(kind: MetricKind, name: &str, value: &str, timestamp: u64) -> String {
    let mut ts = itoa::Buffer::new();
    let name = sanitize_name(name);
    let value = sanitize_value(value);

    let mut line = String::with_capacity(name.len() + value.len() + 32);
    line.push_str(kind.protocol_key());
    line.push(' ');
    line.push_str(&name);
    line.push(' ');
    line.push_str(&value);
    line.push(' ');
    line.push_str(ts.format(timestamp));
    line.push('\n');
    line
}

/// Renders one notice frame: `notice <start seconds> <duration seconds> <name>`, LF-terminated.
pub(crate) fn render_notice(start: u64, duration: u64, name: &str) -> String {
    let mut secs = itoa::Buffer::new();
    let name = sanitize_name(name);

    let mut line = String::with_capacity(name.len() + 32);
    line.push_str("notice ");
    line.push_str(secs.format(start));
    line.push(' ');
    line.push_str(secs.format(duration));
    line.push(' ');
    line.push_str(&name);
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn name_sanitization() {
        // Cases are defined as: input, expected output.
        let cases = [
            ("foo", "foo"),
            ("foo.bar_baz-quux", "foo.bar_baz-quux"),
            ("foo, bar", "foo-bar"),
            ("f()", "f__"),
            ("f(a, b)", "f__a-b__"),
            ("foo((bar))", "foo__bar__"),
            ("a, (b)", "a-__b__"),
            ("foo bar", "foo.bar"),
            ("foo@bar!baz", "foo.bar.baz"),
            ("a(, )b", "a__-__b"),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize_name(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn value_sanitization() {
        let cases = [
            ("1", "1"),
            ("1  2", "1.2"),
            ("1 \t2", "1.2"),
            (" 1 ", ".1."),
            ("3.14", "3.14"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize_value(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn metric_frame() {
        let line = render_metric(MetricKind::Increment, "a.b-c", "1", 1000);
        assert_eq!(line, "increment a.b-c 1 1000\n");

        let line = render_metric(MetricKind::Gauge, "cpu(total, user)", "0.5", 42);
        assert_eq!(line, "gauge cpu__total-user__ 0.5 42\n");

        let line = render_metric(MetricKind::GaugeAbsolute, "queue depth", "7", 0);
        assert_eq!(line, "gauge_absolute queue.depth 7 0\n");
    }

    #[test]
    fn notice_frame() {
        assert_eq!(render_notice(100, 20, "deploy.finished"), "notice 100 20 deploy.finished\n");
        assert_eq!(render_notice(0, 0, "big deploy"), "notice 0 0 big.deploy\n");
    }

    #[test]
    fn protocol_keys() {
        assert_eq!(MetricKind::Gauge.protocol_key(), "gauge");
        assert_eq!(MetricKind::GaugeAbsolute.protocol_key(), "gauge_absolute");
        assert_eq!(MetricKind::Increment.protocol_key(), "increment");
    }

    proptest! {
        #[test]
        fn sanitized_names_are_protocol_safe(input in ".{0,64}") {
            let sanitized = sanitize_name(&input);
            prop_assert!(sanitized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'));
            prop_assert!(!sanitized.contains(", "));
            prop_assert!(!sanitized.contains('('));
            prop_assert!(!sanitized.contains(')'));
        }

        #[test]
        fn sanitized_values_have_no_whitespace(input in ".{0,64}") {
            let sanitized = sanitize_value(&input);
            prop_assert!(!sanitized.chars().any(char::is_whitespace));
        }

        #[test]
        fn rendered_metric_is_one_line(name in ".{0,32}", value in ".{0,16}", ts in any::<u64>()) {
            let line = render_metric(MetricKind::Gauge, &name, &value, ts);
            prop_assert!(line.ends_with('\n'));
            prop_assert_eq!(line.matches('\n').count(), 1);
            prop_assert_eq!(line.trim_end_matches('\n').split(' ').count(), 4);
        }
    }
}
