use serde::{Deserialize, Serialize};

/// Prefix of a stdout line that carries a [`TestReport`] instead of user output.
pub const TEST_RESULT_MARKER: &str = "__TESTRESULT__ ";

/// Appended after the user source and test method so that running the
/// program also reports a verdict through [`TEST_RESULT_MARKER`].
pub const TEST_RESULT_DECORATION: &str = r##"
String _resultJson(String value) {
  final out = StringBuffer('"');
  for (final unit in value.codeUnits) {
    if (unit == 0x22) {
      out.write(r'\"');
    } else if (unit == 0x5c) {
      out.write(r'\\');
    } else if (unit < 0x20) {
      out.write(r'\u' + unit.toRadixString(16).padLeft(4, '0'));
    } else {
      out.writeCharCode(unit);
    }
  }
  out.write('"');
  return out.toString();
}

void _result(bool success, [List<String> messages = const []]) {
  final joined = messages.map(_resultJson).join(',');
  print('__TESTRESULT__ {"success": $success, "messages": [$joined]}');
}
"##;

/// Entry point and import list forwarded with every artifact. Both are
/// reserved and currently empty.
pub const DEFAULT_ENTRY_POINT: &str = "";
pub const DEFAULT_IMPORTS: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub source: String,
}

impl CompileRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Body returned by the compile service. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Opaque compile output; only the execution environment looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompiledArtifact(pub String);

impl CompiledArtifact {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub entry_point: String,
    pub imports: String,
    pub artifact: CompiledArtifact,
}

impl ExecutionRequest {
    pub fn for_artifact(artifact: CompiledArtifact) -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            imports: DEFAULT_IMPORTS.to_string(),
            artifact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Stdout(String),
    Stderr(String),
    TestResult { success: bool, message: String },
}

impl ExecutionEvent {
    pub fn is_test_result(&self) -> bool {
        matches!(self, ExecutionEvent::TestResult { .. })
    }
}

/// Verdict printed by [`TEST_RESULT_DECORATION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl TestReport {
    pub fn into_event(self) -> ExecutionEvent {
        let message = if !self.messages.is_empty() {
            self.messages.join("\n")
        } else if self.success {
            "All tests passed.".to_string()
        } else {
            "Tests failed.".to_string()
        };
        ExecutionEvent::TestResult {
            success: self.success,
            message,
        }
    }
}

/// Returns `None` for ordinary output lines and the parse outcome for marker lines.
pub fn parse_test_report(line: &str) -> Option<Result<TestReport, serde_json::Error>> {
    let payload = line.strip_prefix(TEST_RESULT_MARKER)?;
    Some(serde_json::from_str(payload.trim()))
}

/// User source, then test method, then the reporting decoration.
pub fn build_full_source(source: &str, test_method: &str) -> String {
    format!("{source}\n{test_method}\n{TEST_RESULT_DECORATION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_source_keeps_fixed_order() {
        let full = build_full_source("void main() {}", "void test() {}");
        let source_at = full.find("void main()").expect("source");
        let test_at = full.find("void test()").expect("test");
        let decoration_at = full.find("void _result(").expect("decoration");
        assert!(source_at < test_at && test_at < decoration_at);
    }

    #[test]
    fn marker_lines_parse_into_reports() {
        let report = parse_test_report(r#"__TESTRESULT__ {"success": true, "messages": ["ok"]}"#)
            .expect("marker line")
            .expect("valid json");
        assert_eq!(
            report.into_event(),
            ExecutionEvent::TestResult {
                success: true,
                message: "ok".to_string()
            }
        );
    }

    #[test]
    fn decoration_escapes_messages() {
        assert!(TEST_RESULT_DECORATION.contains("messages.map(_resultJson)"));
        assert!(!TEST_RESULT_DECORATION.contains(r#"'"$m"'"#));
        for escape in [r#"r'\"'"#, r"r'\\'", r"r'\u'"] {
            assert!(TEST_RESULT_DECORATION.contains(escape), "missing {escape}");
        }
    }

    #[test]
    fn escaped_messages_survive_parsing() {
        let line = r#"__TESTRESULT__ {"success": true, "messages": ["expected \"3\"", "C:\\tmp", "two\u000alines"]}"#;
        let report = parse_test_report(line)
            .expect("marker line")
            .expect("valid json");
        assert_eq!(
            report.messages,
            vec![
                "expected \"3\"".to_string(),
                "C:\\tmp".to_string(),
                "two\nlines".to_string(),
            ]
        );
        assert!(report.success);
    }

    #[test]
    fn ordinary_lines_are_not_reports() {
        assert!(parse_test_report("hello world").is_none());
    }

    #[test]
    fn malformed_marker_payload_is_an_error() {
        let parsed = parse_test_report("__TESTRESULT__ {not json").expect("marker line");
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_failure_report_gets_default_message() {
        let event = TestReport {
            success: false,
            messages: Vec::new(),
        }
        .into_event();
        assert_eq!(
            event,
            ExecutionEvent::TestResult {
                success: false,
                message: "Tests failed.".to_string()
            }
        );
    }

    #[test]
    fn execution_events_use_tagged_wire_shape() {
        let json = serde_json::to_value(ExecutionEvent::Stdout("hi".into())).expect("json");
        assert_eq!(json["type"], "stdout");
        assert_eq!(json["payload"], "hi");
    }
}
