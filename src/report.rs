//! Output formatting for guardian results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the analysis results as the host would deliver them
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use crate::analyzer::AnalysisResult;
use crate::rules::{RuleRegistry, Severity, Violation};

/// Counts across a set of analysis results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub parse_failures: usize,
}

impl Summary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let mut summary = Summary {
            files: results.len(),
            ..Default::default()
        };
        for result in results {
            if result.is_failure() {
                summary.parse_failures += 1;
            }
            for v in &result.violations {
                match v.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.infos += 1,
                }
            }
        }
        summary
    }

    /// No error-severity violations and every file parsed.
    pub fn passed(&self) -> bool {
        self.errors == 0 && self.parse_failures == 0
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub passed: bool,
    pub summary: Summary,
    pub results: Vec<AnalysisResult>,
}

/// Write results in JSON format.
pub fn write_json<W: Write>(out: &mut W, path: &str, results: &[AnalysisResult]) -> anyhow::Result<()> {
    let summary = Summary::from_results(results);
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        passed: summary.passed(),
        summary,
        results: results.to_vec(),
    };

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "guardian";

#[derive(Serialize, Deserialize)]
struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    invocations: Vec<SarifInvocation>,
    results: Vec<SarifResult>,
}

/// Files that could not be analyzed are reported here, not as results.
#[derive(Serialize, Deserialize)]
struct SarifInvocation {
    #[serde(rename = "executionSuccessful")]
    execution_successful: bool,
    #[serde(rename = "toolExecutionNotifications")]
    tool_execution_notifications: Vec<SarifNotification>,
}

#[derive(Serialize, Deserialize)]
struct SarifNotification {
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize, Deserialize)]
struct SarifDriver {
    name: String,
    version: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize, Deserialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
}

#[derive(Serialize, Deserialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
    #[serde(rename = "partialFingerprints")]
    partial_fingerprints: SarifFingerprints,
}

#[derive(Serialize, Deserialize)]
struct SarifFingerprints {
    #[serde(rename = "guardianViolationId")]
    violation_id: String,
}

#[derive(Serialize, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<SarifRegion>,
}

#[derive(Serialize, Deserialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
    #[serde(rename = "startColumn")]
    start_column: usize,
    #[serde(rename = "endLine")]
    end_line: usize,
    #[serde(rename = "endColumn")]
    end_column: usize,
}

fn map_severity_to_level(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// "sovereign-imports-only" -> "SovereignImportsOnly"
fn rule_display_name(rule_id: &str) -> String {
    rule_id
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn make_relative_path(file_path: &str, base_path: &Path) -> String {
    if base_path.to_string_lossy().is_empty() {
        return file_path.to_string();
    }

    let file = Path::new(file_path);

    // If they're the same (single file scan), return just the filename
    if file == base_path {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
    }

    file.strip_prefix(base_path)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file_path.to_string())
}

fn sarif_result(v: &Violation, uri: String) -> SarifResult {
    SarifResult {
        rule_id: v.rule_id.clone(),
        level: map_severity_to_level(&v.severity).to_string(),
        message: SarifMessage {
            text: v.message.clone(),
        },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifact { uri },
                // SARIF columns are 1-based.
                region: Some(SarifRegion {
                    start_line: v.location.start.line.max(1),
                    start_column: v.location.start.column + 1,
                    end_line: v.location.end.line.max(1),
                    end_column: v.location.end.column + 1,
                }),
            },
        }],
        partial_fingerprints: SarifFingerprints {
            violation_id: v.id.clone(),
        },
    }
}

/// Write results in SARIF format.
pub fn write_sarif<W: Write>(
    out: &mut W,
    base_path: &Path,
    results: &[AnalysisResult],
    registry: &RuleRegistry,
) -> anyhow::Result<()> {
    // Rules that actually fired, in a stable order
    let rule_ids: BTreeSet<&str> = results
        .iter()
        .flat_map(|r| r.violations.iter().map(|v| v.rule_id.as_str()))
        .collect();

    let rules: Vec<SarifRule> = rule_ids
        .into_iter()
        .map(|rule_id| {
            let (summary, level) = match registry.get(rule_id) {
                Some(rule) => (rule.summary, map_severity_to_level(&rule.severity)),
                None => ("Unregistered rule", "warning"),
            };
            SarifRule {
                id: rule_id.to_string(),
                name: rule_display_name(rule_id),
                short_description: SarifMessage {
                    text: summary.to_string(),
                },
                default_config: SarifRuleConfig {
                    level: level.to_string(),
                },
            }
        })
        .collect();

    let findings: Vec<SarifResult> = results
        .iter()
        .flat_map(|r| {
            let uri = make_relative_path(&r.file_path, base_path);
            r.violations
                .iter()
                .map(move |v| sarif_result(v, uri.clone()))
        })
        .collect();

    let notifications: Vec<SarifNotification> = results
        .iter()
        .filter_map(|r| {
            let message = r.error_message.as_ref()?;
            Some(SarifNotification {
                level: "error".to_string(),
                message: SarifMessage {
                    text: message.clone(),
                },
                locations: vec![SarifLocation {
                    physical_location: SarifPhysicalLocation {
                        artifact_location: SarifArtifact {
                            uri: make_relative_path(&r.file_path, base_path),
                        },
                        region: None,
                    },
                }],
            })
        })
        .collect();

    let report = SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    rules,
                },
            },
            invocations: vec![SarifInvocation {
                execution_successful: notifications.is_empty(),
                tool_execution_notifications: notifications,
            }],
            results: findings,
        }],
    };

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty<W: Write>(out: &mut W, path: &str, results: &[AnalysisResult]) -> std::io::Result<()> {
    let summary = Summary::from_results(results);

    // Header
    writeln!(out)?;
    writeln!(out, "  {} v{}", "guardian".cyan().bold(), env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Checking: ".dimmed(), path)?;
    writeln!(out, "  {}{}", "Files:    ".dimmed(), summary.files)?;
    writeln!(out)?;

    for result in results {
        if let Some(message) = &result.error_message {
            writeln!(out, "    {} {}", "FAIL ".red().bold(), result.file_path.blue())?;
            writeln!(out, "            {}", message)?;
            writeln!(out)?;
        }
    }

    if summary.total() > 0 {
        writeln!(out, "  {} ({}):", "Violations".bold(), summary.total())?;
        writeln!(out)?;
        for result in results {
            write_violations(out, &result.file_path, &result.violations)?;
        }
    }

    write_final_status(out, &summary)?;
    writeln!(out)?;
    Ok(())
}

fn write_violations<W: Write>(out: &mut W, file: &str, violations: &[Violation]) -> std::io::Result<()> {
    for v in violations {
        write_severity_tag(out, &v.severity)?;
        write!(out, "   {:<24}", v.rule_id.as_str().dimmed())?;
        write!(out, "{}", file.blue())?;
        writeln!(out, "{}", format!(":{}", v.location.start).dimmed())?;

        // Message on next line, indented
        writeln!(out, "            {}", v.message)?;
        if let Some(fix) = &v.fix {
            writeln!(out, "            {}", format!("fix: {}", fix.description).dimmed())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_severity_tag<W: Write>(out: &mut W, severity: &Severity) -> std::io::Result<()> {
    match severity {
        Severity::Error => write!(out, "    {} ", "ERROR".red()),
        Severity::Warning => write!(out, "    {} ", "WARN ".yellow()),
        Severity::Info => write!(out, "    {} ", "INFO ".blue()),
    }
}

fn write_final_status<W: Write>(out: &mut W, summary: &Summary) -> std::io::Result<()> {
    write!(
        out,
        "  {}",
        format!(
            "{} errors, {} warnings, {} info",
            summary.errors, summary.warnings, summary.infos
        )
        .dimmed()
    )?;
    if summary.parse_failures > 0 {
        write!(
            out,
            "  {}",
            format!("{} unparsable", summary.parse_failures).red()
        )?;
    }
    write!(out, "  ")?;

    if summary.passed() {
        writeln!(out, "{}", "PASSED".green())
    } else {
        writeln!(out, "{}", "FAILED".red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;
    use crate::rules::Location;

    fn violation(rule_id: &str, severity: Severity, line: usize) -> Violation {
        Violation {
            id: format!("violation_{:016x}", line),
            rule_id: rule_id.to_string(),
            severity,
            message: format!("{} fired", rule_id),
            location: Location {
                start: Position::new(line, 4),
                end: Position::new(line, 9),
            },
            fix: None,
        }
    }

    fn results() -> Vec<AnalysisResult> {
        vec![
            AnalysisResult {
                file_path: "src/app.ts".to_string(),
                violations: vec![
                    violation("any-type", Severity::Error, 1),
                    violation("console-log", Severity::Info, 3),
                ],
                error_message: None,
                completed_at: 1,
            },
            AnalysisResult {
                file_path: "src/broken.ts".to_string(),
                violations: Vec::new(),
                error_message: Some("AST parse failed: syntax error".to_string()),
                completed_at: 1,
            },
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_results(&results());
        assert_eq!(summary.files, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.infos, 1);
        assert_eq!(summary.parse_failures, 1);
        assert!(!summary.passed());

        let clean = Summary::from_results(&[AnalysisResult {
            file_path: "a.ts".to_string(),
            violations: vec![violation("clone-deep", Severity::Warning, 1)],
            error_message: None,
            completed_at: 1,
        }]);
        assert!(clean.passed());
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_json(&mut out, "src", &results()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["summary"]["parseFailures"], 1);
        assert_eq!(json["results"][0]["violations"][0]["ruleId"], "any-type");
    }

    #[test]
    fn test_sarif_report() {
        let mut out = Vec::new();
        let registry = RuleRegistry::builtin();
        write_sarif(&mut out, Path::new("src"), &results(), &registry).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let run = &json["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "guardian");
        assert_eq!(run["tool"]["driver"]["rules"][0]["id"], "any-type");
        assert_eq!(run["tool"]["driver"]["rules"][0]["name"], "AnyType");

        let first = &run["results"][0];
        assert_eq!(first["level"], "error");
        assert_eq!(
            first["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "app.ts"
        );
        assert_eq!(first["locations"][0]["physicalLocation"]["region"]["startColumn"], 5);
        assert_eq!(run["results"][1]["level"], "note");
        assert_eq!(run["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sarif_reports_unparsed_files() {
        let mut out = Vec::new();
        write_sarif(&mut out, Path::new("src"), &results(), &RuleRegistry::builtin()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let invocation = &json["runs"][0]["invocations"][0];
        assert_eq!(invocation["executionSuccessful"], false);
        let notes = invocation["toolExecutionNotifications"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["level"], "error");
        assert_eq!(notes[0]["message"]["text"], "AST parse failed: syntax error");
        let location = &notes[0]["locations"][0]["physicalLocation"];
        assert_eq!(location["artifactLocation"]["uri"], "broken.ts");
        assert!(location.get("region").is_none());

        // All files parsed: the invocation succeeds with nothing to report.
        let mut out = Vec::new();
        write_sarif(&mut out, Path::new("src"), &results()[..1], &RuleRegistry::builtin()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let invocation = &json["runs"][0]["invocations"][0];
        assert_eq!(invocation["executionSuccessful"], true);
        assert!(invocation["toolExecutionNotifications"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_pretty_report() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write_pretty(&mut out, "src", &results()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ERROR"));
        assert!(text.contains("src/app.ts:1:4"));
        assert!(text.contains("FAIL  src/broken.ts"));
        assert!(text.contains("FAILED"));
    }

    #[test]
    fn test_rule_display_name() {
        assert_eq!(rule_display_name("sovereign-imports-only"), "SovereignImportsOnly");
        assert_eq!(rule_display_name("any-type"), "AnyType");
    }
}
