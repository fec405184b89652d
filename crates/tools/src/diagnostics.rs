//! Diagnostic heuristics: dependency, security, review, and performance scans.
//!
//! Every scan is a pure function of the snapshot (optionally narrowed to one
//! file). Findings go to the model as text and to the caller as metadata.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use codeweave_core::error::ToolError;
use codeweave_core::file::{FileSnapshot, ProjectFile};
use codeweave_core::tool::ToolExecutionResult;
use regex::Regex;
use serde::Serialize;
use serde_json::json;

use crate::request::AnalysisArgs;

/// Largest file, in lines, before review flags it.
const LARGE_FILE_LINES: usize = 500;
const LONG_LINE_CHARS: usize = 140;
const MAX_FINDINGS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub severity: &'static str,
    pub message: String,
}

struct Rule {
    pattern: Regex,
    severity: &'static str,
    message: &'static str,
}

fn rule(pattern: &str, severity: &'static str, message: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("static diagnostic pattern"),
        severity,
        message,
    }
}

static SECURITY_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            r#"(?i)(api[_-]?key|secret|password|passwd|token)\s*[:=]\s*["'][^"']{8,}["']"#,
            "high",
            "possible hardcoded credential",
        ),
        rule(r"-----BEGIN [A-Z ]*PRIVATE KEY-----", "critical", "embedded private key"),
        rule(r"\beval\s*\(", "high", "eval() executes arbitrary code"),
        rule(r"\bnew Function\s*\(", "high", "Function constructor executes arbitrary code"),
        rule(r"\.innerHTML\s*=|dangerouslySetInnerHTML", "medium", "raw HTML injection point (XSS risk)"),
        rule(
            r#"(?i)["'`]\s*(select|insert|update|delete)\b[^"'`]*["'`]\s*\+"#,
            "high",
            "SQL built by string concatenation",
        ),
        rule(r"(?i)\b(exec|execSync|spawn|system|popen)\s*\([^)]*\+", "high", "shell command built from concatenated input"),
        rule(r#"["']http://[^"'\s]"#, "low", "plain HTTP URL"),
        rule(r"(?i)verify\s*=\s*false|rejectUnauthorized\s*:\s*false", "high", "TLS verification disabled"),
    ]
});

static REVIEW_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"\b(TODO|FIXME|HACK|XXX)\b", "low", "unresolved marker comment"),
        rule(r"\bconsole\.(log|debug)\s*\(|\bdbg!\s*\(|^\s*print\s*\(", "low", "leftover debug output"),
        rule(r"\.unwrap\(\)", "medium", "unwrap() panics on failure; propagate the error instead"),
        rule(r":\s*any\b|<any>|as any\b", "low", "`any` defeats type checking"),
        rule(r"catch\s*(\([^)]*\))?\s*\{\s*\}", "medium", "empty catch block swallows errors"),
        rule(r"(?i)except\s*:\s*pass", "medium", "bare except swallows errors"),
    ]
});

static PERF_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"\b(readFileSync|writeFileSync|execSync)\b", "medium", "blocking I/O call"),
        rule(r"\.forEach\s*\(\s*async\b", "medium", "async callback in forEach is not awaited"),
        rule(r"\bJSON\.parse\s*\(\s*JSON\.stringify\b", "low", "deep clone via JSON round-trip"),
    ]
});

/// Work that should be hoisted out of a loop body.
static IN_LOOP_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"\bnew RegExp\s*\(|Regex::new\s*\(|re\.compile\s*\(", "medium", "regex compiled inside a loop"),
        rule(r"\bawait\b", "low", "sequential await inside a loop"),
        rule(r"\.clone\(\)", "low", "clone inside a loop"),
        rule(r"\+=\s*['\x22`]|\.push_str\(&format!", "low", "string built incrementally inside a loop"),
    ]
});

static LOOP_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(for|while|loop)\b|\.(forEach|map|filter|reduce)\s*\(").expect("static loop pattern")
});

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:import\s+(?:[^'"]*\s+from\s+)?['"]([^'"]+)['"]|(?:const|let|var)\s+[^=]+=\s*require\(\s*['"]([^'"]+)['"]\s*\)|use\s+([A-Za-z_][\w:]*)|from\s+([\w.]+)\s+import|import\s+([\w.]+))"#,
    )
    .expect("static import pattern")
});

fn targets<'a>(snapshot: &'a FileSnapshot, args: &AnalysisArgs) -> Result<Vec<&'a ProjectFile>, ToolError> {
    match args.path.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(path) => snapshot
            .get(path)
            .map(|f| vec![f])
            .ok_or_else(|| ToolError::FileNotFound { file_name: path.to_string() }),
        None => Ok(snapshot.files().iter().collect()),
    }
}

fn scan(files: &[&ProjectFile], rules: &[Rule], findings: &mut Vec<Finding>) {
    for file in files {
        for (i, line) in file.content.lines().enumerate() {
            for r in rules {
                if r.pattern.is_match(line) {
                    findings.push(Finding {
                        file: file.name.clone(),
                        line: i + 1,
                        severity: r.severity,
                        message: r.message.to_string(),
                    });
                }
            }
        }
    }
}

fn report(title: &str, findings: Vec<Finding>, scanned: usize) -> ToolExecutionResult {
    let total = findings.len();
    if total == 0 {
        return ToolExecutionResult::text(format!("{title}: no issues found in {scanned} file(s)."))
            .with_metadata(json!({ "findings": [], "files_scanned": scanned }));
    }

    let mut output = format!("{title}: {total} finding(s) in {scanned} file(s)\n");
    for f in findings.iter().take(MAX_FINDINGS) {
        output.push_str(&format!("{}:{} [{}] {}\n", f.file, f.line, f.severity, f.message));
    }
    if total > MAX_FINDINGS {
        output.push_str(&format!("... {} more not shown\n", total - MAX_FINDINGS));
    }
    ToolExecutionResult::text(output.trim_end())
        .with_metadata(json!({ "findings": findings, "files_scanned": scanned }))
}

pub fn scan_security(snapshot: &FileSnapshot, args: &AnalysisArgs) -> Result<ToolExecutionResult, ToolError> {
    let files = targets(snapshot, args)?;
    let mut findings = Vec::new();
    scan(&files, &SECURITY_RULES, &mut findings);
    Ok(report("Security scan", findings, files.len()))
}

pub fn review_code(snapshot: &FileSnapshot, args: &AnalysisArgs) -> Result<ToolExecutionResult, ToolError> {
    let files = targets(snapshot, args)?;
    let mut findings = Vec::new();
    scan(&files, &REVIEW_RULES, &mut findings);

    for file in &files {
        let count = file.line_count();
        if count > LARGE_FILE_LINES {
            findings.push(Finding {
                file: file.name.clone(),
                line: 1,
                severity: "medium",
                message: format!("{count} lines; consider splitting the file"),
            });
        }
        for (i, line) in file.content.lines().enumerate() {
            if line.chars().count() > LONG_LINE_CHARS {
                findings.push(Finding {
                    file: file.name.clone(),
                    line: i + 1,
                    severity: "low",
                    message: format!("line longer than {LONG_LINE_CHARS} characters"),
                });
            }
        }
    }
    findings.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    Ok(report("Code review", findings, files.len()))
}

pub fn analyze_performance(snapshot: &FileSnapshot, args: &AnalysisArgs) -> Result<ToolExecutionResult, ToolError> {
    let files = targets(snapshot, args)?;
    let mut findings = Vec::new();
    scan(&files, &PERF_RULES, &mut findings);

    for file in &files {
        // Indentation-based loop nesting; good enough for brace and offside languages alike.
        let mut open_loops: Vec<usize> = Vec::new();
        for (i, line) in file.content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let indent = line.len() - line.trim_start().len();
            while open_loops.last().is_some_and(|&l| indent <= l) {
                open_loops.pop();
            }
            let in_loop = !open_loops.is_empty();
            if LOOP_START.is_match(line) {
                if in_loop {
                    findings.push(Finding {
                        file: file.name.clone(),
                        line: i + 1,
                        severity: "medium",
                        message: "nested loop (quadratic or worse)".into(),
                    });
                }
                open_loops.push(indent);
            } else if in_loop {
                for r in IN_LOOP_RULES.iter() {
                    if r.pattern.is_match(line) {
                        findings.push(Finding {
                            file: file.name.clone(),
                            line: i + 1,
                            severity: r.severity,
                            message: r.message.to_string(),
                        });
                    }
                }
            }
        }
    }
    findings.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    Ok(report("Performance analysis", findings, files.len()))
}

pub fn analyze_dependencies(snapshot: &FileSnapshot, args: &AnalysisArgs) -> Result<ToolExecutionResult, ToolError> {
    let files = targets(snapshot, args)?;
    let mut per_file = serde_json::Map::new();
    let mut external: BTreeSet<String> = BTreeSet::new();
    let mut output = String::new();

    for file in &files {
        let mut deps: Vec<String> = Vec::new();
        for cap in IMPORT.captures_iter(&file.content) {
            if let Some(m) = cap.iter().skip(1).flatten().next() {
                let dep = m.as_str().trim_end_matches(';').to_string();
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        for dep in &deps {
            if !is_internal(dep) {
                external.insert(package_root(dep));
            }
        }
        if !deps.is_empty() {
            output.push_str(&format!("{}: {}\n", file.name, deps.join(", ")));
            per_file.insert(file.name.clone(), json!(deps));
        }
    }

    let declared = declared_packages(snapshot);
    let unused: Vec<&String> = declared.iter().filter(|d| !external.contains(*d)).collect();

    if output.is_empty() {
        output.push_str("No imports found.\n");
    }
    if !external.is_empty() {
        output.push_str(&format!(
            "External packages: {}\n",
            external.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !declared.is_empty() && !unused.is_empty() {
        output.push_str(&format!(
            "Declared but never imported: {}\n",
            unused.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }

    Ok(ToolExecutionResult::text(output.trim_end()).with_metadata(json!({
        "imports": per_file,
        "external": external,
        "declared": declared,
        "unused_declared": unused,
    })))
}

fn is_internal(dep: &str) -> bool {
    dep.starts_with('.')
        || dep.starts_with('/')
        || dep.starts_with("crate::")
        || dep.starts_with("self::")
        || dep.starts_with("super::")
        || dep.starts_with("@/")
}

/// `lodash/fp` → `lodash`, `@scope/pkg/x` → `@scope/pkg`, `serde::Deserialize` → `serde`.
fn package_root(dep: &str) -> String {
    if let Some((root, _)) = dep.split_once("::") {
        return root.to_string();
    }
    let parts: Vec<&str> = dep.split('/').collect();
    if dep.starts_with('@') && parts.len() >= 2 {
        format!("{}/{}", parts[0], parts[1])
    } else {
        parts[0].split('.').next().unwrap_or(parts[0]).to_string()
    }
}

/// Package names declared in `package.json` or `Cargo.toml`, when present.
fn declared_packages(snapshot: &FileSnapshot) -> BTreeSet<String> {
    let mut declared = BTreeSet::new();
    for file in snapshot.files() {
        let base = file.name.rsplit('/').next().unwrap_or(&file.name);
        if base == "package.json"
            && let Ok(v) = serde_json::from_str::<serde_json::Value>(&file.content)
        {
            for section in ["dependencies", "devDependencies"] {
                if let Some(map) = v.get(section).and_then(|d| d.as_object()) {
                    declared.extend(map.keys().cloned());
                }
            }
        } else if base == "Cargo.toml" {
            let mut in_deps = false;
            for line in file.content.lines() {
                let t = line.trim();
                if t.starts_with('[') {
                    in_deps = t.ends_with("dependencies]");
                } else if in_deps && let Some((name, _)) = t.split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() && !name.starts_with('#') {
                        declared.insert(name.replace('-', "_"));
                    }
                }
            }
        }
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> AnalysisArgs {
        AnalysisArgs::default()
    }

    #[test]
    fn security_flags_secrets_and_eval() {
        let snap = FileSnapshot::new(vec![ProjectFile::new(
            "src/config.js",
            "const API_KEY = \"sk-live-0123456789\";\nrun(eval(input));\nconst ok = 1;\n",
        )]);
        let result = scan_security(&snap, &all()).unwrap();
        assert!(result.output.contains("src/config.js:1 [high] possible hardcoded credential"));
        assert!(result.output.contains("src/config.js:2 [high] eval()"));
        assert_eq!(result.metadata.unwrap()["findings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn clean_file_reports_no_issues() {
        let snap = FileSnapshot::new(vec![ProjectFile::new("a.ts", "export const x = 1;\n")]);
        let out = scan_security(&snap, &all()).unwrap().output;
        assert_eq!(out, "Security scan: no issues found in 1 file(s).");
    }

    #[test]
    fn review_flags_debug_output_and_todo() {
        let snap = FileSnapshot::new(vec![ProjectFile::new(
            "app.ts",
            "// TODO: remove\nconsole.log(user);\ntry { go() } catch (e) {}\n",
        )]);
        let out = review_code(&snap, &all()).unwrap().output;
        assert!(out.contains("app.ts:1 [low] unresolved marker comment"));
        assert!(out.contains("app.ts:2 [low] leftover debug output"));
        assert!(out.contains("app.ts:3 [medium] empty catch block"));
    }

    #[test]
    fn performance_flags_nested_loops() {
        let snap = FileSnapshot::new(vec![ProjectFile::new(
            "sort.py",
            "for a in xs:\n    for b in ys:\n        total += a * b\nprint(total)\n",
        )]);
        let out = analyze_performance(&snap, &all()).unwrap().output;
        assert!(out.contains("sort.py:2 [medium] nested loop"));
    }

    #[test]
    fn performance_flags_regex_in_loop() {
        let snap = FileSnapshot::new(vec![ProjectFile::new(
            "scan.rs",
            "fn f(xs: &[&str]) {\n    for x in xs {\n        let re = Regex::new(x);\n    }\n}\nlet re = Regex::new(\"a\");\n",
        )]);
        let result = analyze_performance(&snap, &all()).unwrap();
        let findings = result.metadata.unwrap()["findings"].as_array().unwrap().clone();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["line"], 3);
    }

    #[test]
    fn dependencies_split_internal_and_external() {
        let snap = FileSnapshot::new(vec![
            ProjectFile::new(
                "src/app.ts",
                "import React from 'react';\nimport { api } from './api';\nimport get from 'lodash/get';\n",
            ),
            ProjectFile::new("package.json", r#"{"dependencies": {"react": "18", "left-pad": "1"}}"#),
        ]);
        let result = analyze_dependencies(&snap, &all()).unwrap();
        assert!(result.output.contains("src/app.ts: react, ./api, lodash/get"));
        assert!(result.output.contains("External packages: lodash, react"));
        assert!(result.output.contains("Declared but never imported: left-pad"));
    }

    #[test]
    fn narrowing_to_missing_file_fails() {
        let snap = FileSnapshot::new(vec![ProjectFile::new("a.ts", "")]);
        let args = AnalysisArgs { path: Some("b.ts".into()) };
        assert!(matches!(review_code(&snap, &args), Err(ToolError::FileNotFound { .. })));
    }

    #[test]
    fn package_roots() {
        assert_eq!(package_root("@scope/pkg/deep"), "@scope/pkg");
        assert_eq!(package_root("serde::Deserialize"), "serde");
        assert_eq!(package_root("os.path"), "os");
    }
}
