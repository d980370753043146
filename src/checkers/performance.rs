use super::{file_issue, line_of, read_source, Checker};
use crate::config::ProjectLayout;
use crate::core::Severity;
use crate::extract::lexer::mask_non_code;
use crate::io::walker::FileWalker;
use crate::ledger::IssueLedger;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

const CATEGORY: &str = "performance";

static UNBOUNDED_ALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]\w*)::all\s*\(\s*\)").unwrap());
static FOREACH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bforeach\s*\(.*?\bas\s+(?:\$\w+\s*=>\s*)?\$(\w+)\s*\)").unwrap());
static QUERY_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z]\w*::(?:find|findOrFail|where|firstWhere|query)\s*\(|DB::table\s*\(").unwrap()
});

/// Flags unbounded table loads and queries issued once per loop iteration.
pub struct PerformanceChecker {
    enabled: bool,
}

impl PerformanceChecker {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for PerformanceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for PerformanceChecker {
    fn name(&self) -> &str {
        "Performance Checker"
    }

    fn description(&self) -> &str {
        "Detects unbounded queries and N+1 query loops"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn check(&self, layout: &ProjectLayout) -> IssueLedger {
        let mut ledger = IssueLedger::new();
        let files = FileWalker::new(&layout.app)
            .with_ignore_patterns(&layout.ignore_patterns)
            .walk();

        for path in files {
            let Some(source) = read_source(layout, &path, CATEGORY, &mut ledger) else {
                continue;
            };

            for caps in UNBOUNDED_ALL.captures_iter(&source) {
                let Some(call) = caps.get(0) else { continue };
                ledger.add_issue(
                    CATEGORY,
                    "unbounded_query",
                    file_issue(
                        layout,
                        &path,
                        line_of(&source, call.start()),
                        format!("{}::all() loads the whole table; paginate or chunk", &caps[1]),
                        Severity::Low,
                    ),
                );
            }

            for query in loop_queries(&source) {
                ledger.add_issue(
                    CATEGORY,
                    "n_plus_one",
                    file_issue(
                        layout,
                        &path,
                        query.line,
                        format!(
                            "Query inside foreach over ${} runs once per item; eager load or batch it",
                            query.loop_variable
                        ),
                        Severity::Medium,
                    )
                    .with_context("loop_line", query.loop_line),
                );
            }
        }
        ledger
    }
}

#[derive(Debug, PartialEq)]
struct LoopQuery {
    loop_variable: String,
    loop_line: usize,
    line: usize,
}

/// First query issued inside the body of each `foreach`. Matching runs on
/// the masked source, so strings and comments never count as code.
fn loop_queries(source: &str) -> Vec<LoopQuery> {
    let code = mask_non_code(source);
    let mut found = Vec::new();

    for caps in FOREACH.captures_iter(&code) {
        let Some(header) = caps.get(0) else { continue };
        let Some(body) = loop_body(&code, header.end()) else {
            continue;
        };
        let Some(query) = QUERY_CALL.find(&code[body.clone()]) else {
            continue;
        };
        found.push(LoopQuery {
            loop_variable: caps[1].to_string(),
            loop_line: line_of(source, header.start()),
            line: line_of(source, body.start + query.start()),
        });
    }
    found
}

/// Byte range between the braces that open after `after`. A `;` before any
/// brace means a single-statement loop, which is not tracked.
fn loop_body(code: &str, after: usize) -> Option<Range<usize>> {
    let mut depth = 0usize;
    let mut start = None;
    for (offset, ch) in code[after..].char_indices() {
        let offset = after + offset;
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(offset + 1);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| s..offset);
                }
            }
            ';' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}
