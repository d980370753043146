use super::{file_issue, line_of, read_source, Checker};
use crate::config::ProjectLayout;
use crate::core::{Improvement, Severity};
use crate::io::walker::FileWalker;
use crate::ledger::IssueLedger;
use once_cell::sync::Lazy;
use regex::Regex;

const CATEGORY: &str = "security";

/// Raw SQL entry points called with an interpolated or concatenated string.
static RAW_SQL_INTERPOLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:DB::(?:select|statement|insert|update|delete|unprepared)|(?:->|::)\s*(?:whereRaw|selectRaw|orderByRaw|havingRaw|groupByRaw))\s*\(\s*(?:"[^"]*\$[^"]*"|'[^']*'\s*\.\s*\$)"#,
    )
    .unwrap()
});
static UNESCAPED_OUTPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{!!\s*(.+?)\s*!!\}").unwrap());

/// Looks for raw SQL built from variables and unescaped template output.
pub struct SecurityChecker {
    enabled: bool,
}

impl SecurityChecker {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    fn check_sql(&self, layout: &ProjectLayout, ledger: &mut IssueLedger) {
        let files = FileWalker::new(&layout.app)
            .with_ignore_patterns(&layout.ignore_patterns)
            .walk();
        for path in files {
            let Some(source) = read_source(layout, &path, CATEGORY, ledger) else {
                continue;
            };
            for found in RAW_SQL_INTERPOLATION.find_iter(&source) {
                ledger.add_issue(
                    CATEGORY,
                    "sql_injection",
                    file_issue(
                        layout,
                        &path,
                        line_of(&source, found.start()),
                        "Raw SQL built from a variable; use parameter bindings",
                        Severity::Critical,
                    )
                    .with_context("code", found.as_str()),
                );
            }
        }
    }

    fn check_templates(&self, layout: &ProjectLayout, ledger: &mut IssueLedger) {
        let files = FileWalker::new(&layout.views)
            .with_suffixes([".blade.php"])
            .with_ignore_patterns(&layout.ignore_patterns)
            .walk();
        for path in files {
            let Some(source) = read_source(layout, &path, CATEGORY, ledger) else {
                continue;
            };
            for caps in UNESCAPED_OUTPUT.captures_iter(&source) {
                let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if !expr.as_str().contains('$') {
                    continue;
                }
                let line = line_of(&source, whole.start());
                ledger.add_issue(
                    CATEGORY,
                    "xss",
                    file_issue(
                        layout,
                        &path,
                        line,
                        format!("Unescaped output of {}", expr.as_str()),
                        Severity::High,
                    ),
                );
                ledger.attach_improvement_to_last_issue(
                    Improvement::new(
                        &path,
                        "escape_output",
                        Severity::High,
                        "Escape template output",
                        "Echo with {{ }} so the value is HTML-escaped",
                        whole.as_str(),
                        format!("{{{{ {} }}}}", expr.as_str()),
                    )
                    .at_line(line),
                );
            }
        }
    }
}

impl Default for SecurityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for SecurityChecker {
    fn name(&self) -> &str {
        "Security Checker"
    }

    fn description(&self) -> &str {
        "Finds SQL injection and unescaped template output"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn check(&self, layout: &ProjectLayout) -> IssueLedger {
        let mut ledger = IssueLedger::new();
        self.check_sql(layout, &mut ledger);
        self.check_templates(layout, &mut ledger);
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaGuardConfig;
    use crate::core::ApplyOutcome;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn layout(dir: &std::path::Path) -> ProjectLayout {
        let layout = ProjectLayout::new(dir, &SchemaGuardConfig::default());
        std::fs::create_dir_all(&layout.controllers).unwrap();
        std::fs::create_dir_all(&layout.views).unwrap();
        layout
    }

    #[test]
    fn test_interpolated_raw_sql_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        std::fs::write(
            layout.controllers.join("UserController.php"),
            indoc! {r#"
                <?php
                class UserController
                {
                    public function show($id)
                    {
                        $safe = DB::select('select * from users where id = ?', [$id]);
                        $bad = DB::select("select * from users where id = $id");
                        $worse = User::whereRaw('name = ' . $name)->get();
                    }
                }
            "#},
        )
        .unwrap();

        let ledger = SecurityChecker::new().check(&layout);
        let lines: Vec<_> = ledger
            .issues_by_type("sql_injection")
            .iter()
            .map(|i| i.line())
            .collect();
        assert_eq!(lines, vec![Some(7), Some(8)]);
    }

    #[test]
    fn test_unescaped_output_is_fixable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let view = layout.views.join("profile.blade.php");
        std::fs::write(&view, "<p>{!! $user->bio !!}</p>\n{!! csrf_field() !!}\n").unwrap();

        let ledger = SecurityChecker::new().check(&layout);
        let issues = ledger.issues_by_type("xss");
        assert_eq!(issues.len(), 1);

        let fix = issues[0].improvement.as_ref().unwrap();
        assert_eq!(fix.improved_code, "{{ $user->bio }}");
        assert_eq!(fix.apply(true).unwrap(), ApplyOutcome::WouldApply { replacements: 1 });
        assert_eq!(
            std::fs::read_to_string(&view).unwrap(),
            "<p>{!! $user->bio !!}</p>\n{!! csrf_field() !!}\n"
        );

        fix.apply(false).unwrap();
        assert_eq!(
            std::fs::read_to_string(&view).unwrap(),
            "<p>{{ $user->bio }}</p>\n{!! csrf_field() !!}\n"
        );
    }

    #[test]
    fn test_static_and_chained_raw_clauses_are_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        std::fs::write(
            layout.controllers.join("ReportController.php"),
            indoc! {r#"
                <?php
                $totals = Order::selectRaw("sum($column)")->get();
                $sorted = Order::query()->orderByRaw('created_at ' . $direction)->get();
                $fine = Order::whereRaw('total > ?', [$min])->get();
            "#},
        )
        .unwrap();

        let ledger = SecurityChecker::new().check(&layout);
        let lines: Vec<_> = ledger
            .issues_by_type("sql_injection")
            .iter()
            .map(|i| i.line())
            .collect();
        assert_eq!(lines, vec![Some(2), Some(3)]);
    }
}
