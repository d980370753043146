use super::{Checker, MigrationChecker, ModelChecker, PerformanceChecker, SecurityChecker};
use crate::config::{ProjectLayout, SchemaGuardConfig};
use crate::ledger::IssueLedger;
use crate::observability::{set_phase, Phase};
use tracing::{debug, info, warn};

/// Ordered roster of checkers sharing one project layout.
pub struct CheckerOrchestrator {
    layout: ProjectLayout,
    checkers: Vec<Box<dyn Checker>>,
}

impl CheckerOrchestrator {
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            checkers: Vec::new(),
        }
    }

    /// The built-in roster, with the checkers named in
    /// `[checkers] disabled` switched off.
    pub fn with_defaults(layout: ProjectLayout, config: &SchemaGuardConfig) -> Self {
        let mut orchestrator = Self::new(layout);
        orchestrator.register(Box::new(MigrationChecker::new(
            (&config.thresholds).into(),
        )));
        orchestrator.register(Box::new(ModelChecker::new()));
        orchestrator.register(Box::new(SecurityChecker::new()));
        orchestrator.register(Box::new(PerformanceChecker::new()));

        for name in &config.checkers.disabled {
            if !orchestrator.disable(name) {
                warn!(checker = %name, "Configured checker to disable does not exist");
            }
        }
        orchestrator
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn register(&mut self, checker: Box<dyn Checker>) {
        debug!(checker = checker.name(), "Registered checker");
        self.checkers.push(checker);
    }

    /// Enable the checker with exactly this name. Returns whether one matched.
    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable the checker with exactly this name. Returns whether one matched.
    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.checkers.iter_mut().find(|c| c.name() == name) {
            Some(checker) => {
                checker.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// First checker whose name contains `query`, ignoring case.
    pub fn find_checker(&self, query: &str) -> Option<&dyn Checker> {
        let query = query.to_lowercase();
        self.checkers
            .iter()
            .find(|c| c.name().to_lowercase().contains(&query))
            .map(|c| c.as_ref())
    }

    pub fn checkers(&self) -> impl Iterator<Item = &dyn Checker> {
        self.checkers.iter().map(|c| c.as_ref())
    }

    pub fn enabled_checkers(&self) -> impl Iterator<Item = &dyn Checker> {
        self.checkers().filter(|c| c.is_enabled())
    }

    pub fn run_all_checks(&self) -> IssueLedger {
        self.run_all_checks_with_progress(|_, _, _| {})
    }

    /// Run every enabled checker in order, calling `on_progress(done, total,
    /// name)` after each one.
    pub fn run_all_checks_with_progress<F>(&self, mut on_progress: F) -> IssueLedger
    where
        F: FnMut(usize, usize, &str),
    {
        let _phase = set_phase(Phase::Checking);
        let enabled: Vec<&dyn Checker> = self.enabled_checkers().collect();
        let total = enabled.len();
        let mut ledger = IssueLedger::new();

        for (index, checker) in enabled.into_iter().enumerate() {
            let found = checker.check(&self.layout);
            info!(checker = checker.name(), issues = found.len(), "Checker finished");
            ledger.merge(found);
            on_progress(index + 1, total, checker.name());
        }
        ledger
    }

    /// Run one checker by exact name. A disabled checker yields an empty
    /// ledger; an unknown name yields `None`.
    pub fn run_check(&self, name: &str) -> Option<IssueLedger> {
        let checker = self.checkers.iter().find(|c| c.name() == name)?;
        if !checker.is_enabled() {
            debug!(checker = name, "Checker disabled, not running");
            return Some(IssueLedger::new());
        }
        let _phase = set_phase(Phase::Checking);
        Some(checker.check(&self.layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IssueData;

    struct FixedChecker {
        name: &'static str,
        enabled: bool,
        issues: usize,
    }

    impl Checker for FixedChecker {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn check(&self, _layout: &ProjectLayout) -> IssueLedger {
            let mut ledger = IssueLedger::new();
            for i in 0..self.issues {
                ledger.add_issue(self.name, "fixed", IssueData::new(format!("issue {i}")));
            }
            ledger
        }
    }

    fn orchestrator() -> CheckerOrchestrator {
        let layout = ProjectLayout::new("/tmp/project", &SchemaGuardConfig::default());
        let mut orchestrator = CheckerOrchestrator::new(layout);
        orchestrator.register(Box::new(FixedChecker {
            name: "Alpha",
            enabled: true,
            issues: 2,
        }));
        orchestrator.register(Box::new(FixedChecker {
            name: "Beta",
            enabled: true,
            issues: 3,
        }));
        orchestrator
    }

    #[test]
    fn test_disabled_checker_is_kept_but_not_run() {
        let mut orchestrator = orchestrator();
        assert!(orchestrator.disable("Beta"));

        assert_eq!(orchestrator.checkers().count(), 2);
        assert_eq!(orchestrator.enabled_checkers().count(), 1);
        assert_eq!(orchestrator.run_all_checks().len(), 2);
        assert_eq!(orchestrator.run_check("Beta").map(|l| l.len()), Some(0));

        assert!(orchestrator.enable("Beta"));
        assert_eq!(orchestrator.run_all_checks().len(), 5);
    }

    #[test]
    fn test_enable_and_disable_match_exactly() {
        let mut orchestrator = orchestrator();
        assert!(!orchestrator.disable("beta"));
        assert!(!orchestrator.enable("Gamma"));
        assert_eq!(orchestrator.enabled_checkers().count(), 2);
    }

    #[test]
    fn test_find_checker_is_case_insensitive_substring() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.find_checker("ET").map(|c| c.name()), Some("Beta"));
        assert!(orchestrator.find_checker("zeta").is_none());
    }

    #[test]
    fn test_unknown_checker_is_none() {
        assert!(orchestrator().run_check("Gamma").is_none());
    }

    #[test]
    fn test_progress_reports_each_enabled_checker() {
        let mut orchestrator = orchestrator();
        orchestrator.disable("Alpha");
        let mut seen = Vec::new();
        orchestrator.run_all_checks_with_progress(|done, total, name| {
            seen.push((done, total, name.to_string()));
        });
        assert_eq!(seen, vec![(1, 1, "Beta".to_string())]);
    }

    #[test]
    fn test_defaults_honour_disabled_config() {
        let mut config = SchemaGuardConfig::default();
        config.checkers.disabled = vec!["Security Checker".into()];
        let layout = ProjectLayout::new("/tmp/project", &config);
        let orchestrator = CheckerOrchestrator::with_defaults(layout, &config);

        let enabled: Vec<&str> = orchestrator.enabled_checkers().map(|c| c.name()).collect();
        assert_eq!(
            enabled,
            vec!["Migration Checker", "Model Checker", "Performance Checker"]
        );
    }
}
