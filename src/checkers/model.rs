use super::{file_issue, line_of, read_source, Checker};
use crate::config::ProjectLayout;
use crate::core::{Improvement, Severity};
use crate::io::walker::FileWalker;
use crate::ledger::IssueLedger;
use once_cell::sync::Lazy;
use regex::Regex;

const CATEGORY: &str = "models";

static MODEL_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"class\s+(\w+)\s+extends\s+(?:[\w\\]*\\)?(?:Model|Authenticatable|Pivot)\b").unwrap()
});
static FILLABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$fillable\s*=").unwrap());
static GUARDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$guarded\s*=").unwrap());
static EMPTY_GUARDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"protected\s+\$guarded\s*=\s*\[\s*\]\s*;").unwrap());
static HIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$hidden\s*=").unwrap());

/// Attribute names that should never be serialized.
const SENSITIVE_ATTRIBUTES: &[&str] = &[
    "password",
    "remember_token",
    "api_token",
    "secret",
    "two_factor_secret",
];

/// Checks ORM model classes for mass-assignment and serialization hazards.
pub struct ModelChecker {
    enabled: bool,
}

impl ModelChecker {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for ModelChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for ModelChecker {
    fn name(&self) -> &str {
        "Model Checker"
    }

    fn description(&self) -> &str {
        "Checks models for mass-assignment protection and hidden attributes"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn check(&self, layout: &ProjectLayout) -> IssueLedger {
        let mut ledger = IssueLedger::new();
        let files = FileWalker::new(&layout.models)
            .with_ignore_patterns(&layout.ignore_patterns)
            .walk();

        for path in files {
            let Some(source) = read_source(layout, &path, CATEGORY, &mut ledger) else {
                continue;
            };
            let Some(class) = MODEL_CLASS.captures(&source) else {
                continue;
            };
            let class_line = line_of(&source, class.get(0).map_or(0, |m| m.start()));
            let name = &class[1];

            if !FILLABLE.is_match(&source) && !GUARDED.is_match(&source) {
                ledger.add_issue(
                    CATEGORY,
                    "mass_assignment",
                    file_issue(
                        layout,
                        &path,
                        class_line,
                        format!("Model {name} defines neither $fillable nor $guarded"),
                        Severity::High,
                    )
                    .with_context("model", name),
                );
            }

            if let Some(guarded) = EMPTY_GUARDED.find(&source) {
                let line = line_of(&source, guarded.start());
                ledger.add_issue(
                    CATEGORY,
                    "unguarded_model",
                    file_issue(
                        layout,
                        &path,
                        line,
                        format!("Model {name} leaves every attribute mass assignable"),
                        Severity::High,
                    )
                    .with_context("model", name),
                );
                ledger.attach_improvement_to_last_issue(
                    Improvement::new(
                        &path,
                        "guard_primary_key",
                        Severity::High,
                        format!("Guard the primary key of {name}"),
                        "Keep at least the primary key out of mass assignment",
                        guarded.as_str(),
                        "protected $guarded = ['id'];",
                    )
                    .at_line(line),
                );
            }

            if !HIDDEN.is_match(&source) {
                for attribute in exposed_attributes(&source) {
                    ledger.add_issue(
                        CATEGORY,
                        "sensitive_exposure",
                        file_issue(
                            layout,
                            &path,
                            class_line,
                            format!(
                                "Model {name} serializes sensitive attribute '{attribute}'; add it to $hidden"
                            ),
                            Severity::Medium,
                        )
                        .with_context("model", name)
                        .with_context("attribute", attribute),
                    );
                }
            }
        }
        ledger
    }
}

fn exposed_attributes(source: &str) -> Vec<&'static str> {
    SENSITIVE_ATTRIBUTES
        .iter()
        .copied()
        .filter(|attr| source.contains(&format!("'{attr}'")) || source.contains(&format!("\"{attr}\"")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaGuardConfig;
    use indoc::indoc;

    fn check(files: &[(&str, &str)]) -> IssueLedger {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path(), &SchemaGuardConfig::default());
        std::fs::create_dir_all(&layout.models).unwrap();
        for (name, source) in files {
            std::fs::write(layout.models.join(name), source).unwrap();
        }
        ModelChecker::new().check(&layout)
    }

    #[test]
    fn test_unprotected_model_is_flagged() {
        let ledger = check(&[(
            "Post.php",
            indoc! {r#"
                <?php
                namespace App\Models;

                class Post extends Model
                {
                }
            "#},
        )]);

        let issues = ledger.issues_by_type("mass_assignment");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].file(), Some("app/Models/Post.php"));
        assert_eq!(issues[0].line(), Some(4));
    }

    #[test]
    fn test_empty_guarded_gets_a_fix() {
        let ledger = check(&[(
            "Tag.php",
            indoc! {r#"
                <?php
                class Tag extends Model
                {
                    protected $guarded = [];
                }
            "#},
        )]);

        assert!(ledger.issues_by_type("mass_assignment").is_empty());
        let issue = ledger.issues_by_type("unguarded_model")[0];
        let fix = issue.improvement.as_ref().unwrap();
        assert_eq!(fix.original_code, "protected $guarded = [];");
        assert_eq!(fix.line, Some(4));
    }

    #[test]
    fn test_sensitive_attributes_need_hidden() {
        let exposed = indoc! {r#"
            <?php
            class User extends Authenticatable
            {
                protected $fillable = ['name', 'email', 'password'];
            }
        "#};
        let hidden = indoc! {r#"
            <?php
            class User extends Authenticatable
            {
                protected $fillable = ['name', 'email', 'password'];
                protected $hidden = ['password', 'remember_token'];
            }
        "#};

        assert_eq!(check(&[("User.php", exposed)]).issues_by_type("sensitive_exposure").len(), 1);
        assert!(check(&[("User.php", hidden)]).is_empty());
    }

    #[test]
    fn test_non_model_classes_are_ignored() {
        let ledger = check(&[("Helper.php", "<?php\nclass Helper\n{\n}\n")]);
        assert!(ledger.is_empty());
    }
}
