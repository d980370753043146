mod common;

use common::{Project, CREATE_USERS};
use indoc::indoc;
use pretty_assertions::assert_eq;
use schemaguard::cleanup::MigrationCleaner;
use schemaguard::jobs::{run_check_job, JobStatus, JobStore};
use schemaguard::{ApplyOutcome, CheckerOrchestrator, Severity};

fn populated_project() -> Project {
    let project = Project::new();
    project.migration("2024_01_01_000000_create_users_table.php", CREATE_USERS);
    project.write(
        "app/Models/Post.php",
        indoc! {r#"
            <?php

            namespace App\Models;

            class Post extends Model
            {
                protected $guarded = [];
            }
        "#},
    );
    project.write(
        "app/Http/Controllers/PostController.php",
        indoc! {r#"
            <?php

            class PostController
            {
                public function index($author)
                {
                    $posts = DB::select("select * from posts where author = '$author'");
                    foreach ($posts as $post) {
                        $user = User::find($post->user_id);
                    }
                    return Post::all();
                }
            }
        "#},
    );
    project.write(
        "resources/views/posts/show.blade.php",
        "<h1>{{ $post->title }}</h1>\n<div>{!! $post->body !!}</div>\n",
    );
    project
}

#[test]
fn test_default_checkers_cover_every_category() {
    let project = populated_project();
    let orchestrator = CheckerOrchestrator::with_defaults(project.layout.clone(), &project.config);

    let ledger = orchestrator.run_all_checks();

    for category in ["models", "security", "performance"] {
        assert!(
            !ledger.issues_by_category(category).is_empty(),
            "no {category} issues"
        );
    }
    assert!(ledger.issues_by_category("migrations").is_empty());
    assert_eq!(ledger.issues_by_type("sql_injection").len(), 1);
    assert_eq!(ledger.issues_by_type("n_plus_one").len(), 1);
    assert_eq!(ledger.issues_by_type("unbounded_query").len(), 1);
    assert_eq!(ledger.highest_severity(), Some(Severity::Critical));
    assert_eq!(ledger.stats().total_issues, ledger.len());
}

#[test]
fn test_configured_disabled_checkers_do_not_run() {
    let mut project = populated_project();
    project.config.checkers.disabled = vec!["Security Checker".into(), "Nope".into()];
    let orchestrator = CheckerOrchestrator::with_defaults(project.layout.clone(), &project.config);

    let enabled: Vec<_> = orchestrator.enabled_checkers().map(|c| c.name()).collect();
    assert_eq!(
        enabled,
        vec!["Migration Checker", "Model Checker", "Performance Checker"]
    );

    let ledger = orchestrator.run_all_checks();
    assert!(ledger.issues_by_category("security").is_empty());
    assert_eq!(
        orchestrator.run_check("Security Checker").map(|l| l.len()),
        Some(0)
    );
}

#[test]
fn test_fixable_improvements_apply_to_files() {
    let project = populated_project();
    let orchestrator = CheckerOrchestrator::with_defaults(project.layout.clone(), &project.config);
    let ledger = orchestrator.run_all_checks();

    let fixes: Vec<_> = ledger.fixable_improvements().collect();
    assert_eq!(fixes.len(), 2);
    for fix in &fixes {
        assert_eq!(
            fix.apply(true).unwrap(),
            ApplyOutcome::WouldApply { replacements: 1 }
        );
    }
    for fix in &fixes {
        assert_eq!(
            fix.apply(false).unwrap(),
            ApplyOutcome::Applied { replacements: 1 }
        );
    }

    let view =
        std::fs::read_to_string(project.root().join("resources/views/posts/show.blade.php"))
            .unwrap();
    assert!(view.contains("{{ $post->body }}"));

    let rerun = orchestrator.run_all_checks();
    assert!(rerun.issues_by_type("xss").is_empty());
    assert!(rerun.issues_by_type("unguarded_model").is_empty());
}

#[test]
fn test_check_job_reports_completion() {
    let project = populated_project();
    let orchestrator = CheckerOrchestrator::with_defaults(project.layout.clone(), &project.config);
    let store = JobStore::new(&project.layout.jobs);

    let job_id = store.create().unwrap();
    assert_eq!(store.load(&job_id).unwrap().status, JobStatus::Pending);

    let record = run_check_job(&store, &job_id, &orchestrator).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100);

    let stored = store.load(&job_id).unwrap();
    assert_eq!(stored, record);
    let total = stored.result.unwrap()["total_issues"].as_u64().unwrap();
    assert_eq!(total as usize, orchestrator.run_all_checks().len());
}

#[test]
fn test_redundant_migrations_are_backed_up_then_removed() {
    let project = Project::new();
    let old = project.migration("2024_01_01_000000_create_users_table.php", CREATE_USERS);
    let new = project.migration("2024_06_01_000000_create_users_table.php", CREATE_USERS);

    let dry = MigrationCleaner::new(&project.layout.migrations, &project.layout.backups)
        .with_dry_run(true)
        .cleanup()
        .unwrap();
    assert!(dry.dry_run);
    assert!(old.exists());

    let report = MigrationCleaner::new(&project.layout.migrations, &project.layout.backups)
        .cleanup()
        .unwrap();
    assert_eq!(report.removed, vec![old.clone()]);
    assert!(!old.exists());
    assert!(new.exists());
    let backup_dir = report.backup_dir.unwrap();
    assert!(backup_dir
        .join("2024_01_01_000000_create_users_table.php")
        .is_file());
}
