// Test utility module for schemaguard integration tests
#![allow(dead_code)]

use indoc::indoc;
use rusqlite::Connection;
use schemaguard::config::{ProjectLayout, SchemaGuardConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CREATE_USERS: &str = indoc! {r#"
    <?php

    use Illuminate\Database\Migrations\Migration;
    use Illuminate\Database\Schema\Blueprint;
    use Illuminate\Support\Facades\Schema;

    return new class extends Migration
    {
        public function up(): void
        {
            Schema::create('users', function (Blueprint $table) {
                $table->id();
                $table->string('name');
                $table->string('email')->unique();
                $table->timestamps();
            });
        }

        public function down(): void
        {
            Schema::dropIfExists('users');
        }
    };
"#};

pub const CREATE_TAGS: &str = indoc! {r#"
    <?php

    return new class extends Migration
    {
        public function up(): void
        {
            Schema::create('tags', function (Blueprint $table) {
                $table->id();
                $table->string('label', 64);
                $table->timestamps();
            });
        }

        public function down(): void
        {
            Schema::dropIfExists('tags');
        }
    };
"#};

/// An unbalanced brace plus a two-column drop.
pub const BROKEN_DROP: &str = indoc! {r#"
    <?php

    return new class extends Migration
    {
        public function up(): void
        {
            Schema::table('users', function (Blueprint $table) {
                $table->dropColumn(['nickname', 'legacy_score']);
            });
        }
    "#};

/// A throwaway Laravel-style project tree.
pub struct Project {
    pub dir: TempDir,
    pub config: SchemaGuardConfig,
    pub layout: ProjectLayout,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = SchemaGuardConfig::default();
        let layout = ProjectLayout::new(dir.path(), &config);
        for path in [&layout.migrations, &layout.models, &layout.views, &layout.controllers] {
            std::fs::create_dir_all(path).unwrap();
        }
        Self {
            dir,
            config,
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn migration(&self, name: &str, source: &str) -> PathBuf {
        let path = self.layout.migrations.join(name);
        std::fs::write(&path, source).unwrap();
        path
    }

    /// Create the configured SQLite database with `users` and `posts`.
    pub fn seed_database(&self) -> Connection {
        if let Some(parent) = self.layout.database.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let conn = Connection::open(&self.layout.database).unwrap();
        seed(&conn);
        conn
    }
}

pub fn seed(conn: &Connection) {
    conn.execute_batch(indoc! {"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT
        );
        CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            title TEXT,
            body BLOB
        );
        INSERT INTO users (id, name, email) VALUES
            (1, 'Ada', 'ada@example.com'),
            (2, 'O''Brien', NULL),
            (3, 'Grace', 'grace@example.com');
        INSERT INTO posts (id, user_id, title, body) VALUES
            (1, 1, 'Hello; world', X'DEADBEEF'),
            (2, 3, 'Second', NULL);
    "})
    .unwrap();
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .unwrap()
}
