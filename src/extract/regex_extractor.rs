use super::lexer::{check_balance, has_comments, split_statements, Statement};
use super::{
    ColumnDecl, ColumnRef, ColumnRename, DestructiveKind, DestructiveStatement, ForeignKeyDecl,
    IndexDecl, MigrationExtractor, MigrationFacts, StatementRef, TableOperation,
    TableOperationKind,
};
use once_cell::sync::Lazy;
use regex::Regex;

static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunction\s+(\w+)\s*\(").unwrap());
static SCHEMA_OP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"Schema::(create|table|dropIfExists|drop|rename)\s*\(\s*['"]([\w\.]+)['"](?:\s*,\s*['"]([\w\.]+)['"])?"#,
    )
    .unwrap()
});
static BLUEPRINT_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\w+\s*->\s*(\w+)\s*\(").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]([\w\.]+)['"]"#).unwrap());
static DATA_MIGRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)DB::table\s*\([^)]*\)(?:\s*->\s*\w+\s*\([^)]*\))*\s*->\s*(?:insert|insertUsing|update|upsert|chunk|chunkById|each)\b|INSERT\s+INTO|->\s*chunk(?:ById)?\s*\(",
    )
    .unwrap()
});
static CHUNKING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"->\s*(?:chunk|chunkById|lazy|lazyById|cursor)\s*\(").unwrap());
static TRUNCATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)->\s*truncate\s*\(\s*\)|::truncate\s*\(|\bTRUNCATE\s+(?:TABLE\s+)?[`'\x22]?(\w+)?").unwrap());
static DELETE_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"->\s*delete\s*\(\s*\)").unwrap());
static RAW_DELETE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bDELETE\s+FROM\s+[`'"]?(\w+)"#).unwrap());
static UPDATE_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"->\s*update\s*\(").unwrap());
static RAW_UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bUPDATE\s+[`'"]?(\w+)[`'"]?\s+SET\b"#).unwrap());
static DB_TABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"DB::table\s*\(\s*['"](\w+)['"]"#).unwrap());
static MODEL_STATIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]\w*)::(?:query|truncate)\b").unwrap());
static WHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bwhere").unwrap());

const COLUMN_TYPES: &[&str] = &[
    "bigIncrements",
    "bigInteger",
    "binary",
    "boolean",
    "char",
    "date",
    "dateTime",
    "dateTimeTz",
    "decimal",
    "double",
    "enum",
    "float",
    "foreignId",
    "foreignUlid",
    "foreignUuid",
    "geometry",
    "increments",
    "integer",
    "ipAddress",
    "json",
    "jsonb",
    "longText",
    "macAddress",
    "mediumInteger",
    "mediumText",
    "set",
    "smallInteger",
    "string",
    "text",
    "time",
    "timeTz",
    "timestamp",
    "timestampTz",
    "tinyInteger",
    "tinyText",
    "ulid",
    "unsignedBigInteger",
    "unsignedInteger",
    "unsignedMediumInteger",
    "unsignedSmallInteger",
    "unsignedTinyInteger",
    "uuid",
    "year",
];

const INDEX_METHODS: &[&str] = &["index", "unique", "primary", "fullText", "spatialIndex"];
const ON_DELETE: &[&str] = &[
    "onDelete(",
    "cascadeOnDelete(",
    "nullOnDelete(",
    "restrictOnDelete(",
    "noActionOnDelete(",
];
const ON_UPDATE: &[&str] = &[
    "onUpdate(",
    "cascadeOnUpdate(",
    "nullOnUpdate(",
    "restrictOnUpdate(",
    "noActionOnUpdate(",
];

/// Pattern-matching extractor for Laravel schema-builder migrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexMigrationExtractor;

impl RegexMigrationExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MigrationExtractor for RegexMigrationExtractor {
    fn extract(&self, source: &str) -> MigrationFacts {
        let mut facts = MigrationFacts {
            line_count: source.lines().count(),
            has_comments: has_comments(source),
            syntax_error: check_balance(source),
            ..Default::default()
        };

        let statements = split_statements(source);
        let mut walker = UpBodyWalker::new(&statements);
        let mut chunked = false;

        while let Some(stmt) = walker.next_up_statement() {
            let text = stmt.text.as_str();

            for caps in SCHEMA_OP.captures_iter(text) {
                record_schema_operation(&mut facts, &mut walker, &caps, stmt.line);
            }

            if let Some(caps) = BLUEPRINT_CALL.captures(text) {
                let table = walker.current_table.clone();
                record_blueprint_call(&mut facts, &caps[1], stmt, table, walker.in_alter);
            } else {
                record_data_statement(&mut facts, stmt);
            }

            if DATA_MIGRATION.is_match(text) {
                facts.has_data_migration = true;
            }
            if CHUNKING.is_match(text) {
                chunked = true;
            }
        }

        if chunked {
            facts.bulk_updates.clear();
        }

        facts
    }
}

/// Iterates statements belonging to the `up()` body. Files without an `up`
/// function are treated as one big body.
struct UpBodyWalker<'a> {
    statements: &'a [Statement],
    position: usize,
    in_up: bool,
    current_table: Option<String>,
    in_alter: bool,
}

impl<'a> UpBodyWalker<'a> {
    fn new(statements: &'a [Statement]) -> Self {
        let has_up = statements.iter().any(|s| {
            FUNCTION_DECL
                .captures(&s.text)
                .is_some_and(|c| &c[1] == "up")
        });
        Self {
            statements,
            position: 0,
            in_up: !has_up,
            current_table: None,
            in_alter: false,
        }
    }

    fn next_up_statement(&mut self) -> Option<&'a Statement> {
        while let Some(stmt) = self.statements.get(self.position) {
            self.position += 1;
            if let Some(caps) = FUNCTION_DECL.captures(&stmt.text) {
                self.in_up = &caps[1] == "up";
                self.current_table = None;
                continue;
            }
            if self.in_up {
                return Some(stmt);
            }
        }
        None
    }
}

fn record_schema_operation(
    facts: &mut MigrationFacts,
    walker: &mut UpBodyWalker<'_>,
    caps: &regex::Captures<'_>,
    line: usize,
) {
    let table = caps[2].to_string();
    let kind = match &caps[1] {
        "create" => TableOperationKind::Create,
        "table" => TableOperationKind::Alter,
        "rename" => TableOperationKind::Rename,
        _ => TableOperationKind::Drop,
    };

    match kind {
        TableOperationKind::Create | TableOperationKind::Alter => {
            walker.current_table = Some(table.clone());
            walker.in_alter = kind == TableOperationKind::Alter;
        }
        TableOperationKind::Rename => {
            if let Some(to) = caps.get(3) {
                facts.table_operations.push(TableOperation {
                    table: to.as_str().to_string(),
                    kind,
                    line,
                });
            }
        }
        TableOperationKind::Drop => {}
    }

    facts.table_operations.push(TableOperation { table, kind, line });
}

fn record_blueprint_call(
    facts: &mut MigrationFacts,
    method: &str,
    stmt: &Statement,
    table: Option<String>,
    in_alter: bool,
) {
    let text = stmt.text.as_str();
    let args = call_arguments(text, method).unwrap_or_default();
    let first_names = args.first().map(|a| quoted_names(a)).unwrap_or_default();

    if COLUMN_TYPES.contains(&method) {
        let Some(name) = first_names.first().cloned() else {
            return;
        };
        let column = ColumnDecl {
            table: table.clone(),
            name: name.clone(),
            column_type: method.to_string(),
            line: stmt.line,
            nullable: text.contains("->nullable("),
            has_default: text.contains("->default(") || text.contains("->useCurrent("),
            indexed: INDEX_METHODS
                .iter()
                .any(|m| text.contains(&format!("->{m}("))),
            is_change: text.contains("->change("),
            in_alter,
            snippet: text.to_string(),
        };

        if let Some(constrained) = call_arguments(text, "constrained") {
            let references = constrained
                .first()
                .and_then(|a| quoted_names(a).into_iter().next())
                .or_else(|| guess_referenced_table(&name));
            facts.foreign_keys.push(ForeignKeyDecl {
                table,
                column: name,
                references,
                named: constrained.len() >= 3,
                on_delete: has_policy(text, ON_DELETE),
                on_update: has_policy(text, ON_UPDATE),
                line: stmt.line,
                snippet: text.to_string(),
            });
        }
        facts.columns.push(column);
        return;
    }

    match method {
        "foreign" => {
            let references = call_arguments(text, "on")
                .and_then(|a| a.first().and_then(|arg| quoted_names(arg).into_iter().next()));
            for column in first_names {
                facts.foreign_keys.push(ForeignKeyDecl {
                    table: table.clone(),
                    column,
                    references: references.clone(),
                    named: args.len() >= 2,
                    on_delete: has_policy(text, ON_DELETE),
                    on_update: has_policy(text, ON_UPDATE),
                    line: stmt.line,
                    snippet: text.to_string(),
                });
            }
        }
        m if INDEX_METHODS.contains(&m) => facts.indexes.push(IndexDecl {
            table,
            columns: first_names,
            line: stmt.line,
        }),
        "dropColumn" => {
            for column in args.iter().flat_map(|a| quoted_names(a)) {
                facts.dropped_columns.push(ColumnRef {
                    table: table.clone(),
                    column,
                    line: stmt.line,
                    snippet: text.to_string(),
                });
            }
        }
        "dropTimestamps" | "dropSoftDeletes" | "dropRememberToken" => {
            let columns: &[&str] = match method {
                "dropTimestamps" => &["created_at", "updated_at"],
                "dropSoftDeletes" => &["deleted_at"],
                _ => &["remember_token"],
            };
            for column in columns {
                facts.dropped_columns.push(ColumnRef {
                    table: table.clone(),
                    column: column.to_string(),
                    line: stmt.line,
                    snippet: text.to_string(),
                });
            }
        }
        "renameColumn" => {
            let names: Vec<String> = args.iter().flat_map(|a| quoted_names(a)).collect();
            if let [from, to, ..] = names.as_slice() {
                facts.renamed_columns.push(ColumnRename {
                    table,
                    from: from.clone(),
                    to: to.clone(),
                    line: stmt.line,
                    snippet: text.to_string(),
                });
            }
        }
        _ => {}
    }
}

fn record_data_statement(facts: &mut MigrationFacts, stmt: &Statement) {
    let text = stmt.text.as_str();
    let referenced_table = || {
        DB_TABLE
            .captures(text)
            .or_else(|| MODEL_STATIC.captures(text))
            .map(|c| c[1].to_string())
    };

    if let Some(caps) = TRUNCATE.captures(text) {
        facts.destructive_statements.push(DestructiveStatement {
            kind: DestructiveKind::Truncate,
            table: caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .or_else(referenced_table),
            line: stmt.line,
            snippet: text.to_string(),
        });
    }

    if !WHERE.is_match(text) {
        let raw_delete = RAW_DELETE.captures(text).map(|c| c[1].to_string());
        if DELETE_CALL.is_match(text) || raw_delete.is_some() {
            facts.destructive_statements.push(DestructiveStatement {
                kind: DestructiveKind::DeleteAll,
                table: raw_delete.or_else(referenced_table),
                line: stmt.line,
                snippet: text.to_string(),
            });
        }
    }

    let raw_update = RAW_UPDATE.captures(text).map(|c| c[1].to_string());
    if UPDATE_CALL.is_match(text) || raw_update.is_some() {
        facts.bulk_updates.push(StatementRef {
            table: raw_update.or_else(referenced_table),
            line: stmt.line,
            snippet: text.to_string(),
        });
    }
}

fn has_policy(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

fn quoted_names(arg: &str) -> Vec<String> {
    QUOTED
        .captures_iter(arg)
        .map(|c| c[1].to_string())
        .collect()
}

/// Laravel's convention: `user_id` references `users`.
fn guess_referenced_table(column: &str) -> Option<String> {
    column
        .strip_suffix("_id")
        .filter(|base| !base.is_empty())
        .map(|base| format!("{base}s"))
}

/// Top-level, comma-separated arguments of the first `->method(...)` or
/// `::method(...)` call in `text`. `None` when the call is absent.
fn call_arguments(text: &str, method: &str) -> Option<Vec<String>> {
    let start = [format!("->{method}("), format!("::{method}(")]
        .iter()
        .filter_map(|needle| text.find(needle.as_str()).map(|i| i + needle.len()))
        .min()?;

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in text[start..].chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' if depth == 0 => break,
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => args.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    args.push(current);

    Some(
        args.into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
    )
}
