//! The `INSERT` statement format used by backup data files.
//!
//! Each row is written as one `INSERT INTO "t" ("a", "b") VALUES (...);`
//! statement. Values are SQLite literals: `NULL`, integers, reals,
//! single-quoted text with `''` escaping, and `X'..'` blobs.

use crate::database::{quote_literal, Dialect};
use crate::errors::{GuardError, GuardResult};
use rusqlite::types::Value;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl InsertStatement {
    pub fn single(table: impl Into<String>, columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            table: table.into(),
            columns,
            rows: vec![values],
        }
    }

    pub fn render(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| dialect.quote_ident(c)).collect();
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(render_value).collect();
                format!("({})", values.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {};",
            dialect.quote_ident(&self.table),
            columns.join(", "),
            rows.join(", ")
        )
    }

    pub fn parse(statement: &str) -> GuardResult<Self> {
        let mut p = Parser::new(statement);
        p.keyword("INSERT")?;
        p.keyword("INTO")?;
        let table = p.identifier()?;

        p.expect('(')?;
        let mut columns = vec![p.identifier()?];
        while p.eat(',') {
            columns.push(p.identifier()?);
        }
        p.expect(')')?;

        p.keyword("VALUES")?;
        let mut rows = vec![p.tuple()?];
        while p.eat(',') {
            rows.push(p.tuple()?);
        }
        p.eat(';');
        p.end()?;

        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(p.error(format!(
                "{} values for {} columns",
                bad.len(),
                columns.len()
            )));
        }

        Ok(Self {
            table,
            columns,
            rows,
        })
    }

    /// Rename or drop columns in place. `target` returns a column's new name,
    /// or `None` to drop it.
    pub fn remap_columns<F>(&mut self, mut target: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        let plan: Vec<Option<String>> = self.columns.iter().map(|c| target(c)).collect();
        self.columns = plan.iter().flatten().cloned().collect();
        for row in &mut self.rows {
            let values = std::mem::take(row);
            *row = values
                .into_iter()
                .zip(&plan)
                .filter_map(|(value, keep)| keep.as_ref().map(|_| value))
                .collect();
        }
    }
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) if r.is_nan() => "NULL".to_string(),
        Value::Real(r) if r.is_infinite() => {
            if *r > 0.0 { "9e999" } else { "-9e999" }.to_string()
        }
        Value::Real(r) => format!("{r:?}"),
        Value::Text(s) => quote_literal(s),
        Value::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
    }
}

/// Split a file of statements at `;` outside quotes and identifiers.
pub fn split_sql_statements(content: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in content.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if matches!(ch, '\'' | '"' | '`') => quote = Some(ch),
            None if ch == ';' => {
                current.push(ch);
                let stmt = current.trim();
                if stmt.len() > 1 {
                    statements.push(stmt.to_string());
                }
                current.clear();
                continue;
            }
            None => {}
        }
        current.push(ch);
    }

    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl AsRef<str>) -> GuardError {
        let preview: String = self.source.chars().take(60).collect();
        GuardError::MalformedStatement(format!(
            "{} at offset {} in `{preview}`",
            message.as_ref(),
            self.pos
        ))
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> GuardResult<()> {
        if self.eat(ch) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{ch}'")))
        }
    }

    fn end(&mut self) -> GuardResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
        }
    }

    fn word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn keyword(&mut self, keyword: &str) -> GuardResult<()> {
        let word = self.word();
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn quoted(&mut self, quote: char) -> GuardResult<String> {
        // opening quote already consumed
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos).copied() {
                None => return Err(self.error("unterminated quote")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    if self.chars.get(self.pos) == Some(&quote) {
                        out.push(quote);
                        self.pos += 1;
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn identifier(&mut self) -> GuardResult<String> {
        match self.peek() {
            Some(q @ ('"' | '`')) => {
                self.pos += 1;
                self.quoted(q)
            }
            Some(c) if c.is_alphanumeric() || c == '_' => Ok(self.word()),
            _ => Err(self.error("expected identifier")),
        }
    }

    fn tuple(&mut self) -> GuardResult<Vec<Value>> {
        self.expect('(')?;
        let mut values = vec![self.value()?];
        while self.eat(',') {
            values.push(self.value()?);
        }
        self.expect(')')?;
        Ok(values)
    }

    fn value(&mut self) -> GuardResult<Value> {
        match self.peek() {
            Some('\'') => {
                self.pos += 1;
                Ok(Value::Text(self.quoted('\'')?))
            }
            Some('x' | 'X') if self.chars.get(self.pos + 1) == Some(&'\'') => {
                self.pos += 2;
                let hex = self.quoted('\'')?;
                decode_hex(&hex)
                    .map(Value::Blob)
                    .ok_or_else(|| self.error("invalid blob literal"))
            }
            Some(_) => {
                let word = self.word();
                if word.eq_ignore_ascii_case("NULL") {
                    Ok(Value::Null)
                } else if let Ok(i) = word.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else if let Ok(r) = word.parse::<f64>() {
                    Ok(Value::Real(r))
                } else {
                    Err(self.error(format!("invalid literal '{word}'")))
                }
            }
            None => Err(self.error("expected value")),
        }
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
