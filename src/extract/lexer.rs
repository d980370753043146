//! Character-level scanning of PHP source: comment/string classification,
//! bracket balance, and statement splitting.
//!
//! This is deliberately shallow. It knows enough about `//`, `#`, `/* */`,
//! and quoted strings to avoid miscounting brackets inside them, and nothing
//! about heredocs or PHP grammar.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharKind {
    Code,
    Str,
    Comment,
}

#[derive(Debug, Clone, Copy)]
struct Classified {
    ch: char,
    kind: CharKind,
    line: usize,
}

/// A statement ended by `;`, `{` or `}` outside strings and comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Statement text with comments blanked out and whitespace collapsed.
    pub text: String,
    /// 1-based line of the statement's first character.
    pub line: usize,
}

/// First bracket mismatch in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceError {
    pub line: usize,
    pub message: String,
}

fn classify(source: &str) -> Vec<Classified> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Single,
        Double,
    }

    let chars: Vec<char> = source.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut state = State::Code;
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        let mut push = |ch: char, kind: CharKind, line: usize| out.push(Classified { ch, kind, line });

        match state {
            State::Code => match (ch, next) {
                ('/', Some('/')) => {
                    state = State::LineComment;
                    push(ch, CharKind::Comment, line);
                }
                ('#', n) if n != Some('[') => {
                    state = State::LineComment;
                    push(ch, CharKind::Comment, line);
                }
                ('/', Some('*')) => {
                    state = State::BlockComment;
                    push(ch, CharKind::Comment, line);
                    push('*', CharKind::Comment, line);
                    i += 1;
                }
                ('\'', _) => {
                    state = State::Single;
                    push(ch, CharKind::Str, line);
                }
                ('"', _) => {
                    state = State::Double;
                    push(ch, CharKind::Str, line);
                }
                _ => push(ch, CharKind::Code, line),
            },
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                    push(ch, CharKind::Code, line);
                } else {
                    push(ch, CharKind::Comment, line);
                }
            }
            State::BlockComment => {
                push(ch, CharKind::Comment, line);
                if ch == '*' && next == Some('/') {
                    push('/', CharKind::Comment, line);
                    i += 1;
                    state = State::Code;
                }
            }
            State::Single | State::Double => {
                let quote = if state == State::Single { '\'' } else { '"' };
                push(ch, CharKind::Str, line);
                if ch == '\\' {
                    if let Some(escaped) = next {
                        push(escaped, CharKind::Str, line);
                        if escaped == '\n' {
                            line += 1;
                        }
                        i += 1;
                    }
                } else if ch == quote {
                    state = State::Code;
                }
            }
        }

        if ch == '\n' {
            line += 1;
        }
        i += 1;
    }

    out
}

/// True if the source contains at least one comment.
pub fn has_comments(source: &str) -> bool {
    classify(source).iter().any(|c| c.kind == CharKind::Comment)
}

/// The source with string and comment contents blanked to spaces. Byte
/// offsets and line breaks are preserved, so matches on the result map back
/// onto the original text.
pub fn mask_non_code(source: &str) -> String {
    let mut masked = String::with_capacity(source.len());
    for c in classify(source) {
        match c.kind {
            CharKind::Code => masked.push(c.ch),
            _ if c.ch == '\n' => masked.push('\n'),
            _ => masked.extend(std::iter::repeat(' ').take(c.ch.len_utf8())),
        }
    }
    masked
}

/// Find the first unbalanced `()`, `[]` or `{}` outside strings and comments.
pub fn check_balance(source: &str) -> Option<BalanceError> {
    let mut stack: Vec<(char, usize)> = Vec::new();

    for c in classify(source).into_iter().filter(|c| c.kind == CharKind::Code) {
        match c.ch {
            '(' | '[' | '{' => stack.push((c.ch, c.line)),
            ')' | ']' | '}' => {
                let expected_open = match c.ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected_open => {}
                    Some((open, open_line)) => {
                        return Some(BalanceError {
                            line: c.line,
                            message: format!(
                                "unexpected '{}' while '{}' from line {} is still open",
                                c.ch, open, open_line
                            ),
                        });
                    }
                    None => {
                        return Some(BalanceError {
                            line: c.line,
                            message: format!("unmatched '{}'", c.ch),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    stack.pop().map(|(open, line)| BalanceError {
        line,
        message: format!("'{}' opened here is never closed", open),
    })
}

/// Split source into statements at `;`, `{` and `}` in code.
pub fn split_statements(source: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut start_line: Option<usize> = None;

    let mut flush = |current: &mut String, start_line: &mut Option<usize>| {
        let text = collapse_whitespace(current);
        if let Some(line) = start_line.take() {
            if text.chars().any(|c| c.is_alphanumeric()) {
                statements.push(Statement { text, line });
            }
        }
        current.clear();
    };

    for c in classify(source) {
        match c.kind {
            CharKind::Code if matches!(c.ch, ';' | '{' | '}') => {
                flush(&mut current, &mut start_line);
            }
            CharKind::Comment => current.push(' '),
            _ => {
                if start_line.is_none() && !c.ch.is_whitespace() {
                    start_line = Some(c.line);
                }
                current.push(c.ch);
            }
        }
    }
    flush(&mut current, &mut start_line);

    statements
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
