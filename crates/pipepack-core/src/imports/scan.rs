//! Import specifier scanner.
//!
//! Finds the string literals of ESM `import`/`export ... from` statements and
//! `import("...")` calls without full parsing. Comments, string literals,
//! template literals and regular expression literals are skipped, so text
//! that merely looks like an import inside them is never reported.

use std::ops::Range;

/// Kind of module reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `import x from "..."`, `import {a} from "..."`, `import "..."`.
    Import,
    /// `export {a} from "..."`, `export * from "..."`.
    Export,
    /// `import("...")` with a plain string literal argument.
    Dynamic,
}

/// Location of one specifier. `start..end` covers the text between the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierSpan {
    pub kind: SpecifierKind,
    pub start: usize,
    pub end: usize,
}

impl SpecifierSpan {
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The specifier text inside `source`.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.range()).unwrap_or("")
    }
}

/// Scan source code for import/export specifiers, in source order.
///
/// Offsets always fall on ASCII quote boundaries, so slicing `source` with
/// them is safe.
#[must_use]
pub fn scan_specifiers(source: &str) -> Vec<SpecifierSpan> {
    let mut scanner = Scanner::new(source.as_bytes());
    scanner.run();
    scanner.specs
}

/// Keywords after which a `/` starts a regular expression rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&[u8]] = &[
    b"return",
    b"typeof",
    b"instanceof",
    b"in",
    b"of",
    b"new",
    b"delete",
    b"void",
    b"throw",
    b"case",
    b"do",
    b"else",
    b"yield",
    b"await",
    b"default",
    b"extends",
];

/// Keywords whose parenthesized head may be followed by a regular expression.
const CONTROL_HEAD_KEYWORDS: &[&[u8]] = &[b"if", b"while", b"for", b"with"];

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    specs: Vec<SpecifierSpan>,
    /// One entry per open `${` in a template literal: the `{` depth inside it.
    templates: Vec<u32>,
    regex_allowed: bool,
    /// Previous token was a member-access `.`.
    after_dot: bool,
    /// Previous token was `if`, `while`, `for` or `with`.
    after_control: bool,
    /// One entry per open `(`: whether it opened a control statement head.
    parens: Vec<bool>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            specs: Vec::new(),
            templates: Vec::new(),
            regex_allowed: true,
            after_dot: false,
            after_control: false,
            parens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn run(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                b'/' => {
                    if self.regex_allowed {
                        self.skip_regex();
                        self.token(false);
                    } else {
                        self.pos += 1;
                        self.token(true);
                    }
                }
                b'\'' | b'"' => {
                    self.read_string();
                    self.token(false);
                }
                b'`' => {
                    self.pos += 1;
                    self.scan_template_body();
                    self.token(false);
                }
                b'{' => {
                    if let Some(depth) = self.templates.last_mut() {
                        *depth += 1;
                    }
                    self.pos += 1;
                    self.token(true);
                }
                b'}' => {
                    self.pos += 1;
                    if self.templates.last() == Some(&0) {
                        self.templates.pop();
                        self.scan_template_body();
                    } else if let Some(depth) = self.templates.last_mut() {
                        *depth -= 1;
                    }
                    self.token(false);
                }
                b'(' => {
                    self.parens.push(self.after_control);
                    self.pos += 1;
                    self.token(true);
                }
                b')' => {
                    self.pos += 1;
                    // `if (x) /re/` starts a regex, `f(x) / 2` divides
                    let closed_head = self.parens.pop().unwrap_or(false);
                    self.token(closed_head);
                }
                b']' => {
                    self.pos += 1;
                    self.token(false);
                }
                b'.' if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') => {
                    self.pos += 3;
                    self.token(true);
                }
                b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.skip_number();
                    self.token(false);
                }
                b'.' => {
                    self.pos += 1;
                    self.regex_allowed = false;
                    self.after_dot = true;
                }
                b'0'..=b'9' => {
                    self.skip_number();
                    self.token(false);
                }
                b if is_ident_start(b) => self.word(),
                _ => {
                    self.pos += 1;
                    self.token(true);
                }
            }
        }
    }

    /// Record that a token other than `.` was consumed.
    fn token(&mut self, regex_allowed: bool) {
        self.regex_allowed = regex_allowed;
        self.after_dot = false;
        self.after_control = false;
    }

    fn word(&mut self) {
        let member = self.after_dot;
        let src = self.src;
        let start = self.pos;
        self.skip_word();
        let word = &src[start..self.pos];

        if !member {
            if word == b"import" {
                self.scan_import();
                return;
            }
            if word == b"export" {
                self.scan_export();
                return;
            }
        }

        let regex_allowed = !member && REGEX_PREFIX_KEYWORDS.iter().any(|k| *k == word);
        self.token(regex_allowed);
        self.after_control = !member && CONTROL_HEAD_KEYWORDS.iter().any(|k| *k == word);
    }

    /// Called with `pos` just past the `import` keyword.
    fn scan_import(&mut self) {
        let after_keyword = self.pos;
        self.skip_trivia();

        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.skip_trivia();
                if matches!(self.peek(), Some(b'\'' | b'"')) {
                    if let Some(range) = self.read_string() {
                        self.skip_trivia();
                        if matches!(self.peek(), Some(b')' | b',')) {
                            self.push(SpecifierKind::Dynamic, range);
                        }
                        self.parens.push(false);
                        self.token(false);
                        return;
                    }
                }
                // Computed specifier: let the main loop walk the arguments.
                self.pos = after_keyword;
                self.token(false);
            }
            Some(b'\'' | b'"') => {
                if let Some(range) = self.read_string() {
                    self.push(SpecifierKind::Import, range);
                }
                self.token(false);
            }
            _ => {
                if !self.scan_import_clause() {
                    // `import.meta`, TS `import x = require(...)` and the like
                    self.pos = after_keyword;
                }
                self.token(false);
            }
        }
    }

    /// Walk `x, {a as b}, * as ns, type T` up to `from "..."`.
    fn scan_import_clause(&mut self) -> bool {
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'{') => {
                    if !self.skip_braces() {
                        return false;
                    }
                }
                Some(b'*' | b',') => self.pos += 1,
                Some(b) if is_ident_start(b) => {
                    let start = self.pos;
                    self.skip_word();
                    if &self.src[start..self.pos] == b"from" && self.scan_from_literal(SpecifierKind::Import) {
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Called with `pos` just past the `export` keyword.
    fn scan_export(&mut self) {
        let after_keyword = self.pos;
        self.skip_trivia();

        if self.at_word(b"type") {
            self.pos += 4;
            self.skip_trivia();
        }

        let found = match self.peek() {
            Some(b'*') => {
                self.pos += 1;
                self.skip_trivia();
                if self.at_word(b"as") {
                    self.pos += 2;
                    self.skip_trivia();
                    match self.peek() {
                        Some(b'\'' | b'"') => {
                            self.read_string();
                        }
                        Some(b) if is_ident_start(b) => self.skip_word(),
                        _ => {}
                    }
                    self.skip_trivia();
                }
                self.expect_from_literal()
            }
            Some(b'{') => self.skip_braces() && {
                self.skip_trivia();
                self.expect_from_literal()
            },
            _ => false,
        };

        if !found {
            // `export const`, `export default`, a local `export {a}`: scan on normally.
            self.pos = after_keyword;
        }
        self.token(!found);
    }

    fn expect_from_literal(&mut self) -> bool {
        if !self.at_word(b"from") {
            return false;
        }
        self.pos += 4;
        self.scan_from_literal(SpecifierKind::Export)
    }

    /// Called just past a `from` keyword: read the literal, if there is one.
    fn scan_from_literal(&mut self, kind: SpecifierKind) -> bool {
        let after_from = self.pos;
        self.skip_trivia();
        if matches!(self.peek(), Some(b'\'' | b'"')) {
            if let Some(range) = self.read_string() {
                self.push(kind, range);
                return true;
            }
        }
        self.pos = after_from;
        false
    }

    fn push(&mut self, kind: SpecifierKind, range: Range<usize>) {
        self.specs.push(SpecifierSpan {
            kind,
            start: range.start,
            end: range.end,
        });
    }

    fn at_word(&self, word: &[u8]) -> bool {
        self.src.get(self.pos..).is_some_and(|rest| rest.starts_with(word))
            && !self
                .src
                .get(self.pos + word.len())
                .copied()
                .is_some_and(is_ident_continue)
    }

    fn skip_word(&mut self) {
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
    }

    fn skip_number(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'.' || c == b'_')
        {
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != b'\n') {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'*' && self.peek_at(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    /// Read a `'...'` or `"..."` literal at `pos`. Returns the content range,
    /// or `None` for an unterminated literal (left at the offending newline).
    fn read_string(&mut self) -> Option<Range<usize>> {
        let quote = self.src[self.pos];
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return None,
                _ if b == quote => {
                    let end = self.pos;
                    self.pos += 1;
                    return Some(start..end);
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
        None
    }

    /// Skip template text up to the closing backtick or the next `${`.
    fn scan_template_body(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek_at(1) == Some(b'{') => {
                    self.pos += 2;
                    self.templates.push(0);
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
    }

    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return,
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    self.skip_word();
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
    }

    /// Skip a balanced `{...}` starting at `pos`. Strings and comments inside are honored.
    fn skip_braces(&mut self) -> bool {
        let mut depth = 0u32;
        while let Some(b) = self.peek() {
            match b {
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    self.pos += 1;
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return true;
                    }
                }
                b'\'' | b'"' => {
                    if self.read_string().is_none() {
                        return false;
                    }
                }
                b'/' if matches!(self.peek_at(1), Some(b'/' | b'*')) => self.skip_trivia(),
                _ => self.pos += 1,
            }
        }
        false
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}
