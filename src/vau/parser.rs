// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/parser.rs

// Reads program text into terms.

// <>

use std::iter;
use std::str;

use super::core::Value;
use super::error::{Error, Result};

/// Parses every term in `code`, in order
pub fn parse(code: &str) -> Result<Vec<Value>> {
    let mut reader = Reader::new(code);
    let mut out = Vec::new();

    loop {
        match reader.read_item()? {
            Item::Value(value) => out.push(value),
            Item::End => return Ok(out),
            Item::Close => return Err(reader.error("unexpected )")),
            Item::Dot => return Err(reader.error("unexpected .")),
        }
    }
}

/// Parses text holding exactly one term
pub fn parse_one(code: &str) -> Result<Value> {
    let mut terms = parse(code)?;
    match terms.len() {
        1 => Ok(terms.remove(0)),
        n => Err(Error::Read {
            line: 1,
            msg: format!("expected one term, found {}", n),
        }),
    }
}

/// Net number of open parentheses in `code`, ignoring strings,
/// character literals and comments
pub fn open_depth(code: &str) -> i64 {
    let mut depth = 0;
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '#' if chars.peek() == Some(&'\\') => {
                chars.next();
                chars.next();
            }
            _ => {}
        }
    }

    depth
}

enum Item {
    Value(Value),
    Close,
    Dot,
    End,
}

struct Reader<'a> {
    chars: iter::Peekable<str::Chars<'a>>,
    line: usize,
}

fn delimiter_p(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\'' | '`' | ',')
}

fn symbol_initial_p(c: char) -> bool {
    c.is_ascii_alphabetic() || "+-*^?!<=>_~/$%&:".contains(c)
}

fn symbol_subsequent_p(c: char) -> bool {
    symbol_initial_p(c) || c.is_ascii_digit() || c == '.'
}

impl<'a> Reader<'a> {
    fn new(code: &'a str) -> Self {
        Reader {
            chars: code.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::Read {
            line: self.line,
            msg: msg.into(),
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Skips whitespace and comments
    fn skip_atmosphere(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while let Some(c) = self.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.next();
            } else {
                break;
            }
        }
    }

    /// Returns the next complete item in the stream
    /// The appropriate reader can almost always be deduced from the first character
    fn read_item(&mut self) -> Result<Item> {
        self.skip_atmosphere();

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Item::End),
        };

        let value = match c {
            '(' => {
                self.next();
                self.read_list()?
            }
            ')' => {
                self.next();
                return Ok(Item::Close);
            }
            '\'' => {
                self.next();
                self.read_quote("quote")?
            }
            '`' => {
                self.next();
                self.read_quote("quasiquote")?
            }
            ',' => {
                self.next();
                if self.peek() == Some('@') {
                    self.next();
                    self.read_quote("unquote-splicing")?
                } else {
                    self.read_quote("unquote")?
                }
            }
            '"' => {
                self.next();
                self.read_string()?
            }
            '#' => {
                self.next();
                self.read_special()?
            }
            _ => {
                let token = self.read_token();
                if token == "." {
                    return Ok(Item::Dot);
                }
                self.read_atom(&token)?
            }
        };

        Ok(Item::Value(value))
    }

    /// Reads one full term, failing at the end of input
    fn read_value(&mut self) -> Result<Value> {
        match self.read_item()? {
            Item::Value(value) => Ok(value),
            Item::End => Err(self.error("unexpected end of input")),
            Item::Close => Err(self.error("unexpected )")),
            Item::Dot => Err(self.error("unexpected .")),
        }
    }

    fn read_quote(&mut self, head: &str) -> Result<Value> {
        let quoted = self.read_value()?;
        Ok(Value::list(vec![Value::sym(head), quoted]))
    }

    fn read_list(&mut self) -> Result<Value> {
        let mut items = Vec::new();

        loop {
            match self.read_item()? {
                Item::Value(value) => items.push(value),
                Item::Close => return Ok(Value::list(items)),
                Item::Dot => {
                    if items.is_empty() {
                        return Err(self.error("nothing before . in list"));
                    }
                    let tail = self.read_value()?;
                    return match self.read_item()? {
                        Item::Close => Ok(Value::list_with_tail(items, tail)),
                        _ => Err(self.error("expected ) after dotted tail")),
                    };
                }
                Item::End => return Err(self.error("unterminated list")),
            }
        }
    }

    fn read_string(&mut self) -> Result<Value> {
        let mut acc = String::new();

        loop {
            match self.next() {
                Some('"') => return Ok(Value::string(&acc)),
                Some('\\') => match self.next() {
                    Some('n') => acc.push('\n'),
                    Some('t') => acc.push('\t'),
                    Some(c) => acc.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => acc.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    /// Booleans and character literals
    fn read_special(&mut self) -> Result<Value> {
        match self.peek() {
            Some('\\') => {
                self.next();
                let first = self
                    .next()
                    .ok_or_else(|| self.error("unterminated character literal"))?;
                let mut name = String::from(first);
                while let Some(c) = self.peek() {
                    if delimiter_p(c) {
                        break;
                    }
                    name.push(c);
                    self.next();
                }

                let ch = match name.to_lowercase().as_str() {
                    _ if name.chars().count() == 1 => first,
                    "space" => ' ',
                    "newline" => '\n',
                    "tab" => '\t',
                    _ => return Err(self.error(format!("unknown character #\\{}", name))),
                };
                Ok(Value::string(ch.encode_utf8(&mut [0; 4])))
            }
            Some(_) => match self.read_token().as_str() {
                "t" | "T" => Ok(Value::Bool(true)),
                "f" | "F" => Ok(Value::Bool(false)),
                other => Err(self.error(format!("unknown syntax #{}", other))),
            },
            None => Err(self.error("unexpected end of input after #")),
        }
    }

    /// Collects characters up to the next delimiter
    fn read_token(&mut self) -> String {
        let mut acc = String::new();
        while let Some(c) = self.peek() {
            if delimiter_p(c) {
                break;
            }
            acc.push(c);
            self.next();
        }
        acc
    }

    fn read_atom(&self, token: &str) -> Result<Value> {
        if token.eq_ignore_ascii_case("nil") {
            return Ok(Value::Nil);
        }

        let digits = token.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(token);
        if digits.starts_with(|c: char| c.is_ascii_digit()) {
            return self.read_number(token);
        }

        let mut chars = token.chars();
        let valid = chars.next().map_or(false, symbol_initial_p) && chars.all(symbol_subsequent_p);
        if valid {
            Ok(Value::sym(token))
        } else {
            Err(self.error(format!("invalid symbol {}", token)))
        }
    }

    fn read_number(&self, token: &str) -> Result<Value> {
        if !token.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
            if let Ok(i) = token.parse::<i64>() {
                return Ok(Value::int(i));
            }
        }
        token
            .parse::<f64>()
            .map(Value::real)
            .map_err(|_| self.error(format!("invalid number {}", token)))
    }
}
