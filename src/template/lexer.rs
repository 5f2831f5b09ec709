//! Single-pass tokenizer for template source.
//!
//! # Responsibilities
//! - Split source into literal runs, `[name]` substitutions, and
//!   `[[op a b ...]]` tags
//! - Apply the tag argument rules: space-split, `'...'` quoting with
//!   spaces allowed inside, `\` escapes the following character
//!
//! # Design Decisions
//! - Unclosed brackets and quotes fail the whole render; there is no
//!   literal fallback for half-open syntax
//! - A `]]` terminates the tag wherever it appears outside quotes

use super::{RenderError, RenderResult};

/// One element of tokenized template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Verbatim output.
    Literal(String),
    /// `[name]` — splice a string-valued symbol.
    Subst(String),
    /// `[[op a b ...]]` — operator with parsed arguments.
    Tag { op: String, args: Vec<String> },
}

/// Tokenize template source in one left-to-right pass.
pub fn tokenize(source: &str) -> RenderResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '[' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        if i + 1 < chars.len() && chars[i + 1] == '[' {
            let (mut args, next) = scan_tag(&chars, i + 2)?;
            if args.is_empty() {
                return Err(RenderError::Invalid);
            }
            let op = args.remove(0);
            tokens.push(Token::Tag { op, args });
            i = next;
        } else {
            let (name, next) = scan_subst(&chars, i + 1)?;
            tokens.push(Token::Subst(name));
            i = next;
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

/// Scan a `[name]` reference starting after the opening bracket.
fn scan_subst(chars: &[char], mut i: usize) -> RenderResult<(String, usize)> {
    let mut name = String::new();
    loop {
        match chars.get(i) {
            None => return Err(RenderError::Unterminated),
            Some(']') => return Ok((name, i + 1)),
            Some(c) => {
                name.push(*c);
                i += 1;
            }
        }
    }
}

/// Scan a tag body starting after `[[`, returning the split arguments
/// and the index just past the closing `]]`.
fn scan_tag(chars: &[char], mut i: usize) -> RenderResult<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut pending = false;

    loop {
        match chars.get(i) {
            None => return Err(RenderError::Unterminated),
            Some(']') if chars.get(i + 1) == Some(&']') => {
                if pending {
                    args.push(current);
                }
                return Ok((args, i + 2));
            }
            Some('\'') => {
                i += 1;
                pending = true;
                loop {
                    match chars.get(i) {
                        None => return Err(RenderError::Unterminated),
                        Some('\'') => break,
                        Some('\\') => {
                            i += 1;
                            match chars.get(i) {
                                None => return Err(RenderError::Unterminated),
                                Some(c) => current.push(*c),
                            }
                        }
                        Some(c) => current.push(*c),
                    }
                    i += 1;
                }
                i += 1;
            }
            Some('\\') => {
                i += 1;
                match chars.get(i) {
                    None => return Err(RenderError::Unterminated),
                    Some(c) => {
                        current.push(*c);
                        pending = true;
                        i += 1;
                    }
                }
            }
            Some(c) if c.is_whitespace() => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
                i += 1;
            }
            Some(c) => {
                current.push(*c);
                pending = true;
                i += 1;
            }
        }
    }
}
