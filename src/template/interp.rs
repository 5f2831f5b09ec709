//! Token-list interpreter.
//!
//! # Responsibilities
//! - Walk the flat token list once per rendered block
//! - Drive if/else-if/else chains and foreach loops with depth-matched
//!   block bounds
//! - Splice substitutions and operator results into the output
//!
//! # Design Decisions
//! - Block bounds are found by scanning tokens, not source text; a
//!   foreach iteration replays a token range, never re-lexes
//! - A discarded branch is skipped as a unit, so conditionals nested
//!   inside it cannot desynchronize the scanner

use super::lexer::{tokenize, Token};
use super::symbols::SymbolTable;
use super::{RenderError, RenderResult};

/// Render template source against a symbol table.
pub fn render(source: &str, syms: &mut SymbolTable) -> RenderResult<String> {
    let tokens = tokenize(source)?;
    let mut out = String::new();
    exec(&tokens, 0, tokens.len(), syms, &mut out)?;
    Ok(out)
}

/// How a branch block was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    ElseIf,
    Else,
    End,
}

/// Execute tokens in `[start, end)`, appending to `out`.
fn exec(
    tokens: &[Token],
    start: usize,
    end: usize,
    syms: &mut SymbolTable,
    out: &mut String,
) -> RenderResult<()> {
    let mut i = start;
    while i < end {
        match &tokens[i] {
            Token::Literal(text) => {
                out.push_str(text);
                i += 1;
            }
            Token::Subst(name) => {
                out.push_str(&syms.eval_string(name, &[])?);
                i += 1;
            }
            Token::Tag { op, args } => match op.as_str() {
                "if" => i = exec_if(tokens, i, end, syms, out)?,
                "foreach" => i = exec_foreach(tokens, i, end, syms, out)?,
                // Terminators are consumed by exec_if/exec_foreach; one
                // showing up here has no opening tag.
                "else-if" | "else" | "end" => return Err(RenderError::Invalid),
                _ => {
                    out.push_str(&syms.eval_string(op, args)?);
                    i += 1;
                }
            },
        }
    }
    Ok(())
}

/// Execute an if/else-if/else chain starting at the `if` tag.
/// Returns the index just past the matching `end`.
fn exec_if(
    tokens: &[Token],
    if_idx: usize,
    end: usize,
    syms: &mut SymbolTable,
    out: &mut String,
) -> RenderResult<usize> {
    let mut branch = if_idx;
    loop {
        let take = match &tokens[branch] {
            Token::Tag { op, args } if op == "if" || op == "else-if" => {
                match args.split_first() {
                    Some((name, rest)) => syms.eval_bool(name, rest)?,
                    None => return Err(RenderError::Invalid),
                }
            }
            Token::Tag { op, .. } if op == "else" => true,
            _ => return Err(RenderError::Invalid),
        };

        let (term_idx, term) = find_terminator(tokens, branch + 1, end)?;
        if take {
            exec(tokens, branch + 1, term_idx, syms, out)?;
            let end_idx = match term {
                Terminator::End => term_idx,
                _ => find_end(tokens, term_idx + 1, end)?,
            };
            return Ok(end_idx + 1);
        }
        match term {
            Terminator::End => return Ok(term_idx + 1),
            Terminator::ElseIf | Terminator::Else => branch = term_idx,
        }
    }
}

/// Execute `foreach <sym> in <arraySymbol>` starting at the tag.
/// Returns the index just past the matching `end`.
fn exec_foreach(
    tokens: &[Token],
    tag_idx: usize,
    end: usize,
    syms: &mut SymbolTable,
    out: &mut String,
) -> RenderResult<usize> {
    let Token::Tag { args, .. } = &tokens[tag_idx] else {
        return Err(RenderError::Invalid);
    };
    let [var, kw, array] = args.as_slice() else {
        return Err(RenderError::Invalid);
    };
    if kw != "in" {
        return Err(RenderError::Invalid);
    }

    let elements = syms.array(array)?.to_vec();
    let var = var.clone();
    let end_idx = find_end(tokens, tag_idx + 1, end)?;

    for element in elements {
        syms.register_string(var.clone(), element);
        exec(tokens, tag_idx + 1, end_idx, syms, out)?;
    }
    Ok(end_idx + 1)
}

/// Find the next `else-if`/`else`/`end` tag at the same block depth.
fn find_terminator(
    tokens: &[Token],
    from: usize,
    end: usize,
) -> RenderResult<(usize, Terminator)> {
    let mut depth = 0usize;
    for i in from..end {
        if let Token::Tag { op, .. } = &tokens[i] {
            match op.as_str() {
                "if" | "foreach" => depth += 1,
                "end" if depth == 0 => return Ok((i, Terminator::End)),
                "end" => depth -= 1,
                "else-if" if depth == 0 => return Ok((i, Terminator::ElseIf)),
                "else" if depth == 0 => return Ok((i, Terminator::Else)),
                _ => {}
            }
        }
    }
    Err(RenderError::Unterminated)
}

/// Find the matching `end` tag at the same block depth, ignoring
/// sibling else/else-if branches.
fn find_end(tokens: &[Token], from: usize, end: usize) -> RenderResult<usize> {
    let mut depth = 0usize;
    for i in from..end {
        if let Token::Tag { op, .. } = &tokens[i] {
            match op.as_str() {
                "if" | "foreach" => depth += 1,
                "end" if depth == 0 => return Ok(i),
                "end" => depth -= 1,
                _ => {}
            }
        }
    }
    Err(RenderError::Unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::with_defaults("test-agent")
    }

    #[test]
    fn test_literal_passthrough() {
        assert_eq!(render("plain text", &mut table()).unwrap(), "plain text");
    }

    #[test]
    fn test_substitution() {
        assert_eq!(render("ua=[user-agent]", &mut table()).unwrap(), "ua=test-agent");
    }

    #[test]
    fn test_unknown_symbol_not_found() {
        assert_eq!(render("[unknown]", &mut table()), Err(RenderError::NotFound));
    }

    #[test]
    fn test_if_false_takes_else() {
        let mut syms = table();
        syms.register_bool_fn("flag", |_, _| Ok(false));
        let out = render("[[if flag]]A[[else]]B[[end]]", &mut syms).unwrap();
        assert_eq!(out, "B");
    }

    #[test]
    fn test_if_true_skips_else() {
        let mut syms = table();
        syms.register_bool_fn("flag", |_, _| Ok(true));
        let out = render("[[if flag]]A[[else]]B[[end]]", &mut syms).unwrap();
        assert_eq!(out, "A");
    }

    #[test]
    fn test_else_if_chain() {
        let mut syms = table();
        let src = "[[if eq? a b]]1[[else-if eq? c c]]2[[else]]other[[end]]";
        assert_eq!(render(src, &mut syms).unwrap(), "2");

        let src = "[[if eq? a b]]1[[else-if eq? c d]]2[[else]]other[[end]]";
        assert_eq!(render(src, &mut syms).unwrap(), "other");
    }

    #[test]
    fn test_nested_if_inside_discarded_branch() {
        let mut syms = table();
        syms.register_bool_fn("no", |_, _| Ok(false));
        syms.register_bool_fn("yes", |_, _| Ok(true));
        let src = "[[if no]]x[[if yes]]y[[end]]z[[else]]ok[[end]]";
        assert_eq!(render(src, &mut syms).unwrap(), "ok");
    }

    #[test]
    fn test_nested_if_inside_taken_branch() {
        let mut syms = table();
        syms.register_bool_fn("yes", |_, _| Ok(true));
        let src = "[[if yes]]a[[if yes]]b[[end]]c[[else]]d[[end]]";
        assert_eq!(render(src, &mut syms).unwrap(), "abc");
    }

    #[test]
    fn test_foreach_renders_each_element() {
        let mut syms = table();
        syms.register_array(
            "titles",
            vec!["one".to_string(), "two".to_string(), "three".to_string()],
        );
        let out = render("[[foreach t in titles]]<li>[t]</li>[[end]]", &mut syms).unwrap();
        assert_eq!(out, "<li>one</li><li>two</li><li>three</li>");
    }

    #[test]
    fn test_foreach_empty_array_renders_nothing() {
        let mut syms = table();
        syms.register_array("titles", vec![]);
        let out = render("a[[foreach t in titles]]X[[end]]b", &mut syms).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_foreach_bad_shape_invalid() {
        let mut syms = table();
        syms.register_array("titles", vec!["x".to_string()]);
        assert_eq!(
            render("[[foreach t titles]]X[[end]]", &mut syms),
            Err(RenderError::Invalid)
        );
    }

    #[test]
    fn test_foreach_over_non_array_invalid() {
        let mut syms = table();
        syms.register_string("titles", "not an array");
        assert_eq!(
            render("[[foreach t in titles]]X[[end]]", &mut syms),
            Err(RenderError::Invalid)
        );
    }

    #[test]
    fn test_abort_unwinds() {
        let mut syms = table();
        assert_eq!(
            render("before[[abort]]after", &mut syms),
            Err(RenderError::Aborted)
        );
    }

    #[test]
    fn test_missing_end_unterminated() {
        let mut syms = table();
        syms.register_bool_fn("flag", |_, _| Ok(true));
        assert_eq!(
            render("[[if flag]]A", &mut syms),
            Err(RenderError::Unterminated)
        );
    }

    #[test]
    fn test_stray_end_invalid() {
        assert_eq!(render("[[end]]", &mut table()), Err(RenderError::Invalid));
    }

    #[test]
    fn test_xref_in_page() {
        let mut syms = table();
        syms.register_array("names".to_string(), vec!["A".into(), "B".into()]);
        syms.register_array("ids".to_string(), vec!["10".into(), "20".into()]);
        let out = render("[[xref 20 names ids]]", &mut syms).unwrap();
        assert_eq!(out, "B");
    }
}
