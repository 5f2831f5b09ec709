//! Symbol table for template rendering.
//!
//! # Responsibilities
//! - Hold named values: constant arrays/strings and boolean/string
//!   operator callbacks
//! - Evaluate references with the arity and type rules the interpreter
//!   relies on
//! - Register the default operators every page gets
//!
//! # Design Decisions
//! - Registering a name replaces (and drops) the prior value; names never
//!   alias a payload
//! - Callbacks receive the table itself so operators can evaluate other
//!   symbols

use std::collections::HashMap;

use super::{RenderError, RenderResult};

/// Boolean operator callback.
pub type BoolCallback = Box<dyn Fn(&SymbolTable, &[String]) -> RenderResult<bool> + Send + Sync>;

/// String operator callback.
pub type StrCallback = Box<dyn Fn(&SymbolTable, &[String]) -> RenderResult<String> + Send + Sync>;

/// A registered template symbol.
pub enum TemplSym {
    ConstArray(Vec<String>),
    ConstString(String),
    BoolFn(BoolCallback),
    StrFn(StrCallback),
}

/// Named symbols visible to one render.
#[derive(Default)]
pub struct SymbolTable {
    syms: HashMap<String, TemplSym>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-loaded with the default operators and the requesting
    /// client's User-Agent value.
    pub fn with_defaults(user_agent: &str) -> Self {
        let mut table = Self::new();
        table.register_string("user-agent", user_agent);
        table.register_bool_fn("not?", |syms, args| match args.split_first() {
            Some((name, rest)) => Ok(!syms.eval_bool(name, rest)?),
            None => Err(RenderError::Invalid),
        });
        table.register_bool_fn("eq?", |_, args| match args {
            [a, b] => Ok(a == b),
            _ => Err(RenderError::Invalid),
        });
        table.register_str_fn("xref", |syms, args| {
            let [needle, from, via] = args else {
                return Err(RenderError::Invalid);
            };
            let from = syms.array(from)?;
            let via = syms.array(via)?;
            match via.iter().position(|v| v == needle) {
                Some(i) => from.get(i).cloned().ok_or(RenderError::NotFound),
                None => Err(RenderError::NotFound),
            }
        });
        table.register_str_fn("abort", |_, _| Err(RenderError::Aborted));
        table
    }

    /// Register a symbol, replacing any prior value under the name.
    pub fn register(&mut self, name: impl Into<String>, sym: TemplSym) {
        self.syms.insert(name.into(), sym);
    }

    pub fn register_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.register(name, TemplSym::ConstString(value.into()));
    }

    pub fn register_array(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.register(name, TemplSym::ConstArray(values));
    }

    pub fn register_bool_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&SymbolTable, &[String]) -> RenderResult<bool> + Send + Sync + 'static,
    {
        self.register(name, TemplSym::BoolFn(Box::new(f)));
    }

    pub fn register_str_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&SymbolTable, &[String]) -> RenderResult<String> + Send + Sync + 'static,
    {
        self.register(name, TemplSym::StrFn(Box::new(f)));
    }

    /// Evaluate a boolean-valued symbol.
    pub fn eval_bool(&self, name: &str, args: &[String]) -> RenderResult<bool> {
        match self.syms.get(name) {
            None => Err(RenderError::NotFound),
            Some(TemplSym::BoolFn(f)) => f(self, args),
            Some(_) => Err(RenderError::Invalid),
        }
    }

    /// Evaluate a string-valued symbol.
    pub fn eval_string(&self, name: &str, args: &[String]) -> RenderResult<String> {
        match self.syms.get(name) {
            None => Err(RenderError::NotFound),
            Some(TemplSym::ConstString(s)) => {
                if args.is_empty() {
                    Ok(s.clone())
                } else {
                    Err(RenderError::Invalid)
                }
            }
            Some(TemplSym::StrFn(f)) => f(self, args),
            Some(_) => Err(RenderError::Invalid),
        }
    }

    /// Resolve an array-valued symbol.
    pub fn array(&self, name: &str) -> RenderResult<&[String]> {
        match self.syms.get(name) {
            None => Err(RenderError::NotFound),
            Some(TemplSym::ConstArray(v)) => Ok(v),
            Some(_) => Err(RenderError::Invalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_replaces() {
        let mut table = SymbolTable::new();
        table.register_string("x", "old");
        table.register_string("x", "new");
        assert_eq!(table.eval_string("x", &[]).unwrap(), "new");
    }

    #[test]
    fn test_unknown_symbol() {
        let table = SymbolTable::new();
        assert_eq!(table.eval_string("nope", &[]), Err(RenderError::NotFound));
        assert_eq!(table.eval_bool("nope", &[]), Err(RenderError::NotFound));
    }

    #[test]
    fn test_type_mismatch_is_invalid() {
        let mut table = SymbolTable::new();
        table.register_array("list", strings(&["a"]));
        assert_eq!(table.eval_string("list", &[]), Err(RenderError::Invalid));
        assert_eq!(table.eval_bool("list", &[]), Err(RenderError::Invalid));
    }

    #[test]
    fn test_eq_operator() {
        let table = SymbolTable::with_defaults("");
        assert!(table.eval_bool("eq?", &strings(&["a", "a"])).unwrap());
        assert!(!table.eval_bool("eq?", &strings(&["a", "b"])).unwrap());
        assert_eq!(
            table.eval_bool("eq?", &strings(&["a"])),
            Err(RenderError::Invalid)
        );
    }

    #[test]
    fn test_not_operator_negates_symbol() {
        let mut table = SymbolTable::with_defaults("");
        table.register_bool_fn("yes", |_, _| Ok(true));
        assert!(!table.eval_bool("not?", &strings(&["yes"])).unwrap());
        assert_eq!(table.eval_bool("not?", &[]), Err(RenderError::Invalid));
    }

    #[test]
    fn test_xref_aligned_lookup() {
        let mut table = SymbolTable::with_defaults("");
        table.register_array("names", strings(&["Zelda", "Mario"]));
        table.register_array("ids", strings(&["1", "2"]));

        assert_eq!(
            table.eval_string("xref", &strings(&["2", "names", "ids"])).unwrap(),
            "Mario"
        );
        assert_eq!(
            table.eval_string("xref", &strings(&["9", "names", "ids"])),
            Err(RenderError::NotFound)
        );
    }

    #[test]
    fn test_xref_requires_arrays() {
        let mut table = SymbolTable::with_defaults("");
        table.register_array("names", strings(&["a"]));
        table.register_string("ids", "not an array");
        assert_eq!(
            table.eval_string("xref", &strings(&["a", "names", "ids"])),
            Err(RenderError::Invalid)
        );
    }

    #[test]
    fn test_abort() {
        let table = SymbolTable::with_defaults("");
        assert_eq!(table.eval_string("abort", &[]), Err(RenderError::Aborted));
    }

    #[test]
    fn test_user_agent_default() {
        let table = SymbolTable::with_defaults("curl/8.0");
        assert_eq!(table.eval_string("user-agent", &[]).unwrap(), "curl/8.0");
    }
}
