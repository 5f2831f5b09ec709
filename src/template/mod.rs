//! Template rendering for dynamic admin pages.
//!
//! # Data Flow
//! ```text
//! .tpl bytes (from the file cache)
//!     → lexer.rs (one tokenize pass: literals, [name] substitutions,
//!       [[op ...]] tags)
//!     → interp.rs (flat token walk with depth-matched block scanning)
//!     → symbols.rs (symbol table: arrays, strings, bool/string operators)
//!     → rendered page, or a numeric failure code for the 500 page
//! ```
//!
//! # Design Decisions
//! - Tokenize once, interpret the flat list; the source text is never
//!   re-scanned, even across foreach iterations
//! - Branch skipping counts block depth, so conditionals nested inside a
//!   discarded branch are skipped as a unit
//! - abort unwinds the interpreter as an error; partial output is thrown
//!   away

pub mod interp;
pub mod lexer;
pub mod symbols;

pub use interp::render;
pub use symbols::{SymbolTable, TemplSym};

/// Rendering failure, with the numeric code the HTTP 500 page reports.
/// A successful render is code 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    /// An operator abandoned the render.
    Aborted,
    /// Unclosed bracket or quote in the source.
    Unterminated,
    /// Reference to a symbol that is not registered.
    NotFound,
    /// Bad arity, wrong symbol type, or stray control tag.
    Invalid,
}

impl RenderError {
    /// Numeric code, as reported by the 500 page.
    pub fn code(&self) -> u8 {
        match self {
            RenderError::Aborted => 1,
            RenderError::Unterminated => 2,
            RenderError::NotFound => 3,
            RenderError::Invalid => 4,
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Aborted => write!(f, "rendering aborted"),
            RenderError::Unterminated => write!(f, "unterminated bracket or quote"),
            RenderError::NotFound => write!(f, "unknown symbol"),
            RenderError::Invalid => write!(f, "invalid operator use"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;
