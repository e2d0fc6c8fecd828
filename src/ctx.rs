//! Shared interpreter context: the string interner and the keyword table.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::token::TokenKind;

/// An interned identifier name.
///
/// Symbols produced by the same [`Context`] are unique per spelling, so they
/// compare by address rather than by content.
#[derive(Debug, Clone, Hash)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State shared by the lexer, parser and evaluator of one interpreter
/// session: interned symbols and the keyword lookup consulted after an
/// identifier has been scanned.
///
/// Returned behind an `Rc` because several pipeline stages hold it at once.
#[derive(Debug)]
pub struct Context {
    symbols: RefCell<HashSet<Symbol>>,
    keywords: HashMap<Symbol, TokenKind>,
}

impl Context {
    pub fn new() -> Rc<Context> {
        let mut symbols = HashSet::new();
        let mut keywords = HashMap::new();
        for (name, kind) in KEYWORDS {
            keywords.insert(intern(&mut symbols, name), kind);
        }
        Rc::new(Context {
            symbols: RefCell::new(symbols),
            keywords,
        })
    }

    /// Intern `name` if needed and return its symbol.
    pub fn symbol(&self, name: &str) -> Symbol {
        intern(&mut self.symbols.borrow_mut(), name)
    }

    /// The token kind reserved for `sym`, if it is a keyword.
    pub fn keyword(&self, sym: &Symbol) -> Option<TokenKind> {
        self.keywords.get(sym).copied()
    }
}

fn intern(symbols: &mut HashSet<Symbol>, name: &str) -> Symbol {
    if let Some(sym) = symbols.get(name) {
        sym.clone()
    } else {
        let sym = Symbol(Rc::from(name));
        symbols.insert(sym.clone());
        sym
    }
}

const KEYWORDS: [(&str, TokenKind); 7] = [
    ("fn", TokenKind::Function),
    ("let", TokenKind::Let),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("return", TokenKind::Return),
];
