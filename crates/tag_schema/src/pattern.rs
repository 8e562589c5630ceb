//! The child-sequence pattern language
//!
//! A tiny regular language over role names: whitespace-separated atoms with
//! postfix `?`, `*`, `+`, parenthesized grouping, and implicit
//! concatenation. `full_match` accepts iff the entire sequence is consumed.
//!
//! Matching computes the set of reachable end positions rather than walking
//! a single greedy cursor, so `+` followed by further atoms backtracks
//! correctly and zero-width repetitions cannot loop.

use crate::PatternError;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ast {
    Atom(String),
    Seq(Vec<Ast>),
    Opt(Box<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
}

/// A compiled child-sequence pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    ast: Ast,
    source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PToken {
    Atom(String),
    Open,
    Close,
    Quant(char),
}

fn tokenize(src: &str) -> Result<Vec<(PToken, usize)>, PatternError> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push((PToken::Open, pos));
            }
            ')' => {
                chars.next();
                out.push((PToken::Close, pos));
            }
            '?' | '*' | '+' => {
                chars.next();
                out.push((PToken::Quant(c), pos));
            }
            _ => {
                let mut atom = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '?' | '*' | '+') {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                out.push((PToken::Atom(atom), pos));
            }
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<(PToken, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(PToken, usize)> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<(PToken, usize)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    /// seq := term+
    fn parse_seq(&mut self) -> Result<Ast, PatternError> {
        let mut terms = Vec::new();
        while let Some((tok, _)) = self.peek() {
            match tok {
                PToken::Close => break,
                _ => terms.push(self.parse_term()?),
            }
        }
        match terms.len() {
            0 => Err(PatternError::Empty),
            1 => Ok(terms.remove(0)),
            _ => Ok(Ast::Seq(terms)),
        }
    }

    /// term := factor quantifier*
    fn parse_term(&mut self) -> Result<Ast, PatternError> {
        let mut ast = self.parse_factor()?;
        while let Some((PToken::Quant(q), _)) = self.peek() {
            let q = *q;
            self.bump();
            ast = match q {
                '?' => Ast::Opt(Box::new(ast)),
                '*' => Ast::Star(Box::new(ast)),
                _ => Ast::Plus(Box::new(ast)),
            };
        }
        Ok(ast)
    }

    /// factor := atom | '(' seq ')'
    fn parse_factor(&mut self) -> Result<Ast, PatternError> {
        match self.bump() {
            Some((PToken::Atom(a), _)) => Ok(Ast::Atom(a)),
            Some((PToken::Open, open_pos)) => {
                let inner = self.parse_seq()?;
                match self.bump() {
                    Some((PToken::Close, _)) => Ok(inner),
                    _ => Err(PatternError::UnbalancedParen { pos: open_pos }),
                }
            }
            Some((PToken::Close, pos)) => Err(PatternError::UnexpectedToken {
                pos,
                found: ")".to_string(),
            }),
            Some((PToken::Quant(q), pos)) => Err(PatternError::DanglingQuantifier {
                pos,
                quantifier: q,
            }),
            None => Err(PatternError::Empty),
        }
    }
}

impl Pattern {
    /// Compile a pattern source
    pub fn compile(source: &str) -> Result<Pattern, PatternError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(PatternError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.parse_seq()?;
        if let Some((tok, pos)) = parser.peek() {
            return Err(PatternError::UnexpectedToken {
                pos: *pos,
                found: match tok {
                    PToken::Close => ")".to_string(),
                    PToken::Open => "(".to_string(),
                    PToken::Quant(q) => q.to_string(),
                    PToken::Atom(a) => a.clone(),
                },
            });
        }
        Ok(Pattern {
            ast,
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True iff the whole sequence matches the pattern
    pub fn full_match<S: AsRef<str>>(&self, sequence: &[S]) -> bool {
        let seq: Vec<&str> = sequence.iter().map(AsRef::as_ref).collect();
        ends(&self.ast, &seq, 0).contains(&seq.len())
    }

    /// Every atom the pattern mentions, in source order
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_atoms(&self.ast, &mut out);
        out
    }
}

fn collect_atoms<'a>(ast: &'a Ast, out: &mut Vec<&'a str>) {
    match ast {
        Ast::Atom(a) => out.push(a),
        Ast::Seq(items) => items.iter().for_each(|i| collect_atoms(i, out)),
        Ast::Opt(inner) | Ast::Star(inner) | Ast::Plus(inner) => collect_atoms(inner, out),
    }
}

/// Positions reachable after matching `ast` starting at `start`
fn ends(ast: &Ast, seq: &[&str], start: usize) -> BTreeSet<usize> {
    match ast {
        Ast::Atom(a) => {
            let mut out = BTreeSet::new();
            if seq.get(start) == Some(&a.as_str()) {
                out.insert(start + 1);
            }
            out
        }
        Ast::Seq(items) => {
            let mut current: BTreeSet<usize> = [start].into_iter().collect();
            for item in items {
                let mut next = BTreeSet::new();
                for &s in &current {
                    next.extend(ends(item, seq, s));
                }
                if next.is_empty() {
                    return next;
                }
                current = next;
            }
            current
        }
        Ast::Opt(inner) => {
            let mut out = ends(inner, seq, start);
            out.insert(start);
            out
        }
        Ast::Star(inner) => closure(inner, seq, start),
        Ast::Plus(inner) => {
            let first = ends(inner, seq, start);
            let mut out = BTreeSet::new();
            for &s in &first {
                out.extend(closure(inner, seq, s));
            }
            out
        }
    }
}

/// Reflexive-transitive closure of one repetition step
fn closure(inner: &Ast, seq: &[&str], start: usize) -> BTreeSet<usize> {
    let mut reached: BTreeSet<usize> = [start].into_iter().collect();
    let mut queue = vec![start];
    while let Some(s) = queue.pop() {
        for e in ends(inner, seq, s) {
            if reached.insert(e) {
                queue.push(e);
            }
        }
    }
    reached
}
