//! Content stream scanning
//!
//! A minimal operator scanner over raw page content. It understands just
//! enough of the syntax to do three jobs: locate marked-content sections by
//! MCID, rewrite a tagged `BDC` opening into `/Artifact BMC` byte-for-byte,
//! and derive coarse per-MCID text geometry and extracted text for the
//! checks. Everything outside the rewritten opening operators is preserved
//! untouched.

use crate::{ContainerError, Font, Result};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use crate::Rect;

/// Approximate glyph advance as a fraction of the font size, used when the
/// scanner estimates text extents without font metrics
const GLYPH_WIDTH_FACTOR: f64 = 0.5;

/// A TJ kern at least this negative (in thousandths) reads as a word break
const TJ_WORD_GAP: f64 = -200.0;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(f64),
    Str(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Object {
    Name(String),
    Number(f64),
    Str(Vec<u8>),
    Array(Vec<Object>),
    Dict(Vec<(String, Object)>),
}

impl Object {
    fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Object::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn dict_get(&self, key: &str) -> Option<&Object> {
        match self {
            Object::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned<T> {
    value: T,
    start: usize,
    end: usize,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_noise(&mut self) {
        loop {
            while self.pos < self.bytes.len() && is_whitespace(self.bytes[self.pos]) {
                self.pos += 1;
            }
            if self.pos < self.bytes.len() && self.bytes[self.pos] == b'%' {
                while self.pos < self.bytes.len() && !matches!(self.bytes[self.pos], b'\r' | b'\n')
                {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn read_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && !is_whitespace(self.bytes[self.pos])
            && !is_delimiter(self.bytes[self.pos])
        {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn read_literal_string(&mut self) -> Vec<u8> {
        // Caller consumed the opening parenthesis
        let mut out = Vec::new();
        let mut depth = 1usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            match b {
                b'\\' => {
                    if self.pos < self.bytes.len() {
                        let esc = self.bytes[self.pos];
                        self.pos += 1;
                        match esc {
                            b'n' => out.push(b'\n'),
                            b'r' => out.push(b'\r'),
                            b't' => out.push(b'\t'),
                            b'b' => out.push(8),
                            b'f' => out.push(12),
                            other => out.push(other),
                        }
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
        out
    }

    fn read_hex_string(&mut self) -> Vec<u8> {
        // Caller consumed the opening angle bracket
        let mut digits = Vec::new();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if b.is_ascii_hexdigit() {
                digits.push(b);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        digits
            .chunks(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
                let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
                (hi << 4) | lo
            })
            .collect()
    }

    fn next(&mut self) -> Option<Spanned<Token>> {
        self.skip_noise();
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let b = self.bytes[self.pos];
        let token = match b {
            b'/' => {
                self.pos += 1;
                let name = self.read_regular();
                Token::Name(String::from_utf8_lossy(name).into_owned())
            }
            b'(' => {
                self.pos += 1;
                Token::Str(self.read_literal_string())
            }
            b'<' => {
                if self.bytes.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Token::DictStart
                } else {
                    self.pos += 1;
                    Token::Str(self.read_hex_string())
                }
            }
            b'>' => {
                if self.bytes.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Token::DictEnd
                } else {
                    // Stray close bracket, skip it
                    self.pos += 1;
                    return self.next();
                }
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'{' | b'}' | b')' => {
                self.pos += 1;
                return self.next();
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => {
                let text = self.read_regular();
                match std::str::from_utf8(text).ok().and_then(|s| s.parse().ok()) {
                    Some(n) => Token::Number(n),
                    None => return self.next(),
                }
            }
            _ => {
                let text = self.read_regular();
                if text.is_empty() {
                    self.pos += 1;
                    return self.next();
                }
                Token::Op(String::from_utf8_lossy(text).into_owned())
            }
        };
        Some(Spanned {
            value: token,
            start,
            end: self.pos,
        })
    }
}

/// One instruction: an operator with its preceding operands
#[derive(Debug, Clone)]
struct Instruction {
    op: String,
    operands: Vec<Object>,
    /// Start of the first operand (or of the operator when it has none)
    start: usize,
    /// End of the operator keyword
    end: usize,
    /// Start of the operator keyword itself
    op_start: usize,
}

/// Parse the stream into a flat instruction list
fn instructions(bytes: &[u8]) -> Vec<Instruction> {
    let mut lexer = Lexer::new(bytes);
    let mut out = Vec::new();
    let mut operands: Vec<Spanned<Object>> = Vec::new();

    fn compound(lexer: &mut Lexer<'_>, open: Spanned<Token>) -> Option<Spanned<Object>> {
        match open.value {
            Token::ArrayStart => {
                let mut items = Vec::new();
                let mut end = open.end;
                while let Some(tok) = lexer.next() {
                    end = tok.end;
                    match tok.value {
                        Token::ArrayEnd => break,
                        _ => {
                            if let Some(obj) = compound(lexer, tok) {
                                end = obj.end;
                                items.push(obj.value);
                            }
                        }
                    }
                }
                Some(Spanned {
                    value: Object::Array(items),
                    start: open.start,
                    end,
                })
            }
            Token::DictStart => {
                let mut entries = Vec::new();
                let mut end = open.end;
                let mut pending_key: Option<String> = None;
                while let Some(tok) = lexer.next() {
                    end = tok.end;
                    match tok.value {
                        Token::DictEnd => break,
                        Token::Name(n) if pending_key.is_none() => pending_key = Some(n),
                        value => {
                            let tok = Spanned {
                                value,
                                start: tok.start,
                                end: tok.end,
                            };
                            if let Some(obj) = compound(lexer, tok) {
                                end = obj.end;
                                if let Some(key) = pending_key.take() {
                                    entries.push((key, obj.value));
                                }
                            }
                        }
                    }
                }
                Some(Spanned {
                    value: Object::Dict(entries),
                    start: open.start,
                    end,
                })
            }
            Token::Name(n) => Some(Spanned {
                value: Object::Name(n),
                start: open.start,
                end: open.end,
            }),
            Token::Number(n) => Some(Spanned {
                value: Object::Number(n),
                start: open.start,
                end: open.end,
            }),
            Token::Str(s) => Some(Spanned {
                value: Object::Str(s),
                start: open.start,
                end: open.end,
            }),
            Token::ArrayEnd | Token::DictEnd | Token::Op(_) => None,
        }
    }

    while let Some(tok) = lexer.next() {
        match tok.value {
            Token::Op(ref op) => {
                let start = operands.first().map(|o| o.start).unwrap_or(tok.start);
                out.push(Instruction {
                    op: op.clone(),
                    operands: operands.drain(..).map(|o| o.value).collect(),
                    start,
                    end: tok.end,
                    op_start: tok.start,
                });
            }
            _ => {
                if let Some(obj) = compound(&mut lexer, tok) {
                    operands.push(obj);
                }
            }
        }
    }
    out
}

/// A marked-content section located in a stream
#[derive(Debug, Clone)]
pub struct MarkedContentSpan {
    pub tag: String,
    pub mcid: Option<u32>,
    /// Byte range of the opening operator including its operands
    pub open_range: Range<usize>,
    /// Byte range between the opening operator and its matching `EMC`
    pub body_range: Range<usize>,
}

fn mcid_of(operand: Option<&Object>, properties: &HashMap<String, u32>) -> Option<u32> {
    match operand? {
        Object::Dict(_) => operand?
            .dict_get("MCID")
            .and_then(Object::as_number)
            .map(|n| n as u32),
        Object::Name(n) => properties.get(n.as_str()).copied(),
        _ => None,
    }
}

/// Locate all marked-content sections. `properties` resolves named
/// Properties resources to MCIDs.
pub fn find_marked_content(
    bytes: &[u8],
    properties: &HashMap<String, u32>,
) -> Vec<MarkedContentSpan> {
    let mut out = Vec::new();
    let mut open: Vec<(String, Option<u32>, Range<usize>, usize)> = Vec::new();

    for inst in instructions(bytes) {
        match inst.op.as_str() {
            "BDC" | "BMC" => {
                let tag = inst
                    .operands
                    .first()
                    .and_then(Object::as_name)
                    .unwrap_or("")
                    .to_string();
                let mcid = mcid_of(inst.operands.get(1), properties);
                open.push((tag, mcid, inst.start..inst.end, inst.end));
            }
            "EMC" => {
                if let Some((tag, mcid, open_range, body_start)) = open.pop() {
                    out.push(MarkedContentSpan {
                        tag,
                        mcid,
                        open_range,
                        body_range: body_start..inst.op_start,
                    });
                }
            }
            _ => {}
        }
    }
    out.sort_by_key(|s| s.open_range.start);
    out
}

/// Rewrite the opening operator of every section whose MCID is in `mcids`
/// to `/Artifact BMC`, leaving all other bytes untouched.
///
/// Fails without producing output if any requested MCID is absent from the
/// stream, so a partially artifacted page can never be written back.
pub fn artifact_mcids(
    bytes: &[u8],
    page: u32,
    mcids: &BTreeSet<u32>,
    properties: &HashMap<String, u32>,
) -> Result<(Vec<u8>, usize)> {
    let spans = find_marked_content(bytes, properties);
    let mut found: BTreeSet<u32> = BTreeSet::new();
    let mut replacements: Vec<Range<usize>> = Vec::new();

    for span in &spans {
        if let Some(mcid) = span.mcid {
            if mcids.contains(&mcid) {
                found.insert(mcid);
                replacements.push(span.open_range.clone());
            }
        }
    }

    if let Some(&missing) = mcids.difference(&found).next() {
        return Err(ContainerError::McidNotFound {
            page,
            mcid: missing,
        });
    }

    replacements.sort_by_key(|r| r.start);
    let mut out = Vec::with_capacity(bytes.len());
    let mut cursor = 0usize;
    for range in &replacements {
        out.extend_from_slice(&bytes[cursor..range.start]);
        out.extend_from_slice(b"/Artifact BMC");
        cursor = range.end;
    }
    out.extend_from_slice(&bytes[cursor..]);
    Ok((out, replacements.len()))
}

#[derive(Debug, Clone, Default)]
struct TextState {
    x: f64,
    y: f64,
    size: f64,
    leading: f64,
    font: Option<String>,
}

/// MCID the current content belongs to: the top marked-content entry.
/// A nested section without an MCID (an artifact, say) shadows the outer id.
fn current_mcid(stack: &[Option<u32>]) -> Option<u32> {
    stack.last().copied().flatten()
}

fn shown_bytes(inst: &Instruction) -> Vec<&Object> {
    match inst.op.as_str() {
        "Tj" | "'" => inst.operands.iter().rev().take(1).collect(),
        "\"" => inst.operands.iter().rev().take(1).collect(),
        "TJ" => match inst.operands.first() {
            Some(Object::Array(items)) => items.iter().collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Coarse bounding rectangles per MCID, derived from text and rectangle
/// operators. Geometry is approximate (glyph advances are estimated), which
/// is all the proximity checks need.
pub fn text_bounds(bytes: &[u8], properties: &HashMap<String, u32>) -> HashMap<u32, Rect> {
    let mut bounds: HashMap<u32, Rect> = HashMap::new();
    let mut mc_stack: Vec<Option<u32>> = Vec::new();
    let mut ts = TextState::default();

    let mut add = |mcid: u32, rect: Rect, bounds: &mut HashMap<u32, Rect>| {
        bounds
            .entry(mcid)
            .and_modify(|r| *r = r.union(&rect))
            .or_insert(rect);
    };

    for inst in instructions(bytes) {
        match inst.op.as_str() {
            "BDC" | "BMC" => mc_stack.push(mcid_of(inst.operands.get(1), properties)),
            "EMC" => {
                mc_stack.pop();
            }
            "BT" => {
                ts.x = 0.0;
                ts.y = 0.0;
            }
            "Tf" => {
                ts.font = inst.operands.first().and_then(Object::as_name).map(String::from);
                ts.size = inst.operands.get(1).and_then(Object::as_number).unwrap_or(12.0);
            }
            "Tm" => {
                ts.x = inst.operands.get(4).and_then(Object::as_number).unwrap_or(0.0);
                ts.y = inst.operands.get(5).and_then(Object::as_number).unwrap_or(0.0);
            }
            "Td" => {
                ts.x += inst.operands.first().and_then(Object::as_number).unwrap_or(0.0);
                ts.y += inst.operands.get(1).and_then(Object::as_number).unwrap_or(0.0);
            }
            "TD" => {
                let dx = inst.operands.first().and_then(Object::as_number).unwrap_or(0.0);
                let dy = inst.operands.get(1).and_then(Object::as_number).unwrap_or(0.0);
                ts.x += dx;
                ts.y += dy;
                ts.leading = -dy;
            }
            "TL" => {
                ts.leading = inst.operands.first().and_then(Object::as_number).unwrap_or(0.0);
            }
            "T*" => {
                ts.y -= ts.leading;
            }
            "Tj" | "'" | "\"" | "TJ" => {
                if inst.op == "'" || inst.op == "\"" {
                    ts.y -= ts.leading;
                }
                let size = if ts.size > 0.0 { ts.size } else { 12.0 };
                let mut advance = 0.0;
                for obj in shown_bytes(&inst) {
                    match obj {
                        Object::Str(s) => advance += s.len() as f64 * size * GLYPH_WIDTH_FACTOR,
                        Object::Number(kern) => advance -= kern / 1000.0 * size,
                        _ => {}
                    }
                }
                if advance > 0.0 {
                    if let Some(mcid) = current_mcid(&mc_stack) {
                        let rect = Rect::new(ts.x, ts.y, ts.x + advance, ts.y + size);
                        add(mcid, rect, &mut bounds);
                    }
                    ts.x += advance;
                }
            }
            "re" => {
                if let Some(mcid) = current_mcid(&mc_stack) {
                    let x = inst.operands.first().and_then(Object::as_number).unwrap_or(0.0);
                    let y = inst.operands.get(1).and_then(Object::as_number).unwrap_or(0.0);
                    let w = inst.operands.get(2).and_then(Object::as_number).unwrap_or(0.0);
                    let h = inst.operands.get(3).and_then(Object::as_number).unwrap_or(0.0);
                    add(mcid, Rect::new(x, y, x + w, y + h), &mut bounds);
                }
            }
            _ => {}
        }
    }
    bounds
}

/// Decode the text shown inside the marked-content section with `mcid`,
/// resolving character codes through the page's font resources.
pub fn extract_text(
    bytes: &[u8],
    mcid: u32,
    fonts: &HashMap<String, Font>,
    properties: &HashMap<String, u32>,
) -> String {
    let mut out = String::new();
    let mut mc_stack: Vec<Option<u32>> = Vec::new();
    let mut current_font: Option<String> = None;

    for inst in instructions(bytes) {
        match inst.op.as_str() {
            "BDC" | "BMC" => mc_stack.push(mcid_of(inst.operands.get(1), properties)),
            "EMC" => {
                mc_stack.pop();
            }
            "Tf" => {
                current_font = inst.operands.first().and_then(Object::as_name).map(String::from);
            }
            "Tj" | "'" | "\"" | "TJ" => {
                if current_mcid(&mc_stack) != Some(mcid) {
                    continue;
                }
                let font = current_font.as_deref().and_then(|n| fonts.get(n));
                for obj in shown_bytes(&inst) {
                    match obj {
                        Object::Str(s) => {
                            for &code in s {
                                match font.and_then(|f| f.decode(code as u16)) {
                                    Some(text) => out.push_str(text),
                                    None => {
                                        if (0x20..0x7f).contains(&code) {
                                            out.push(code as char);
                                        }
                                    }
                                }
                            }
                        }
                        Object::Number(kern) if *kern <= TJ_WORD_GAP => {
                            if !out.ends_with(' ') && !out.is_empty() {
                                out.push(' ');
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    out
}
