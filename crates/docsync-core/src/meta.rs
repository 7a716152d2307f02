//! `export const meta = {...}` extraction.
//!
//! MDX documents declare page metadata as an exported object literal. Only a
//! restricted grammar is understood: the first statement of a top-level ESM
//! block must be `export const|let|var meta = <init>`, and `<init>` must be an
//! object literal. Properties survive only when the key is a plain identifier
//! and the value is a single string, number, boolean, or `null` literal.
//! Everything else (spreads, computed keys, nested objects, arrays, template
//! strings, unary minus, calls) is dropped without error.

use std::sync::OnceLock;

use markdown::mdast::Node;
use regex::Regex;
use serde_json::{Number, Value};

use crate::document::ContentTree;
use crate::models::MetadataMap;

/// Find the first top-level ESM node binding `meta` and convert its object
/// literal into a map.
///
/// Returns `None` when no such export exists, when the bound value is not an
/// object literal, or when the statement cannot be tokenized.
pub fn extract_meta_export(tree: &ContentTree) -> Option<MetadataMap> {
    tree.children.iter().find_map(|node| match node {
        Node::MdxjsEsm(esm) => meta_initializer(&esm.value),
        _ => None,
    })?
}

/// Convert the source text of an object literal (`{ ... }`) into a map.
///
/// An empty literal gives an empty map. Returns `None` if `text` is not a
/// single object literal.
pub fn get_object_from_expression(text: &str) -> Option<MetadataMap> {
    let tokens = tokenize(text)?;
    let (map, end) = parse_object(&tokens, 0)?;
    (end == tokens.len()).then_some(map)
}

fn meta_binding() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?s:\s+|//[^\n]*|/\*.*?\*/)*export\s+(?:const|let|var)\s+meta(?:[^\w$]|$)")
            .expect("meta binding regex is valid")
    })
}

/// `Some(result)` when the first statement binds `meta`, where `result` is
/// the converted object literal (or `None` for any other initializer, or
/// when the statement cannot be tokenized).
fn meta_initializer(code: &str) -> Option<Option<MetadataMap>> {
    if !meta_binding().is_match(code) {
        return None;
    }
    Some(meta_object(code))
}

/// The object literal bound by `export const|let|var meta = {...}`.
fn meta_object(code: &str) -> Option<MetadataMap> {
    let tokens = tokenize(code)?;
    // export, const|let|var, meta
    if !is_ident(tokens.get(2)?, "meta") {
        return None;
    }
    let mut pos = 3;

    if tokens.get(pos) != Some(&Token::Punct('=')) {
        return None;
    }
    pos += 1;

    let (map, end) = parse_object(&tokens, pos)?;
    if continues_expression(tokens.get(end)) {
        return None;
    }
    Some(map)
}

/// Whether `code` stops partway through a statement: inside a block
/// comment, template literal, or string, or with an unclosed bracket.
///
/// A newline ends a plain string (an error rather than an open literal),
/// and stray closing brackets count as finished.
pub(crate) fn is_unfinished_statement(code: &str) -> bool {
    let chars: Vec<char> = code.chars().collect();
    let mut depth = 0i64;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return true;
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            quote @ ('"' | '\'') => {
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return true,
                        Some('\\') => i += 2,
                        Some('\n') => break,
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '`' => match skip_template(&chars, i) {
                Some(next) => i = next,
                None => return true,
            },
            '{' | '[' | '(' => {
                depth += 1;
                i += 1;
            }
            '}' | ']' | ')' => {
                depth -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    depth > 0
}

/// Whether the token after an object literal makes it part of a larger
/// expression (`{...}.x`, `{...} as const`, `{...} || {}`).
fn continues_expression(next: Option<&Token>) -> bool {
    match next {
        None => false,
        Some(Token::Punct(c)) => !matches!(c, ';' | ','),
        Some(Token::Ident(word)) => matches!(word.as_str(), "as" | "satisfies" | "in" | "instanceof"),
        Some(_) => false,
    }
}

fn is_ident(token: &Token, word: &str) -> bool {
    matches!(token, Token::Ident(name) if name == word)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Option<Number>),
    /// Template literals are never plain literals.
    Template,
    Punct(char),
    Spread,
}

/// Parse `{ member, ... }` starting at `start`; returns the map and the index
/// just past the closing brace.
fn parse_object(tokens: &[Token], start: usize) -> Option<(MetadataMap, usize)> {
    if tokens.get(start) != Some(&Token::Punct('{')) {
        return None;
    }

    let mut map = MetadataMap::new();
    let mut pos = start + 1;
    let mut member_start = pos;
    let mut depth = 0usize;

    loop {
        let token = tokens.get(pos)?;
        match token {
            Token::Punct('{' | '[' | '(') => depth += 1,
            Token::Punct(close @ ('}' | ']' | ')')) => {
                if depth == 0 {
                    if *close != '}' {
                        return None;
                    }
                    add_member(&mut map, &tokens[member_start..pos]);
                    return Some((map, pos + 1));
                }
                depth -= 1;
            }
            Token::Punct(',') if depth == 0 => {
                add_member(&mut map, &tokens[member_start..pos]);
                member_start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
}

fn add_member(map: &mut MetadataMap, member: &[Token]) {
    let [Token::Ident(key), Token::Punct(':'), value] = member else {
        return;
    };
    let value = match value {
        Token::Str(s) => Value::String(s.clone()),
        Token::Num(Some(n)) => Value::Number(n.clone()),
        Token::Ident(word) => match word.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => return,
        },
        _ => return,
    };
    map.insert(key.clone(), value);
}

fn tokenize(code: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = code.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return None;
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            '"' | '\'' => {
                let (value, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(value));
                i = next;
            }
            '`' => {
                i = skip_template(&chars, i)?;
                tokens.push(Token::Template);
            }
            '.' if chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') => {
                tokens.push(Token::Spread);
                i += 3;
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '_'))
                {
                    // exponent sign: 1e-5
                    if matches!(chars[i], 'e' | 'E')
                        && matches!(chars.get(i + 1), Some('+' | '-'))
                        && !chars[start..i].iter().any(|d| matches!(d, 'x' | 'X'))
                    {
                        i += 1;
                    }
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)));
            }
            c if c == '$' || c == '_' || c.is_alphabetic() => {
                let start = i;
                while i < chars.len()
                    && (chars[i] == '$' || chars[i] == '_' || chars[i].is_alphanumeric())
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                tokens.push(Token::Punct(other));
                i += 1;
            }
        }
    }

    Some(tokens)
}

fn read_string(chars: &[char], start: usize) -> Option<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    loop {
        let c = *chars.get(i)?;
        match c {
            c if c == quote => return Some((out, i + 1)),
            '\n' => return None,
            '\\' => {
                let escaped = *chars.get(i + 1)?;
                i += 2;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    '\n' => {}
                    'x' => {
                        let hex: String = chars.get(i..i + 2)?.iter().collect();
                        out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
                        i += 2;
                    }
                    'u' if chars.get(i) == Some(&'{') => {
                        let close = chars[i..].iter().position(|&d| d == '}')? + i;
                        let hex: String = chars[i + 1..close].iter().collect();
                        out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
                        i = close + 1;
                    }
                    'u' => {
                        let hex: String = chars.get(i..i + 4)?.iter().collect();
                        let unit = u16::from_str_radix(&hex, 16).ok()?;
                        i += 4;
                        out.push(decode_utf16_unit(unit, chars, &mut i));
                    }
                    other => out.push(other),
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
}

/// Decode a `\uXXXX` unit, consuming a following low surrogate escape when
/// `unit` is a high surrogate.
fn decode_utf16_unit(unit: u16, chars: &[char], i: &mut usize) -> char {
    if (0xD800..0xDC00).contains(&unit)
        && chars.get(*i) == Some(&'\\')
        && chars.get(*i + 1) == Some(&'u')
    {
        let low: Option<u16> = chars
            .get(*i + 2..*i + 6)
            .map(|h| h.iter().collect::<String>())
            .and_then(|h| u16::from_str_radix(&h, 16).ok());
        if let Some(low) = low.filter(|l| (0xDC00..0xE000).contains(l)) {
            *i += 6;
            return char::decode_utf16([unit, low])
                .next()
                .and_then(Result::ok)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
        }
    }
    char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn skip_template(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    loop {
        match *chars.get(i)? {
            '\\' => i += 2,
            '`' => return Some(i + 1),
            _ => i += 1,
        }
    }
}

/// JS numeric literal → JSON number. BigInts and non-finite values are
/// not representable and give `None`.
fn parse_number(literal: &str) -> Option<Number> {
    let cleaned = literal.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();

    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let value = u64::from_str_radix(&lower[2..], radix).ok()?;
        return Some(Number::from(value));
    }
    if lower.ends_with('n') {
        return None;
    }
    if let Ok(int) = lower.parse::<i64>() {
        return Some(Number::from(int));
    }
    let float: f64 = lower.parse().ok()?;
    if float.fract() == 0.0 && float.abs() < 9.007_199_254_740_992e15 {
        return Some(Number::from(float as i64));
    }
    Number::from_f64(float)
}
