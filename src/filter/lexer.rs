//! Tokenizer for the SCIM filter grammar (RFC 7644 §3.4.2.2).

use crate::error::{ScimError, ScimResult};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    AttrPath(String),
    And,
    Or,
    Not,
    Comparator(&'static str),
    Pr,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Literal(Value),
}

pub fn tokenize(input: &str) -> ScimResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0usize;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '"' => {
                let (s, next) = read_string(&chars, i)?;
                tokens.push(Token::Literal(Value::String(s)));
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let (value, next) = read_number(&chars, i)?;
                tokens.push(Token::Literal(value));
                i = next;
            }
            c if is_word_start(c) => {
                let (word, next) = read_word(&chars, i);
                i = next;
                tokens.push(classify_word(&word)?);
            }
            other => {
                return Err(ScimError::invalid_filter(format!(
                    "unexpected character '{other}' at position {i}"
                )));
            }
        }
    }

    Ok(tokens)
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || c == ':'
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '$' | '/')
}

fn read_word(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && is_word_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn classify_word(word: &str) -> ScimResult<Token> {
    let lower = word.to_ascii_lowercase();
    Ok(match lower.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "pr" => Token::Pr,
        "eq" => Token::Comparator("eq"),
        "ne" => Token::Comparator("ne"),
        "co" => Token::Comparator("co"),
        "sw" => Token::Comparator("sw"),
        "ew" => Token::Comparator("ew"),
        "gt" => Token::Comparator("gt"),
        "lt" => Token::Comparator("lt"),
        "ge" => Token::Comparator("ge"),
        "le" => Token::Comparator("le"),
        "true" => Token::Literal(Value::Bool(true)),
        "false" => Token::Literal(Value::Bool(false)),
        "null" => Token::Literal(Value::Null),
        _ => Token::AttrPath(word.to_string()),
    })
}

fn read_string(chars: &[char], start: usize) -> ScimResult<(String, usize)> {
    let mut i = start + 1;
    let mut out = String::new();
    loop {
        if i >= chars.len() {
            return Err(ScimError::invalid_filter("unterminated string literal"));
        }
        match chars[i] {
            '"' => {
                return Ok((out, i + 1));
            }
            '\\' if i + 1 < chars.len() => {
                let esc = chars[i + 1];
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '"' => '"',
                    '\\' => '\\',
                    '/' => '/',
                    other => other,
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
}

fn read_number(chars: &[char], start: usize) -> ScimResult<(Value, usize)> {
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return Err(ScimError::invalid_filter("malformed numeric literal"));
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let frac_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return Err(ScimError::invalid_filter("malformed numeric literal"));
        }
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        i += 1;
        if i < chars.len() && matches!(chars[i], '+' | '-') {
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let text: String = chars[start..i].iter().collect();
    let number: serde_json::Number = text
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| ScimError::invalid_filter(format!("malformed numeric literal '{text}'")))?;
    Ok((Value::Number(number), i))
}
