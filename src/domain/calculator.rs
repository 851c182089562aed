//! Arithmetic evaluation behind the `calculate` tool.
//!
//! Input is first reduced to digits, `+ - * / ( ) .` and whitespace; anything
//! else is stripped. What remains is evaluated with the usual precedence and
//! IEEE-754 doubles, so `1 / 0` is `Infinity` rather than an error.
//!
//! Sign operators may not be doubled up (`--2`) and a signed operand may not be
//! the base of `**` (`-2 ** 2`); write `- -2` or `(-2) ** 2` instead. Nesting
//! is capped at [`MAX_DEPTH`] so hostile input fails instead of exhausting the
//! stack.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Deepest nesting of parentheses, signs and `**` chains accepted.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("expression is empty")]
    Empty,
    #[error("Unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Expression nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => format_number(*value),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::StarStar => "**".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn disallowed_characters() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9+\-*/().\s]").expect("static regex is valid"))
}

pub fn sanitize(expression: &str) -> String {
    disallowed_characters().replace_all(expression, "").into_owned()
}

/// Sanitizes and evaluates `expression`.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(&sanitize(expression))?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(CalcError::UnexpectedToken(token.describe())),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, character)) = chars.next() {
        let token = match character {
            c if c.is_whitespace() => continue,
            '+' | '-' => {
                if let Some((_, repeated)) = chars.next_if(|(_, next)| *next == character) {
                    return Err(CalcError::UnexpectedToken(format!("{character}{repeated}")));
                }
                if character == '+' {
                    Token::Plus
                } else {
                    Token::Minus
                }
            }
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '*' => {
                if chars.next_if(|(_, next)| *next == '*').is_some() {
                    Token::StarStar
                } else {
                    Token::Star
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some((index, next)) =
                    chars.next_if(|(_, next)| next.is_ascii_digit() || *next == '.')
                {
                    end = index + next.len_utf8();
                }
                let literal = &input[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(literal.to_string()))?;
                Token::Number(value)
            }
            other => return Err(CalcError::UnexpectedToken(other.to_string())),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value += self.term()?;
            } else if self.eat(&Token::Minus) {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.exponentiation()?;
        loop {
            if self.eat(&Token::Star) {
                value *= self.exponentiation()?;
            } else if self.eat(&Token::Slash) {
                value /= self.exponentiation()?;
            } else {
                return Ok(value);
            }
        }
    }

    // `**` is right-associative: 2 ** 3 ** 2 == 2 ** 9.
    fn exponentiation(&mut self) -> Result<f64, CalcError> {
        if matches!(self.peek(), Some(Token::Minus | Token::Plus)) {
            let value = self.signed()?;
            if self.peek() == Some(&Token::StarStar) {
                return Err(CalcError::UnexpectedToken("**".to_string()));
            }
            return Ok(value);
        }

        let base = self.primary()?;
        if self.eat(&Token::StarStar) {
            let exponent = self.nested(Self::exponentiation)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        let negate = match self.advance() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            Some(other) => return Err(CalcError::UnexpectedToken(other.describe())),
            None => return Err(CalcError::UnexpectedEnd),
        };

        let operand = self.nested(|parser| {
            if matches!(parser.peek(), Some(Token::Minus | Token::Plus)) {
                parser.signed()
            } else {
                parser.primary()
            }
        })?;
        Ok(if negate { -operand } else { operand })
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.nested(Self::expression)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(CalcError::UnexpectedToken(other.describe())),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(other) => Err(CalcError::UnexpectedToken(other.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<f64, CalcError>,
    ) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }
}

/// Formats a result the way a calculator display would: integral values
/// without a fraction, `Infinity`/`NaN` spelled out, exponent form only for
/// very large or very small magnitudes.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }

    format!("{value}")
}
