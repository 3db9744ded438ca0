//! Local attribute filter dialect
//!
//! A small SQL-style where clause evaluated against feature attributes:
//!
//! ```text
//! expr       := and_expr ( OR and_expr )*
//! and_expr   := unary ( AND unary )*
//! unary      := NOT unary | '(' expr ')' | comparison
//! comparison := field ( op literal | [NOT] IN '(' literal, ... ')' | IS [NOT] NULL )
//! op         := = | <> | != | < | <= | > | >=
//! literal    := number | 'text' | NULL
//! ```
//!
//! Keywords and field names are case-insensitive. A comparison against a
//! missing or null attribute is false, as in SQL.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Parsed local filter
///
/// # Examples
///
/// ```
/// use geosync::adapters::geoprocessing::LocalFilter;
/// use serde_json::json;
///
/// let filter = LocalFilter::parse("status = 'current' AND area >= 100").unwrap();
/// let attrs = json!({"status": "current", "area": 250}).as_object().unwrap().clone();
/// assert!(filter.matches(&attrs));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFilter {
    source: String,
    expr: Expr,
}

impl LocalFilter {
    /// Parses a where clause
    ///
    /// # Errors
    ///
    /// Returns a description of the first syntax error
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(format!("Unexpected {token} at end of filter"));
        }
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// Evaluates the filter against a feature's attributes
    pub fn matches(&self, attributes: &Map<String, Value>) -> bool {
        self.expr.eval(attributes)
    }

    /// Original filter text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for LocalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Text(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(String, Op, Literal),
    In(String, Vec<Literal>, bool),
    IsNull(String, bool),
}

impl Expr {
    fn eval(&self, attributes: &Map<String, Value>) -> bool {
        match self {
            Expr::Or(a, b) => a.eval(attributes) || b.eval(attributes),
            Expr::And(a, b) => a.eval(attributes) && b.eval(attributes),
            Expr::Not(inner) => !inner.eval(attributes),
            Expr::Compare(field, op, literal) => match lookup(attributes, field) {
                Some(value) => compare(value, literal).is_some_and(|ord| op.accepts(ord)),
                None => false,
            },
            Expr::In(field, list, negated) => match lookup(attributes, field) {
                Some(value) => {
                    let found = list
                        .iter()
                        .any(|lit| compare(value, lit) == Some(Ordering::Equal));
                    found != *negated
                }
                None => false,
            },
            Expr::IsNull(field, negated) => lookup(attributes, field).is_none() != *negated,
        }
    }
}

impl Op {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        }
    }
}

/// Case-insensitive attribute lookup; null counts as missing
fn lookup<'a>(attributes: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    attributes
        .get(field)
        .or_else(|| {
            attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field))
                .map(|(_, v)| v)
        })
        .filter(|v| !v.is_null())
}

fn compare(value: &Value, literal: &Literal) -> Option<Ordering> {
    match literal {
        Literal::Null => None,
        Literal::Number(n) => {
            let v = match value {
                Value::Number(num) => num.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                Value::Bool(b) => f64::from(u8::from(*b)),
                _ => return None,
            };
            v.partial_cmp(n)
        }
        Literal::Text(t) => match value {
            Value::String(s) => Some(s.as_str().cmp(t.as_str())),
            Value::Number(num) => Some(num.to_string().as_str().cmp(t.as_str())),
            Value::Bool(b) => Some(b.to_string().as_str().cmp(t.as_str())),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Op(Op),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Number(n) => write!(f, "number {n}"),
            Token::Text(s) => write!(f, "string '{s}'"),
            Token::Op(op) => write!(f, "operator {op:?}"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(Op::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            '<' => {
                let (op, len) = match chars.get(i + 1) {
                    Some('=') => (Op::Le, 2),
                    Some('>') => (Op::Ne, 2),
                    _ => (Op::Lt, 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '>' => {
                let (op, len) = match chars.get(i + 1) {
                    Some('=') => (Op::Ge, 2),
                    _ => (Op::Gt, 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("Unterminated string literal".to_string()),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == '"')
                    .ok_or_else(|| "Unterminated quoted field name".to_string())?;
                tokens.push(Token::Ident(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number '{text}'"))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("Unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn keyword(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case(word) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, wanted: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == wanted => Ok(()),
            Some(token) => Err(format!("Expected {wanted}, found {token}")),
            None => Err(format!("Expected {wanted}, found end of filter")),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while self.keyword("AND") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(token) => return Err(format!("Expected a field name, found {token}")),
            None => return Err("Expected a field name, found end of filter".to_string()),
        };

        if self.keyword("IS") {
            let negated = self.keyword("NOT");
            if !self.keyword("NULL") {
                return Err(format!("Expected NULL after IS for field '{field}'"));
            }
            return Ok(Expr::IsNull(field, negated));
        }

        let negated = self.keyword("NOT");
        if self.keyword("IN") {
            self.expect(Token::LParen)?;
            let mut list = vec![self.literal()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                list.push(self.literal()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::In(field, list, negated));
        }
        if negated {
            return Err(format!("Expected IN after NOT for field '{field}'"));
        }

        match self.next() {
            Some(Token::Op(op)) => Ok(Expr::Compare(field, op, self.literal()?)),
            Some(token) => Err(format!("Expected an operator after '{field}', found {token}")),
            None => Err(format!("Expected an operator after '{field}'")),
        }
    }

    fn literal(&mut self) -> Result<Literal, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Literal::Number(n)),
            Some(Token::Text(s)) => Ok(Literal::Text(s)),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => Ok(Literal::Null),
            Some(token) => Err(format!("Expected a literal, found {token}")),
            None => Err("Expected a literal, found end of filter".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test_case("status = 'current'", true ; "text equality")]
    #[test_case("STATUS = 'current'", true ; "field case insensitive")]
    #[test_case("status <> 'current'", false ; "not equal")]
    #[test_case("area > 100 AND area <= 250", true ; "range")]
    #[test_case("area < 100 OR district = 'Otago'", true ; "or")]
    #[test_case("district IN ('Otago', 'Southland')", true ; "in list")]
    #[test_case("district NOT IN ('Otago')", false ; "not in list")]
    #[test_case("note IS NULL", true ; "is null on null")]
    #[test_case("missing IS NULL", true ; "is null on missing")]
    #[test_case("district IS NOT NULL", true ; "is not null")]
    #[test_case("NOT (area > 1000)", true ; "not")]
    #[test_case("note = 'x'", false ; "comparison with null is false")]
    #[test_case("code = 42", true ; "numeric string compared as number")]
    #[test_case("name = 'O''Brien'", true ; "escaped quote")]
    fn test_filter_matches(filter: &str, expected: bool) {
        let attributes = attrs(json!({
            "status": "current",
            "area": 250,
            "district": "Otago",
            "note": null,
            "code": "42",
            "name": "O'Brien"
        }));
        let filter = LocalFilter::parse(filter).unwrap();
        assert_eq!(filter.matches(&attributes), expected);
    }

    #[test_case("status =" ; "missing literal")]
    #[test_case("status = 'open" ; "unterminated string")]
    #[test_case("(status = 'a'" ; "unbalanced paren")]
    #[test_case("status 'a'" ; "missing operator")]
    #[test_case("a = 1 b = 2" ; "trailing tokens")]
    #[test_case("" ; "empty")]
    fn test_filter_rejects(filter: &str) {
        assert!(LocalFilter::parse(filter).is_err());
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let filter = LocalFilter::parse("a = 1 OR a = 2 AND b = 3").unwrap();
        assert!(filter.matches(&attrs(json!({"a": 1, "b": 0}))));
        assert!(!filter.matches(&attrs(json!({"a": 2, "b": 0}))));
    }

    #[test]
    fn test_display_keeps_source() {
        let filter = LocalFilter::parse(" status = 'current' ").unwrap();
        assert_eq!(filter.to_string(), "status = 'current'");
    }
}
