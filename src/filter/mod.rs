//! A small boolean expression language over record fields, used to select
//! which documents a query counts. Example queries:
//!
//! ```text
//! filePath contains drafts && words > 100
//! filePath starts_with /journal OR date == 2024-03-07
//! ```
//!
//! Raw text is tokenized and parsed here; [compile] turns the tree into a
//! reusable predicate.

pub mod compile;

pub use compile::{compile, CompileError, Predicate};

/// Filter expression tree. Immutable once parsed; compiled once into a
/// closure tree and evaluated many times.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A record field reference.
    Ident(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
    StartsWith,
}

impl BinaryOp {
    /// Fixed operator table: logical operators bind loosest so comparisons
    /// don't need parentheses.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(i64),
    Op(BinaryOp),
    OpenParen,
    CloseParen,
}

/// Fields that resolve against a record. Bare words outside this set are
/// treated as string literals, so `filePath contains drafts` reads naturally
/// without quotes.
const FIELDS: &[&str] = &["filePath", "file_path", "date", "words", "chars"];

fn tokenize(text: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = vec![];
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::CloseParen);
            }
            '&' | '|' | '=' | '!' => {
                chars.next();
                let second = chars.next();
                let op = match (c, second) {
                    ('&', Some('&')) => BinaryOp::And,
                    ('|', Some('|')) => BinaryOp::Or,
                    ('=', Some('=')) => BinaryOp::Eq,
                    ('!', Some('=')) => BinaryOp::Ne,
                    _ => {
                        return Err(CompileError::UnsupportedOperator(
                            second.map_or_else(|| c.to_string(), |s| format!("{c}{s}")),
                        ))
                    }
                };
                tokens.push(Token::Op(op));
            }
            '>' => {
                chars.next();
                tokens.push(Token::Op(BinaryOp::Gt));
            }
            '<' => {
                chars.next();
                tokens.push(Token::Op(BinaryOp::Lt));
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(v) if v == c => break,
                        Some(v) => value.push(v),
                        None => return Err(CompileError::UnexpectedEnd),
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if is_word_char(c) => {
                let mut value = String::new();
                while let Some(&v) = chars.peek() {
                    if is_word_char(v) {
                        value.push(v);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // all-digit words are numbers; "2024-03-07" stays a string
                if value.bytes().all(|b| b.is_ascii_digit()) {
                    let num = value
                        .parse()
                        .map_err(|_| CompileError::UnexpectedToken(value))?;
                    tokens.push(Token::Num(num));
                } else {
                    tokens.push(classify_word(value));
                }
            }
            c => return Err(CompileError::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '/' | '.' | '*')
}

fn classify_word(word: String) -> Token {
    // AND/OR keywords normalize to the symbolic operators before parsing.
    match word.as_str() {
        "AND" => Token::Op(BinaryOp::And),
        "OR" => Token::Op(BinaryOp::Or),
        "contains" => Token::Op(BinaryOp::Contains),
        "starts_with" => Token::Op(BinaryOp::StartsWith),
        w if FIELDS.contains(&w) => Token::Ident(word),
        _ => Token::Str(word),
    }
}

/// Parses query text into an expression tree.
pub fn parse(text: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(0)?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(t) => Err(CompileError::UnexpectedToken(format!("{t:?}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn expression(&mut self, min_precedence: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.primary()?;

        while let Some(Token::Op(op)) = self.tokens.get(self.pos) {
            let op = *op;
            if op.precedence() < min_precedence {
                break;
            }
            self.pos += 1;
            // left associative: the right side only takes tighter operators
            let rhs = self.expression(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(CompileError::UnexpectedEnd)?
            .clone();
        self.pos += 1;
        match token {
            Token::OpenParen => {
                let inner = self.expression(0)?;
                match self.tokens.get(self.pos) {
                    Some(Token::CloseParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(CompileError::UnexpectedEnd),
                }
            }
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::Str(value) => Ok(Expr::Literal(Literal::Str(value))),
            Token::Num(value) => Ok(Expr::Literal(Literal::Num(value))),
            t => Err(CompileError::UnexpectedToken(format!("{t:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, BinaryOp, Expr, Literal};

    #[test]
    fn parses_comparison() {
        let expr = parse("words > 100").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Gt,
                lhs: Box::new(Expr::Ident("words".into())),
                rhs: Box::new(Expr::Literal(Literal::Num(100))),
            }
        );
    }

    #[test]
    fn logical_operators_bind_loosest() {
        let expr = parse("words > 100 && filePath contains drafts").unwrap();
        let Expr::Binary { op, lhs, rhs } = expr else {
            panic!("expected binary expr");
        };
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Gt, .. }));
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Contains, .. }));
    }

    #[test]
    fn keywords_normalize_to_operators() {
        assert_eq!(
            parse("words > 1 AND chars > 2 OR words < 5").unwrap(),
            parse("words > 1 && chars > 2 || words < 5").unwrap()
        );
    }

    #[test]
    fn bare_words_become_string_literals() {
        let expr = parse("filePath contains drafts").unwrap();
        let Expr::Binary { rhs, .. } = expr else {
            panic!("expected binary expr");
        };
        assert_eq!(*rhs, Expr::Literal(Literal::Str("drafts".into())));
    }

    #[test]
    fn parentheses_group() {
        let expr = parse("(words > 1 || words < 5) && filePath contains a").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn malformed_input_reports_errors() {
        assert!(parse("words >").is_err());
        assert!(parse("&& words").is_err());
        assert!(parse("words = 5").is_err());
        assert!(parse("'unterminated").is_err());
    }
}
