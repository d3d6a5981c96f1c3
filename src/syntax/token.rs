use std::fmt;

use crate::syntax::error::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    LeftAngle,
    RightAngle,
    Colon,
    Star,
    Question,

    // `$name`. The token text is the name without the dollar sign.
    Reference,

    Name,
}

impl TokenType {
    fn from_char(c: char) -> Option<TokenType> {
        match c {
            '(' => Some(TokenType::LeftParen),
            ')' => Some(TokenType::RightParen),
            '[' => Some(TokenType::LeftBracket),
            ']' => Some(TokenType::RightBracket),
            '{' => Some(TokenType::LeftBrace),
            '}' => Some(TokenType::RightBrace),
            '<' => Some(TokenType::LeftAngle),
            '>' => Some(TokenType::RightAngle),
            ':' => Some(TokenType::Colon),
            '*' => Some(TokenType::Star),
            '?' => Some(TokenType::Question),
            _ => None,
        }
    }

    /// Whether a token of this type can begin an atom.
    pub fn starts_atom(&self) -> bool {
        match self {
            TokenType::LeftParen
            | TokenType::LeftBracket
            | TokenType::LeftBrace
            | TokenType::LeftAngle
            | TokenType::Star
            | TokenType::Question
            | TokenType::Reference
            | TokenType::Name => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub text: String,

    /// Byte offset of the token in the input.
    pub offset: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.token_type {
            TokenType::Reference => write!(f, "${}", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}

// Characters that never appear inside a name.
fn is_reserved(c: char) -> bool {
    TokenType::from_char(c).is_some() || matches!(c, '$' | ';' | ',' | '#' | '!')
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !is_reserved(c)
}

/// Splits the input into tokens.
pub fn scan(input: &str) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut chars = input.char_indices().peekable();
    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if let Some(token_type) = TokenType::from_char(c) {
            chars.next();
            tokens.push(Token {
                token_type,
                text: c.to_string(),
                offset,
            });
            continue;
        }

        let token_type = if c == '$' {
            chars.next();
            TokenType::Reference
        } else if is_name_char(c) {
            TokenType::Name
        } else {
            return Err(Error::new(offset, format!("unexpected character '{}'", c)));
        };

        let mut text = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if !is_name_char(c) {
                break;
            }
            text.push(c);
            chars.next();
        }
        if text.is_empty() {
            return Err(Error::new(offset, "expected a name after '$'"));
        }
        tokens.push(Token {
            token_type,
            text,
            offset,
        });
    }
    Ok(tokens)
}
