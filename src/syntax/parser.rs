use std::collections::BTreeSet;

use crate::expression::{Expression, Name};
use crate::syntax::error::{Error, Result};
use crate::syntax::token::{scan, Token, TokenType};

/// Parses an expression where no name is predefined.
pub fn parse(input: &str) -> Result<Expression> {
    Parser::new(input)?.parse()
}

/// A recursive-descent parser over one line of input.
///
/// Juxtaposition is left-associative application, and binder bodies extend as far to the
/// right as they can. A bare name refers to a variable when an enclosing abstraction binds
/// it, or when it is one of the globals. Otherwise it is a symbol.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    end_offset: usize,
    globals: BTreeSet<Name>,

    // Names bound by the enclosing abstractions, innermost last.
    bound: Vec<Name>,
}

impl Parser {
    pub fn new(input: &str) -> Result<Parser> {
        Ok(Parser {
            tokens: scan(input)?,
            position: 0,
            end_offset: input.len(),
            globals: BTreeSet::new(),
            bound: vec![],
        })
    }

    pub fn with_globals<I>(mut self, globals: I) -> Parser
    where
        I: IntoIterator<Item = Name>,
    {
        self.globals.extend(globals);
        self
    }

    /// Parses the whole input as a single expression.
    pub fn parse(mut self) -> Result<Expression> {
        let expression = self.parse_expression()?;
        match self.peek() {
            None => Ok(expression),
            Some(token) => Err(Error::new(
                token.offset,
                format!("unexpected '{}' after expression", token),
            )),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error_here(&self, message: &str) -> Error {
        let offset = self.peek().map_or(self.end_offset, |t| t.offset);
        Error::new(offset, message)
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<Token> {
        match self.next() {
            Some(token) if token.token_type == token_type => Ok(token),
            Some(token) => Err(Error::new(
                token.offset,
                format!("expected {}, found '{}'", what, token),
            )),
            None => Err(self.error_here(&format!("expected {}", what))),
        }
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        let mut answer = self.parse_atom()?;
        while self.peek().map_or(false, |t| t.token_type.starts_atom()) {
            let argument = self.parse_atom()?;
            answer = Expression::apply(answer, argument);
        }
        Ok(answer)
    }

    fn parse_atom(&mut self) -> Result<Expression> {
        let Some(token) = self.next() else {
            return Err(self.error_here("expected an expression"));
        };
        match token.token_type {
            TokenType::LeftParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenType::RightParen, "')'")?;
                Ok(inner)
            }
            TokenType::LeftAngle => self.parse_abstraction(),
            TokenType::LeftBracket => {
                let constraint = self.parse_expression()?;
                self.expect(TokenType::RightBracket, "']'")?;
                let body = self.parse_expression()?;
                Ok(Expression::comprehension(constraint, body))
            }
            TokenType::LeftBrace => {
                let assertion = self.parse_expression()?;
                self.expect(TokenType::RightBrace, "'}'")?;
                let body = self.parse_expression()?;
                Ok(Expression::scoped_assertion(assertion, body))
            }
            TokenType::Star => Ok(Expression::Wildcard),
            TokenType::Question => Ok(Expression::FreshValueGenerator),
            TokenType::Reference => Ok(Expression::reference(&token.text)),
            TokenType::Name => {
                if self.is_variable(&token.text) {
                    Ok(Expression::reference(&token.text))
                } else {
                    Ok(Expression::symbol(&token.text))
                }
            }
            _ => Err(Error::new(
                token.offset,
                format!("unexpected '{}'", token),
            )),
        }
    }

    // Called after the opening '<'.
    fn parse_abstraction(&mut self) -> Result<Expression> {
        let param: Name = self.expect(TokenType::Name, "a parameter name")?.text.into();
        let pattern = match self.peek() {
            Some(token) if token.token_type == TokenType::Colon => {
                self.next();
                Some(self.parse_expression()?)
            }
            _ => None,
        };
        self.expect(TokenType::RightAngle, "'>'")?;

        let mut binders = BTreeSet::new();
        if let Some(pattern) = &pattern {
            pattern.collect_free_names(&mut binders);
        }
        binders.insert(param.clone());
        let depth = self.bound.len();
        self.bound.extend(binders);
        let body = self.parse_expression();
        self.bound.truncate(depth);

        Ok(Expression::abstraction_with(param, pattern, body?))
    }

    fn is_variable(&self, name: &str) -> bool {
        self.bound.iter().any(|b| b.as_ref() == name) || self.globals.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Expression {
        Expression::symbol(name)
    }

    fn check_round_trip(input: &str) {
        let parsed = parse(input).unwrap();
        assert_eq!(parsed.to_string(), input);
    }

    #[test]
    fn test_application_is_left_associative() {
        let parsed = parse("rel a b").unwrap();
        assert_eq!(
            parsed,
            Expression::apply_all(sym("rel"), vec![sym("a"), sym("b")])
        );
        let grouped = parse("f (g x)").unwrap();
        assert_eq!(
            grouped,
            Expression::apply(sym("f"), Expression::apply(sym("g"), sym("x")))
        );
    }

    #[test]
    fn test_abstraction_binds_its_parameter() {
        let parsed = parse("<x> pair x y").unwrap();
        let Expression::Abstraction(abstraction) = &parsed else {
            panic!("expected an abstraction, got {}", parsed);
        };
        assert_eq!(abstraction.param.as_ref(), "x");
        assert_eq!(
            abstraction.body,
            Expression::apply_all(
                sym("pair"),
                vec![Expression::reference("x"), sym("y")]
            )
        );
    }

    #[test]
    fn test_parameter_scope_ends_with_the_group() {
        let parsed = parse("(<x> x) x").unwrap();
        let Expression::Application(_, argument) = &parsed else {
            panic!("expected an application, got {}", parsed);
        };
        assert_eq!(argument.as_ref(), &sym("x"));
    }

    #[test]
    fn test_pattern_names_are_bound() {
        let parsed = parse("<o : some v> v").unwrap();
        let Expression::Abstraction(abstraction) = &parsed else {
            panic!("expected an abstraction, got {}", parsed);
        };
        // Inside the pattern, v is still a plain symbol.
        assert_eq!(
            abstraction.pattern,
            Some(Expression::apply(sym("some"), sym("v")))
        );
        assert_eq!(abstraction.body, sym("v"));

        let parsed = parse("<o : some $v> v").unwrap();
        let Expression::Abstraction(abstraction) = &parsed else {
            panic!("expected an abstraction, got {}", parsed);
        };
        assert_eq!(abstraction.body, Expression::reference("v"));
    }

    #[test]
    fn test_globals_are_references() {
        let parsed = Parser::new("swap pair")
            .unwrap()
            .with_globals(vec![Name::from("swap")])
            .parse()
            .unwrap();
        assert_eq!(
            parsed,
            Expression::apply(Expression::reference("swap"), sym("pair"))
        );
    }

    #[test]
    fn test_special_atoms() {
        assert_eq!(parse("*").unwrap(), Expression::Wildcard);
        assert_eq!(parse("?").unwrap(), Expression::FreshValueGenerator);
        assert_eq!(parse("$r").unwrap(), Expression::reference("r"));
    }

    #[test]
    fn test_round_trips() {
        check_round_trip("rel a *");
        check_round_trip("(<x> $x) a");
        check_round_trip("<x : some $v> rel $x $v");
        check_round_trip("[rel a $r] $r");
        check_round_trip("{rel a d} [rel a d] yes");
        check_round_trip("f (g ?) (<y> $y)");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("(a b").is_err());
        assert!(parse("a b)").is_err());
        assert!(parse("<> a").is_err());
        assert!(parse("[a b").is_err());
        assert!(parse("{a}").is_err());
        let error = parse("rel a )").unwrap_err();
        assert_eq!(error.offset, 6);
    }
}
