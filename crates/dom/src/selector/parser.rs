//! Selector text → [`SelectorList`]
//!
//! Single-pass recursive descent over the input. Errors carry the byte
//! offset where parsing stopped.

use super::{
    AttrOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, PseudoClass,
    SelectorList, SelectorPart,
};
use crate::error::{DomError, Result};

pub(super) fn parse(input: &str) -> Result<SelectorList> {
    let mut parser = Parser { input, pos: 0 };
    let list = parser.parse_list()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{}'", c)));
    }
    Ok(list)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> DomError {
        DomError::selector(self.input, self.pos, reason)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected)))
        }
    }

    /// Returns true if any whitespace was consumed
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_list(&mut self) -> Result<SelectorList> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            if !self.eat(',') {
                break;
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector> {
        let mut parts = vec![SelectorPart {
            compound: self.parse_compound()?,
            combinator: None,
        }];

        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') | Some(')') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_whitespace();
            }
            if matches!(self.peek(), None | Some(',') | Some(')')) {
                return Err(self.error("combinator is not followed by a selector"));
            }

            parts.push(SelectorPart {
                compound: self.parse_compound()?,
                combinator: Some(combinator),
            });
        }

        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector> {
        let start = self.pos;
        let mut compound = CompoundSelector::default();

        if self.eat('*') {
            compound.universal = true;
        } else if let Some(tag) = self.ident() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self
                        .ident()
                        .ok_or_else(|| self.error("expected identifier after '#'"))?;
                    if compound.id.as_ref().is_some_and(|existing| *existing != id) {
                        return Err(self.error("conflicting id selectors"));
                    }
                    compound.id = Some(id);
                }
                Some('.') => {
                    self.bump();
                    let class = self
                        .ident()
                        .ok_or_else(|| self.error("expected identifier after '.'"))?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.pseudo_classes.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector> {
        self.skip_whitespace();
        let name = self
            .ident()
            .ok_or_else(|| self.error("expected attribute name"))?
            .to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match (self.peek(), self.peek_second()) {
            (Some(']'), _) => {
                self.bump();
                return Ok(AttributeSelector {
                    name,
                    operator: AttrOperator::Exists,
                    value: String::new(),
                });
            }
            (Some('='), _) => AttrOperator::Equals,
            (Some('^'), Some('=')) => AttrOperator::Prefix,
            (Some('$'), Some('=')) => AttrOperator::Suffix,
            (Some('*'), Some('=')) => AttrOperator::Substring,
            (Some('~'), Some('=')) => AttrOperator::Includes,
            (Some('|'), Some('=')) => AttrOperator::DashMatch,
            _ => return Err(self.error("expected attribute operator or ']'")),
        };
        if operator != AttrOperator::Equals {
            self.bump();
        }
        self.bump();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.quoted(quote)?
            }
            _ => self
                .ident()
                .ok_or_else(|| self.error("expected attribute value"))?,
        };

        self.skip_whitespace();
        self.expect(']')?;
        Ok(AttributeSelector {
            name,
            operator,
            value,
        })
    }

    fn parse_pseudo(&mut self) -> Result<PseudoClass> {
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-elements are not supported"));
        }
        let name = self
            .ident()
            .ok_or_else(|| self.error("expected pseudo-class name"))?
            .to_ascii_lowercase();

        match name.as_str() {
            "not" => {
                self.expect('(')?;
                let inner = self.parse_list()?;
                self.skip_whitespace();
                self.expect(')')?;
                Ok(PseudoClass::Not(inner))
            }
            "first-child" => Ok(PseudoClass::FirstChild),
            "last-child" => Ok(PseudoClass::LastChild),
            "only-child" => Ok(PseudoClass::OnlyChild),
            "empty" => Ok(PseudoClass::Empty),
            "root" => Ok(PseudoClass::Root),
            other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
        }
    }

    /// Identifier with backslash escapes, `None` if nothing was consumed
    fn ident(&mut self) -> Option<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                }
            } else if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                self.bump();
                out.push(c);
            } else {
                break;
            }
        }
        (!out.is_empty()).then_some(out)
    }

    /// Body of a quoted string, opening quote already consumed
    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated string"))
    }
}
