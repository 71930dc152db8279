//! Selector engine
//!
//! `compile` turns selector text into an immutable [`SelectorList`];
//! matching walks the real tree through the arena and never mutates the
//! tree or the compiled list, so one list can be evaluated many times.
//!
//! Supported syntax:
//!
//! ```text
//! list      := complex ( ',' complex )*
//! complex   := compound ( combinator compound )*
//! combinator:= ' ' | '>' | '+' | '~'
//! compound  := ( tag | '*' )? ( '#id' | '.class' | '[attr op value]' | ':pseudo' )*
//! pseudo    := not( list ) | first-child | last-child | only-child | empty | root
//! ```

pub(crate) mod matcher;
mod parser;

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{ElementData, NodeId};
use std::str::FromStr;

/// Comma-separated alternatives, a node matches if any alternative does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    /// Compile selector text
    pub fn compile(selector: &str) -> Result<Self> {
        parser::parse(selector)
    }

    /// All matches under `root` in document order
    pub fn evaluate(&self, arena: &DomArena, root: NodeId) -> Result<Vec<NodeId>> {
        arena.select(root, self)
    }
}

impl FromStr for SelectorList {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

/// Compound selectors joined by combinators, stored left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub parts: Vec<SelectorPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPart {
    pub compound: CompoundSelector,
    /// Relation to the previous (left) part, `None` for the first one
    pub combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub universal: bool,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub pseudo_classes: Vec<PseudoClass>,
}

impl CompoundSelector {
    /// Check the predicates that only depend on the element itself
    pub fn matches_element(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|class| element.has_class(class))
            && self
                .attributes
                .iter()
                .all(|attr| attr.matches(element.attr(&attr.name)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Lowercased attribute name
    pub name: String,
    pub operator: AttrOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[name]`
    Exists,
    /// `[name=value]`
    Equals,
    /// `[name^=value]`
    Prefix,
    /// `[name$=value]`
    Suffix,
    /// `[name*=value]`
    Substring,
    /// `[name~=value]`
    Includes,
    /// `[name|=value]`
    DashMatch,
}

impl AttributeSelector {
    /// An absent attribute never matches
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let expected = self.value.as_str();

        match self.operator {
            AttrOperator::Exists => true,
            AttrOperator::Equals => actual == expected,
            AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOperator::Substring => !expected.is_empty() && actual.contains(expected),
            AttrOperator::Includes => {
                !expected.is_empty()
                    && !expected.contains(|c: char| c.is_ascii_whitespace())
                    && actual.split_ascii_whitespace().any(|token| token == expected)
            }
            AttrOperator::DashMatch => {
                actual == expected
                    || (actual.len() > expected.len()
                        && actual.starts_with(expected)
                        && actual.as_bytes()[expected.len()] == b'-')
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    /// Negation of a full selector list, evaluated in the node's real tree position
    Not(SelectorList),
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Root,
}
