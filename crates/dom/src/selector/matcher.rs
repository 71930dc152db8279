//! Right-to-left matching against the live tree
//!
//! The rightmost compound is tested against the candidate, then each
//! combinator walks parent or sibling links toward the left. Descendant and
//! subsequent-sibling steps backtrack over every viable anchor. Failed
//! `(node, part)` pairs are remembered for the rest of one match, so a
//! selector with several descendant steps stays polynomial in tree depth.

use super::{Combinator, ComplexSelector, CompoundSelector, PseudoClass, SelectorList, SelectorPart};
use crate::arena::DomArena;
use crate::error::Result;
use crate::types::{NodeData, NodeId};
use ahash::AHashSet;

/// `(node, part index)` pairs already known not to match
type Failed = AHashSet<(NodeId, usize)>;

impl DomArena {
    /// Test one node against a compiled list
    pub fn matches(&self, id: NodeId, list: &SelectorList) -> Result<bool> {
        matches_list(self, id, list)
    }
}

pub(crate) fn matches_list(arena: &DomArena, id: NodeId, list: &SelectorList) -> Result<bool> {
    for complex in &list.selectors {
        if matches_complex(arena, id, complex)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_complex(arena: &DomArena, id: NodeId, complex: &ComplexSelector) -> Result<bool> {
    match complex.parts.len() {
        0 => Ok(false),
        len => matches_part(arena, id, &complex.parts, len - 1, &mut Failed::default()),
    }
}

fn matches_part(
    arena: &DomArena,
    id: NodeId,
    parts: &[SelectorPart],
    index: usize,
    failed: &mut Failed,
) -> Result<bool> {
    if failed.contains(&(id, index)) {
        return Ok(false);
    }
    let matched = match_part_at(arena, id, parts, index, failed)?;
    if !matched {
        failed.insert((id, index));
    }
    Ok(matched)
}

fn match_part_at(
    arena: &DomArena,
    id: NodeId,
    parts: &[SelectorPart],
    index: usize,
    failed: &mut Failed,
) -> Result<bool> {
    let part = &parts[index];
    if !matches_compound(arena, id, &part.compound)? {
        return Ok(false);
    }

    let Some(combinator) = part.combinator else {
        return Ok(true);
    };
    // A combinator on the first part cannot come out of the parser
    let Some(next) = index.checked_sub(1) else {
        return Ok(false);
    };

    match combinator {
        Combinator::Child => match arena.parent(id)? {
            Some(parent) => matches_part(arena, parent, parts, next, failed),
            None => Ok(false),
        },
        Combinator::Descendant => {
            for ancestor in arena.ancestors(id)? {
                if matches_part(arena, ancestor, parts, next, failed)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Combinator::NextSibling => match preceding_elements(arena, id)?.last() {
            Some(&previous) => matches_part(arena, previous, parts, next, failed),
            None => Ok(false),
        },
        Combinator::SubsequentSibling => {
            for previous in preceding_elements(arena, id)?.into_iter().rev() {
                if matches_part(arena, previous, parts, next, failed)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn matches_compound(arena: &DomArena, id: NodeId, compound: &CompoundSelector) -> Result<bool> {
    let own = arena.read(id, |data| {
        data.as_element()
            .is_some_and(|element| compound.matches_element(element))
    })?;
    if !own {
        return Ok(false);
    }

    for pseudo in &compound.pseudo_classes {
        if !matches_pseudo(arena, id, pseudo)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_pseudo(arena: &DomArena, id: NodeId, pseudo: &PseudoClass) -> Result<bool> {
    match pseudo {
        PseudoClass::Not(inner) => Ok(!matches_list(arena, id, inner)?),
        PseudoClass::FirstChild => Ok(has_parent(arena, id)? && preceding_elements(arena, id)?.is_empty()),
        PseudoClass::LastChild => Ok(has_parent(arena, id)? && following_elements(arena, id)?.is_empty()),
        PseudoClass::OnlyChild => Ok(has_parent(arena, id)?
            && preceding_elements(arena, id)?.is_empty()
            && following_elements(arena, id)?.is_empty()),
        PseudoClass::Empty => {
            for child in arena.children(id)? {
                let blank = arena.read(child, |data| match data {
                    NodeData::Comment { .. } => true,
                    NodeData::Text { data } => data.is_empty(),
                    _ => false,
                })?;
                if !blank {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        PseudoClass::Root => match arena.parent(id)? {
            Some(parent) => arena.read(parent, |data| matches!(data, NodeData::Document(_))),
            None => Ok(false),
        },
    }
}

fn has_parent(arena: &DomArena, id: NodeId) -> Result<bool> {
    Ok(arena.parent(id)?.is_some())
}

/// Element siblings before `id`, in document order
fn preceding_elements(arena: &DomArena, id: NodeId) -> Result<Vec<NodeId>> {
    sibling_elements(arena, id, true)
}

/// Element siblings after `id`, in document order
fn following_elements(arena: &DomArena, id: NodeId) -> Result<Vec<NodeId>> {
    sibling_elements(arena, id, false)
}

fn sibling_elements(arena: &DomArena, id: NodeId, before: bool) -> Result<Vec<NodeId>> {
    let Some(parent) = arena.parent(id)? else {
        return Ok(Vec::new());
    };
    let children = arena.children(parent)?;
    let Some(index) = children.iter().position(|&child| child == id) else {
        return Ok(Vec::new());
    };

    let range = if before {
        &children[..index]
    } else {
        &children[index + 1..]
    };

    let mut elements = Vec::with_capacity(range.len());
    for &sibling in range {
        // Siblings disposed concurrently are skipped, not reported
        if arena
            .read(sibling, |data| data.as_element().is_some())
            .unwrap_or(false)
        {
            elements.push(sibling);
        }
    }
    Ok(elements)
}
