//! Indented bullet-list import.
//!
//! # Responsibility
//! - Parse plain-text outlines (`-`, `*` or `+` bullets, two-space indents).
//! - Turn the parsed forest into `CreateThought` intents under one context.
//!
//! # Invariants
//! - A single leading root-token line is dropped so exported text imports
//!   back to the same tree.
//! - Imported siblings are ranked after any children already present.

use crate::model::hash::ContextHash;
use crate::model::path::{is_root_token, Context};
use crate::model::rank::Rank;
use crate::reducers::{reduce_all, Intent, ReducerError, Transition};
use crate::selectors;
use crate::state::State;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One parsed line with its nested lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub value: String,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// A line is indented less than the first line of the outline.
    InvalidIndent { line: usize },
    /// Applying the generated intents failed.
    Reducer(ReducerError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIndent { line } => write!(f, "invalid indentation at line {line}"),
            Self::Reducer(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Reducer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReducerError> for ImportError {
    fn from(value: ReducerError) -> Self {
        Self::Reducer(value)
    }
}

const TAB_WIDTH: usize = 2;

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|ch| *ch == ' ' || *ch == '\t')
        .map(|ch| if ch == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn bullet_value(content: &str) -> &str {
    for bullet in ['-', '*', '+'] {
        if content == bullet.to_string() {
            return "";
        }
        if let Some(rest) = content.strip_prefix(bullet) {
            if rest.starts_with(' ') || rest.starts_with('\t') {
                return rest.trim();
            }
        }
    }
    content
}

/// Parses indented text into a forest of nodes.
///
/// Blank lines are skipped. A line indented deeper than the previous one
/// becomes its child; indentation amounts are relative, not fixed.
pub fn parse_outline(text: &str) -> Result<Vec<OutlineNode>, ImportError> {
    let mut roots: Vec<OutlineNode> = Vec::new();
    let mut stack: Vec<(usize, OutlineNode)> = Vec::new();
    let mut base = None;

    for (number, line) in text.lines().enumerate() {
        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        let indent = indent_width(line);
        if indent < *base.get_or_insert(indent) {
            return Err(ImportError::InvalidIndent { line: number + 1 });
        }
        while stack.last().is_some_and(|(depth, _)| *depth >= indent) {
            attach(&mut stack, &mut roots);
        }
        stack.push((indent, OutlineNode::new(bullet_value(content))));
    }
    while !stack.is_empty() {
        attach(&mut stack, &mut roots);
    }

    if roots.len() == 1 && is_root_token(&roots[0].value) {
        return Ok(roots.remove(0).children);
    }
    Ok(roots)
}

fn attach(stack: &mut Vec<(usize, OutlineNode)>, roots: &mut Vec<OutlineNode>) {
    if let Some((_, node)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Builds the intents that recreate `text` under `context`.
pub fn import_intents(
    state: &State,
    context: &Context,
    text: &str,
) -> Result<Vec<Intent>, ImportError> {
    let nodes = parse_outline(text)?;
    let mut next_ranks: HashMap<ContextHash, Rank> = HashMap::new();
    let mut intents = Vec::new();
    push_intents(state, &context.canonical(), &nodes, &mut next_ranks, &mut intents);
    Ok(intents)
}

fn push_intents(
    state: &State,
    context: &Context,
    nodes: &[OutlineNode],
    next_ranks: &mut HashMap<ContextHash, Rank>,
    intents: &mut Vec<Intent>,
) {
    for node in nodes {
        let rank = next_ranks
            .entry(context.hash())
            .or_insert_with(|| selectors::get_next_rank(state, context));
        let placed = *rank;
        *rank = placed.after();
        intents.push(Intent::CreateThought {
            context: context.clone(),
            value: node.value.clone(),
            rank: placed,
        });
        push_intents(
            state,
            &context.child(&node.value),
            &node.children,
            next_ranks,
            intents,
        );
    }
}

/// Parses `text` and applies it under `context` as one transition.
pub fn import_text(state: &State, context: &Context, text: &str) -> Result<Transition, ImportError> {
    let intents = import_intents(state, context, text)?;
    Ok(reduce_all(state, &intents)?)
}
