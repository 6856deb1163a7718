//! Outline export as indented plain text or nested HTML lists.
//!
//! # Invariants
//! - Children are emitted in `(rank, id)` order.
//! - Export refuses to run over non-loaded parent records.

use crate::model::parent::Child;
use crate::model::path::{is_meta_value, Context, ARCHIVE_TOKEN, ROOT_TOKEN};
use crate::selectors;
use crate::state::{FetchRequest, State};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Output format, addressed by MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    PlainText,
    Html,
}

impl ExportFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "text/plain" | "plain" | "text" => Ok(Self::PlainText),
            "text/html" | "html" => Ok(Self::Html),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Filters and labels applied during export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Leaves out every `=`-prefixed meta attribute.
    pub exclude_meta: bool,
    /// Leaves out `=archive` subtrees.
    pub exclude_archived: bool,
    /// Replaces the head line; defaults to the context head.
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    UnsupportedFormat(String),
    NeedsFetch(FetchRequest),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(value) => write!(f, "unsupported export format: {value}"),
            Self::NeedsFetch(request) => write!(
                f,
                "export needs {} unloaded contexts",
                request.contexts.len()
            ),
        }
    }
}

impl Error for ExportError {}

/// Renders `context` and its descendants.
pub fn export_context(
    state: &State,
    context: &Context,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<String, ExportError> {
    let context = context.canonical();
    let mut request = FetchRequest::new();
    collect_pending(state, &context, options, &mut request, 0);
    if !request.is_empty() {
        return Err(ExportError::NeedsFetch(request));
    }

    let title = options
        .title
        .clone()
        .unwrap_or_else(|| context.head().unwrap_or(ROOT_TOKEN).to_string());
    let mut out = String::new();
    match format {
        ExportFormat::PlainText => {
            out.push_str("- ");
            out.push_str(&title);
            write_plain(state, &context, options, 1, &mut out);
        }
        ExportFormat::Html => {
            out.push_str("<ul>\n  <li>");
            out.push_str(&escape_html(&title));
            write_html(state, &context, options, 2, &mut out);
            out.push_str("</li>\n</ul>");
        }
    }
    Ok(out)
}

const MAX_DEPTH: usize = 256;

fn visible_children(state: &State, context: &Context, options: &ExportOptions) -> Vec<Child> {
    selectors::get_all_children(state, context)
        .into_iter()
        .filter(|child| {
            let meta = options.exclude_meta && is_meta_value(&child.value);
            let archived = options.exclude_archived && child.value == ARCHIVE_TOKEN;
            !(meta || archived)
        })
        .collect()
}

fn collect_pending(
    state: &State,
    context: &Context,
    options: &ExportOptions,
    request: &mut FetchRequest,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        return;
    }
    if selectors::is_pending(state, context) {
        request.add_context(context);
        return;
    }
    for child in visible_children(state, context, options) {
        collect_pending(state, &context.child(&child.value), options, request, depth + 1);
    }
}

fn write_plain(
    state: &State,
    context: &Context,
    options: &ExportOptions,
    depth: usize,
    out: &mut String,
) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in visible_children(state, context, options) {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
        out.push_str("- ");
        out.push_str(&child.value);
        write_plain(state, &context.child(&child.value), options, depth + 1, out);
    }
}

fn write_html(
    state: &State,
    context: &Context,
    options: &ExportOptions,
    depth: usize,
    out: &mut String,
) {
    let children = visible_children(state, context, options);
    if children.is_empty() || depth > MAX_DEPTH {
        return;
    }
    let indent = "  ".repeat(depth);
    out.push_str("<ul>");
    for child in children {
        out.push('\n');
        out.push_str(&indent);
        out.push_str("<li>");
        out.push_str(&escape_html(&child.value));
        write_html(state, &context.child(&child.value), options, depth + 1, out);
        out.push_str("</li>");
    }
    out.push('\n');
    out.push_str(&"  ".repeat(depth - 1));
    out.push_str("</ul>");
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
