//! Placeholder substitution for narrative notes.
//!
//! Note lines reference projection results through `{key}` placeholders,
//! optionally with a fixed-precision spec (`{proj_pre_final:.2f}`). `{{` and
//! `}}` emit literal braces. Every placeholder must resolve; a typo in a key
//! aborts the run before anything is written, rather than publishing a
//! report with a hole in it.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{
    Crossing, CrossingOutcome, DatasetStats, NoteSection, NotesFile, PhaseFit, RunSpec,
};
use crate::error::{AppError, EXIT_INPUT};
use crate::report::format::{describe_outcome, long_date};

/// A substitutable value. Dates render in the report's long form, numbers
/// honor an optional `.Nf` spec.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Keyed values available to note placeholders.
#[derive(Debug, Clone, Default)]
pub struct NoteContext {
    values: BTreeMap<String, NoteValue>,
}

impl NoteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), NoteValue::Text(value.into()));
    }

    pub fn insert_number(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), NoteValue::Number(value));
    }

    pub fn insert_date(&mut self, key: &str, value: NaiveDate) {
        self.values.insert(key.to_string(), NoteValue::Date(value));
    }

    pub fn get(&self, key: &str) -> Option<&NoteValue> {
        self.values.get(key)
    }
}

/// Substitution failure.
#[derive(Debug, Clone, PartialEq)]
pub enum NotesError {
    /// A placeholder referenced a key the run does not provide.
    MissingKey { key: String, line: String },
    /// A placeholder was malformed (unclosed brace, bad format spec, spec on
    /// a non-numeric value).
    BadPlaceholder { detail: String, line: String },
}

impl std::fmt::Display for NotesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotesError::MissingKey { key, line } => {
                write!(f, "notes reference unknown key '{key}' in line: {line}")
            }
            NotesError::BadPlaceholder { detail, line } => {
                write!(f, "bad placeholder ({detail}) in line: {line}")
            }
        }
    }
}

impl std::error::Error for NotesError {}

impl From<NotesError> for AppError {
    fn from(err: NotesError) -> Self {
        AppError::new(EXIT_INPUT, err.to_string())
    }
}

/// The standard context every report run provides to its notes.
pub fn build_context(
    stats: &DatasetStats,
    spec: &RunSpec,
    pre: &PhaseFit,
    post: &PhaseFit,
    pre_horizon_value: f64,
    crossings: &[Crossing],
) -> NoteContext {
    let mut ctx = NoteContext::new();
    ctx.insert_number("proj_pre_final", pre_horizon_value);
    ctx.insert_number("vgpr", spec.vgpr_threshold);
    ctx.insert_number("cr", spec.cr_threshold);
    ctx.insert_date("latest_date", stats.date_max);
    ctx.insert_number("latest_kappa", stats.kappa_latest);
    ctx.insert_text("pre_model", pre.fit.model.kind.display_name());
    ctx.insert_text("post_model", post.fit.model.kind.display_name());

    for c in crossings {
        let key = format!("{}_date", c.kind.key());
        match c.outcome {
            CrossingOutcome::Reached { date, .. } => ctx.insert_date(&key, date),
            _ => ctx.insert_text(&key, describe_outcome(&c.outcome)),
        }
    }
    ctx
}

/// Render every section of a notes file, substituting all placeholders.
///
/// All lines are rendered before anything is returned, so a bad key anywhere
/// fails the whole render.
pub fn render_sections(notes: &NotesFile, ctx: &NoteContext) -> Result<Vec<NoteSection>, NotesError> {
    notes
        .sections
        .iter()
        .map(|section| {
            let content = section
                .content
                .iter()
                .map(|line| render_line(line, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NoteSection {
                title: section.title.clone(),
                content,
            })
        })
        .collect()
}

/// Substitute one line's placeholders.
pub fn render_line(line: &str, ctx: &NoteContext) -> Result<String, NotesError> {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for c2 in chars.by_ref() {
                    if c2 == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(c2);
                }
                if !closed {
                    return Err(NotesError::BadPlaceholder {
                        detail: "unclosed '{'".to_string(),
                        line: line.to_string(),
                    });
                }
                out.push_str(&render_placeholder(&inner, ctx, line)?);
            }
            '}' => {
                return Err(NotesError::BadPlaceholder {
                    detail: "unmatched '}'".to_string(),
                    line: line.to_string(),
                });
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn render_placeholder(inner: &str, ctx: &NoteContext, line: &str) -> Result<String, NotesError> {
    let (key, spec) = match inner.split_once(':') {
        Some((key, spec)) => (key, Some(spec)),
        None => (inner, None),
    };

    let value = ctx.get(key).ok_or_else(|| NotesError::MissingKey {
        key: key.to_string(),
        line: line.to_string(),
    })?;

    match (value, spec) {
        (NoteValue::Text(s), None) => Ok(s.clone()),
        (NoteValue::Date(d), None) => Ok(long_date(*d)),
        (NoteValue::Number(v), None) => Ok(format!("{v}")),
        (NoteValue::Number(v), Some(spec)) => {
            let dp = parse_float_spec(spec).ok_or_else(|| NotesError::BadPlaceholder {
                detail: format!("unsupported format spec '{spec}'"),
                line: line.to_string(),
            })?;
            Ok(format!("{v:.dp$}"))
        }
        (_, Some(spec)) => Err(NotesError::BadPlaceholder {
            detail: format!("format spec '{spec}' only applies to numeric keys (key '{key}')"),
            line: line.to_string(),
        }),
    }
}

/// Accept `.Nf` fixed-point specs, nothing else.
fn parse_float_spec(spec: &str) -> Option<usize> {
    spec.strip_prefix('.')?.strip_suffix('f')?.parse().ok()
}
