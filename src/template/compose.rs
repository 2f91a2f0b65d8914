use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::format::{self, RAND20_MAX};
use super::{Element, Template};
use crate::contracts::ComposeError;

/// Inputs of one composition besides the template itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeContext {
    /// Reference instant for `date` elements.
    pub at: DateTime<Utc>,
    /// Pre-allocated sequence number shared by every `seq` element.
    pub sequence: Option<u64>,
}

impl ComposeContext {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at, sequence: None }
    }

    /// Context at the current instant with no sequence number.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

impl Default for ComposeContext {
    fn default() -> Self {
        Self::now()
    }
}

/// Composes one identifier from `template`.
///
/// Elements are rendered in order and concatenated. Each `rand20` element
/// draws from `rng`; elements sharing an `id` reuse the first draw. The
/// composer never allocates sequence numbers itself.
pub fn compose<R: Rng>(
    template: &Template,
    ctx: &ComposeContext,
    rng: &mut R,
) -> Result<String, ComposeError> {
    if !template.enabled {
        return Err(ComposeError::TemplateDisabled);
    }
    let sequence = match (template.needs_sequence(), ctx.sequence) {
        (true, None) => return Err(ComposeError::MissingSequence),
        (_, seq) => seq,
    };

    let mut draws: HashMap<&str, u32> = HashMap::new();
    let mut out = String::new();

    for element in &template.elements {
        match element {
            Element::Fixed { value, .. } => out.push_str(&format::fixed(value)),
            Element::Rand20 { id, fmt } => {
                let raw = match id.as_deref() {
                    Some(id) => *draws
                        .entry(id)
                        .or_insert_with(|| rng.random_range(0..=RAND20_MAX)),
                    None => rng.random_range(0..=RAND20_MAX),
                };
                out.push_str(&format::rand20(raw, fmt.as_deref()));
            }
            Element::Seq { fmt, width, .. } => {
                // needs_sequence() guarantees a number is present here.
                if let Some(number) = sequence {
                    out.push_str(&format::seq(number, fmt.as_deref(), *width));
                }
            }
            Element::Date { fmt, .. } => out.push_str(&format::date(&ctx.at, fmt.as_deref())),
            Element::Unknown { .. } => {}
        }
    }

    if out.trim().is_empty() {
        return Err(ComposeError::EmptyResult);
    }
    Ok(out)
}

/// Renders a sample identifier without touching storage.
///
/// Templates with a sequence element are rendered with `next_sequence`;
/// callers usually pass the counter's current value plus one. Disabled
/// templates are previewed as if enabled.
pub fn preview<R: Rng>(
    template: &Template,
    at: DateTime<Utc>,
    next_sequence: u64,
    rng: &mut R,
) -> Result<String, ComposeError> {
    let enabled;
    let template = if template.enabled {
        template
    } else {
        enabled = Template {
            enabled: true,
            elements: template.elements.clone(),
        };
        &enabled
    };
    compose(
        template,
        &ComposeContext::new(at).with_sequence(next_sequence),
        rng,
    )
}
