//! Rendering of documents with their hits highlighted.

use std::fmt::Write;

use crate::error::{Result, SemsearchError};
use crate::index::DocumentData;
use crate::query::Binding;

/// Writes a document, with its hits marked, to a text sink.
pub trait DocumentRenderer: Send + Sync {
    /// Render `document` to `out`, marking every token covered by `hits`.
    fn render(&self, document: &DocumentData, hits: &[Binding], out: &mut dyn Write)
    -> Result<()>;
}

/// Configuration for hit highlighting.
#[derive(Debug, Clone)]
pub struct HighlightConfig {
    /// HTML tag to wrap highlighted spans (e.g., "mark", "em", "strong").
    pub tag: String,
    /// CSS class to add to highlight tags.
    pub css_class: Option<String>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig {
            tag: "mark".to_string(),
            css_class: None,
        }
    }
}

impl HighlightConfig {
    /// Create a new highlight configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTML tag for highlighting.
    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the CSS class for highlight tags.
    pub fn css_class<S: Into<String>>(mut self, css_class: S) -> Self {
        self.css_class = Some(css_class.into());
        self
    }

    /// Build the opening HTML tag.
    pub fn opening_tag(&self) -> String {
        if let Some(ref css_class) = self.css_class {
            format!("<{} class=\"{}\">", self.tag, css_class)
        } else {
            format!("<{}>", self.tag)
        }
    }

    /// Build the closing HTML tag.
    pub fn closing_tag(&self) -> String {
        format!("</{}>", self.tag)
    }
}

/// Renders the token stream separated by single spaces, wrapping each run of
/// hit tokens in the configured tag. Overlapping hits merge into one run.
#[derive(Debug, Clone, Default)]
pub struct HighlightRenderer {
    config: HighlightConfig,
}

impl HighlightRenderer {
    /// Create a renderer with the given configuration.
    pub fn new(config: HighlightConfig) -> Self {
        HighlightRenderer { config }
    }

    /// Get the highlight configuration.
    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    fn write_tokens(
        &self,
        document: &DocumentData,
        hits: &[Binding],
        out: &mut dyn Write,
    ) -> std::fmt::Result {
        let opening = self.config.opening_tag();
        let closing = self.config.closing_tag();
        let mut in_hit = false;

        for (position, token) in document.tokens.iter().enumerate() {
            let covered = hits.iter().any(|hit| hit.covers(position));
            if covered && !in_hit {
                if position > 0 {
                    out.write_char(' ')?;
                }
                out.write_str(&opening)?;
            } else if !covered && in_hit {
                out.write_str(&closing)?;
                out.write_char(' ')?;
            } else if position > 0 {
                out.write_char(' ')?;
            }
            out.write_str(token)?;
            in_hit = covered;
        }
        if in_hit {
            out.write_str(&closing)?;
        }
        Ok(())
    }
}

impl DocumentRenderer for HighlightRenderer {
    fn render(
        &self,
        document: &DocumentData,
        hits: &[Binding],
        out: &mut dyn Write,
    ) -> Result<()> {
        self.write_tokens(document, hits, out)
            .map_err(|e| SemsearchError::other(format!("Failed to render document: {e}")))
    }
}
