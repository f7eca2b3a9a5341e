//! Narrative types

use serde::Serialize;

/// Default maximum chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Returned by comparators when a chunk pair has no differences to report
pub const NO_DIFFERENCES: &str = "No differences found.";

/// Narrative errors
///
/// None of these affect the visual comparison.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("Narrative service request failed: {0}")]
    Http(String),

    #[error("Narrative service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed narrative response: {0}")]
    MalformedResponse(String),

    #[error("Narrative request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Narrative service is not configured")]
    NotConfigured,
}

/// Structured description of textual changes
///
/// `summary` holds one entry per line. Group headers end with `:`; bullets
/// under a header are indented by two spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNarrative {
    pub summary: String,
}

/// One classified narrative line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NarrativeLine {
    Header {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Item {
        text: String,
        bulleted: bool,
        indented: bool,
    },
}

impl ChangeNarrative {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }

    /// Classify every non-blank line as a header or an item
    pub fn lines(&self) -> Vec<NarrativeLine> {
        self.summary
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(classify_line)
            .collect()
    }
}

fn strip_bullet(line: &str) -> Option<&str> {
    line.strip_prefix('•')
        .or_else(|| line.strip_prefix('-'))
        .map(str::trim_start)
}

fn classify_line(raw: &str) -> NarrativeLine {
    let line = raw.trim();

    if line.contains("**") || line.ends_with(':') {
        let unstarred = line.replace("**", "");
        let text = strip_bullet(&unstarred).unwrap_or(&unstarred).to_string();
        return NarrativeLine::Header { text };
    }

    let indented = raw.starts_with(char::is_whitespace);
    match strip_bullet(line) {
        Some(text) => NarrativeLine::Item {
            text: text.to_string(),
            bulleted: true,
            indented,
        },
        None => NarrativeLine::Item {
            text: line.to_string(),
            bulleted: false,
            indented,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_classification() {
        let narrative = ChangeNarrative::new(
            "• Currency Symbol Change:\n  • $ → €\n**Dates**\nPlain remark\n\n- loose bullet",
        );
        let lines = narrative.lines();

        assert_eq!(
            lines,
            vec![
                NarrativeLine::Header {
                    text: "Currency Symbol Change:".to_string()
                },
                NarrativeLine::Item {
                    text: "$ → €".to_string(),
                    bulleted: true,
                    indented: true
                },
                NarrativeLine::Header {
                    text: "Dates".to_string()
                },
                NarrativeLine::Item {
                    text: "Plain remark".to_string(),
                    bulleted: false,
                    indented: false
                },
                NarrativeLine::Item {
                    text: "loose bullet".to_string(),
                    bulleted: true,
                    indented: false
                },
            ]
        );
    }

    #[test]
    fn test_empty_narrative() {
        assert!(ChangeNarrative::default().is_empty());
        assert!(ChangeNarrative::new(" \n ").lines().is_empty());
    }
}
