//! Text change narrative
//!
//! Turns the extracted text of both documents into a human-readable list of
//! changes. The comparison itself is delegated to a [`TextComparator`]; this
//! module only chunks the input and normalizes the output.

mod provider;
mod service;
mod types;

#[cfg(test)]
pub(crate) use provider::MockComparator;
pub use provider::{OpenAiComparator, TextComparator, DEFAULT_API_URL, DEFAULT_MODEL};
pub use service::{chunk_text, parse_differences, NarrativeService};
pub use types::{ChangeNarrative, NarrativeError, NarrativeLine, DEFAULT_CHUNK_SIZE, NO_DIFFERENCES};
