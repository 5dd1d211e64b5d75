//! src/source/format_iter.rs
//!
//! Format inference as an ordered sequence of tactics, cheapest first:
//!
//! 1. the object key's filename extension,
//! 2. the identifier's filename extension,
//! 3. the stored content type (one HEAD request),
//! 4. magic bytes (one small ranged GET).
//!
//! Only the last two touch the network, and only when actually reached.

use crate::models::format::{DETECT_READ_LENGTH, Format};
use crate::models::object::ByteRange;
use crate::models::variant::Identifier;
use crate::source::range_reader::RangeReader;
use tracing::warn;

const TACTIC_COUNT: usize = 4;

/// Advances through the inference tactics one call at a time.
pub struct FormatIterator {
    reader: RangeReader,
    identifier: Identifier,
    index: usize,
}

impl FormatIterator {
    pub(crate) fn new(reader: RangeReader, identifier: Identifier) -> Self {
        Self {
            reader,
            identifier,
            index: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.index < TACTIC_COUNT
    }

    /// Runs the next tactic. Returns `None` once every tactic has run;
    /// `Some(None)` when the tactic was inconclusive. Network failures are
    /// logged and count as inconclusive; sniffing is best-effort.
    pub async fn next(&mut self) -> Option<Option<Format>> {
        if !self.has_next() {
            return None;
        }
        let tactic = self.index;
        self.index += 1;
        let guess = match tactic {
            0 => Format::from_path_extension(self.reader.reference().key()),
            1 => Format::from_path_extension(self.identifier.as_str()),
            2 => match self.reader.head().await {
                Ok(attributes) => attributes
                    .content_type
                    .as_deref()
                    .and_then(Format::from_media_type),
                Err(err) => {
                    warn!("checking content type of {}: {}", self.reader.reference(), err);
                    None
                }
            },
            _ => {
                // The store clamps the range to the object end.
                let range = ByteRange::new(0, DETECT_READ_LENGTH - 1);
                match self.reader.fetch(range).await {
                    Ok(bytes) => Format::detect(&bytes),
                    Err(err) => {
                        warn!("checking magic bytes of {}: {}", self.reader.reference(), err);
                        None
                    }
                }
            }
        };
        Some(guess)
    }

    /// Runs remaining tactics in order until one is conclusive.
    pub async fn detect(&mut self) -> Option<Format> {
        while let Some(guess) = self.next().await {
            if guess.is_some() {
                return guess;
            }
        }
        None
    }
}
