//! Character-level text comparison.

use serde::Serialize;
use similar::{Algorithm, DiffTag, TextDiff};
use std::ops::Range;

/// Kind of a [`DiffOpcode`] span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    /// Same text on both sides
    Equal,
    /// Text only on the right
    Insert,
    /// Text only on the left
    Delete,
    /// Left text replaced by right text
    Replace,
}

impl From<DiffTag> for OpTag {
    fn from(tag: DiffTag) -> Self {
        match tag {
            DiffTag::Equal => Self::Equal,
            DiffTag::Insert => Self::Insert,
            DiffTag::Delete => Self::Delete,
            DiffTag::Replace => Self::Replace,
        }
    }
}

/// One span of a diff. Ranges count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOpcode {
    /// Span kind
    pub tag: OpTag,
    /// Character range in the left text
    pub lhs: Range<usize>,
    /// Character range in the right text
    pub rhs: Range<usize>,
}

impl DiffOpcode {
    /// The left-hand text covered by this span.
    #[must_use]
    pub fn lhs_text(&self, lhs: &str) -> String {
        slice_chars(lhs, &self.lhs)
    }

    /// The right-hand text covered by this span.
    #[must_use]
    pub fn rhs_text(&self, rhs: &str) -> String {
        slice_chars(rhs, &self.rhs)
    }
}

fn slice_chars(text: &str, range: &Range<usize>) -> String {
    text.chars()
        .skip(range.start)
        .take(range.end.saturating_sub(range.start))
        .collect()
}

/// Longest-common-subsequence opcodes turning `lhs` into `rhs`.
///
/// The spans cover both strings completely and in order.
#[must_use]
pub fn diff_opcodes(lhs: &str, rhs: &str) -> Vec<DiffOpcode> {
    TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_chars(lhs, rhs)
        .ops()
        .iter()
        .map(|op| {
            let (tag, lhs, rhs) = op.as_tag_tuple();
            DiffOpcode {
                tag: tag.into(),
                lhs,
                rhs,
            }
        })
        .collect()
}

/// `2 * matched / total` over the characters of both strings, in `0.0..=1.0`.
///
/// Two empty strings are identical.
#[must_use]
pub fn similarity_ratio(lhs: &str, rhs: &str) -> f64 {
    f64::from(
        TextDiff::configure()
            .algorithm(Algorithm::Lcs)
            .diff_chars(lhs, rhs)
            .ratio(),
    )
}
