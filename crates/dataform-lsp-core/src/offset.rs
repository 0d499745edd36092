//! Translating compiled-query line numbers back to source lines

use crate::config_block::ConfigBlockSpan;
use crate::diagnostic::Position;

/// Converts positions reported against the compiled query into positions in
/// the `.sqlx` source.
///
/// The compiled query lacks the config block but gains a fixed preamble of
/// `query_string_offset` lines from the compiler wrapper, so the shift is
/// `(block length + 1) - query_string_offset`. The block length changes as
/// the user edits the file, so the offset is computed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetReconciler {
    query_string_offset: i64,
}

impl OffsetReconciler {
    /// Create a reconciler for a compiler that injects `query_string_offset`
    /// lines before the user's query
    pub fn new(query_string_offset: i64) -> Self {
        Self {
            query_string_offset,
        }
    }

    /// Preamble length this reconciler was built with
    pub fn query_string_offset(&self) -> i64 {
        self.query_string_offset
    }

    /// Number of lines to add to a reported line number
    pub fn line_offset(&self, span: ConfigBlockSpan) -> i64 {
        (i64::from(span.len()) + 1) - self.query_string_offset
    }

    /// Shift a reported position onto the source file.
    ///
    /// Only the line moves; columns are reported against the same text in
    /// both representations. Lines that would become negative clamp to 0.
    pub fn remap(&self, span: ConfigBlockSpan, position: Position) -> Position {
        let line = i64::from(position.line) + self.line_offset(span);
        Position {
            line: line.clamp(0, i64::from(u32::MAX)) as u32,
            column: position.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_for_block_on_lines_two_to_six() {
        let reconciler = OffsetReconciler::new(3);
        let span = ConfigBlockSpan::new(2, 6);

        assert_eq!(reconciler.line_offset(span), 2);
        assert_eq!(
            reconciler.remap(span, Position::new(5, 10)),
            Position::new(7, 10)
        );
    }

    #[test]
    fn missing_block_uses_zero_length() {
        let reconciler = OffsetReconciler::new(3);
        assert_eq!(reconciler.line_offset(ConfigBlockSpan::NOT_FOUND), -2);
        assert_eq!(reconciler.line_offset(ConfigBlockSpan::new(4, 0)), -2);
    }

    #[test]
    fn column_is_never_adjusted() {
        let reconciler = OffsetReconciler::new(0);
        let remapped = reconciler.remap(ConfigBlockSpan::new(1, 10), Position::new(1, 42));
        assert_eq!(remapped.column, 42);
        assert_eq!(remapped.line, 11);
    }

    #[test]
    fn negative_lines_clamp_to_zero() {
        let reconciler = OffsetReconciler::new(3);
        let remapped = reconciler.remap(ConfigBlockSpan::NOT_FOUND, Position::new(1, 4));
        assert_eq!(remapped, Position::new(0, 4));
    }
}
