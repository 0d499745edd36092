//! Locating the leading `config { ... }` block of a `.sqlx` file
//!
//! The compiler strips the config block from the file before it emits the
//! query, so any line number reported against the compiled query has to be
//! shifted by the block's length. The locator scans the document once and
//! reports where the block starts and ends.

/// Line range of the config block.
///
/// Both lines are 1-indexed: `start_line` is the line holding the `config`
/// token and `end_line` the line holding the brace that closes the block.
/// `0` means "not found" for either bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigBlockSpan {
    /// Line of the `config` token (1-indexed), or 0
    pub start_line: u32,

    /// Line of the closing brace (1-indexed), or 0
    pub end_line: u32,
}

impl ConfigBlockSpan {
    /// Span returned when the document has no config block
    pub const NOT_FOUND: Self = Self {
        start_line: 0,
        end_line: 0,
    };

    /// Create a span from explicit bounds
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Whether both the opening and closing lines were found
    pub fn is_closed(&self) -> bool {
        self.start_line > 0 && self.end_line >= self.start_line
    }

    /// Number of lines between the `config` line and the closing brace.
    ///
    /// An unclosed block counts as empty.
    pub fn len(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line)
    }

    /// True when the span covers no lines
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scanner state while walking the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No `config` token seen yet
    BeforeBlock,

    /// Past the `config` token, with `depth` braces currently open
    InsideBlock { depth: u32 },

    /// The brace matching the block's opening brace was found
    Closed,
}

/// Finds the config block of a document
pub struct ConfigBlockLocator;

impl ConfigBlockLocator {
    /// Scan `lines` top to bottom and return the span of the config block.
    ///
    /// Braces are counted per character, so a line such as
    /// `assertions: { uniqueKey: ["id"] },` opens and closes within itself.
    /// Only the first `config` token starts a block; later ones are part of
    /// the block body. If the document ends before the block closes, the
    /// start line is returned with an `end_line` of 0.
    pub fn locate<'a, I>(lines: I) -> ConfigBlockSpan
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut span = ConfigBlockSpan::NOT_FOUND;
        let mut state = ScanState::BeforeBlock;

        for (index, line) in lines.into_iter().enumerate() {
            let line_number = index as u32 + 1;

            if state == ScanState::BeforeBlock {
                if !contains_config_token(line) {
                    continue;
                }
                span.start_line = line_number;
                state = ScanState::InsideBlock { depth: 0 };
            }

            state = Self::advance(state, line);

            if state == ScanState::Closed {
                span.end_line = line_number;
                return span;
            }
        }

        span
    }

    /// Feed one line's braces through the state machine
    fn advance(state: ScanState, line: &str) -> ScanState {
        let ScanState::InsideBlock { mut depth } = state else {
            return state;
        };

        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    // A closing brace at depth 0 ends the block even when the
                    // opening brace was never seen on its own line.
                    if depth <= 1 {
                        return ScanState::Closed;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        ScanState::InsideBlock { depth }
    }
}

/// Whether `line` contains `config` as a standalone word
fn contains_config_token(line: &str) -> bool {
    const TOKEN: &str = "config";
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    line.match_indices(TOKEN).any(|(start, _)| {
        let before = line[..start].chars().next_back();
        let after = line[start + TOKEN.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locate(lines: &[&str]) -> ConfigBlockSpan {
        ConfigBlockLocator::locate(lines.iter().copied())
    }

    #[test]
    fn single_level_block() {
        let span = locate(&["config {", "  type: \"table\"", "}", "select 1"]);
        assert_eq!(span, ConfigBlockSpan::new(1, 3));
        assert!(span.is_closed());
        assert_eq!(span.len(), 2);
    }

    #[test]
    fn nested_braces() {
        let span = locate(&[
            "config {",
            "  type: \"incremental\",",
            "  bigqueryOptions: {",
            "    partitionBy: \"dt\"",
            "  },",
            "  tags: [\"daily\"]",
            "}",
            "select * from ${ref(\"source\")}",
        ]);
        assert_eq!(span, ConfigBlockSpan::new(1, 7));
    }

    #[test]
    fn open_and_close_on_the_same_line() {
        let span = locate(&[
            "config {",
            "  assertions: { uniqueKey: [\"id\"] },",
            "  type: \"table\"",
            "}",
        ]);
        assert_eq!(span, ConfigBlockSpan::new(1, 4));
    }

    #[test]
    fn whole_block_on_one_line() {
        let span = locate(&["config { type: \"view\" }", "select 1"]);
        assert_eq!(span, ConfigBlockSpan::new(1, 1));
        assert!(span.is_empty());
    }

    #[test]
    fn brace_on_the_line_after_config() {
        let span = locate(&["config", "{", "  type: \"table\"", "}", "select 1"]);
        assert_eq!(span, ConfigBlockSpan::new(1, 4));
    }

    #[test]
    fn leading_comment_lines_shift_the_block() {
        let span = locate(&["-- orders model", "config {", "  type: \"table\"", "}"]);
        assert_eq!(span, ConfigBlockSpan::new(2, 4));
    }

    #[test]
    fn only_first_config_token_starts_the_block() {
        let span = locate(&[
            "config {",
            "  description: \"config for orders\",",
            "}",
            "select 'config' as c",
        ]);
        assert_eq!(span, ConfigBlockSpan::new(1, 3));
    }

    #[test]
    fn no_config_block() {
        let span = locate(&["select 1", "from t"]);
        assert_eq!(span, ConfigBlockSpan::NOT_FOUND);
        assert!(!span.is_closed());
    }

    #[test]
    fn empty_document() {
        assert_eq!(locate(&[]), ConfigBlockSpan::NOT_FOUND);
    }

    #[test]
    fn unclosed_block_keeps_start_line() {
        let span = locate(&["config {", "  type: \"table\""]);
        assert_eq!(span, ConfigBlockSpan::new(1, 0));
        assert!(!span.is_closed());
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn config_must_be_a_whole_word() {
        assert!(contains_config_token("config {"));
        assert!(contains_config_token("  config{"));
        assert!(!contains_config_token("-- reconfigure"));
        assert!(!contains_config_token("select my_config from t"));
    }
}
