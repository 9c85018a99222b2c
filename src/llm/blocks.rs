//! Fenced code block extraction
//!
//! A two-state scanner over the response text: outside a block, a "```"
//! marker opens one; inside, the next marker closes it. The opening marker's
//! info string (the rest of its line) is recorded but not part of the body.
//! Only blocks whose closing marker is present are yielded.

const FENCE: &str = "```";

/// One closed fenced block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Text after the opening fence on the same line, e.g. a language tag
    pub info: &'a str,
    /// Block content without the fence markers
    pub body: &'a str,
}

/// Lazy iterator over the closed fenced blocks of a text
///
/// A clone continues from the same position; call [`fenced_blocks`] again
/// to scan from the start.
#[derive(Debug, Clone)]
pub struct FencedBlocks<'a> {
    rest: &'a str,
}

/// Iterate over fenced blocks in order of appearance
pub fn fenced_blocks(text: &str) -> FencedBlocks<'_> {
    FencedBlocks { rest: text }
}

/// Bodies of every closed block, in order
pub fn extract_blocks(text: &str) -> Vec<String> {
    fenced_blocks(text).map(|b| b.body.to_string()).collect()
}

impl<'a> Iterator for FencedBlocks<'a> {
    type Item = FencedBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Outside: find the opening marker
        let open = self.rest.find(FENCE)?;
        let after_open = &self.rest[open + FENCE.len()..];

        // Info string runs to the end of the line, unless the block closes
        // on that same line (inline ```code```)
        let (info, content) = match (after_open.find('\n'), after_open.find(FENCE)) {
            (Some(nl), Some(close)) if close < nl => ("", after_open),
            (Some(nl), _) => (after_open[..nl].trim(), &after_open[nl + 1..]),
            (None, _) => ("", after_open),
        };

        // Inside: find the closing marker
        let Some(close) = content.find(FENCE) else {
            // Unterminated block: nothing more to yield
            self.rest = "";
            return None;
        };

        let raw = &content[..close];
        let body = raw
            .strip_suffix("\r\n")
            .or_else(|| raw.strip_suffix('\n'))
            .unwrap_or(raw);
        self.rest = &content[close + FENCE.len()..];
        Some(FencedBlock { info, body })
    }
}
