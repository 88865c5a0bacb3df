//! Incremental extraction of top-level JSON objects from a text stream.
//!
//! Model output arrives in arbitrary fragments. [`JsonObjectExtractor`] keeps the
//! unconsumed tail in a buffer and emits every object as soon as its closing
//! brace has arrived, without waiting for the stream to end.
//!
//! Brace matching ignores braces inside JSON string literals, so `html` values
//! full of CSS rules do not end an object early. A brace-balanced span that
//! still fails to parse is skipped: scanning resumes at the next `{` after the
//! span's start and the buffer is kept. When an unmatched quote leaves the
//! string-aware scan open, the plain brace count decides the span instead.

use std::collections::VecDeque;
use std::sync::LazyLock;

use futures::{stream, Stream, StreamExt};
use regex::Regex;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Default)]
pub struct JsonObjectExtractor {
    buffer: String,
}

impl JsonObjectExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fragment` and return every object completed by it, in closing-brace order.
    pub fn push(&mut self, fragment: &str) -> Vec<Value> {
        self.buffer.push_str(fragment);

        let mut objects = Vec::new();
        let mut from = 0;
        while let Some(start) = find_byte(self.buffer.as_bytes(), b'{', from) {
            let bytes = self.buffer.as_bytes();
            let end = match matching_close(bytes, start) {
                Some(end) => end,
                // a stray quote in junk can open a string that never closes;
                // the plain brace count still bounds the span
                None => match plain_close(bytes, start) {
                    Some(end) => end,
                    None => break,
                },
            };
            match serde_json::from_str::<Value>(&self.buffer[start..=end]) {
                Ok(value) => {
                    objects.push(value);
                    self.buffer.drain(..=end);
                    from = 0;
                }
                Err(e) => {
                    tracing::debug!(
                        start,
                        end,
                        error = %e,
                        "skipping unparsable brace-balanced span"
                    );
                    from = start + 1;
                }
            }
        }
        objects
    }

    /// Text received but not yet consumed by an emitted object.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// End of input. Drops the unterminated tail and returns how many bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffer.len();
        if self.buffer.contains('{') {
            tracing::debug!(discarded, "discarding unterminated trailing object");
        }
        self.buffer.clear();
        discarded
    }
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

/// Index of the `}` that returns depth to zero for the `{` at `start`.
///
/// All delimiters are ASCII, so byte offsets are always char boundaries.
fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Like [`matching_close`] but counting every brace, quoted or not.
fn plain_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

static ARRAY_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// The span from the first `[` to the last `]` of a non-streaming reply.
///
/// Models wrap arrays in prose or code fences; this cuts them out before parsing.
pub fn json_array_span(text: &str) -> Option<&str> {
    ARRAY_SPAN_RE.find(text).map(|m| m.as_str())
}

struct ExtractState<S> {
    fragments: S,
    extractor: JsonObjectExtractor,
    ready: VecDeque<Value>,
    done: bool,
}

/// Turn a stream of text fragments into a stream of parsed JSON objects.
///
/// Objects are yielded as soon as they complete. A fragment error is forwarded
/// once and ends the stream; a clean end drops any unterminated trailing object.
pub fn extract_objects<S, T>(fragments: S) -> impl Stream<Item = Result<Value>>
where
    S: Stream<Item = Result<T>> + Unpin,
    T: AsRef<str>,
{
    let state = ExtractState {
        fragments,
        extractor: JsonObjectExtractor::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(value) = st.ready.pop_front() {
                return Some((Ok(value), st));
            }
            if st.done {
                return None;
            }
            match st.fragments.next().await {
                Some(Ok(fragment)) => {
                    let objects = st.extractor.push(fragment.as_ref());
                    st.ready.extend(objects);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.extractor.finish();
                }
            }
        }
    })
}
