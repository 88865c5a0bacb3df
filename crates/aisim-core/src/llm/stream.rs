//! Line-oriented decoding of provider streaming responses.
//!
//! Gemini, OpenAI and Anthropic stream server-sent events (`data: {...}` lines);
//! Ollama streams newline-delimited JSON. Both reduce to "split on newline, parse
//! each line", so one decoder serves all four.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use super::{ChunkStream, LlmProvider, TextChunk};
use crate::error::{AisimError, Result};

/// Buffers raw bytes and hands back complete lines.
///
/// Bytes are kept until a `\n` arrives so multibyte characters split across
/// network reads are never decoded in halves.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Whatever is left once the body ends, if it is not blank.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decode one line of a streaming body.
///
/// `None` means the line carries no text (keep-alives, event names, usage
/// frames, `[DONE]`). Provider error frames and payloads that are not JSON
/// come back as `Some(Err(..))`.
pub(crate) fn parse_stream_line(provider: LlmProvider, line: &str) -> Option<Result<TextChunk>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let payload = match provider {
        LlmProvider::Ollama => line,
        _ => {
            let data = line.strip_prefix("data:")?.trim_start();
            if data == "[DONE]" {
                return None;
            }
            data
        }
    };

    let json: Value = match serde_json::from_str(payload) {
        Ok(json) => json,
        Err(e) => {
            return Some(Err(AisimError::Llm(format!(
                "{} sent an undecodable stream event: {e}",
                provider.name()
            ))));
        }
    };

    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| err.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        let code = err
            .get("code")
            .map(|c| format!(" {c}"))
            .unwrap_or_default();
        return Some(Err(AisimError::Llm(format!(
            "{} stream error{code}: {message}",
            provider.name()
        ))));
    }

    let text = match provider {
        LlmProvider::Gemini => json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            }),
        LlmProvider::OpenAI => json["choices"][0]["delta"]["content"]
            .as_str()
            .map(str::to_string),
        LlmProvider::Anthropic => {
            if json["type"] == "content_block_delta" {
                json["delta"]["text"].as_str().map(str::to_string)
            } else {
                None
            }
        }
        LlmProvider::Ollama => json["response"].as_str().map(str::to_string),
    };

    text.map(|t| Ok(TextChunk::new(t)))
}

struct BodyState {
    body: BoxStream<'static, Result<Vec<u8>>>,
    decoder: LineDecoder,
    provider: LlmProvider,
    ready: std::collections::VecDeque<Result<TextChunk>>,
    done: bool,
}

/// Wrap a successful streaming response as a [`ChunkStream`].
pub(crate) fn chunk_stream(resp: reqwest::Response, provider: LlmProvider) -> ChunkStream {
    let body = resp
        .bytes_stream()
        .map(move |r| {
            r.map(|b| b.to_vec())
                .map_err(|e| AisimError::Llm(format!("{} stream interrupted: {e}", provider.name())))
        })
        .boxed();
    decode_body(body, provider)
}

fn decode_body(body: BoxStream<'static, Result<Vec<u8>>>, provider: LlmProvider) -> ChunkStream {
    let state = BodyState {
        body,
        decoder: LineDecoder::default(),
        provider,
        ready: Default::default(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                if item.is_err() {
                    st.ready.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    for line in st.decoder.push(&bytes) {
                        st.ready.extend(parse_stream_line(st.provider, &line));
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    if let Some(line) = st.decoder.finish() {
                        st.ready.extend(parse_stream_line(st.provider, &line));
                    }
                }
            }
        }
    })
    .boxed()
}
