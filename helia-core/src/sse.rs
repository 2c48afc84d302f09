//! Server-Sent Events decoding for streaming responses.
//!
//! Turns a raw body stream into the `data:` payloads of each event. Chunk
//! boundaries are arbitrary: an event, a line or even a UTF-8 sequence may be
//! split across chunks, so decoding works on bytes and only converts complete
//! events to text.

use futures::stream::{self, Stream, StreamExt};

use crate::error::GenerationError;

/// Decodes a byte stream into the data payload of each event
///
/// Events without data lines (comments, keep-alives) are skipped. Multiple
/// `data:` lines in one event are joined with `\n`. A transport error is
/// yielded once and ends the stream.
pub fn data_events<S, B, E>(body: S) -> impl Stream<Item = Result<String, GenerationError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<GenerationError>,
{
    stream::unfold(
        (body, Vec::<u8>::new(), false),
        |(mut body, mut buffer, mut finished)| async move {
            loop {
                if let Some(event) = take_event(&mut buffer) {
                    match event {
                        Ok(Some(data)) => return Some((Ok(data), (body, buffer, finished))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (body, buffer, finished))),
                    }
                }

                if finished {
                    return None;
                }

                match body.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(e.into()), (body, buffer, true)));
                    }
                    None => {
                        finished = true;
                        // flush a trailing event that was not blank-line terminated
                        if !buffer.iter().all(u8::is_ascii_whitespace) {
                            buffer.extend_from_slice(b"\n\n");
                        } else {
                            buffer.clear();
                        }
                    }
                }
            }
        },
    )
}

/// Removes one complete event from the front of `buffer`
fn take_event(buffer: &mut Vec<u8>) -> Option<Result<Option<String>, GenerationError>> {
    let (end, delimiter) = find_boundary(buffer)?;
    let raw: Vec<u8> = buffer.drain(..end + delimiter).take(end).collect();

    let text = match String::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(GenerationError::Unknown(format!(
                "invalid UTF-8 in event stream: {e}"
            ))));
        }
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        Some(Ok(None))
    } else {
        Some(Ok(Some(data.join("\n"))))
    }
}

/// Position and length of the first blank-line event delimiter
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
