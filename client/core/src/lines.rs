//! Incremental Line Streaming
//!
//! [`read_lines`] consumes a chunked byte stream (typically an HTTP response
//! body carrying newline-delimited JSON) and invokes a callback once per
//! complete line, as the data arrives. Nothing beyond the current partial
//! line is ever buffered, so a long-running server operation can report
//! progress record by record without the client holding the whole body.
//!
//! Lines are delivered verbatim with only the `\n` terminator removed: no
//! trimming, and empty lines are delivered too, so concatenating the
//! delivered lines with `\n` reproduces the input (modulo one trailing
//! terminator). A non-empty remainder left when the source ends without a
//! final newline is flushed as a last, unterminated line.

use futures::{Stream, StreamExt};

/// Read a chunked byte stream line by line.
///
/// `stream` is any fallible stream of byte chunks; `reqwest`'s
/// [`bytes_stream`](reqwest::Response::bytes_stream) fits directly. Chunk
/// boundaries may fall anywhere, including inside a UTF-8 sequence or
/// mid-record; lines are reassembled before decoding, and decoding is lossy
/// (the server speaks ASCII-clean JSON, so replacement characters only ever
/// stand in for corrupt transport data).
///
/// `on_line` is invoked synchronously, in source order, once per line. The
/// call suspends only while waiting for the next chunk; it resolves once the
/// source is exhausted and any unterminated remainder has been flushed.
///
/// # Errors
///
/// A failing chunk, or an `Err` returned by `on_line` (e.g. a record that
/// does not parse), aborts the read and propagates to the caller. Lines
/// already delivered stand; there is no rollback.
pub async fn read_lines<S, B, E, F>(mut stream: S, mut on_line: F) -> anyhow::Result<()>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
    F: FnMut(&str) -> anyhow::Result<()>,
{
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let rest = buffer.split_off(pos + 1);
            buffer.pop();
            on_line(&String::from_utf8_lossy(&buffer))?;
            buffer = rest;
        }
    }

    // End of stream: flush a non-empty unterminated tail as a final line.
    if !buffer.is_empty() {
        on_line(&String::from_utf8_lossy(&buffer))?;
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
