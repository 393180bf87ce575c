//! Text framing for events on a `text/event-stream` connection.
//!
//! A frame is one `<field>:<value>` line per event attribute, written in the
//! order `name`, `data`, `origin`, `id`, `source`, and terminated by a blank
//! line:
//!
//! ```text
//! name:message
//! data:{"set1":{"val1":"hello"}}
//! origin:
//! id:1571234567
//! source:host-a
//!
//! ```
//!
//! The payload is written as-is. It must not contain a raw newline, which
//! holds for anything built with [`Event::from_json`](events::Event::from_json).
//!
//! Decoding is permissive: unknown lines are skipped and missing fields keep
//! their defaults, so a frame never fails to decode.

use events::Event;
use log::*;

/// Comment frame sent to keep idle connections open. Clients ignore it.
pub const KEEP_ALIVE_FRAME: &[u8] = b":keep-alive\n\n";

/// Lines of one frame, each still carrying its line terminator.
pub type Frame = Vec<Vec<u8>>;

#[derive(Clone, Copy)]
enum Field {
    Kind,
    Data,
    Origin,
    Id,
    Source,
}

// Decoding accepts both the names written by `encode` and the names used on
// the receiving side of an EventSource (`type`, `lastEventId`).
const FIELDS: [(&[u8], Field); 7] = [
    (b"name:", Field::Kind),
    (b"type:", Field::Kind),
    (b"data:", Field::Data),
    (b"origin:", Field::Origin),
    (b"id:", Field::Id),
    (b"lastEventId:", Field::Id),
    (b"source:", Field::Source),
];

/// Serializes `event` into a single frame.
pub fn encode(event: &Event) -> Vec<u8> {
    let mut frame = Vec::with_capacity(
        event.kind().len()
            + event.data().len()
            + event.origin().len()
            + event.id().len()
            + event.source().len()
            + 32,
    );

    frame.extend_from_slice(b"name:");
    frame.extend_from_slice(event.kind().as_bytes());
    frame.extend_from_slice(b"\ndata:");
    frame.extend_from_slice(event.data());
    frame.extend_from_slice(b"\norigin:");
    frame.extend_from_slice(event.origin().as_bytes());
    frame.extend_from_slice(b"\nid:");
    frame.extend_from_slice(event.id().as_bytes());
    frame.extend_from_slice(b"\nsource:");
    frame.extend_from_slice(event.source().as_bytes());
    frame.extend_from_slice(b"\n\n");

    frame
}

/// Builds an event from the lines of one frame.
pub fn decode<I, L>(lines: I) -> Event
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    let mut event = Event::default();

    for line in lines {
        let line = trim_terminator(line.as_ref());
        let Some((field, value)) = classify(line) else {
            continue;
        };

        event = match field {
            Field::Kind => event.with_kind(String::from_utf8_lossy(value)),
            Field::Data => event.with_data(value),
            Field::Origin => event.with_origin(String::from_utf8_lossy(value)),
            Field::Id => event.with_id(String::from_utf8_lossy(value)),
            Field::Source => event.with_source(String::from_utf8_lossy(value)),
        };
    }

    event
}

/// True if the frame carries nothing but comments (such as keep-alives).
pub fn is_comment_frame<L: AsRef<[u8]>>(lines: &[L]) -> bool {
    lines
        .iter()
        .map(|line| trim_terminator(line.as_ref()))
        .filter(|line| !line.is_empty())
        .all(|line| line.starts_with(b":"))
}

fn classify(line: &[u8]) -> Option<(Field, &[u8])> {
    FIELDS
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map(|(prefix, field)| (*field, &line[prefix.len()..]))
}

fn trim_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Longest line `FrameBuffer` will hold. Longer lines are dropped together
/// with the frame they belong to.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Reassembles frames from a byte stream that arrives in arbitrary chunks.
///
/// Lines may end in `\n`, `\r\n` or a bare `\r`.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    partial_line: Vec<u8>,
    lines: Frame,
    // The previous byte was `\r`, so a following `\n` belongs to it.
    after_cr: bool,
    // Dropping the current frame because one of its lines was too long.
    discarding: bool,
    // Still inside that oversized line.
    skipping_line: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }

            if byte != b'\n' && byte != b'\r' {
                if self.skipping_line {
                    continue;
                }
                if self.partial_line.len() >= MAX_LINE_LEN {
                    warn!("Dropping frame with a line longer than {MAX_LINE_LEN} bytes");
                    self.partial_line.clear();
                    self.lines.clear();
                    self.discarding = true;
                    self.skipping_line = true;
                    continue;
                }
                self.partial_line.push(byte);
                continue;
            }

            self.after_cr = byte == b'\r';
            if std::mem::take(&mut self.skipping_line) {
                continue;
            }

            self.partial_line.push(byte);
            let line = std::mem::take(&mut self.partial_line);

            if trim_terminator(&line).is_empty() {
                if !self.discarding && !self.lines.is_empty() {
                    frames.push(std::mem::take(&mut self.lines));
                }
                self.discarding = false;
            } else if !self.discarding {
                self.lines.push(line);
            }
        }

        frames
    }

    /// True when a frame has been started but not yet terminated.
    pub fn has_partial_frame(&self) -> bool {
        !self.lines.is_empty() || !self.partial_line.is_empty() || self.discarding
    }
}
