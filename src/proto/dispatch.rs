//! # Frame Dispatch
//!
//! Routes each decoded frame to a handler by its type tag.
//!
//! The table is direct-indexed over all 256 possible tag values and every
//! slot is populated at construction, so a lookup can never miss: tags with
//! no registered handler fall through to [`DefaultHandler`], which hex-dumps
//! the payload at INFO as a diagnostic fallback. Routing is the dispatcher's
//! whole job; interpreting payload bytes belongs to the handlers.

use tracing::info;

use super::packet::InCursor;
use super::Frame;
use crate::error::Result;

/// One message type's interpreter.
///
/// A handler reads exactly the fields its tag defines from the cursor and
/// produces whatever side effect is appropriate (publish an event, log).
/// Returning an error marks the frame undecodable; the loop logs it and
/// moves on, so a handler failure is always frame-local.
pub trait FrameHandler: Send {
    /// Consume one frame's payload.
    fn on_frame(&mut self, tag: u8, cursor: &mut InCursor<'_>) -> Result<()>;
}

/// Fixed 256-entry handler table indexed by type tag.
///
/// # Examples
///
/// ```
/// use rover_bridge::proto::dispatch::{Dispatcher, FrameHandler};
/// use rover_bridge::proto::packet::InCursor;
/// use rover_bridge::proto::Frame;
///
/// struct Idle;
/// impl FrameHandler for Idle {
///     fn on_frame(&mut self, _tag: u8, cursor: &mut InCursor<'_>) -> rover_bridge::error::Result<()> {
///         let _count = cursor.read_u16()?;
///         Ok(())
///     }
/// }
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher.register(b'I', Box::new(Idle));
/// dispatcher.dispatch(&Frame::new(b"I\x2A\x00"))?;
/// # Ok::<(), rover_bridge::error::BridgeError>(())
/// ```
pub struct Dispatcher {
    handlers: Vec<Box<dyn FrameHandler>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("slots", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a table with every slot pointing at the default handler.
    pub fn new() -> Self {
        let handlers = (0..=u8::MAX)
            .map(|_| Box::new(DefaultHandler) as Box<dyn FrameHandler>)
            .collect();
        Self { handlers }
    }

    /// Install `handler` for `tag`, replacing the previous entry.
    pub fn register(&mut self, tag: u8, handler: Box<dyn FrameHandler>) {
        self.handlers[tag as usize] = handler;
    }

    /// Route one frame to its handler.
    ///
    /// Constructs a cursor over the payload (tag already consumed) and
    /// invokes the handler for the frame's tag. Errors are the handler's
    /// decode failures; the lookup itself cannot fail.
    pub fn dispatch(&mut self, frame: &Frame<'_>) -> Result<()> {
        let tag = frame.tag();
        let mut cursor = InCursor::new(frame.payload());
        self.handlers[tag as usize].on_frame(tag, &mut cursor)
    }
}

/// Diagnostic fallback for tags with no registered handler.
///
/// Logs the tag and a hex dump of the payload. Seeing these lines means the
/// firmware is sending a message type this side does not interpret yet; it
/// is visibility, not a parsing failure, and it never errors.
#[derive(Debug, Clone, Copy)]
pub struct DefaultHandler;

impl FrameHandler for DefaultHandler {
    fn on_frame(&mut self, tag: u8, cursor: &mut InCursor<'_>) -> Result<()> {
        let payload = cursor.remaining_bytes();
        info!(
            "no handler for message: {:02X}({}) {}",
            tag,
            payload.len(),
            hex_dump(payload)
        );
        Ok(())
    }
}

/// Render bytes as space-separated `0xNN` pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 5);
    for &b in bytes {
        out.push_str(&format!("0x{:02X} ", b));
    }
    out.trim_end().to_string()
}
