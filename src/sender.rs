// Transport send seam

use crate::pages::PageList;

/// State of the transport send queue
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SendState {
    ConnectionReady,
    ConnectionOverloaded,
    QueueSoftLimit,
    QueueHardLimit,
}

/// Serialized message handed to the transport
pub struct MessageEntry {
    /// Chunk header bytes (empty for raw payloads)
    pub header: Vec<u8>,

    /// Payload pages (None for header-only messages)
    pub pages: Option<PageList>,

    /// Offset of the message payload within the page list
    pub msg_offset: u32,
}

/// Byte pipe the connection writes serialized messages to
///
/// Implementations queue the entries and report queue pressure back to the
/// connection through send_state_changed.
pub trait Sender {
    /// Queues a message for sending
    fn send_message(&mut self, entry: MessageEntry);

    /// Pushes the queued messages to the wire
    fn flush(&mut self);

    /// Drains the send queue, then closes the transport
    fn close_after_flush(&mut self);
}
