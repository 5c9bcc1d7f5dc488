// Chunk stream state

use crate::pages::PageList;

/// Offset tracker for pre-serialized chunking
///
/// A context lives for a single message and must not be reused for the next
/// one, so that each message starts at a chunk boundary.
pub struct PrechunkContext {
    /// Offset into the current chunk, always smaller than the chunk size
    pub prechunk_offset: u32,
}

impl PrechunkContext {
    /// Creates a fresh context
    pub fn new() -> PrechunkContext {
        PrechunkContext { prechunk_offset: 0 }
    }

    /// Resets the context for a new message
    pub fn reset(&mut self) {
        self.prechunk_offset = 0;
    }
}

impl Default for PrechunkContext {
    fn default() -> PrechunkContext {
        PrechunkContext::new()
    }
}

/// Header compression state of one chunk stream, for both directions
pub struct ChunkStream {
    /// Chunk stream ID (valid range 2..65599)
    pub chunk_stream_id: u32,

    /// True once a Type 0 header was received on this stream
    pub in_header_valid: bool,

    /// Timestamp of the message being received
    pub in_msg_timestamp: u32,

    /// Timestamp delta of the last received header
    pub in_msg_timestamp_delta: u32,

    /// Length of the message being received
    pub in_msg_len: u32,

    /// Type of the message being received
    pub in_msg_type_id: u8,

    /// Message stream of the message being received
    pub in_msg_stream_id: u32,

    /// Number of payload bytes already received for the current message
    pub in_msg_offset: u32,

    /// Prechunking context of the message being received
    pub in_prechunk_ctx: PrechunkContext,

    /// Pages accumulating the current inbound message
    pub page_list: PageList,

    /// True once a header was sent on this stream
    pub out_header_valid: bool,

    /// Timestamp of the last sent message
    pub out_msg_timestamp: u32,

    /// Timestamp delta of the last sent header
    pub out_msg_timestamp_delta: u32,

    /// Length of the last sent message
    pub out_msg_len: u32,

    /// Type of the last sent message
    pub out_msg_type_id: u8,

    /// Message stream of the last sent message
    pub out_msg_stream_id: u32,
}

impl ChunkStream {
    /// Creates the state for a chunk stream
    ///
    /// # Arguments
    ///
    /// * `chunk_stream_id` - ID of the chunk stream
    pub fn new(chunk_stream_id: u32) -> ChunkStream {
        ChunkStream {
            chunk_stream_id,
            in_header_valid: false,
            in_msg_timestamp: 0,
            in_msg_timestamp_delta: 0,
            in_msg_len: 0,
            in_msg_type_id: 0,
            in_msg_stream_id: 0,
            in_msg_offset: 0,
            in_prechunk_ctx: PrechunkContext::new(),
            page_list: PageList::new(),
            out_header_valid: false,
            out_msg_timestamp: 0,
            out_msg_timestamp_delta: 0,
            out_msg_len: 0,
            out_msg_type_id: 0,
            out_msg_stream_id: 0,
        }
    }

    /// Drops the in-progress inbound message, releasing its pages
    pub fn reset_in_message(&mut self) {
        self.page_list.reset();
        self.in_msg_offset = 0;
        self.in_prechunk_ctx.reset();
    }
}
