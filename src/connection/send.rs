// Outbound message serialization and control message senders

use byteorder::{BigEndian, ByteOrder};
use chrono::Utc;

use crate::log_error;
use crate::pages::PageList;
use crate::rtmp::{
    MessageDesc, PrechunkContext, COMMAND_MESSAGE_STREAM_ID, MAX_HEADER_LEN, MAX_MESSAGE_LEN,
    MIN_CHUNK_SIZE, PING_REQUEST, PING_RESPONSE, PRECHUNK_SIZE, RTMP_COMMAND_CHUNK_STREAM_ID,
    RTMP_CONTROL_CHUNK_STREAM_ID, RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_EVENT, RTMP_TYPE_INVOKE,
    RTMP_TYPE_SET_CHUNK_SIZE, RTMP_TYPE_SET_PEER_BANDWIDTH,
    RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE, SET_BUFFER_LENGTH, STREAM_BEGIN, STREAM_IS_RECORDED,
};
use crate::sender::MessageEntry;

use super::connection::RtmpConnection;
use super::header::fill_message_header;
use super::prechunk::fill_prechunked_pages;

impl RtmpConnection {
    /// Serializes and queues an outbound message given as a byte slice
    ///
    /// # Arguments
    ///
    /// * `mdesc` - Descriptor of the message
    /// * `chunk_stream_id` - Chunk stream to send on
    /// * `mem` - Message payload
    /// * `prechunk_size` - Chunk size mem is already split with, or 0 to
    ///   let the serializer split it
    pub fn send_message(
        &mut self,
        mdesc: &MessageDesc,
        chunk_stream_id: u32,
        mem: &[u8],
        prechunk_size: u32,
    ) {
        let mut page_list = PageList::new();

        if prechunk_size > 0 {
            self.page_pool.fill_pages(&mut page_list, mem);

            self.send_message_pages(mdesc, chunk_stream_id, page_list, 0, prechunk_size);
        } else {
            let mut prechunk_ctx = PrechunkContext::new();

            fill_prechunked_pages(
                &mut prechunk_ctx,
                mem,
                &self.page_pool,
                &mut page_list,
                chunk_stream_id,
                true,
                PRECHUNK_SIZE,
            );

            self.send_message_pages(mdesc, chunk_stream_id, page_list, 0, PRECHUNK_SIZE);
        }
    }

    /// Serializes and queues an outbound message given as a page list
    ///
    /// The page list is consumed; callers keeping a reference pass a clone.
    ///
    /// # Arguments
    ///
    /// * `mdesc` - Descriptor of the message
    /// * `chunk_stream_id` - Chunk stream to send on
    /// * `page_list` - Message payload pages
    /// * `msg_offset` - Offset of the payload within the first page
    /// * `prechunk_size` - Chunk size the pages are already split with, or
    ///   0 to let the serializer split them
    pub fn send_message_pages(
        &mut self,
        mdesc: &MessageDesc,
        chunk_stream_id: u32,
        page_list: PageList,
        msg_offset: u32,
        prechunk_size: u32,
    ) {
        if self.is_closed {
            return;
        }

        let timestamp = self.mangle_out_timestamp(mdesc.timestamp);

        // The size the payload is, or is about to be, chunked with. It has
        // to be known before the header is built: the fix-header choice
        // depends on whether the message spans multiple chunks
        let chunking_size = if prechunk_size == 0 {
            PRECHUNK_SIZE
        } else {
            prechunk_size
        };

        let mut header_buf = [0; MAX_HEADER_LEN];

        let header_len = {
            let RtmpConnection {
                logger,
                chunk_streams,
                ..
            } = self;

            let chunk_stream = chunk_streams
                .entry(chunk_stream_id)
                .or_insert_with(|| crate::rtmp::ChunkStream::new(chunk_stream_id));

            fill_message_header(
                logger,
                mdesc,
                chunk_stream,
                &mut header_buf,
                timestamp,
                chunking_size,
            )
        };

        let (pages, msg_offset) = if prechunk_size == 0 {
            let mut prechunk_ctx = PrechunkContext::new();
            let mut prechunked = PageList::new();

            let mut first_chunk = true;

            for page in page_list.pages() {
                let bytes = page.bytes();

                let region = if first_chunk {
                    &bytes[(msg_offset as usize).min(bytes.len())..]
                } else {
                    bytes
                };

                fill_prechunked_pages(
                    &mut prechunk_ctx,
                    region,
                    &self.page_pool,
                    &mut prechunked,
                    chunk_stream_id,
                    first_chunk,
                    PRECHUNK_SIZE,
                );

                first_chunk = false;
            }

            (prechunked, 0)
        } else {
            (page_list, msg_offset)
        };

        if chunking_size != self.out_chunk_size {
            self.send_set_chunk_size(chunking_size);
            self.out_chunk_size = chunking_size;
        }

        self.sender.send_message(MessageEntry {
            header: header_buf[..header_len].to_vec(),
            pages: Some(pages),
            msg_offset,
        });
        self.sender.flush();
    }

    /// Queues pages without any chunk framing (handshake traffic)
    ///
    /// # Arguments
    ///
    /// * `page_list` - The pages to send
    /// * `msg_offset` - Offset of the payload within the first page
    pub(crate) fn send_raw_pages(&mut self, page_list: PageList, msg_offset: u32) {
        if self.is_closed {
            return;
        }

        self.sender.send_message(MessageEntry {
            header: Vec::new(),
            pages: Some(page_list),
            msg_offset,
        });
        self.sender.flush();
    }

    /// Sends a SetChunkSize protocol control message
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - The announced chunk size
    pub(crate) fn send_set_chunk_size(&mut self, chunk_size: u32) {
        if chunk_size < MIN_CHUNK_SIZE {
            log_error!(self.logger, format!("Bad chunk size: {}", chunk_size));
        }

        let mut msg = [0; 4];
        BigEndian::write_u32(&mut msg, chunk_size);

        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_SET_CHUNK_SIZE,
            msg_stream_id: COMMAND_MESSAGE_STREAM_ID,
            msg_len: msg.len() as u32,
            cs_hdr_comp: false,
        };

        // Passing out_chunk_size as the prechunk size stops
        // send_message_pages from emitting SetChunkSize recursively. Safe,
        // since a SetChunkSize message always fits into a single chunk
        let out_chunk_size = self.out_chunk_size;
        self.send_message(&mdesc, RTMP_CONTROL_CHUNK_STREAM_ID, &msg, out_chunk_size);
    }

    /// Sends an Ack protocol control message
    ///
    /// # Arguments
    ///
    /// * `seq` - Total number of received bytes
    pub(crate) fn send_ack(&mut self, seq: u32) {
        let mut msg = [0; 4];
        BigEndian::write_u32(&mut msg, seq);

        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_ACKNOWLEDGEMENT,
            msg_stream_id: COMMAND_MESSAGE_STREAM_ID,
            msg_len: msg.len() as u32,
            cs_hdr_comp: false,
        };

        self.send_message(&mdesc, RTMP_CONTROL_CHUNK_STREAM_ID, &msg, 0);
    }

    /// Sends a WindowAckSize protocol control message
    ///
    /// # Arguments
    ///
    /// * `wack_size` - The announced window size
    pub fn send_window_ack_size(&mut self, wack_size: u32) {
        let mut msg = [0; 4];
        BigEndian::write_u32(&mut msg, wack_size);

        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
            msg_stream_id: COMMAND_MESSAGE_STREAM_ID,
            msg_len: msg.len() as u32,
            cs_hdr_comp: false,
        };

        self.send_message(&mdesc, RTMP_CONTROL_CHUNK_STREAM_ID, &msg, 0);
    }

    /// Sends a SetPeerBandwidth protocol control message
    ///
    /// # Arguments
    ///
    /// * `wack_size` - The requested window size
    /// * `limit_type` - Bandwidth limit type (0 hard, 1 soft, 2 dynamic)
    pub fn send_set_peer_bandwidth(&mut self, wack_size: u32, limit_type: u8) {
        let mut msg = [0; 5];
        BigEndian::write_u32(&mut msg[0..4], wack_size);
        msg[4] = limit_type;

        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_SET_PEER_BANDWIDTH,
            msg_stream_id: COMMAND_MESSAGE_STREAM_ID,
            msg_len: msg.len() as u32,
            cs_hdr_comp: false,
        };

        self.send_message(&mdesc, RTMP_CONTROL_CHUNK_STREAM_ID, &msg, 0);
    }

    /// Sends a StreamBegin user control message
    ///
    /// # Arguments
    ///
    /// * `msg_stream_id` - The beginning message stream
    pub fn send_user_control_stream_begin(&mut self, msg_stream_id: u32) {
        let mut msg = [0; 6];
        BigEndian::write_u16(&mut msg[0..2], STREAM_BEGIN);
        BigEndian::write_u32(&mut msg[2..6], msg_stream_id);

        self.send_user_control(&msg, msg_stream_id);
    }

    /// Sends a SetBufferLength user control message
    ///
    /// # Arguments
    ///
    /// * `msg_stream_id` - The buffered message stream
    /// * `buffer_len` - Buffer length, in milliseconds
    pub fn send_user_control_set_buffer_length(&mut self, msg_stream_id: u32, buffer_len: u32) {
        let mut msg = [0; 10];
        BigEndian::write_u16(&mut msg[0..2], SET_BUFFER_LENGTH);
        BigEndian::write_u32(&mut msg[2..6], msg_stream_id);
        BigEndian::write_u32(&mut msg[6..10], buffer_len);

        self.send_user_control(&msg, msg_stream_id);
    }

    /// Sends a StreamIsRecorded user control message
    ///
    /// # Arguments
    ///
    /// * `msg_stream_id` - The recorded message stream
    pub fn send_user_control_stream_is_recorded(&mut self, msg_stream_id: u32) {
        let mut msg = [0; 6];
        BigEndian::write_u16(&mut msg[0..2], STREAM_IS_RECORDED);
        BigEndian::write_u32(&mut msg[2..6], msg_stream_id);

        self.send_user_control(&msg, msg_stream_id);
    }

    /// Sends a PingRequest user control message carrying the current time
    pub fn send_user_control_ping_request(&mut self) {
        let time = Utc::now().timestamp() as u32;

        let mut msg = [0; 6];
        BigEndian::write_u16(&mut msg[0..2], PING_REQUEST);
        BigEndian::write_u32(&mut msg[2..6], time);

        self.send_user_control(&msg, COMMAND_MESSAGE_STREAM_ID);
    }

    /// Sends a PingResponse user control message
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Timestamp echoed from the ping request
    pub fn send_user_control_ping_response(&mut self, timestamp: u32) {
        let mut msg = [0; 6];
        BigEndian::write_u16(&mut msg[0..2], PING_RESPONSE);
        BigEndian::write_u32(&mut msg[2..6], timestamp);

        self.send_user_control(&msg, COMMAND_MESSAGE_STREAM_ID);
    }

    /// Sends a user control message payload on the control chunk stream
    fn send_user_control(&mut self, msg: &[u8], msg_stream_id: u32) {
        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_EVENT,
            msg_stream_id,
            msg_len: msg.len() as u32,
            cs_hdr_comp: false,
        };

        self.send_message(&mdesc, RTMP_CONTROL_CHUNK_STREAM_ID, msg, 0);
    }

    /// Sends an AMF0 command message on the command chunk stream
    ///
    /// # Arguments
    ///
    /// * `msg_stream_id` - Message stream of the command
    /// * `mem` - Encoded command body
    pub fn send_command_message_amf0(&mut self, msg_stream_id: u32, mem: &[u8]) {
        if mem.len() as u64 > MAX_MESSAGE_LEN as u64 {
            // The 3-byte wire length field cannot carry it. Drop the
            // message, the connection stays usable
            log_error!(
                self.logger,
                format!("Command message too long: {} bytes", mem.len())
            );
            return;
        }

        let mdesc = MessageDesc {
            timestamp: 0,
            msg_type_id: RTMP_TYPE_INVOKE,
            msg_stream_id,
            msg_len: mem.len() as u32,
            cs_hdr_comp: false,
        };

        self.send_message(&mdesc, RTMP_COMMAND_CHUNK_STREAM_ID, mem, 0);
    }
}

// Tests
