// Inbound chunk stream demultiplexer

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::pages::PageList;
use crate::rtmp::{
    generate_c2, generate_s1_s2, ChunkStream, DEFAULT_AUDIO_CHUNK_STREAM_ID,
    DEFAULT_VIDEO_CHUNK_STREAM_ID, PRECHUNK_SIZE, RTMP_EXTENDED_TIMESTAMP, RTMP_SIG_SIZE,
    RTMP_TYPE_AUDIO, RTMP_TYPE_VIDEO, RTMP_VERSION,
};
use crate::sender::MessageEntry;
use crate::{log_debug, log_error};

use super::connection::RtmpConnection;
use super::prechunk::fill_prechunked_pages;

/// Result of feeding bytes to the demultiplexer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessInputResult {
    /// Input was processed and more can be accepted
    Normal,

    /// More bytes are needed to make progress. Unconsumed bytes must be
    /// presented again together with later input
    Again,

    /// Parsing was halted by the backpressure switch
    InputBlocked,

    /// Fatal error. The caller is expected to tear the connection down
    Error,
}

/// Receive automaton states
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ReceiveState {
    Invalid,
    ClientWaitS0,
    ClientWaitS1,
    ClientWaitS2,
    ServerWaitC0,
    ServerWaitC1,
    ServerWaitC2,
    BasicHeader,
    ChunkHeaderType0,
    ChunkHeaderType1,
    ChunkHeaderType2,
    ChunkHeaderType3,
    ExtendedTimestamp,
    ChunkData,
}

/// Form of the basic header being parsed
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CsIdFormat {
    Unknown,
    OneByte,
    TwoBytesFirst,
    TwoBytesSecond,
}

impl RtmpConnection {
    /// Feeds transport bytes to the receive automaton
    ///
    /// The automaton accepts partial input at every state boundary,
    /// including in the middle of a chunk.
    ///
    /// # Arguments
    ///
    /// * `mem` - The received bytes
    ///
    /// # Return value
    ///
    /// The processing result, plus the number of bytes consumed. On Again,
    /// the unconsumed tail must be presented again once more bytes arrive.
    /// On Error the caller is expected to tear the connection down
    pub fn process_input(&mut self, mem: &[u8]) -> (ProcessInputResult, usize) {
        if self.is_closed {
            return (ProcessInputResult::Error, 0);
        }

        if mem.is_empty() {
            return (ProcessInputResult::Again, 0);
        }

        self.processing_input = true;

        let mut data: &[u8] = mem;
        let mut ret_res = ProcessInputResult::Normal;

        loop {
            if self.block_input {
                ret_res = ProcessInputResult::InputBlocked;
                break;
            }

            match self.conn_state {
                ReceiveState::Invalid => {
                    log_error!(self.logger, "Input received before the connection was started");
                    ret_res = ProcessInputResult::Error;
                    break;
                }
                ReceiveState::ClientWaitS0 => {
                    if data.is_empty() {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let server_version = data[0];
                    if server_version < RTMP_VERSION {
                        // Deprecated protocols
                        log_error!(
                            self.logger,
                            format!("Old protocol version from server: {}", server_version)
                        );
                    }

                    data = &data[1..];

                    self.conn_state = ReceiveState::ClientWaitS1;
                }
                ReceiveState::ClientWaitS1 => {
                    if data.len() < RTMP_SIG_SIZE {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let c2 = generate_c2(&data[..RTMP_SIG_SIZE]);

                    let mut page_list = PageList::new();
                    self.page_pool.fill_pages(&mut page_list, &c2);
                    self.send_raw_pages(page_list, 0);

                    data = &data[RTMP_SIG_SIZE..];

                    self.conn_state = ReceiveState::ClientWaitS2;
                }
                ReceiveState::ClientWaitS2 => {
                    if data.len() < RTMP_SIG_SIZE {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    data = &data[RTMP_SIG_SIZE..];

                    if self.frontend.handshake_complete().is_err() {
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    self.begin_pings();

                    self.conn_state = ReceiveState::BasicHeader;
                }
                ReceiveState::ServerWaitC0 => {
                    if data.is_empty() {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let client_version = data[0];
                    if client_version < RTMP_VERSION {
                        // Deprecated protocols
                        log_error!(
                            self.logger,
                            format!("Old protocol version from client: {}", client_version)
                        );
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    data = &data[1..];

                    // Sending S0
                    self.sender.send_message(MessageEntry {
                        header: vec![RTMP_VERSION],
                        pages: None,
                        msg_offset: 0,
                    });
                    self.sender.flush();

                    self.conn_state = ReceiveState::ServerWaitC1;
                }
                ReceiveState::ServerWaitC1 => {
                    if data.len() < RTMP_SIG_SIZE {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let msg = match generate_s1_s2(&data[..RTMP_SIG_SIZE], &self.logger) {
                        Ok(m) => m,
                        Err(_) => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    let mut page_list = PageList::new();
                    self.page_pool.fill_pages(&mut page_list, &msg);
                    self.send_raw_pages(page_list, 0);

                    data = &data[RTMP_SIG_SIZE..];

                    self.conn_state = ReceiveState::ServerWaitC2;
                }
                ReceiveState::ServerWaitC2 => {
                    if data.len() < RTMP_SIG_SIZE {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    // C2 is consumed without validation
                    data = &data[RTMP_SIG_SIZE..];

                    if self.frontend.handshake_complete().is_err() {
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    self.begin_pings();

                    self.conn_state = ReceiveState::BasicHeader;
                }
                ReceiveState::BasicHeader => {
                    if data.is_empty() {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let mut next_state = false;

                    match self.cs_id_fmt {
                        CsIdFormat::Unknown => {
                            self.fmt = (data[0] & 0xc0) >> 6;

                            let local_cs_id = (data[0] & 0x3f) as u32;
                            match local_cs_id {
                                0 => {
                                    // Ids 64-319
                                    self.cs_id = 64;
                                    self.cs_id_fmt = CsIdFormat::OneByte;
                                }
                                1 => {
                                    // Ids 64-65599
                                    self.cs_id = 64;
                                    self.cs_id_fmt = CsIdFormat::TwoBytesFirst;
                                }
                                _ => {
                                    // Ids 2-63
                                    self.cs_id = local_cs_id;
                                    next_state = true;
                                }
                            }
                        }
                        CsIdFormat::OneByte => {
                            self.cs_id += data[0] as u32;
                            next_state = true;
                        }
                        CsIdFormat::TwoBytesFirst => {
                            self.cs_id += data[0] as u32;
                            self.cs_id_fmt = CsIdFormat::TwoBytesSecond;
                        }
                        CsIdFormat::TwoBytesSecond => {
                            self.cs_id += (data[0] as u32) << 8;
                            next_state = true;
                        }
                    }

                    data = &data[1..];

                    if next_state {
                        log_debug!(
                            self.logger,
                            format!("Receiving chunk for chunk stream {}", self.cs_id)
                        );

                        let cs_id = self.cs_id;
                        self.chunk_stream_mut(cs_id, true);
                        self.recv_chunk_stream = cs_id;

                        self.conn_state = match self.fmt {
                            0 => ReceiveState::ChunkHeaderType0,
                            1 => ReceiveState::ChunkHeaderType1,
                            2 => ReceiveState::ChunkHeaderType2,
                            _ => ReceiveState::ChunkHeaderType3,
                        };
                    }
                }
                ReceiveState::ChunkHeaderType0 => {
                    if data.len() < 11 {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let chunk_stream = match self.chunk_streams.get_mut(&self.recv_chunk_stream) {
                        Some(cs) => cs,
                        None => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    let timestamp = BigEndian::read_u24(&data[0..3]);

                    let mut has_extended_timestamp = false;
                    if timestamp == RTMP_EXTENDED_TIMESTAMP {
                        has_extended_timestamp = true;
                    } else {
                        chunk_stream.in_msg_timestamp = timestamp;
                    }

                    chunk_stream.in_msg_timestamp_delta = timestamp;
                    chunk_stream.in_msg_len = BigEndian::read_u24(&data[3..6]);
                    chunk_stream.in_msg_type_id = data[6];
                    chunk_stream.in_msg_stream_id = LittleEndian::read_u32(&data[7..11]);
                    chunk_stream.in_header_valid = true;

                    data = &data[11..];

                    if has_extended_timestamp {
                        self.extended_timestamp_is_delta = false;
                        self.conn_state = ReceiveState::ExtendedTimestamp;
                    } else {
                        self.conn_state = ReceiveState::ChunkData;
                    }
                }
                ReceiveState::ChunkHeaderType1 => {
                    if data.len() < 7 {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let chunk_stream = match self.chunk_streams.get_mut(&self.recv_chunk_stream) {
                        Some(cs) => cs,
                        None => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    if !chunk_stream.in_header_valid {
                        log_error!(
                            self.logger,
                            format!(
                                "Type 1 chunk on chunk stream {} before any Type 0",
                                self.recv_chunk_stream
                            )
                        );
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    let timestamp_delta = BigEndian::read_u24(&data[0..3]);

                    let mut has_extended_timestamp = false;
                    if timestamp_delta == RTMP_EXTENDED_TIMESTAMP {
                        has_extended_timestamp = true;
                    } else {
                        chunk_stream.in_msg_timestamp =
                            chunk_stream.in_msg_timestamp.wrapping_add(timestamp_delta);
                    }

                    chunk_stream.in_msg_timestamp_delta = timestamp_delta;
                    chunk_stream.in_msg_len = BigEndian::read_u24(&data[3..6]);
                    chunk_stream.in_msg_type_id = data[6];

                    data = &data[7..];

                    if has_extended_timestamp {
                        self.extended_timestamp_is_delta = true;
                        self.conn_state = ReceiveState::ExtendedTimestamp;
                    } else {
                        self.conn_state = ReceiveState::ChunkData;
                    }
                }
                ReceiveState::ChunkHeaderType2 => {
                    if data.len() < 3 {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let chunk_stream = match self.chunk_streams.get_mut(&self.recv_chunk_stream) {
                        Some(cs) => cs,
                        None => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    if !chunk_stream.in_header_valid {
                        log_error!(
                            self.logger,
                            format!(
                                "Type 2 chunk on chunk stream {} before any Type 0",
                                self.recv_chunk_stream
                            )
                        );
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    let timestamp_delta = BigEndian::read_u24(&data[0..3]);

                    let mut has_extended_timestamp = false;
                    if timestamp_delta == RTMP_EXTENDED_TIMESTAMP {
                        has_extended_timestamp = true;
                    } else {
                        chunk_stream.in_msg_timestamp =
                            chunk_stream.in_msg_timestamp.wrapping_add(timestamp_delta);
                    }

                    chunk_stream.in_msg_timestamp_delta = timestamp_delta;

                    data = &data[3..];

                    if has_extended_timestamp {
                        self.extended_timestamp_is_delta = true;
                        self.conn_state = ReceiveState::ExtendedTimestamp;
                    } else {
                        self.conn_state = ReceiveState::ChunkData;
                    }
                }
                ReceiveState::ChunkHeaderType3 => {
                    if data.is_empty() {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let chunk_stream = match self.chunk_streams.get_mut(&self.recv_chunk_stream) {
                        Some(cs) => cs,
                        None => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    if !chunk_stream.in_header_valid {
                        log_error!(
                            self.logger,
                            format!(
                                "Type 3 chunk on chunk stream {} before any Type 0",
                                self.recv_chunk_stream
                            )
                        );
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    let has_extended_timestamp =
                        chunk_stream.in_msg_timestamp_delta >= RTMP_EXTENDED_TIMESTAMP;

                    if chunk_stream.in_msg_offset == 0 {
                        chunk_stream.in_msg_timestamp = chunk_stream
                            .in_msg_timestamp
                            .wrapping_add(chunk_stream.in_msg_timestamp_delta);
                    }

                    if has_extended_timestamp {
                        // The field is consumed but its value is discarded,
                        // the previously recorded delta stays in effect
                        self.extended_timestamp_is_delta = false;
                        self.ignore_extended_timestamp = true;
                        self.conn_state = ReceiveState::ExtendedTimestamp;
                    } else {
                        self.conn_state = ReceiveState::ChunkData;
                    }
                }
                ReceiveState::ExtendedTimestamp => {
                    if data.len() < 4 {
                        ret_res = ProcessInputResult::Again;
                        break;
                    }

                    let chunk_stream = match self.chunk_streams.get_mut(&self.recv_chunk_stream) {
                        Some(cs) => cs,
                        None => {
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    };

                    if chunk_stream.in_msg_offset == 0 && !self.ignore_extended_timestamp {
                        let extended_timestamp = BigEndian::read_u32(&data[0..4]);

                        if self.extended_timestamp_is_delta {
                            chunk_stream.in_msg_timestamp = chunk_stream
                                .in_msg_timestamp
                                .wrapping_add(extended_timestamp);
                        } else {
                            chunk_stream.in_msg_timestamp = extended_timestamp;
                        }
                    }
                    self.ignore_extended_timestamp = false;

                    data = &data[4..];

                    self.conn_state = ReceiveState::ChunkData;
                }
                ReceiveState::ChunkData => {
                    let cs_id = self.recv_chunk_stream;

                    let (in_msg_len, in_msg_offset) = {
                        let chunk_stream = match self.chunk_streams.get(&cs_id) {
                            Some(cs) => cs,
                            None => {
                                ret_res = ProcessInputResult::Error;
                                break;
                            }
                        };
                        (chunk_stream.in_msg_len, chunk_stream.in_msg_offset)
                    };

                    if !(in_msg_offset < in_msg_len || (in_msg_len == 0 && in_msg_offset == 0)) {
                        log_error!(
                            self.logger,
                            format!(
                                "Bad chunking: in_msg_offset: {}, in_msg_len: {}",
                                in_msg_offset, in_msg_len
                            )
                        );
                        ret_res = ProcessInputResult::Error;
                        break;
                    }

                    let msg_left = in_msg_len - in_msg_offset;

                    if msg_left <= self.in_chunk_size {
                        // Last chunk of the message

                        debug_assert!(self.chunk_offset <= msg_left);
                        let tofill =
                            (msg_left - self.chunk_offset).min(data.len() as u32) as usize;

                        self.fill_chunk_data(cs_id, &data[..tofill]);

                        data = &data[tofill..];

                        self.chunk_offset += tofill as u32;
                        if self.chunk_offset < msg_left {
                            ret_res = ProcessInputResult::Again;
                            break;
                        }

                        let res = self.process_message(cs_id);

                        if let Some(chunk_stream) = self.chunk_streams.get_mut(&cs_id) {
                            chunk_stream.reset_in_message();
                        }
                        self.reset_packet();

                        if res.is_err() {
                            log_error!(self.logger, "Message processing failed");
                            ret_res = ProcessInputResult::Error;
                            break;
                        }
                    } else {
                        // Intermediate chunk

                        debug_assert!(self.chunk_offset < self.in_chunk_size);
                        let tofill = (self.in_chunk_size - self.chunk_offset)
                            .min(data.len() as u32) as usize;

                        self.fill_chunk_data(cs_id, &data[..tofill]);

                        data = &data[tofill..];

                        self.chunk_offset += tofill as u32;
                        if self.chunk_offset < self.in_chunk_size {
                            ret_res = ProcessInputResult::Again;
                            break;
                        }

                        let in_chunk_size = self.in_chunk_size;
                        if let Some(chunk_stream) = self.chunk_streams.get_mut(&cs_id) {
                            chunk_stream.in_msg_offset += in_chunk_size;
                        }
                        self.reset_packet();
                    }
                }
            }
        }

        let accepted = mem.len() - data.len();

        self.total_received = self.total_received.wrapping_add(accepted as u64);

        // Send acks only for bytes actually consumed (avoids ack storms),
        // twice as often as the window requires for extra safety
        if self.remote_wack_size >= 2
            && self.total_received - self.last_ack >= (self.remote_wack_size / 2) as u64
        {
            self.last_ack = self.total_received;
            self.send_ack(self.total_received as u32);
        }

        self.processing_input = false;

        (ret_res, accepted)
    }

    /// Appends chunk payload bytes to the receiving chunk stream
    ///
    /// Audio and video payloads are simultaneously pre-serialized for the
    /// default outbound media chunk streams, so the finished message can be
    /// forwarded to any number of subscribers without re-chunking.
    fn fill_chunk_data(&mut self, cs_id: u32, bytes: &[u8]) {
        let prechunking_enabled = self.config.prechunking_enabled;

        let RtmpConnection {
            page_pool,
            chunk_streams,
            ..
        } = self;

        let chunk_stream = match chunk_streams.get_mut(&cs_id) {
            Some(cs) => cs,
            None => return,
        };

        if prechunking_enabled
            && (chunk_stream.in_msg_type_id == RTMP_TYPE_AUDIO
                || chunk_stream.in_msg_type_id == RTMP_TYPE_VIDEO)
        {
            let out_chunk_stream_id = if chunk_stream.in_msg_type_id == RTMP_TYPE_AUDIO {
                DEFAULT_AUDIO_CHUNK_STREAM_ID
            } else {
                DEFAULT_VIDEO_CHUNK_STREAM_ID
            };

            let first_chunk = chunk_stream.in_msg_offset == 0;

            let ChunkStream {
                in_prechunk_ctx,
                page_list,
                ..
            } = chunk_stream;

            fill_prechunked_pages(
                in_prechunk_ctx,
                bytes,
                page_pool,
                page_list,
                out_chunk_stream_id,
                first_chunk,
                PRECHUNK_SIZE,
            );
        } else {
            page_pool.fill_pages(&mut chunk_stream.page_list, bytes);
        }
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::AmfEncoding;
    use crate::connection::test_support::*;
    use crate::connection::ConnectionConfig;
    use crate::rtmp::{
        verify_signature_digest, GLOB_FMS_KEY, RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_DATA,
        RTMP_TYPE_SET_CHUNK_SIZE, RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
    };

    /// Serializes a Type 0 chunk header
    fn type0_header(cs_id: u8, timestamp: u32, msg_len: u32, type_id: u8, msg_stream_id: u32) -> Vec<u8> {
        let mut header = vec![0; 12];

        header[0] = cs_id & 0x3f;
        BigEndian::write_u24(&mut header[1..4], timestamp);
        BigEndian::write_u24(&mut header[4..7], msg_len);
        header[7] = type_id;
        LittleEndian::write_u32(&mut header[8..12], msg_stream_id);

        header
    }

    fn single_chunk_message(cs_id: u8, type_id: u8, msg_stream_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = type0_header(cs_id, 0, payload.len() as u32, type_id, msg_stream_id);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_set_chunk_size_takeover() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        let mut wire = single_chunk_message(2, RTMP_TYPE_SET_CHUNK_SIZE, 0, &[0x00, 0x00, 0x00, 0x80]);
        wire.extend(single_chunk_message(2, RTMP_TYPE_SET_CHUNK_SIZE, 0, &[0x00, 0x01, 0x00, 0x00]));

        let (res, accepted) = conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());
        assert_eq!(conn.in_chunk_size, 65536);
    }

    #[test]
    fn test_chunk_size_below_minimum_is_fatal() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        let wire = single_chunk_message(2, RTMP_TYPE_SET_CHUNK_SIZE, 0, &[0x00, 0x00, 0x00, 0x00]);

        let (res, _) = conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::Error);
    }

    #[test]
    fn test_header_compression_round_trip() {
        // Messages serialized by one connection must come out of another
        // connection's demultiplexer unchanged
        let (mut sender_conn, sender_state) = make_connection(ConnectionConfig::default());
        let (mut receiver_conn, receiver_state) = make_connection(ConnectionConfig::default());

        let payload_a: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
        let payload_b: Vec<u8> = (0..200u32).map(|i| ((i + 7) % 251) as u8).collect();
        let payload_c: Vec<u8> = (0..90u32).map(|i| (i % 251) as u8).collect();

        for (timestamp, payload) in [(1000u32, &payload_a), (1040, &payload_b), (1080, &payload_c)]
        {
            let mdesc = crate::rtmp::MessageDesc {
                timestamp,
                msg_type_id: RTMP_TYPE_DATA,
                msg_stream_id: 1,
                msg_len: payload.len() as u32,
                cs_hdr_comp: true,
            };
            sender_conn.send_message(&mdesc, 8, payload, 0);
        }

        let wire = sender_state.borrow().wire_bytes();
        let (res, accepted) = receiver_conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());

        // The serializer announced its chunking size first
        assert_eq!(receiver_conn.in_chunk_size, 65536);

        let events = &receiver_state.borrow().events;
        let commands: Vec<(u32, u32, Vec<u8>)> = events
            .iter()
            .filter_map(|ev| match ev {
                FrontendEvent::Command {
                    msg_stream_id,
                    timestamp,
                    amf_encoding,
                    bytes,
                } => {
                    assert_eq!(*amf_encoding, AmfEncoding::AMF0);
                    Some((*msg_stream_id, *timestamp, bytes.clone()))
                }
                _ => None,
            })
            .collect();

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], (1, 0, payload_a));
        assert_eq!(commands[1], (1, 40, payload_b));
        assert_eq!(commands[2], (1, 80, payload_c));
    }

    #[test]
    fn test_partial_input_byte_accounting() {
        // Feeding the same wire bytes one byte at a time must produce the
        // same messages, with every byte eventually consumed
        let (mut sender_conn, sender_state) = make_connection(ConnectionConfig::default());

        let payload: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        let mdesc = crate::rtmp::MessageDesc {
            timestamp: 500,
            msg_type_id: RTMP_TYPE_DATA,
            msg_stream_id: 1,
            msg_len: payload.len() as u32,
            cs_hdr_comp: true,
        };
        sender_conn.send_message(&mdesc, 8, &payload, 0);

        let wire = sender_state.borrow().wire_bytes();

        let (mut receiver_conn, receiver_state) = make_connection(ConnectionConfig::default());

        let mut pending: Vec<u8> = Vec::new();
        let mut total_accepted = 0;

        for byte in &wire {
            pending.push(*byte);

            let (res, accepted) = receiver_conn.process_input(&pending);
            assert_ne!(res, ProcessInputResult::Error);

            total_accepted += accepted;
            pending.drain(..accepted);
        }

        assert_eq!(total_accepted, wire.len());
        assert!(pending.is_empty());

        let events = &receiver_state.borrow().events;
        assert!(events.iter().any(|ev| matches!(
            ev,
            FrontendEvent::Command { bytes, .. } if *bytes == payload
        )));
    }

    #[test]
    fn test_ack_cadence() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        // Shrink the peer window to 16 bytes
        let wack = single_chunk_message(2, RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE, 0, &[0, 0, 0, 16]);
        conn.process_input(&wack);
        assert_eq!(conn.remote_wack_size, 16);

        // The wack message itself (16 bytes) already crossed the half
        // window, so one ack is out
        let ack_count = |state: &SharedState| {
            state
                .entries
                .iter()
                .filter(|(header, _)| {
                    header.len() >= 8
                        && (header[0] & 0x3f) == 2
                        && header[7] == RTMP_TYPE_ACKNOWLEDGEMENT
                })
                .count()
        };

        assert_eq!(ack_count(&state.borrow()), 1);

        // A batch below the half window adds no ack: 7 header bytes are
        // not consumed yet
        let msg = single_chunk_message(4, RTMP_TYPE_DATA, 1, &[1, 2, 3]);
        let (res, accepted) = conn.process_input(&msg[..7]);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, 0);
        assert_eq!(ack_count(&state.borrow()), 1);

        // Completing the message consumes 15 bytes, crossing the window
        let (res, accepted) = conn.process_input(&msg);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, msg.len());
        assert_eq!(ack_count(&state.borrow()), 2);

        // The ack carries the running byte total
        let acks: Vec<Vec<u8>> = state
            .borrow()
            .entries
            .iter()
            .filter(|(header, _)| {
                header.len() >= 8
                    && (header[0] & 0x3f) == 2
                    && header[7] == RTMP_TYPE_ACKNOWLEDGEMENT
            })
            .map(|(_, payload)| payload.clone())
            .collect();

        assert_eq!(acks[1], {
            let mut b = vec![0; 4];
            BigEndian::write_u32(&mut b, (wack.len() + msg.len()) as u32);
            b
        });
    }

    #[test]
    fn test_compressed_header_before_type0_is_fatal() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        // Type 1 chunk on a chunk stream that never saw a Type 0 header
        let mut wire = vec![0x40 | 8];
        wire.extend_from_slice(&[0, 0, 40, 0, 0, 4, RTMP_TYPE_DATA]);
        wire.extend_from_slice(&[1, 2, 3, 4]);

        let (res, _) = conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::Error);
    }

    #[test]
    fn test_abort_resets_partial_message() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        // First chunk of a two-chunk message (default chunk size 128)
        let payload_start: Vec<u8> = vec![0xaa; 128];
        let mut wire = type0_header(8, 0, 200, RTMP_TYPE_DATA, 1);
        wire.extend_from_slice(&payload_start);

        let (res, accepted) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());

        // Abort chunk stream 8, then deliver a fresh complete message
        let abort = single_chunk_message(2, crate::rtmp::RTMP_TYPE_ABORT, 0, &[0, 0, 0, 8]);
        conn.process_input(&abort);

        let fresh = single_chunk_message(8, RTMP_TYPE_DATA, 1, &[9, 9, 9]);
        let (res, _) = conn.process_input(&fresh);
        assert_eq!(res, ProcessInputResult::Again);

        let events = &state.borrow().events;
        let commands: Vec<Vec<u8>> = events
            .iter()
            .filter_map(|ev| match ev {
                FrontendEvent::Command { bytes, .. } => Some(bytes.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(commands, vec![vec![9, 9, 9]]);
    }

    #[test]
    fn test_extended_timestamp_inbound() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        let mut wire = vec![0x02 | 0x00];
        wire[0] = 8;
        wire.extend_from_slice(&[0xff, 0xff, 0xff]); // timestamp sentinel
        wire.extend_from_slice(&[0x00, 0x00, 0x03]); // msg_len 3
        wire.push(RTMP_TYPE_DATA);
        wire.extend_from_slice(&[1, 0, 0, 0]); // msg_stream_id 1, little endian
        wire.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // extended timestamp
        wire.extend_from_slice(&[7, 7, 7]);

        let (res, _) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);

        let events = &state.borrow().events;
        assert!(events.iter().any(|ev| matches!(
            ev,
            FrontendEvent::Command { timestamp, .. } if *timestamp == 0x0100_0000
        )));
    }

    #[test]
    fn test_wide_chunk_stream_ids() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        // 2-byte basic header: id 64 + 6 = 70
        let mut wire = vec![0x00, 6];
        wire.extend_from_slice(&type0_header(0, 0, 2, RTMP_TYPE_DATA, 1)[1..]);
        wire.extend_from_slice(&[5, 5]);

        // 3-byte basic header: id 64 + 336 = 400
        wire.extend_from_slice(&[0x01, 80, 1]);
        wire.extend_from_slice(&type0_header(0, 0, 2, RTMP_TYPE_DATA, 1)[1..]);
        wire.extend_from_slice(&[6, 6]);

        let (res, accepted) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());

        assert!(conn.chunk_streams.contains_key(&70));
        assert!(conn.chunk_streams.contains_key(&400));

        let events = &state.borrow().events;
        let commands: Vec<Vec<u8>> = events
            .iter()
            .filter_map(|ev| match ev {
                FrontendEvent::Command { bytes, .. } => Some(bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(commands, vec![vec![5, 5], vec![6, 6]]);
    }

    #[test]
    fn test_input_blocked() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        conn.set_block_input(true);

        let wire = single_chunk_message(2, RTMP_TYPE_SET_CHUNK_SIZE, 0, &[0, 0, 1, 0]);
        let (res, accepted) = conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::InputBlocked);
        assert_eq!(accepted, 0);

        conn.set_block_input(false);

        let (res, accepted) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());
        assert_eq!(conn.in_chunk_size, 256);
    }

    #[test]
    fn test_server_handshake() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.start_server();

        // C0 + C1, scheme 0
        let mut c1: Vec<u8> = vec![0; RTMP_SIG_SIZE];
        for (i, b) in c1.iter_mut().enumerate().skip(8) {
            *b = (i % 199) as u8;
        }

        let mut wire = vec![3u8];
        wire.extend_from_slice(&c1);

        let (res, accepted) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());

        {
            let state_v = state.borrow();

            // S0 goes out as a bare version byte
            assert_eq!(state_v.entries[0].0, vec![3]);
            assert!(state_v.entries[0].1.is_empty());

            // S1 and S2 in a single raw payload
            let s1_s2 = &state_v.entries[1].1;
            assert_eq!(s1_s2.len(), 2 * RTMP_SIG_SIZE);
            assert_eq!(&s1_s2[4..8], &[3, 0, 2, 1]);
            assert!(verify_signature_digest(
                &s1_s2[..RTMP_SIG_SIZE],
                0,
                &GLOB_FMS_KEY[..36]
            ));

            // Handshake is not complete before C2
            assert!(!state_v
                .events
                .iter()
                .any(|ev| matches!(ev, FrontendEvent::HandshakeComplete)));
        }

        // C2 is consumed without validation
        let c2: Vec<u8> = vec![0; RTMP_SIG_SIZE];
        let (res, accepted) = conn.process_input(&c2);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, c2.len());

        let state_v = state.borrow();
        assert!(state_v
            .events
            .iter()
            .any(|ev| matches!(ev, FrontendEvent::HandshakeComplete)));

        // Keepalive pings armed
        assert_eq!(state_v.timers_added, vec![300]);
    }

    #[test]
    fn test_server_rejects_old_protocol_version() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        conn.start_server();

        let (res, _) = conn.process_input(&[2u8]);
        assert_eq!(res, ProcessInputResult::Error);
    }

    #[test]
    fn test_client_handshake() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.start_client();

        {
            let state_v = state.borrow();

            // C0 + C1 transmitted immediately
            assert_eq!(state_v.entries.len(), 1);
            let c0_c1 = &state_v.entries[0].1;
            assert_eq!(c0_c1.len(), 1 + RTMP_SIG_SIZE);
            assert_eq!(c0_c1[0], 3);
        }

        // S0 + S1 + S2
        let s1: Vec<u8> = (0..RTMP_SIG_SIZE).map(|i| (i % 199) as u8).collect();
        let mut wire = vec![3u8];
        wire.extend_from_slice(&s1);
        wire.extend_from_slice(&vec![0u8; RTMP_SIG_SIZE]);

        let (res, accepted) = conn.process_input(&wire);
        assert_eq!(res, ProcessInputResult::Again);
        assert_eq!(accepted, wire.len());

        let state_v = state.borrow();

        // C2 echoes S1
        let c2 = &state_v.entries[1].1;
        assert_eq!(c2.len(), RTMP_SIG_SIZE);
        assert_eq!(&c2[0..4], &s1[0..4]);
        assert_eq!(&c2[8..], &s1[..RTMP_SIG_SIZE - 8]);

        assert!(state_v
            .events
            .iter()
            .any(|ev| matches!(ev, FrontendEvent::HandshakeComplete)));
        assert_eq!(state_v.timers_added, vec![300]);
    }

    #[test]
    fn test_frontend_rejection_tears_down() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        state.borrow_mut().reject_messages = true;

        let wire = single_chunk_message(8, RTMP_TYPE_DATA, 1, &[1, 2, 3]);
        let (res, _) = conn.process_input(&wire);

        assert_eq!(res, ProcessInputResult::Error);
    }

    #[test]
    fn test_audio_video_prechunked_dispatch() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        // AAC sequence header: codec 10 in the high nibble, byte 1 zero
        let audio_payload = vec![0xaf, 0x00, 0x12, 0x10];
        let audio = single_chunk_message(4, crate::rtmp::RTMP_TYPE_AUDIO, 1, &audio_payload);
        conn.process_input(&audio);

        // AVC key frame: frame type 1, codec 7, byte 1 nonzero
        let video_payload = vec![0x17, 0x01, 0x00, 0x00, 0x00, 0x65];
        let video = single_chunk_message(6, crate::rtmp::RTMP_TYPE_VIDEO, 1, &video_payload);
        conn.process_input(&video);

        let state_v = state.borrow();

        assert!(state_v.events.iter().any(|ev| matches!(
            ev,
            FrontendEvent::Audio {
                timestamp: 0,
                codec_id: crate::rtmp::AudioCodecId::Aac,
                frame_type: crate::rtmp::AudioFrameType::AacSequenceHeader,
                prechunk_size: PRECHUNK_SIZE,
                msg_len: 4,
                ref bytes,
            } if *bytes == audio_payload
        )));

        assert!(state_v.events.iter().any(|ev| matches!(
            ev,
            FrontendEvent::Video {
                codec_id: crate::rtmp::VideoCodecId::Avc,
                frame_type: crate::rtmp::VideoFrameType::KeyFrame,
                msg_len: 6,
                ref bytes,
                ..
            } if *bytes == video_payload
        )));
    }
}
