// RTMP connection state and lifecycle

use std::collections::HashMap;

use crate::log::Logger;
use crate::log_error;
use crate::pages::{PageList, PagePool};
use crate::rtmp::{
    generate_c0_c1, ChunkStream, DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW_ACK_SIZE,
    RTMP_COMMAND_CHUNK_STREAM_ID, RTMP_CONTROL_CHUNK_STREAM_ID,
};
use crate::sender::{SendState, Sender};
use crate::timer::{TimerKey, Timers};

use super::config::ConnectionConfig;
use super::frontend::{ConnectionBackend, ConnectionError, ConnectionFrontend};
use super::input::{CsIdFormat, ReceiveState};

/// One RTMP connection
///
/// The connection owns the chunk stream table and the receive automaton.
/// It is driven from the outside: the transport feeds inbound bytes to
/// process_input, the timer service calls ping_timer_tick, and the owner
/// submits outbound messages through the send methods. Everything runs on
/// the caller's context; there is no internal concurrency.
pub struct RtmpConnection {
    /// Session logger
    pub(crate) logger: Logger,

    /// Connection tunables
    pub(crate) config: ConnectionConfig,

    /// Allocator for payload pages
    pub(crate) page_pool: PagePool,

    /// Transport send queue
    pub(crate) sender: Box<dyn Sender>,

    /// External timer service
    pub(crate) timers: Box<dyn Timers>,

    /// Owner of the connection
    pub(crate) frontend: Box<dyn ConnectionFrontend>,

    /// Transport release hook
    pub(crate) backend: Box<dyn ConnectionBackend>,

    /// Chunk stream table, keyed by chunk stream ID
    pub(crate) chunk_streams: HashMap<u32, ChunkStream>,

    /// True once the connection is closed. All sends become no-ops
    pub(crate) is_closed: bool,

    /// Keepalive timer registration
    pub(crate) ping_send_timer: Option<TimerKey>,

    /// True if a ping reply arrived since the last ping request
    pub(crate) ping_reply_received: bool,

    /// Chunk size for inbound chunks
    pub(crate) in_chunk_size: u32,

    /// Chunk size for outbound chunks
    pub(crate) out_chunk_size: u32,

    /// True once the outbound timestamp origin was recorded
    pub(crate) out_got_first_timestamp: bool,

    /// Outbound timestamp origin. Outbound timestamps are rebased so the
    /// first non-zero one becomes 0
    pub(crate) out_first_timestamp: u32,

    /// True if the pending extended timestamp field is a delta
    pub(crate) extended_timestamp_is_delta: bool,

    /// True if the pending extended timestamp field must be discarded
    pub(crate) ignore_extended_timestamp: bool,

    /// Re-entry guard, set while process_input runs
    pub(crate) processing_input: bool,

    /// Backpressure switch checked before each receive step
    pub(crate) block_input: bool,

    /// Window acknowledgement size requested by the peer
    pub(crate) remote_wack_size: u32,

    /// Window acknowledgement size this side announces
    pub(crate) local_wack_size: u32,

    /// Total inbound bytes consumed
    pub(crate) total_received: u64,

    /// Value of total_received when the last Ack was sent
    pub(crate) last_ack: u64,

    /// Receive automaton state
    pub(crate) conn_state: ReceiveState,

    /// Chunk stream ID being assembled from the basic header
    pub(crate) cs_id: u32,

    /// Basic header form being parsed
    pub(crate) cs_id_fmt: CsIdFormat,

    /// Chunk header type from the basic header
    pub(crate) fmt: u8,

    /// Bytes consumed of the current chunk payload
    pub(crate) chunk_offset: u32,

    /// Chunk stream targeted by the chunk being received
    pub(crate) recv_chunk_stream: u32,
}

impl RtmpConnection {
    /// Creates a connection over an established transport
    ///
    /// The connection does nothing until start_server or start_client is
    /// called.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection tunables
    /// * `page_pool` - Allocator for payload pages
    /// * `sender` - Transport send queue
    /// * `timers` - External timer service
    /// * `frontend` - Owner of the connection
    /// * `backend` - Transport release hook
    /// * `logger` - Session logger
    pub fn new(
        config: ConnectionConfig,
        page_pool: PagePool,
        sender: Box<dyn Sender>,
        timers: Box<dyn Timers>,
        frontend: Box<dyn ConnectionFrontend>,
        backend: Box<dyn ConnectionBackend>,
        logger: Logger,
    ) -> RtmpConnection {
        let mut conn = RtmpConnection {
            logger,
            config,
            page_pool,
            sender,
            timers,
            frontend,
            backend,
            chunk_streams: HashMap::new(),
            is_closed: false,
            ping_send_timer: None,
            ping_reply_received: false,
            in_chunk_size: DEFAULT_CHUNK_SIZE,
            out_chunk_size: DEFAULT_CHUNK_SIZE,
            out_got_first_timestamp: false,
            out_first_timestamp: 0,
            extended_timestamp_is_delta: false,
            ignore_extended_timestamp: false,
            processing_input: false,
            block_input: false,
            remote_wack_size: DEFAULT_WINDOW_ACK_SIZE,
            local_wack_size: DEFAULT_WINDOW_ACK_SIZE,
            total_received: 0,
            last_ack: 0,
            conn_state: ReceiveState::Invalid,
            cs_id: 0,
            cs_id_fmt: CsIdFormat::Unknown,
            fmt: 0,
            chunk_offset: 0,
            recv_chunk_stream: 0,
        };

        conn.reset_packet();

        conn.chunk_stream_mut(RTMP_CONTROL_CHUNK_STREAM_ID, true);
        conn.chunk_stream_mut(RTMP_COMMAND_CHUNK_STREAM_ID, true);

        conn
    }

    /// Gets the state of a chunk stream
    ///
    /// # Arguments
    ///
    /// * `chunk_stream_id` - ID of the chunk stream
    /// * `create` - Create the state if it does not exist yet
    pub(crate) fn chunk_stream_mut(
        &mut self,
        chunk_stream_id: u32,
        create: bool,
    ) -> Option<&mut ChunkStream> {
        if create {
            Some(
                self.chunk_streams
                    .entry(chunk_stream_id)
                    .or_insert_with(|| ChunkStream::new(chunk_stream_id)),
            )
        } else {
            self.chunk_streams.get_mut(&chunk_stream_id)
        }
    }

    /// Rebases an outbound timestamp so the first non-zero timestamp the
    /// connection ever sends becomes 0
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Timestamp requested by the caller
    pub(crate) fn mangle_out_timestamp(&mut self, timestamp: u32) -> u32 {
        if !self.out_got_first_timestamp {
            if timestamp != 0 {
                self.out_first_timestamp = timestamp;
                self.out_got_first_timestamp = true;
                return 0;
            }

            return timestamp;
        }

        if self.out_first_timestamp <= timestamp {
            timestamp - self.out_first_timestamp
        } else {
            0
        }
    }

    /// Resets the chunk parsing position to the start of a basic header
    pub(crate) fn reset_packet(&mut self) {
        self.conn_state = ReceiveState::BasicHeader;
        self.cs_id = 0;
        self.cs_id_fmt = CsIdFormat::Unknown;
        self.chunk_offset = 0;
    }

    /// Arms the receive automaton for the server side of the handshake
    pub fn start_server(&mut self) {
        self.conn_state = ReceiveState::ServerWaitC0;
    }

    /// Arms the receive automaton for the client side of the handshake and
    /// transmits C0 and C1
    pub fn start_client(&mut self) {
        self.conn_state = ReceiveState::ClientWaitS0;

        let msg = generate_c0_c1();

        let mut page_list = PageList::new();
        self.page_pool.fill_pages(&mut page_list, &msg);

        self.send_raw_pages(page_list, 0);
    }

    /// Starts the keepalive ping timer, once
    pub(crate) fn begin_pings(&mut self) {
        if self.ping_send_timer.is_some() {
            return;
        }

        self.ping_send_timer = Some(
            self.timers
                .add_periodic_timer(self.config.ping_period_seconds),
        );
        self.ping_reply_received = true;
    }

    /// Keepalive timer entry point, invoked by the host timer service on
    /// every period
    ///
    /// A period without a ping reply closes the connection with a protocol
    /// error. Otherwise a new ping request is sent.
    pub fn ping_timer_tick(&mut self) {
        if self.is_closed {
            return;
        }

        if !self.ping_reply_received {
            log_error!(self.logger, "No ping reply received, closing connection");
            self.do_close(Some(ConnectionError::ProtocolError));
            return;
        }

        self.ping_reply_received = false;
        self.send_user_control_ping_request();
    }

    /// Drains the transport send queue, then closes the transport
    pub fn close_after_flush(&mut self) {
        self.sender.close_after_flush();
    }

    /// Closes the connection. Idempotent
    pub fn close(&mut self) {
        self.do_close(None);
    }

    /// Forwards a transport send-queue state change to the frontend
    pub fn sender_state_changed(&mut self, send_state: SendState) {
        self.frontend.send_state_changed(send_state);
    }

    /// Reacts to the transport reporting that sending is over
    ///
    /// # Arguments
    ///
    /// * `error` - The transport error, if any
    pub fn sender_closed(&mut self, error: Option<ConnectionError>) {
        self.do_close(error);
    }

    /// Reacts to the transport reporting end of input
    pub fn process_eof(&mut self) {
        self.do_close(None);
    }

    /// Reacts to the transport reporting a receive error
    pub fn process_error(&mut self) {
        self.do_close(Some(ConnectionError::TransportError));
    }

    /// Checks if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Checks if the connection is currently inside process_input
    ///
    /// Outbound work triggered by an inbound event can use this to queue
    /// instead of recursing into the connection.
    pub fn is_processing_input(&self) -> bool {
        self.processing_input
    }

    /// Halts or resumes inbound parsing, for backpressure
    ///
    /// # Arguments
    ///
    /// * `block` - True to halt parsing
    pub fn set_block_input(&mut self, block: bool) {
        self.block_input = block;
    }

    /// Runs the close sequence: mark closed, cancel the keepalive timer,
    /// release pending inbound pages, notify frontend and backend
    pub(crate) fn do_close(&mut self, error: Option<ConnectionError>) {
        if self.is_closed {
            return;
        }

        self.is_closed = true;

        if let Some(timer_key) = self.ping_send_timer.take() {
            self.timers.delete_timer(timer_key);
        }

        for chunk_stream in self.chunk_streams.values_mut() {
            chunk_stream.reset_in_message();
        }

        self.frontend.closed(error);
        self.backend.close();
    }
}

impl Drop for RtmpConnection {
    fn drop(&mut self) {
        if let Some(timer_key) = self.ping_send_timer.take() {
            self.timers.delete_timer(timer_key);
        }
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_support::*;
    use crate::connection::ProcessInputResult;
    use crate::rtmp::{PING_REQUEST, RTMP_SIG_SIZE, RTMP_TYPE_EVENT};

    fn complete_server_handshake(conn: &mut RtmpConnection) {
        conn.start_server();

        let mut wire = vec![3u8];
        wire.extend_from_slice(&vec![0u8; RTMP_SIG_SIZE]);
        conn.process_input(&wire);
        conn.process_input(&vec![0u8; RTMP_SIG_SIZE]);
    }

    /// Finds user control entries and returns their event types
    fn user_control_events(state: &SharedState) -> Vec<u16> {
        state
            .entries
            .iter()
            .filter(|(header, _)| {
                header.len() >= 8 && (header[0] & 0x3f) == 2 && header[7] == RTMP_TYPE_EVENT
            })
            .map(|(_, payload)| ((payload[0] as u16) << 8) | payload[1] as u16)
            .collect()
    }

    #[test]
    fn test_ping_round_trip_keeps_connection_open() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        complete_server_handshake(&mut conn);
        assert_eq!(state.borrow().timers_added, vec![300]);

        // First tick after the handshake sends a ping request
        conn.ping_timer_tick();
        assert_eq!(user_control_events(&state.borrow()), vec![PING_REQUEST]);

        // Deliver the ping response
        let mut wire = vec![0x02u8];
        wire.extend_from_slice(&[0, 0, 0]); // timestamp
        wire.extend_from_slice(&[0, 0, 6]); // msg_len
        wire.push(RTMP_TYPE_EVENT);
        wire.extend_from_slice(&[0, 0, 0, 0]); // msg_stream_id
        wire.extend_from_slice(&[0x00, 0x07, 0, 0, 0, 42]);
        conn.process_input(&wire);

        // The next tick sends a new request instead of closing
        conn.ping_timer_tick();
        assert_eq!(
            user_control_events(&state.borrow()),
            vec![PING_REQUEST, PING_REQUEST]
        );
        assert!(!conn.is_closed());
        assert!(!state
            .borrow()
            .events
            .iter()
            .any(|ev| matches!(ev, FrontendEvent::Closed(_))));
    }

    #[test]
    fn test_missed_ping_reply_closes_with_protocol_error() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        complete_server_handshake(&mut conn);

        conn.ping_timer_tick(); // sends the request, clears the flag
        conn.ping_timer_tick(); // no reply arrived

        assert!(conn.is_closed());

        let state_v = state.borrow();

        let closed_events: Vec<Option<ConnectionError>> = state_v
            .events
            .iter()
            .filter_map(|ev| match ev {
                FrontendEvent::Closed(err) => Some(*err),
                _ => None,
            })
            .collect();

        assert_eq!(closed_events, vec![Some(ConnectionError::ProtocolError)]);
        assert_eq!(state_v.backend_close_count, 1);

        // The keepalive timer was deregistered
        assert_eq!(state_v.timers_deleted.len(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.close();
        conn.close();

        let state_v = state.borrow();

        let closed_count = state_v
            .events
            .iter()
            .filter(|ev| matches!(ev, FrontendEvent::Closed(None)))
            .count();

        assert_eq!(closed_count, 1);
        assert_eq!(state_v.backend_close_count, 1);
    }

    #[test]
    fn test_process_input_after_close_is_an_error() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        conn.close();

        let (res, accepted) = conn.process_input(&[0x02, 0, 0, 0]);
        assert_eq!(res, ProcessInputResult::Error);
        assert_eq!(accepted, 0);
    }

    #[test]
    fn test_transport_eof_and_error_close_paths() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());
        conn.process_eof();
        assert!(matches!(
            state.borrow().events.as_slice(),
            [FrontendEvent::Closed(None)]
        ));

        let (mut conn2, state2) = make_connection(ConnectionConfig::default());
        conn2.process_error();
        assert!(matches!(
            state2.borrow().events.as_slice(),
            [FrontendEvent::Closed(Some(ConnectionError::TransportError))]
        ));
    }

    #[test]
    fn test_close_after_flush_drains_transport() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.close_after_flush();

        assert!(state.borrow().closed_after_flush);
        assert!(!conn.is_closed());
    }

    #[test]
    fn test_send_state_forwarding() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.sender_state_changed(crate::sender::SendState::QueueSoftLimit);

        assert!(matches!(
            state.borrow().events.as_slice(),
            [FrontendEvent::SendStateChanged(
                crate::sender::SendState::QueueSoftLimit
            )]
        ));
    }

    #[test]
    fn test_drop_deregisters_ping_timer() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        complete_server_handshake(&mut conn);
        assert_eq!(state.borrow().timers_added.len(), 1);

        drop(conn);

        assert_eq!(state.borrow().timers_deleted.len(), 1);
    }

    #[test]
    fn test_ping_period_is_configurable() {
        let config = ConnectionConfig {
            ping_period_seconds: 60,
            ..ConnectionConfig::default()
        };

        let (mut conn, state) = make_connection(config);

        complete_server_handshake(&mut conn);

        assert_eq!(state.borrow().timers_added, vec![60]);
    }
}
