// Shared mocks for connection tests

use std::cell::RefCell;
use std::rc::Rc;

use crate::amf::AmfEncoding;
use crate::log::Logger;
use crate::pages::{PageList, PagePool};
use crate::rtmp::{
    AudioCodecId, AudioFrameType, AudioMessageInfo, MessageInfo, VideoCodecId, VideoFrameType,
    VideoMessageInfo,
};
use crate::sender::{MessageEntry, SendState, Sender};
use crate::timer::{TimerKey, Timers};

use super::config::ConnectionConfig;
use super::connection::RtmpConnection;
use super::frontend::{ConnectionBackend, ConnectionError, ConnectionFrontend};

/// Event recorded by the mock frontend
pub(crate) enum FrontendEvent {
    HandshakeComplete,
    Command {
        msg_stream_id: u32,
        timestamp: u32,
        amf_encoding: AmfEncoding,
        bytes: Vec<u8>,
    },
    Audio {
        timestamp: u32,
        codec_id: AudioCodecId,
        frame_type: AudioFrameType,
        prechunk_size: u32,
        msg_len: u32,
        bytes: Vec<u8>,
    },
    Video {
        timestamp: u32,
        codec_id: VideoCodecId,
        frame_type: VideoFrameType,
        prechunk_size: u32,
        msg_len: u32,
        bytes: Vec<u8>,
    },
    SendStateChanged(SendState),
    Closed(Option<ConnectionError>),
}

/// State shared between a connection under test and its mocks
#[derive(Default)]
pub(crate) struct SharedState {
    /// Frontend callbacks, in invocation order
    pub events: Vec<FrontendEvent>,

    /// Serialized entries handed to the sender, as (header, payload) pairs
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,

    /// Number of flush calls
    pub flush_count: usize,

    /// True once close_after_flush was called on the sender
    pub closed_after_flush: bool,

    /// Number of backend close calls
    pub backend_close_count: usize,

    /// Periods of the registered timers
    pub timers_added: Vec<u32>,

    /// Keys of the deleted timers
    pub timers_deleted: Vec<TimerKey>,

    /// Make the frontend reject handshake_complete
    pub reject_handshake: bool,

    /// Make the frontend reject message deliveries
    pub reject_messages: bool,
}

impl SharedState {
    /// Concatenates everything handed to the sender, in wire order
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();

        for (header, payload) in &self.entries {
            out.extend_from_slice(header);
            out.extend_from_slice(payload);
        }

        out
    }
}

pub(crate) struct MockSender {
    pub state: Rc<RefCell<SharedState>>,
}

impl Sender for MockSender {
    fn send_message(&mut self, entry: MessageEntry) {
        let payload = match &entry.pages {
            Some(pages) => {
                let bytes = pages.copy_to_vec();
                bytes[(entry.msg_offset as usize).min(bytes.len())..].to_vec()
            }
            None => Vec::new(),
        };

        self.state.borrow_mut().entries.push((entry.header, payload));
    }

    fn flush(&mut self) {
        self.state.borrow_mut().flush_count += 1;
    }

    fn close_after_flush(&mut self) {
        self.state.borrow_mut().closed_after_flush = true;
    }
}

pub(crate) struct MockTimers {
    pub state: Rc<RefCell<SharedState>>,
    pub next_key: TimerKey,
}

impl Timers for MockTimers {
    fn add_periodic_timer(&mut self, period_seconds: u32) -> TimerKey {
        self.state.borrow_mut().timers_added.push(period_seconds);

        let key = self.next_key;
        self.next_key += 1;
        key
    }

    fn delete_timer(&mut self, key: TimerKey) {
        self.state.borrow_mut().timers_deleted.push(key);
    }
}

pub(crate) struct MockFrontend {
    pub state: Rc<RefCell<SharedState>>,
}

impl ConnectionFrontend for MockFrontend {
    fn handshake_complete(&mut self) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();

        state.events.push(FrontendEvent::HandshakeComplete);

        if state.reject_handshake {
            Err(())
        } else {
            Ok(())
        }
    }

    fn command_message(
        &mut self,
        msg_info: &MessageInfo,
        _page_pool: &PagePool,
        page_list: PageList,
        _msg_len: u32,
        amf_encoding: AmfEncoding,
    ) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();

        state.events.push(FrontendEvent::Command {
            msg_stream_id: msg_info.msg_stream_id,
            timestamp: msg_info.timestamp,
            amf_encoding,
            bytes: page_list.copy_to_vec(),
        });

        if state.reject_messages {
            Err(())
        } else {
            Ok(())
        }
    }

    fn audio_message(
        &mut self,
        audio_msg_info: &AudioMessageInfo,
        _page_pool: &PagePool,
        page_list: PageList,
        msg_len: u32,
        _msg_offset: u32,
    ) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();

        state.events.push(FrontendEvent::Audio {
            timestamp: audio_msg_info.timestamp,
            codec_id: audio_msg_info.codec_id,
            frame_type: audio_msg_info.frame_type,
            prechunk_size: audio_msg_info.prechunk_size,
            msg_len,
            bytes: page_list.copy_to_vec(),
        });

        if state.reject_messages {
            Err(())
        } else {
            Ok(())
        }
    }

    fn video_message(
        &mut self,
        video_msg_info: &VideoMessageInfo,
        _page_pool: &PagePool,
        page_list: PageList,
        msg_len: u32,
        _msg_offset: u32,
    ) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();

        state.events.push(FrontendEvent::Video {
            timestamp: video_msg_info.timestamp,
            codec_id: video_msg_info.codec_id,
            frame_type: video_msg_info.frame_type,
            prechunk_size: video_msg_info.prechunk_size,
            msg_len,
            bytes: page_list.copy_to_vec(),
        });

        if state.reject_messages {
            Err(())
        } else {
            Ok(())
        }
    }

    fn send_state_changed(&mut self, send_state: SendState) {
        self.state
            .borrow_mut()
            .events
            .push(FrontendEvent::SendStateChanged(send_state));
    }

    fn closed(&mut self, error: Option<ConnectionError>) {
        self.state
            .borrow_mut()
            .events
            .push(FrontendEvent::Closed(error));
    }
}

pub(crate) struct MockBackend {
    pub state: Rc<RefCell<SharedState>>,
}

impl ConnectionBackend for MockBackend {
    fn close(&mut self) {
        self.state.borrow_mut().backend_close_count += 1;
    }
}

/// Builds a connection wired to recording mocks
pub(crate) fn make_connection(
    config: ConnectionConfig,
) -> (RtmpConnection, Rc<RefCell<SharedState>>) {
    let state: Rc<RefCell<SharedState>> = Rc::new(RefCell::new(SharedState::default()));

    let connection = RtmpConnection::new(
        config,
        PagePool::new(4096),
        Box::new(MockSender {
            state: state.clone(),
        }),
        Box::new(MockTimers {
            state: state.clone(),
            next_key: 1,
        }),
        Box::new(MockFrontend {
            state: state.clone(),
        }),
        Box::new(MockBackend {
            state: state.clone(),
        }),
        Logger::new_disabled(),
    );

    (connection, state)
}

/// Counts the sender entries whose basic header targets a chunk stream
pub(crate) fn entries_for_chunk_stream(
    state: &SharedState,
    chunk_stream_id: u32,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    state
        .entries
        .iter()
        .filter(|(header, _)| {
            !header.is_empty() && (header[0] & 0x3f) as u32 == chunk_stream_id
        })
        .cloned()
        .collect()
}
