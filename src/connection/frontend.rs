// Frontend and backend contracts

use crate::amf::AmfEncoding;
use crate::pages::{PageList, PagePool};
use crate::rtmp::{AudioMessageInfo, MessageInfo, VideoMessageInfo};
use crate::sender::SendState;

/// Error delivered with the closed callback
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionError {
    /// The peer violated the protocol (malformed message, bad chunking,
    /// missed keepalive reply)
    ProtocolError,

    /// The transport reported an error
    TransportError,
}

/// Capability set the connection invokes on its owner
///
/// All callbacks run on the connection's own context; the connection never
/// holds internal state borrowed across a callback, so implementations may
/// call back into the connection.
pub trait ConnectionFrontend {
    /// Called when the handshake finishes
    ///
    /// Returning an error tears the connection down
    fn handshake_complete(&mut self) -> Result<(), ()>;

    /// Delivers a complete command or data message
    ///
    /// The connection never decodes command bodies itself. Implementations
    /// decode the AMF command name from the page list and, for the commands
    /// the engine can answer, route the message back into the connection's
    /// repliers (do_connect, do_create_stream, do_release_stream,
    /// do_close_stream, do_delete_stream) with a cursor positioned right
    /// after the command name.
    ///
    /// Returning an error tears the connection down
    fn command_message(
        &mut self,
        msg_info: &MessageInfo,
        page_pool: &PagePool,
        page_list: PageList,
        msg_len: u32,
        amf_encoding: AmfEncoding,
    ) -> Result<(), ()>;

    /// Delivers a complete audio message
    ///
    /// Returning an error tears the connection down
    fn audio_message(
        &mut self,
        audio_msg_info: &AudioMessageInfo,
        page_pool: &PagePool,
        page_list: PageList,
        msg_len: u32,
        msg_offset: u32,
    ) -> Result<(), ()>;

    /// Delivers a complete video message
    ///
    /// Returning an error tears the connection down
    fn video_message(
        &mut self,
        video_msg_info: &VideoMessageInfo,
        page_pool: &PagePool,
        page_list: PageList,
        msg_len: u32,
        msg_offset: u32,
    ) -> Result<(), ()>;

    /// Forwards a change of the transport send queue state
    fn send_state_changed(&mut self, send_state: SendState);

    /// Reports that the connection is closed. Called exactly once
    fn closed(&mut self, error: Option<ConnectionError>);
}

/// Backend the connection tells to release the underlying transport
pub trait ConnectionBackend {
    /// Closes the underlying transport
    fn close(&mut self);
}
