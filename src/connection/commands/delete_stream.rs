// DeleteStream command

use crate::amf::AMFDecodingCursor;
use crate::rtmp::MessageInfo;

use super::super::connection::RtmpConnection;

impl RtmpConnection {
    /// Replies to an inbound deleteStream command (server side)
    ///
    /// # Arguments
    ///
    /// * `msg_info` - Info of the inbound command message
    /// * `cursor` - AMF cursor positioned right after the command name
    /// * `data` - The command message body
    pub fn do_delete_stream(
        &mut self,
        msg_info: &MessageInfo,
        cursor: &mut AMFDecodingCursor,
        data: &[u8],
    ) -> Result<(), ()> {
        self.reply_simple_result(msg_info, cursor, data)
    }
}
