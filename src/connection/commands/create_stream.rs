// CreateStream command

use crate::amf::{AMF0Value, AMFDecodingCursor};
use crate::log_error;
use crate::rtmp::{MessageInfo, COMMAND_MESSAGE_STREAM_ID, DEFAULT_MESSAGE_STREAM_ID};

use super::super::connection::RtmpConnection;

impl RtmpConnection {
    /// Sends the createStream command (client side)
    pub fn send_create_stream(&mut self) {
        let mut buf: Vec<u8> = Vec::new();

        AMF0Value::String {
            value: "createStream".to_string(),
        }
        .encode(&mut buf);
        AMF0Value::Number { value: 2.0 }.encode(&mut buf);
        AMF0Value::Null.encode(&mut buf);

        self.send_command_message_amf0(COMMAND_MESSAGE_STREAM_ID, &buf);
    }

    /// Replies to an inbound createStream command (server side)
    ///
    /// The reply carries the allocated message stream id as its fourth
    /// atom.
    ///
    /// # Arguments
    ///
    /// * `msg_info` - Info of the inbound command message
    /// * `cursor` - AMF cursor positioned right after the command name
    /// * `data` - The command message body
    pub fn do_create_stream(
        &mut self,
        msg_info: &MessageInfo,
        cursor: &mut AMFDecodingCursor,
        data: &[u8],
    ) -> Result<(), ()> {
        let transaction_id = match AMF0Value::read(cursor, data) {
            Ok(AMF0Value::Number { value }) => value,
            _ => {
                log_error!(self.logger, "Could not decode transaction_id");
                return Err(());
            }
        };

        let mut buf: Vec<u8> = Vec::new();

        AMF0Value::String {
            value: "_result".to_string(),
        }
        .encode(&mut buf);
        AMF0Value::Number {
            value: transaction_id,
        }
        .encode(&mut buf);
        AMF0Value::Null.encode(&mut buf);
        AMF0Value::Number {
            value: DEFAULT_MESSAGE_STREAM_ID as f64,
        }
        .encode(&mut buf);

        self.send_command_message_amf0(msg_info.msg_stream_id, &buf);

        Ok(())
    }
}
