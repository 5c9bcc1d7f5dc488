// Play command

use crate::amf::AMF0Value;

use super::super::connection::RtmpConnection;

impl RtmpConnection {
    /// Sends the play command (client side)
    ///
    /// # Arguments
    ///
    /// * `stream_name` - Name of the stream to play
    pub fn send_play(&mut self, stream_name: &str) {
        let mut buf: Vec<u8> = Vec::new();

        AMF0Value::String {
            value: "play".to_string(),
        }
        .encode(&mut buf);
        AMF0Value::Number { value: 3.0 }.encode(&mut buf);
        AMF0Value::Null.encode(&mut buf);
        AMF0Value::String {
            value: stream_name.to_string(),
        }
        .encode(&mut buf);

        self.send_command_message_amf0(1, &buf);
    }
}
