// Connect command

use crate::amf::AMF0Value;
use crate::rtmp::{MessageInfo, COMMAND_MESSAGE_STREAM_ID};

use super::super::connection::RtmpConnection;

impl RtmpConnection {
    /// Sends the connect command (client side)
    ///
    /// # Arguments
    ///
    /// * `app_name` - Name of the application to connect to
    pub fn send_connect(&mut self, app_name: &str) {
        let mut buf: Vec<u8> = Vec::new();

        AMF0Value::String {
            value: "connect".to_string(),
        }
        .encode(&mut buf);
        AMF0Value::Number { value: 1.0 }.encode(&mut buf);

        AMF0Value::Object {
            properties: vec![
                (
                    "app".to_string(),
                    AMF0Value::String {
                        value: app_name.to_string(),
                    },
                ),
                (
                    "flashVer".to_string(),
                    AMF0Value::String {
                        value: "LNX 10,0,22,87".to_string(),
                    },
                ),
                (
                    "swfUrl".to_string(),
                    AMF0Value::String {
                        value: "".to_string(),
                    },
                ),
                (
                    "tcUrl".to_string(),
                    AMF0Value::String {
                        value: "".to_string(),
                    },
                ),
                (
                    "pageUrl".to_string(),
                    AMF0Value::String {
                        value: "".to_string(),
                    },
                ),
                ("fpad".to_string(), AMF0Value::Bool { value: false }),
                ("capabilities".to_string(), AMF0Value::Number { value: 15.0 }),
                (
                    "audioCodecs".to_string(),
                    AMF0Value::Number {
                        value: 0x0fff as f64,
                    },
                ),
                (
                    "videoCodecs".to_string(),
                    AMF0Value::Number {
                        value: 0x00ff as f64,
                    },
                ),
                ("videoFunction".to_string(), AMF0Value::Number { value: 1.0 }),
                ("objectEncoding".to_string(), AMF0Value::Number { value: 0.0 }),
            ],
        }
        .encode(&mut buf);

        self.send_command_message_amf0(COMMAND_MESSAGE_STREAM_ID, &buf);
    }

    /// Replies to an inbound connect command (server side)
    ///
    /// The window acknowledgement size, the peer bandwidth and a
    /// StreamBegin event are announced first, then the _result reply.
    ///
    /// # Arguments
    ///
    /// * `msg_info` - Info of the inbound command message
    pub fn do_connect(&mut self, msg_info: &MessageInfo) -> Result<(), ()> {
        let local_wack_size = self.local_wack_size;
        let remote_wack_size = self.remote_wack_size;

        self.send_window_ack_size(local_wack_size);
        self.send_set_peer_bandwidth(remote_wack_size, 2 /* dynamic limit */);
        self.send_user_control_stream_begin(0);

        let mut buf: Vec<u8> = Vec::new();

        AMF0Value::String {
            value: "_result".to_string(),
        }
        .encode(&mut buf);
        AMF0Value::Number { value: 1.0 }.encode(&mut buf);
        AMF0Value::Null.encode(&mut buf);

        AMF0Value::Object {
            properties: vec![
                (
                    "level".to_string(),
                    AMF0Value::String {
                        value: "status".to_string(),
                    },
                ),
                (
                    "code".to_string(),
                    AMF0Value::String {
                        value: "NetConnection.Connect.Success".to_string(),
                    },
                ),
                (
                    "description".to_string(),
                    AMF0Value::String {
                        value: "Connection succeeded.".to_string(),
                    },
                ),
            ],
        }
        .encode(&mut buf);

        AMF0Value::Object {
            properties: vec![
                (
                    "fmsVer".to_string(),
                    AMF0Value::String {
                        value: "MMNT/0,1,0,0".to_string(),
                    },
                ),
                ("capabilities".to_string(), AMF0Value::Number { value: 31.0 }),
                ("mode".to_string(), AMF0Value::Number { value: 1.0 }),
            ],
        }
        .encode(&mut buf);

        self.send_command_message_amf0(msg_info.msg_stream_id, &buf);

        Ok(())
    }
}
