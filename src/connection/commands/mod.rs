// Command message builders and repliers

mod close_stream;
mod connect;
mod create_stream;
mod delete_stream;
mod play;
mod release_stream;

use crate::amf::{AMF0Value, AMFDecodingCursor};
use crate::log_error;
use crate::rtmp::MessageInfo;

use super::connection::RtmpConnection;

impl RtmpConnection {
    /// Replies to a command with _result, the echoed transaction id and a
    /// null command object
    ///
    /// # Arguments
    ///
    /// * `msg_info` - Info of the inbound command message
    /// * `cursor` - AMF cursor positioned right after the command name
    /// * `data` - The command message body
    pub(crate) fn reply_simple_result(
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

        self.send_command_message_amf0(msg_info.msg_stream_id, &buf);

        Ok(())
    }
}

// Tests

#[cfg(test)]
mod tests {
    use crate::amf::{AMF0Value, AMFDecodingCursor};
    use crate::connection::test_support::*;
    use crate::connection::ConnectionConfig;
    use crate::rtmp::{
        MessageInfo, RTMP_TYPE_EVENT, RTMP_TYPE_INVOKE, RTMP_TYPE_SET_PEER_BANDWIDTH,
        RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
    };

    /// Decodes every AMF0 atom of a command payload
    fn decode_atoms(payload: &[u8]) -> Vec<AMF0Value> {
        let mut cursor = AMFDecodingCursor::new(payload);
        let mut atoms: Vec<AMF0Value> = Vec::new();

        while !cursor.ended() {
            atoms.push(AMF0Value::read(&mut cursor, payload).expect("bad AMF payload"));
        }

        atoms
    }

    /// Returns the payloads of the command messages handed to the sender
    fn command_payloads(state: &SharedState) -> Vec<Vec<u8>> {
        state
            .entries
            .iter()
            .filter(|(header, _)| {
                header.len() >= 8 && (header[0] & 0x3f) == 3 && header[7] == RTMP_TYPE_INVOKE
            })
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    #[test]
    fn test_send_connect_envelope() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.send_connect("live");

        let payloads = command_payloads(&state.borrow());
        assert_eq!(payloads.len(), 1);

        let atoms = decode_atoms(&payloads[0]);
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].get_string(), "connect");
        assert_eq!(atoms[1].get_number(), 1.0);

        let cmd_obj = &atoms[2];
        assert_eq!(cmd_obj.get_property("app").unwrap().get_string(), "live");
        assert_eq!(
            cmd_obj.get_property("flashVer").unwrap().get_string(),
            "LNX 10,0,22,87"
        );
        assert_eq!(
            cmd_obj.get_property("audioCodecs").unwrap().get_number(),
            0x0fff as f64
        );
        assert_eq!(
            cmd_obj.get_property("videoCodecs").unwrap().get_number(),
            0x00ff as f64
        );
        assert_eq!(
            cmd_obj.get_property("objectEncoding").unwrap().get_number(),
            0.0
        );
    }

    #[test]
    fn test_do_connect_reply_sequence() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        let msg_info = MessageInfo {
            msg_stream_id: 0,
            timestamp: 0,
            prechunk_size: 0,
        };

        conn.do_connect(&msg_info).expect("do_connect failed");

        let state_v = state.borrow();

        // Control preamble: WindowAckSize, SetPeerBandwidth, StreamBegin
        let control_types: Vec<u8> = state_v
            .entries
            .iter()
            .filter(|(header, _)| header.len() >= 8 && (header[0] & 0x3f) == 2)
            .map(|(header, _)| header[7])
            .collect();

        assert!(control_types.windows(3).any(|w| w
            == [
                RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
                RTMP_TYPE_SET_PEER_BANDWIDTH,
                RTMP_TYPE_EVENT
            ]));

        let payloads = command_payloads(&state_v);
        assert_eq!(payloads.len(), 1);

        let atoms = decode_atoms(&payloads[0]);
        assert_eq!(atoms.len(), 5);
        assert_eq!(atoms[0].get_string(), "_result");
        assert_eq!(atoms[1].get_number(), 1.0);
        assert!(matches!(atoms[2], AMF0Value::Null));
        assert_eq!(
            atoms[3].get_property("code").unwrap().get_string(),
            "NetConnection.Connect.Success"
        );
        assert_eq!(
            atoms[4].get_property("fmsVer").unwrap().get_string(),
            "MMNT/0,1,0,0"
        );
        assert_eq!(atoms[4].get_property("capabilities").unwrap().get_number(), 31.0);
    }

    #[test]
    fn test_do_create_stream_reply() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        // Inbound arguments, positioned after the command name
        let mut inbound: Vec<u8> = Vec::new();
        AMF0Value::Number { value: 5.0 }.encode(&mut inbound);
        AMF0Value::Null.encode(&mut inbound);

        let msg_info = MessageInfo {
            msg_stream_id: 0,
            timestamp: 0,
            prechunk_size: 0,
        };

        let mut cursor = AMFDecodingCursor::new(&inbound);
        conn.do_create_stream(&msg_info, &mut cursor, &inbound)
            .expect("do_create_stream failed");

        let payloads = command_payloads(&state.borrow());
        let atoms = decode_atoms(&payloads[0]);

        assert_eq!(atoms.len(), 4);
        assert_eq!(atoms[0].get_string(), "_result");
        assert_eq!(atoms[1].get_number(), 5.0);
        assert!(matches!(atoms[2], AMF0Value::Null));
        assert_eq!(atoms[3].get_number(), 1.0);
    }

    #[test]
    fn test_simple_result_repliers() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        let mut inbound: Vec<u8> = Vec::new();
        AMF0Value::Number { value: 9.0 }.encode(&mut inbound);

        let msg_info = MessageInfo {
            msg_stream_id: 0,
            timestamp: 0,
            prechunk_size: 0,
        };

        let mut cursor = AMFDecodingCursor::new(&inbound);
        conn.do_release_stream(&msg_info, &mut cursor, &inbound)
            .expect("do_release_stream failed");

        let payloads = command_payloads(&state.borrow());
        let atoms = decode_atoms(&payloads[0]);

        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].get_string(), "_result");
        assert_eq!(atoms[1].get_number(), 9.0);
        assert!(matches!(atoms[2], AMF0Value::Null));
    }

    #[test]
    fn test_missing_transaction_id_is_rejected() {
        let (mut conn, _state) = make_connection(ConnectionConfig::default());

        let inbound: Vec<u8> = Vec::new();

        let msg_info = MessageInfo {
            msg_stream_id: 0,
            timestamp: 0,
            prechunk_size: 0,
        };

        let mut cursor = AMFDecodingCursor::new(&inbound);
        assert!(conn
            .do_delete_stream(&msg_info, &mut cursor, &inbound)
            .is_err());
    }

    #[test]
    fn test_send_play_uses_stream_one() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        conn.send_play("movie");

        let state_v = state.borrow();
        let payloads = command_payloads(&state_v);
        let atoms = decode_atoms(&payloads[0]);

        assert_eq!(atoms[0].get_string(), "play");
        assert_eq!(atoms[1].get_number(), 3.0);
        assert!(matches!(atoms[2], AMF0Value::Null));
        assert_eq!(atoms[3].get_string(), "movie");

        // Sent on message stream 1
        let (header, _) = state_v
            .entries
            .iter()
            .find(|(header, _)| {
                header.len() >= 8 && (header[0] & 0x3f) == 3 && header[7] == RTMP_TYPE_INVOKE
            })
            .unwrap();
        assert_eq!(&header[8..12], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_command_is_dropped() {
        let (mut conn, state) = make_connection(ConnectionConfig::default());

        let oversized: Vec<u8> = vec![0; 0x0100_0001];
        conn.send_command_message_amf0(0, &oversized);

        assert!(command_payloads(&state.borrow()).is_empty());
    }
}
