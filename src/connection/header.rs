// Outbound chunk header serialization

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::log::Logger;
use crate::log_warning;
use crate::rtmp::{
    timestamp_greater, ChunkStream, MessageDesc, MAX_HEADER_LEN, RTMP_CHUNK_TYPE_0,
    RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2, RTMP_CHUNK_TYPE_3, RTMP_EXTENDED_TIMESTAMP,
    RTMP_TYPE_DATA,
};

/// Builds the chunk header for an outbound message and updates the chunk
/// stream's header compression state
///
/// The cheapest header type the prior state allows is chosen. When the
/// timestamp or delta would need the extended field and the message spans
/// multiple chunks, the fix-header form is emitted instead: a dummy Type 0
/// header with zero length and Data_AMF0 type, immediately followed by a
/// Type 1 header with delta 0 carrying the real length and type. Type 3
/// continuation chunks after such a header carry no extended timestamp,
/// which keeps prechunked pages reusable across subscribers.
///
/// # Arguments
///
/// * `logger` - Logger of the connection
/// * `mdesc` - Descriptor of the message
/// * `chunk_stream` - Chunk stream the message is sent on
/// * `header_buf` - Buffer receiving the header bytes
/// * `timestamp` - Message timestamp, already rebased
/// * `prechunk_size` - Chunk size the payload will be split with
///
/// # Return value
///
/// The number of header bytes written
pub(crate) fn fill_message_header(
    logger: &Logger,
    mdesc: &MessageDesc,
    chunk_stream: &mut ChunkStream,
    header_buf: &mut [u8; MAX_HEADER_LEN],
    timestamp: u32,
    prechunk_size: u32,
) -> usize {
    let mut has_extended_timestamp = false;
    let mut extended_timestamp: u32 = 0;

    // Basic header (1 byte, filled at the end)
    let mut offs: usize = 1;

    let mut got_header = false;
    let mut header_type: u8 = 0;
    let mut fix_header = false;

    if mdesc.cs_hdr_comp && chunk_stream.out_header_valid {
        let mut force_type0 = false;

        if !timestamp_greater(timestamp, chunk_stream.out_msg_timestamp) {
            log_warning!(
                logger,
                format!(
                    "Timestamp not greater than the previous one: {} -> {}",
                    chunk_stream.out_msg_timestamp, timestamp
                )
            );
            force_type0 = true;
        }

        if !force_type0 && chunk_stream.out_msg_stream_id == mdesc.msg_stream_id {
            let timestamp_delta = timestamp.wrapping_sub(chunk_stream.out_msg_timestamp);

            if timestamp_delta >= RTMP_EXTENDED_TIMESTAMP
                && prechunk_size != 0
                && mdesc.msg_len > prechunk_size
            {
                // Falls through to a Type 0 header with the fix applied
                fix_header = true;
            } else {
                if timestamp < chunk_stream.out_msg_timestamp {
                    // Goes against RTMP rules and should never happen, the
                    // wraparound check above exists to catch it
                    log_warning!(
                        logger,
                        format!(
                            "Backwards timestamp: new: {}, old: {}",
                            timestamp, chunk_stream.out_msg_timestamp
                        )
                    );
                }

                if chunk_stream.out_msg_type_id == mdesc.msg_type_id
                    && chunk_stream.out_msg_len == mdesc.msg_len
                {
                    if chunk_stream.out_msg_timestamp_delta == timestamp_delta
                        // Type 3 chunks and extended timestamps must not mix
                        && chunk_stream.out_msg_timestamp < RTMP_EXTENDED_TIMESTAMP
                    {
                        // Type 3 header

                        got_header = true;

                        header_type = RTMP_CHUNK_TYPE_3;
                    } else {
                        // Type 2 header

                        got_header = true;

                        chunk_stream.out_msg_timestamp = timestamp;
                        chunk_stream.out_msg_timestamp_delta = timestamp_delta;

                        if timestamp_delta >= RTMP_EXTENDED_TIMESTAMP {
                            header_buf[offs..offs + 3].copy_from_slice(&[0xff, 0xff, 0xff]);

                            has_extended_timestamp = true;
                            extended_timestamp = timestamp_delta;
                        } else {
                            BigEndian::write_u24(&mut header_buf[offs..offs + 3], timestamp_delta);
                        }

                        header_type = RTMP_CHUNK_TYPE_2;
                        offs += 3;
                    }
                }

                if !got_header {
                    // Type 1 header

                    got_header = true;

                    chunk_stream.out_msg_timestamp = timestamp;
                    chunk_stream.out_msg_timestamp_delta = timestamp_delta;
                    chunk_stream.out_msg_len = mdesc.msg_len;
                    chunk_stream.out_msg_type_id = mdesc.msg_type_id;

                    if timestamp_delta >= RTMP_EXTENDED_TIMESTAMP {
                        header_buf[offs..offs + 3].copy_from_slice(&[0xff, 0xff, 0xff]);

                        has_extended_timestamp = true;
                        extended_timestamp = timestamp_delta;
                    } else {
                        BigEndian::write_u24(&mut header_buf[offs..offs + 3], timestamp_delta);
                    }

                    BigEndian::write_u24(&mut header_buf[offs + 3..offs + 6], mdesc.msg_len);
                    header_buf[offs + 6] = mdesc.msg_type_id;

                    header_type = RTMP_CHUNK_TYPE_1;
                    offs += 7;
                }
            }
        }
    }

    if !got_header {
        // Type 0 header

        chunk_stream.out_header_valid = true;
        chunk_stream.out_msg_timestamp = timestamp;
        chunk_stream.out_msg_timestamp_delta = timestamp; // Somewhat weird RTMP rule
        chunk_stream.out_msg_len = mdesc.msg_len;
        chunk_stream.out_msg_type_id = mdesc.msg_type_id;
        chunk_stream.out_msg_stream_id = mdesc.msg_stream_id;

        if timestamp >= RTMP_EXTENDED_TIMESTAMP {
            if prechunk_size != 0 && mdesc.msg_len > prechunk_size {
                fix_header = true;
            }

            header_buf[offs..offs + 3].copy_from_slice(&[0xff, 0xff, 0xff]);

            has_extended_timestamp = true;
            extended_timestamp = timestamp;
        } else {
            BigEndian::write_u24(&mut header_buf[offs..offs + 3], timestamp);
        }

        if !fix_header {
            BigEndian::write_u24(&mut header_buf[offs + 3..offs + 6], mdesc.msg_len);
            header_buf[offs + 6] = mdesc.msg_type_id;
        } else {
            header_buf[offs + 3..offs + 6].copy_from_slice(&[0, 0, 0]);
            header_buf[offs + 6] = RTMP_TYPE_DATA;

            // The state must describe the Type 1 header appended below
            chunk_stream.out_msg_timestamp_delta = 0;
        }

        // msg_stream_id is little endian, unlike every other header field.
        // Flash clients expect it that way.
        LittleEndian::write_u32(
            &mut header_buf[offs + 7..offs + 11],
            mdesc.msg_stream_id,
        );

        header_type = RTMP_CHUNK_TYPE_0;
        offs += 11;
    }

    if has_extended_timestamp {
        BigEndian::write_u32(&mut header_buf[offs..offs + 4], extended_timestamp);
        offs += 4;
    }

    if fix_header {
        header_buf[offs] = (RTMP_CHUNK_TYPE_1 << 6) | ((chunk_stream.chunk_stream_id as u8) & 0x3f);
        offs += 1;

        header_buf[offs..offs + 3].copy_from_slice(&[0, 0, 0]);

        BigEndian::write_u24(&mut header_buf[offs + 3..offs + 6], mdesc.msg_len);
        header_buf[offs + 6] = mdesc.msg_type_id;

        offs += 7;
    }

    // The single byte basic header assumes small chunk stream ids (2-63)
    debug_assert!(chunk_stream.chunk_stream_id > 1 && chunk_stream.chunk_stream_id < 64);
    header_buf[0] = (header_type << 6) | ((chunk_stream.chunk_stream_id as u8) & 0x3f);

    offs
}
