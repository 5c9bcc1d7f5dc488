// Completed message dispatch

use byteorder::{BigEndian, ByteOrder};

use crate::amf::AmfEncoding;
use crate::pages::PageList;
use crate::rtmp::{
    AudioCodecId, AudioFrameType, AudioMessageInfo, MessageInfo, VideoCodecId, VideoFrameType,
    VideoMessageInfo, MIN_CHUNK_SIZE, PING_REQUEST, PING_RESPONSE, PRECHUNK_SIZE,
    RTMP_TYPE_ABORT, RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_AGGREGATE, RTMP_TYPE_AUDIO,
    RTMP_TYPE_DATA, RTMP_TYPE_EVENT, RTMP_TYPE_FLEX_MESSAGE, RTMP_TYPE_FLEX_OBJECT,
    RTMP_TYPE_FLEX_STREAM, RTMP_TYPE_INVOKE, RTMP_TYPE_SET_CHUNK_SIZE,
    RTMP_TYPE_SET_PEER_BANDWIDTH, RTMP_TYPE_SHARED_OBJECT, RTMP_TYPE_VIDEO,
    RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE, SET_BUFFER_LENGTH, STREAM_BEGIN, STREAM_DRY,
    STREAM_EOF, STREAM_IS_RECORDED,
};
use crate::{log_debug, log_error, log_warning};

use super::connection::RtmpConnection;

impl RtmpConnection {
    /// Dispatches a completed inbound message
    ///
    /// The payload pages are taken from the chunk stream; media and command
    /// messages transfer them to the frontend.
    ///
    /// # Arguments
    ///
    /// * `cs_id` - Chunk stream the message arrived on
    pub(crate) fn process_message(&mut self, cs_id: u32) -> Result<(), ()> {
        let (msg_type_id, msg_len, msg_timestamp, msg_stream_id, page_list) = {
            let chunk_stream = self.chunk_streams.get_mut(&cs_id).ok_or(())?;

            (
                chunk_stream.in_msg_type_id,
                chunk_stream.in_msg_len,
                chunk_stream.in_msg_timestamp,
                chunk_stream.in_msg_stream_id,
                std::mem::take(&mut chunk_stream.page_list),
            )
        };

        if self.config.log_requests {
            log_debug!(
                self.logger,
                format!(
                    "Message received: type {}, ts {}, msid {}, csid {}, {} bytes",
                    msg_type_id, msg_timestamp, msg_stream_id, cs_id, msg_len
                )
            );
        }

        match msg_type_id {
            RTMP_TYPE_SET_CHUNK_SIZE => {
                if msg_len < 4 {
                    log_error!(
                        self.logger,
                        format!("SetChunkSize message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                let msg_buf = page_list.first_bytes(4);
                let chunk_size = BigEndian::read_u32(&msg_buf);

                if chunk_size < MIN_CHUNK_SIZE {
                    log_error!(self.logger, format!("Bad chunk size: {}", chunk_size));
                    return Err(());
                }

                self.in_chunk_size = chunk_size;

                Ok(())
            }
            RTMP_TYPE_ABORT => {
                if msg_len < 4 {
                    log_error!(
                        self.logger,
                        format!("Abort message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                let msg_buf = page_list.first_bytes(4);
                let chunk_stream_id = BigEndian::read_u32(&msg_buf);

                match self.chunk_streams.get_mut(&chunk_stream_id) {
                    Some(chunk_stream) => {
                        chunk_stream.reset_in_message();
                    }
                    None => {
                        log_warning!(
                            self.logger,
                            format!("Abort for unknown chunk stream: {}", chunk_stream_id)
                        );
                    }
                }

                Ok(())
            }
            RTMP_TYPE_ACKNOWLEDGEMENT => {
                if msg_len < 4 {
                    log_error!(
                        self.logger,
                        format!("Ack message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                // The reported byte count is not used
                Ok(())
            }
            RTMP_TYPE_EVENT => self.process_user_control_message(&page_list, msg_len),
            RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE => {
                if msg_len < 4 {
                    log_error!(
                        self.logger,
                        format!("WindowAckSize message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                let msg_buf = page_list.first_bytes(4);
                self.remote_wack_size = BigEndian::read_u32(&msg_buf);

                Ok(())
            }
            RTMP_TYPE_SET_PEER_BANDWIDTH => {
                if msg_len < 5 {
                    log_error!(
                        self.logger,
                        format!("SetPeerBandwidth message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                let msg_buf = page_list.first_bytes(5);
                let wack_size = BigEndian::read_u32(&msg_buf[0..4]);
                // msg_buf[4] is the limit type, which is not used

                if self.local_wack_size != wack_size {
                    let local_wack_size = self.local_wack_size;
                    self.send_window_ack_size(local_wack_size);
                }

                Ok(())
            }
            RTMP_TYPE_AUDIO => {
                let hint = page_list.first_bytes(2);

                let (codec_id, frame_type) = if !hint.is_empty() {
                    let codec_id = AudioCodecId::from_flv_codec_id((hint[0] & 0xf0) >> 4);

                    let mut frame_type = AudioFrameType::RawData;
                    if codec_id == AudioCodecId::Aac && hint.len() >= 2 && hint[1] == 0 {
                        frame_type = AudioFrameType::AacSequenceHeader;
                    }

                    (codec_id, frame_type)
                } else {
                    (AudioCodecId::Unknown, AudioFrameType::Unknown)
                };

                let audio_msg_info = AudioMessageInfo {
                    timestamp: msg_timestamp,
                    codec_id,
                    frame_type,
                    prechunk_size: if self.config.prechunking_enabled {
                        PRECHUNK_SIZE
                    } else {
                        0
                    },
                };

                let page_pool = self.page_pool.clone();
                self.frontend
                    .audio_message(&audio_msg_info, &page_pool, page_list, msg_len, 0)
            }
            RTMP_TYPE_VIDEO => {
                let hint = page_list.first_bytes(2);

                let (codec_id, frame_type) = if !hint.is_empty() {
                    let codec_id = VideoCodecId::from_flv_codec_id(hint[0] & 0x0f);
                    let mut frame_type = VideoFrameType::from_flv_frame_type((hint[0] & 0xf0) >> 4);

                    if codec_id == VideoCodecId::Avc && hint.len() >= 2 {
                        if hint[1] == 0 {
                            frame_type = VideoFrameType::AvcSequenceHeader;
                        } else if hint[1] == 2 {
                            frame_type = VideoFrameType::AvcEndOfSequence;
                        }
                    }

                    (codec_id, frame_type)
                } else {
                    (VideoCodecId::Unknown, VideoFrameType::Unknown)
                };

                let video_msg_info = VideoMessageInfo {
                    timestamp: msg_timestamp,
                    codec_id,
                    frame_type,
                    prechunk_size: if self.config.prechunking_enabled {
                        PRECHUNK_SIZE
                    } else {
                        0
                    },
                };

                let page_pool = self.page_pool.clone();
                self.frontend
                    .video_message(&video_msg_info, &page_pool, page_list, msg_len, 0)
            }
            RTMP_TYPE_FLEX_STREAM | RTMP_TYPE_FLEX_MESSAGE => self.call_command_message(
                msg_timestamp,
                msg_stream_id,
                page_list,
                msg_len,
                AmfEncoding::AMF3,
            ),
            RTMP_TYPE_DATA | RTMP_TYPE_INVOKE => self.call_command_message(
                msg_timestamp,
                msg_stream_id,
                page_list,
                msg_len,
                AmfEncoding::AMF0,
            ),
            RTMP_TYPE_FLEX_OBJECT | RTMP_TYPE_SHARED_OBJECT => {
                // No-op
                Ok(())
            }
            RTMP_TYPE_AGGREGATE => {
                // No-op
                Ok(())
            }
            _ => {
                log_warning!(
                    self.logger,
                    format!("Unknown message type: {}", msg_type_id)
                );
                Ok(())
            }
        }
    }

    /// Hands a command or data message to the frontend
    fn call_command_message(
        &mut self,
        msg_timestamp: u32,
        msg_stream_id: u32,
        page_list: PageList,
        msg_len: u32,
        amf_encoding: AmfEncoding,
    ) -> Result<(), ()> {
        let msg_info = MessageInfo {
            msg_stream_id,
            timestamp: msg_timestamp,
            prechunk_size: 0,
        };

        let page_pool = self.page_pool.clone();
        self.frontend
            .command_message(&msg_info, &page_pool, page_list, msg_len, amf_encoding)
    }

    /// Handles a user control message
    fn process_user_control_message(
        &mut self,
        page_list: &PageList,
        msg_len: u32,
    ) -> Result<(), ()> {
        if msg_len < 2 {
            log_error!(
                self.logger,
                format!("UserControl message is too short ({} bytes)", msg_len)
            );
            return Err(());
        }

        let msg_buf = page_list.first_bytes(6);
        let uc_type = BigEndian::read_u16(&msg_buf[0..2]);

        match uc_type {
            STREAM_BEGIN | STREAM_EOF | STREAM_DRY | SET_BUFFER_LENGTH | STREAM_IS_RECORDED => {
                // No-op
                Ok(())
            }
            PING_REQUEST => {
                if msg_len < 6 {
                    log_error!(
                        self.logger,
                        format!("PingRequest message is too short ({} bytes)", msg_len)
                    );
                    return Err(());
                }

                let timestamp = BigEndian::read_u32(&msg_buf[2..6]);
                self.send_user_control_ping_response(timestamp);

                Ok(())
            }
            PING_RESPONSE => {
                self.ping_reply_received = true;

                Ok(())
            }
            _ => {
                log_warning!(
                    self.logger,
                    format!("Unknown user control message type: {}", uc_type)
                );
                Ok(())
            }
        }
    }
}
