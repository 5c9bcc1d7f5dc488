// Message descriptors and codec hints

/// Descriptor of an outbound message
pub struct MessageDesc {
    /// Message timestamp, in milliseconds
    pub timestamp: u32,

    /// Message type
    pub msg_type_id: u8,

    /// Message stream ID
    pub msg_stream_id: u32,

    /// Payload length, in bytes
    pub msg_len: u32,

    /// Allow compressed (Type 1/2/3) headers. When false a Type 0
    /// header is always emitted
    pub cs_hdr_comp: bool,
}

/// Info for an inbound command or data message
pub struct MessageInfo {
    /// Message stream ID
    pub msg_stream_id: u32,

    /// Message timestamp, in milliseconds
    pub timestamp: u32,

    /// Chunk size the payload pages were pre-serialized with (0 when the
    /// pages carry the raw payload)
    pub prechunk_size: u32,
}

/// Audio codec, from the FLV codec ID of the payload
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AudioCodecId {
    Unknown,
    LinearPcm,
    Adpcm,
    Mp3,
    LinearPcmLe,
    Nellymoser16,
    Nellymoser8,
    Nellymoser,
    G711ALaw,
    G711MuLaw,
    Aac,
    Speex,
    Mp3_8Khz,
    DeviceSpecific,
}

impl AudioCodecId {
    /// Gets the audio codec from the FLV codec ID (high nibble of the
    /// first payload byte)
    pub fn from_flv_codec_id(codec_id: u8) -> AudioCodecId {
        match codec_id {
            0 => AudioCodecId::LinearPcm,
            1 => AudioCodecId::Adpcm,
            2 => AudioCodecId::Mp3,
            3 => AudioCodecId::LinearPcmLe,
            4 => AudioCodecId::Nellymoser16,
            5 => AudioCodecId::Nellymoser8,
            6 => AudioCodecId::Nellymoser,
            7 => AudioCodecId::G711ALaw,
            8 => AudioCodecId::G711MuLaw,
            10 => AudioCodecId::Aac,
            11 => AudioCodecId::Speex,
            14 => AudioCodecId::Mp3_8Khz,
            15 => AudioCodecId::DeviceSpecific,
            _ => AudioCodecId::Unknown,
        }
    }
}

/// Kind of audio frame
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AudioFrameType {
    Unknown,
    RawData,
    AacSequenceHeader,
}

/// Video codec, from the FLV codec ID of the payload
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VideoCodecId {
    Unknown,
    SorensonH263,
    ScreenVideo,
    Vp6,
    Vp6Alpha,
    ScreenVideoV2,
    Avc,
}

impl VideoCodecId {
    /// Gets the video codec from the FLV codec ID (low nibble of the
    /// first payload byte)
    pub fn from_flv_codec_id(codec_id: u8) -> VideoCodecId {
        match codec_id {
            2 => VideoCodecId::SorensonH263,
            3 => VideoCodecId::ScreenVideo,
            4 => VideoCodecId::Vp6,
            5 => VideoCodecId::Vp6Alpha,
            6 => VideoCodecId::ScreenVideoV2,
            7 => VideoCodecId::Avc,
            _ => VideoCodecId::Unknown,
        }
    }
}

/// Kind of video frame
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VideoFrameType {
    Unknown,
    KeyFrame,
    InterFrame,
    DisposableInterFrame,
    GeneratedKeyFrame,
    CommandFrame,
    AvcSequenceHeader,
    AvcEndOfSequence,
}

impl VideoFrameType {
    /// Gets the frame type from the FLV frame type (high nibble of the
    /// first payload byte)
    pub fn from_flv_frame_type(frame_type: u8) -> VideoFrameType {
        match frame_type {
            1 => VideoFrameType::KeyFrame,
            2 => VideoFrameType::InterFrame,
            3 => VideoFrameType::DisposableInterFrame,
            4 => VideoFrameType::GeneratedKeyFrame,
            5 => VideoFrameType::CommandFrame,
            _ => VideoFrameType::Unknown,
        }
    }
}

/// Info derived from an inbound audio message
pub struct AudioMessageInfo {
    /// Message timestamp, in milliseconds
    pub timestamp: u32,

    /// Audio codec hint
    pub codec_id: AudioCodecId,

    /// Frame type hint
    pub frame_type: AudioFrameType,

    /// Chunk size the payload pages were pre-serialized with (0 when the
    /// pages carry the raw payload)
    pub prechunk_size: u32,
}

/// Info derived from an inbound video message
pub struct VideoMessageInfo {
    /// Message timestamp, in milliseconds
    pub timestamp: u32,

    /// Video codec hint
    pub codec_id: VideoCodecId,

    /// Frame type hint
    pub frame_type: VideoFrameType,

    /// Chunk size the payload pages were pre-serialized with (0 when the
    /// pages carry the raw payload)
    pub prechunk_size: u32,
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flv_codec_ids() {
        assert_eq!(AudioCodecId::from_flv_codec_id(10), AudioCodecId::Aac);
        assert_eq!(AudioCodecId::from_flv_codec_id(2), AudioCodecId::Mp3);
        assert_eq!(AudioCodecId::from_flv_codec_id(9), AudioCodecId::Unknown);

        assert_eq!(VideoCodecId::from_flv_codec_id(7), VideoCodecId::Avc);
        assert_eq!(VideoCodecId::from_flv_codec_id(2), VideoCodecId::SorensonH263);
        assert_eq!(VideoCodecId::from_flv_codec_id(15), VideoCodecId::Unknown);

        assert_eq!(VideoFrameType::from_flv_frame_type(1), VideoFrameType::KeyFrame);
        assert_eq!(VideoFrameType::from_flv_frame_type(2), VideoFrameType::InterFrame);
        assert_eq!(VideoFrameType::from_flv_frame_type(9), VideoFrameType::Unknown);
    }
}
