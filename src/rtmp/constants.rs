// RTMP constants

// Chunk header types
pub const RTMP_CHUNK_TYPE_0: u8 = 0; // 11 bytes: timestamp(3) + length(3) + type(1) + stream id(4)
pub const RTMP_CHUNK_TYPE_1: u8 = 1; // 7 bytes: delta(3) + length(3) + type(1)
pub const RTMP_CHUNK_TYPE_2: u8 = 2; // 3 bytes: delta(3)
pub const RTMP_CHUNK_TYPE_3: u8 = 3; // 0 bytes

// Well-known chunk streams
pub const RTMP_CONTROL_CHUNK_STREAM_ID: u32 = 2;
pub const RTMP_COMMAND_CHUNK_STREAM_ID: u32 = 3;
pub const DEFAULT_AUDIO_CHUNK_STREAM_ID: u32 = 4;
pub const DEFAULT_VIDEO_CHUNK_STREAM_ID: u32 = 5;

// Message stream ids
pub const COMMAND_MESSAGE_STREAM_ID: u32 = 0;
pub const DEFAULT_MESSAGE_STREAM_ID: u32 = 1;

// Chunk sizes
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const MIN_CHUNK_SIZE: u32 = 1;

/// Chunk size used for server-side pre-serialization of media payloads
pub const PRECHUNK_SIZE: u32 = 65536;

/// Largest serialized chunk header: basic(1) + type 0(11) + extended
/// timestamp(4) + fix-header continuation basic(1) + type 1(7)
pub const MAX_HEADER_LEN: usize = 24;

/// Largest message length the 3-byte wire field can carry
pub const MAX_MESSAGE_LEN: u32 = 0x00ff_ffff;

// Window acknowledgement
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 1 << 20;

// Keepalive
pub const RTMP_PING_PERIOD_SECONDS: u32 = 300;

// Handshake
pub const RTMP_VERSION: u8 = 3;
pub const RTMP_SIG_SIZE: usize = 1536;

/// Flash Media Server handshake key. The first 36 bytes are the ASCII
/// string "Genuine Adobe Flash Media Server 001"
pub const GLOB_FMS_KEY: [u8; 68] = [
    0x47, 0x65, 0x6e, 0x75, 0x69, 0x6e, 0x65, 0x20, 0x41, 0x64, 0x6f, 0x62, 0x65, 0x20, 0x46,
    0x6c, 0x61, 0x73, 0x68, 0x20, 0x4d, 0x65, 0x64, 0x69, 0x61, 0x20, 0x53, 0x65, 0x72, 0x76,
    0x65, 0x72, 0x20, 0x30, 0x30, 0x31, 0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e,
    0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e, 0x57, 0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab,
    0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb, 0x31, 0xae,
];

// Message types

/* Protocol Control Messages */
pub const RTMP_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const RTMP_TYPE_ABORT: u8 = 2;
pub const RTMP_TYPE_ACKNOWLEDGEMENT: u8 = 3; // bytes read report
pub const RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE: u8 = 5; // server bandwidth
pub const RTMP_TYPE_SET_PEER_BANDWIDTH: u8 = 6; // client bandwidth

/* User Control Messages Event (4) */
pub const RTMP_TYPE_EVENT: u8 = 4;

pub const RTMP_TYPE_AUDIO: u8 = 8;
pub const RTMP_TYPE_VIDEO: u8 = 9;

/* Data Message */
pub const RTMP_TYPE_FLEX_STREAM: u8 = 15; // AMF3
pub const RTMP_TYPE_DATA: u8 = 18; // AMF0

/* Shared Object Message */
pub const RTMP_TYPE_FLEX_OBJECT: u8 = 16; // AMF3
pub const RTMP_TYPE_SHARED_OBJECT: u8 = 19; // AMF0

/* Command Message */
pub const RTMP_TYPE_FLEX_MESSAGE: u8 = 17; // AMF3
pub const RTMP_TYPE_INVOKE: u8 = 20; // AMF0

/* Aggregate Message */
pub const RTMP_TYPE_AGGREGATE: u8 = 22;

// User control event types

pub const STREAM_BEGIN: u16 = 0x00;
pub const STREAM_EOF: u16 = 0x01;
pub const STREAM_DRY: u16 = 0x02;
pub const SET_BUFFER_LENGTH: u16 = 0x03;
pub const STREAM_IS_RECORDED: u16 = 0x04;
pub const PING_REQUEST: u16 = 0x06;
pub const PING_RESPONSE: u16 = 0x07;
