// RTMP protocol utilities

mod chunk_stream;
mod constants;
mod handshake;
mod message;
mod timestamp;

pub use chunk_stream::*;
pub use constants::*;
pub use handshake::*;
pub use message::*;
pub use timestamp::*;
