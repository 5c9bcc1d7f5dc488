// AMF parsers and serializers

mod amf0;
mod decode;

pub use amf0::*;
pub use decode::*;

/// Encoding of a command or data message
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AmfEncoding {
    AMF0,
    AMF3,
}
