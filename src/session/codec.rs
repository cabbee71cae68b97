use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Buf, BytesMut};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};
use twoway::find_bytes;

use super::message::{parse_header, Message, HEADER_LEN, MARKER};
use crate::error::Error;

/// Frames BGP messages out of a byte stream
///
/// A decode error consumes the offending bytes before it is returned, so the
/// caller may keep calling `decode` on the same buffer:
///   - bad marker or declared length: skip ahead to the next marker
///   - unknown type or malformed body: skip the whole frame
#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Error> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        match parse_header(&buf[..HEADER_LEN]) {
            Ok(header) => {
                let length = usize::from(header.length);
                if buf.len() < length {
                    buf.reserve(length - buf.len());
                    return Ok(None);
                }
                let frame = buf.split_to(length);
                Message::decode(&header, &frame[HEADER_LEN..]).map(Some)
            }
            Err(err @ Error::UnknownType(_)) => {
                // Length was validated before the type, so the frame can be skipped whole
                let length = usize::from(NetworkEndian::read_u16(&buf[16..18]));
                if buf.len() < length {
                    return Ok(None);
                }
                buf.advance(length);
                Err(err)
            }
            Err(err) => {
                let skip = resync_offset(buf);
                trace!("Dropping {} bytes to resync on next marker", skip);
                buf.advance(skip);
                Err(err)
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, message: Message, buf: &mut BytesMut) -> Result<(), Error> {
        message.encode(buf);
        Ok(())
    }
}

/// Offset of the next possible message start after a corrupt one at 0
///
/// Keeps a trailing partial marker around when no full marker is found.
fn resync_offset(data: &[u8]) -> usize {
    match find_bytes(&data[1..], &MARKER) {
        Some(start) => start + 1,
        None => std::cmp::max(1, data.len().saturating_sub(MARKER.len() - 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::encode_keepalive;

    #[test]
    fn test_resync_offset() {
        let mut data = vec![0u8; 5];
        data.extend_from_slice(&encode_keepalive());
        assert_eq!(resync_offset(&data), 5);

        let data = [0u8; 40];
        assert_eq!(resync_offset(&data), 25);
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = MessageCodec::new();
        let keepalive = encode_keepalive();
        let mut buf = BytesMut::from(&keepalive[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&keepalive[10..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Keepalive));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_resyncs_after_garbage() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&[1u8, 2, 3][..]);
        buf.extend_from_slice(&encode_keepalive());
        buf.extend_from_slice(&encode_keepalive());

        match codec.decode(&mut buf) {
            Err(Error::InvalidMarker) => (),
            other => panic!("Expected InvalidMarker, got {:?}", other),
        }
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Keepalive));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Keepalive));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_skips_unknown_type() {
        let mut codec = MessageCodec::new();
        let mut frame = MARKER.to_vec();
        frame.extend_from_slice(&[0, 21, 9, 0xaa, 0xbb]);
        let mut buf = BytesMut::from(&frame[..]);
        buf.extend_from_slice(&encode_keepalive());

        match codec.decode(&mut buf) {
            Err(Error::UnknownType(9)) => (),
            other => panic!("Expected UnknownType, got {:?}", other),
        }
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Keepalive));
    }

    #[test]
    fn test_encode() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::Keepalive, &mut buf).unwrap();
        assert_eq!(&buf[..], &encode_keepalive()[..]);
    }
}
