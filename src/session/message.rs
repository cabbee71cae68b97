use std::convert::TryFrom;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::net::Ipv4Addr;

use byteorder::{NetworkEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MARKER: [u8; 16] = [0xff; 16];
pub const HEADER_LEN: usize = 19;
pub const MAX_MESSAGE_LEN: usize = 4096;
pub const BGP_VERSION: u8 = 4;
pub const DEFAULT_HOLD_TIME: u16 = 180;
/// Placeholder ASN carried in 2-byte fields for 4-byte ASNs (RFC 6793)
pub const AS_TRANS: u16 = 23456;

const OPEN_BODY_LEN: usize = 10;
const AFI_IPV4: u16 = 1;
const SAFI_UNICAST: u8 = 1;

// Path attribute flags & type codes
const ATTR_OPTIONAL: u8 = 0x80;
const ATTR_TRANSITIVE: u8 = 0x40;
const ATTR_EXTENDED_LEN: u8 = 0x10;
const ATTR_ORIGIN: u8 = 1;
const ATTR_AS_PATH: u8 = 2;
const ATTR_NEXT_HOP: u8 = 3;
const ATTR_MED: u8 = 4;
const ATTR_LOCAL_PREF: u8 = 5;
const AS_SET: u8 = 1;
const AS_SEQUENCE: u8 = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
    RouteRefresh = 5,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        use MessageType::*;
        match value {
            1 => Ok(Open),
            2 => Ok(Update),
            3 => Ok(Notification),
            4 => Ok(Keepalive),
            5 => Ok(RouteRefresh),
            other => Err(Error::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            MessageType::Open => "OPEN",
            MessageType::Update => "UPDATE",
            MessageType::Notification => "NOTIFICATION",
            MessageType::Keepalive => "KEEPALIVE",
            MessageType::RouteRefresh => "ROUTE-REFRESH",
        };
        write!(f, "{}", word)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Header {
    pub length: u16,
    pub kind: MessageType,
}

/// Validate the fixed 19-byte header at the start of `buf`
///
/// Checks are ordered: buffer size, marker, declared length, type.
pub fn parse_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_LEN {
        return Err(Error::InvalidLength(buf.len()));
    }
    if buf[..MARKER.len()] != MARKER {
        return Err(Error::InvalidMarker);
    }
    let mut rdr = &buf[MARKER.len()..HEADER_LEN];
    let length = rdr.read_u16::<NetworkEndian>()?;
    if !(HEADER_LEN..=MAX_MESSAGE_LEN).contains(&usize::from(length)) {
        return Err(Error::InvalidLength(length.into()));
    }
    let kind = MessageType::try_from(rdr.read_u8()?)?;
    Ok(Header { length, kind })
}

fn put_header(buf: &mut BytesMut, kind: MessageType, body_len: usize) {
    buf.reserve(HEADER_LEN + body_len);
    buf.put_slice(&MARKER);
    buf.put_u16((HEADER_LEN + body_len) as u16);
    buf.put_u8(kind as u8);
}

/// Map short reads while decoding a body to `Truncated`
fn truncated(kind: &'static str) -> impl Fn(io::Error) -> Error {
    move |_| Error::Truncated(kind)
}

/// 2-byte representation of an ASN for the OPEN & AS_PATH fields
pub fn two_byte_asn(asn: u32) -> u16 {
    u16::try_from(asn).unwrap_or(AS_TRANS)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenMessage {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub router_id: Ipv4Addr,
    pub opt_params_len: u8,
}

impl OpenMessage {
    pub fn new(asn: u32, router_id: Ipv4Addr) -> Self {
        Self {
            version: BGP_VERSION,
            asn: two_byte_asn(asn),
            hold_time: DEFAULT_HOLD_TIME,
            router_id,
            opt_params_len: 0,
        }
    }

    pub fn with_hold_time(mut self, hold_time: u16) -> Self {
        self.hold_time = hold_time;
        self
    }

    fn encode(&self, buf: &mut BytesMut) {
        put_header(buf, MessageType::Open, OPEN_BODY_LEN);
        buf.put_u8(self.version);
        buf.put_u16(self.asn);
        buf.put_u16(self.hold_time);
        buf.put_slice(&self.router_id.octets());
        // No optional parameters are ever sent
        buf.put_u8(0);
    }

    fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < OPEN_BODY_LEN {
            return Err(Error::Truncated("OPEN"));
        }
        let mut rdr = body;
        let version = rdr.read_u8()?;
        let asn = rdr.read_u16::<NetworkEndian>()?;
        let hold_time = rdr.read_u16::<NetworkEndian>()?;
        let router_id = Ipv4Addr::from(rdr.read_u32::<NetworkEndian>()?);
        let opt_params_len = rdr.read_u8()?;
        Ok(Self {
            version,
            asn,
            hold_time,
            router_id,
            opt_params_len,
        })
    }
}

/// 29-byte OPEN: version 4, 2-byte AS, hold time 180, router ID, no optional params
pub fn encode_open(asn: u32, router_id: Ipv4Addr) -> Bytes {
    Message::Open(OpenMessage::new(asn, router_id)).to_bytes()
}

pub fn encode_keepalive() -> Bytes {
    Message::Keepalive.to_bytes()
}

/// 23-byte ROUTE-REFRESH for IPv4 unicast
pub fn encode_route_refresh() -> Bytes {
    Message::RouteRefresh(RouteRefreshMessage::ipv4_unicast()).to_bytes()
}

/// Decode an OPEN body (the bytes following the header)
pub fn decode_open(body: &[u8]) -> Result<OpenMessage> {
    OpenMessage::decode(body)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub code: u8,
    pub subcode: u8,
    pub data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(code: u8, subcode: u8) -> Self {
        Self {
            code,
            subcode,
            data: vec![],
        }
    }

    /// OPEN Message Error / Bad Peer AS
    pub fn bad_peer_as() -> Self {
        Self::new(2, 2)
    }

    pub fn hold_timer_expired() -> Self {
        Self::new(4, 0)
    }

    /// Cease / Administrative Shutdown
    pub fn admin_shutdown() -> Self {
        Self::new(6, 2)
    }

    /// Cease / Peer De-configured
    pub fn deconfigured() -> Self {
        Self::new(6, 3)
    }

    fn encode(&self, buf: &mut BytesMut) {
        put_header(buf, MessageType::Notification, 2 + self.data.len());
        buf.put_u8(self.code);
        buf.put_u8(self.subcode);
        buf.put_slice(&self.data);
    }

    fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < 2 {
            return Err(Error::Truncated("NOTIFICATION"));
        }
        Ok(Self {
            code: body[0],
            subcode: body[1],
            data: body[2..].to_vec(),
        })
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self.code {
            1 => "Message Header Error",
            2 => "OPEN Message Error",
            3 => "UPDATE Message Error",
            4 => "Hold Timer Expired",
            5 => "Finite State Machine Error",
            6 => "Cease",
            _ => "Unknown",
        };
        write!(f, "{} [{}/{}]", reason, self.code, self.subcode)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRefreshMessage {
    pub afi: u16,
    pub safi: u8,
}

impl RouteRefreshMessage {
    pub fn ipv4_unicast() -> Self {
        Self {
            afi: AFI_IPV4,
            safi: SAFI_UNICAST,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        put_header(buf, MessageType::RouteRefresh, 4);
        buf.put_u16(self.afi);
        buf.put_u8(0);
        buf.put_u8(self.safi);
    }

    fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < 4 {
            return Err(Error::Truncated("ROUTE-REFRESH"));
        }
        let mut rdr = body;
        let afi = rdr.read_u16::<NetworkEndian>()?;
        let _reserved = rdr.read_u8()?;
        let safi = rdr.read_u8()?;
        Ok(Self { afi, safi })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Igp,
    Egp,
    Incomplete,
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Igp
    }
}

impl From<u8> for Origin {
    fn from(value: u8) -> Self {
        match value {
            0 => Origin::Igp,
            1 => Origin::Egp,
            _ => Origin::Incomplete,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            Origin::Igp => "IGP",
            Origin::Egp => "EGP",
            Origin::Incomplete => "Incomplete",
        };
        write!(f, "{}", word)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathAttributes {
    pub origin: Origin,
    pub as_path: Vec<u16>,
    pub next_hop: Option<Ipv4Addr>,
    pub med: Option<u32>,
    pub local_pref: Option<u32>,
}

impl PathAttributes {
    fn encoded(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(32);
        put_attribute(&mut buf, ATTR_TRANSITIVE, ATTR_ORIGIN, &[self.origin as u8]);

        let mut path = Vec::with_capacity(2 + self.as_path.len() * 2);
        if !self.as_path.is_empty() {
            for chunk in self.as_path.chunks(usize::from(u8::MAX)) {
                path.push(AS_SEQUENCE);
                path.push(chunk.len() as u8);
                for asn in chunk {
                    path.extend_from_slice(&asn.to_be_bytes());
                }
            }
        }
        put_attribute(&mut buf, ATTR_TRANSITIVE, ATTR_AS_PATH, &path);

        if let Some(next_hop) = self.next_hop {
            put_attribute(&mut buf, ATTR_TRANSITIVE, ATTR_NEXT_HOP, &next_hop.octets());
        }
        if let Some(med) = self.med {
            put_attribute(&mut buf, ATTR_OPTIONAL, ATTR_MED, &med.to_be_bytes());
        }
        if let Some(local_pref) = self.local_pref {
            put_attribute(&mut buf, ATTR_TRANSITIVE, ATTR_LOCAL_PREF, &local_pref.to_be_bytes());
        }
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let err = truncated("UPDATE");
        let mut attributes = PathAttributes::default();
        let mut rdr = Cursor::new(data);
        while (rdr.position() as usize) < data.len() {
            let flags = rdr.read_u8().map_err(&err)?;
            let code = rdr.read_u8().map_err(&err)?;
            let length = if flags & ATTR_EXTENDED_LEN != 0 {
                usize::from(rdr.read_u16::<NetworkEndian>().map_err(&err)?)
            } else {
                usize::from(rdr.read_u8().map_err(&err)?)
            };
            let mut value = vec![0u8; length];
            rdr.read_exact(&mut value).map_err(&err)?;
            let mut value = value.as_slice();
            match code {
                ATTR_ORIGIN => attributes.origin = Origin::from(value.read_u8().map_err(&err)?),
                ATTR_AS_PATH => {
                    while !value.is_empty() {
                        let segment_type = value.read_u8().map_err(&err)?;
                        let count = value.read_u8().map_err(&err)?;
                        if segment_type != AS_SET && segment_type != AS_SEQUENCE {
                            return Err(Error::Truncated("UPDATE"));
                        }
                        for _ in 0..count {
                            attributes
                                .as_path
                                .push(value.read_u16::<NetworkEndian>().map_err(&err)?);
                        }
                    }
                }
                ATTR_NEXT_HOP => {
                    attributes.next_hop = Some(Ipv4Addr::from(
                        value.read_u32::<NetworkEndian>().map_err(&err)?,
                    ))
                }
                ATTR_MED => {
                    attributes.med = Some(value.read_u32::<NetworkEndian>().map_err(&err)?)
                }
                ATTR_LOCAL_PREF => {
                    attributes.local_pref = Some(value.read_u32::<NetworkEndian>().map_err(&err)?)
                }
                // Everything else is carried opaquely and dropped here
                _ => (),
            }
        }
        Ok(attributes)
    }

    /// Space separated AS path, e.g. "65001 65002"
    pub fn as_path_string(&self) -> String {
        self.as_path
            .iter()
            .map(|asn| asn.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn put_attribute(buf: &mut BytesMut, flags: u8, code: u8, value: &[u8]) {
    if value.len() > usize::from(u8::MAX) {
        buf.put_u8(flags | ATTR_EXTENDED_LEN);
        buf.put_u8(code);
        buf.put_u16(value.len() as u16);
    } else {
        buf.put_u8(flags);
        buf.put_u8(code);
        buf.put_u8(value.len() as u8);
    }
    buf.put_slice(value);
}

/// Number of bytes a prefix occupies in the withdrawn/NLRI fields
pub fn prefix_len(prefix: &Ipv4Network) -> usize {
    1 + (usize::from(prefix.prefix()) + 7) / 8
}

fn put_prefix(buf: &mut BytesMut, prefix: &Ipv4Network) {
    buf.put_u8(prefix.prefix());
    let octets = prefix.network().octets();
    buf.put_slice(&octets[..prefix_len(prefix) - 1]);
}

fn read_prefixes(data: &[u8]) -> Result<Vec<Ipv4Network>> {
    let mut prefixes = Vec::new();
    let mut rdr = data;
    while !rdr.is_empty() {
        let length = rdr.read_u8()?;
        if length > 32 {
            return Err(Error::InvalidPrefix(format!("/{}", length)));
        }
        let mut octets = [0u8; 4];
        let size = (usize::from(length) + 7) / 8;
        rdr.read_exact(&mut octets[..size])
            .map_err(truncated("UPDATE"))?;
        prefixes.push(Ipv4Network::new(Ipv4Addr::from(octets), length)?);
    }
    Ok(prefixes)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMessage {
    pub withdrawn: Vec<Ipv4Network>,
    pub attributes: PathAttributes,
    pub nlri: Vec<Ipv4Network>,
}

impl UpdateMessage {
    pub fn is_empty(&self) -> bool {
        self.withdrawn.is_empty() && self.nlri.is_empty()
    }

    /// Full encoded size including the header
    pub fn encoded_len(&self) -> usize {
        let attributes = if self.nlri.is_empty() {
            0
        } else {
            self.attributes.encoded().len()
        };
        HEADER_LEN
            + 4
            + self.withdrawn.iter().map(prefix_len).sum::<usize>()
            + attributes
            + self.nlri.iter().map(prefix_len).sum::<usize>()
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::with_capacity(self.encoded_len());
        let mut withdrawn = BytesMut::new();
        self.withdrawn.iter().for_each(|p| put_prefix(&mut withdrawn, p));
        body.put_u16(withdrawn.len() as u16);
        body.put_slice(&withdrawn);

        // Path attributes only accompany reachable prefixes
        if self.nlri.is_empty() {
            body.put_u16(0);
        } else {
            let attributes = self.attributes.encoded();
            body.put_u16(attributes.len() as u16);
            body.put_slice(&attributes);
        }
        self.nlri.iter().for_each(|p| put_prefix(&mut body, p));

        put_header(buf, MessageType::Update, body.len());
        buf.put_slice(&body);
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let err = truncated("UPDATE");
        let mut rdr = Cursor::new(body);
        let withdrawn_len = usize::from(rdr.read_u16::<NetworkEndian>().map_err(&err)?);
        let mut withdrawn = vec![0u8; withdrawn_len];
        rdr.read_exact(&mut withdrawn).map_err(&err)?;
        let attributes_len = usize::from(rdr.read_u16::<NetworkEndian>().map_err(&err)?);
        let mut attributes = vec![0u8; attributes_len];
        rdr.read_exact(&mut attributes).map_err(&err)?;
        let nlri = &body[rdr.position() as usize..];

        Ok(Self {
            withdrawn: read_prefixes(&withdrawn)?,
            attributes: PathAttributes::decode(&attributes)?,
            nlri: read_prefixes(nlri)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Open(OpenMessage),
    Update(UpdateMessage),
    Notification(NotificationMessage),
    Keepalive,
    RouteRefresh(RouteRefreshMessage),
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::Open(_) => MessageType::Open,
            Message::Update(_) => MessageType::Update,
            Message::Notification(_) => MessageType::Notification,
            Message::Keepalive => MessageType::Keepalive,
            Message::RouteRefresh(_) => MessageType::RouteRefresh,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Message::Open(open) => open.encode(buf),
            Message::Update(update) => update.encode(buf),
            Message::Notification(notification) => notification.encode(buf),
            Message::Keepalive => put_header(buf, MessageType::Keepalive, 0),
            Message::RouteRefresh(refresh) => refresh.encode(buf),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a message body given its already validated header
    pub fn decode(header: &Header, body: &[u8]) -> Result<Self> {
        let message = match header.kind {
            MessageType::Open => Message::Open(OpenMessage::decode(body)?),
            MessageType::Update => Message::Update(UpdateMessage::decode(body)?),
            MessageType::Notification => {
                Message::Notification(NotificationMessage::decode(body)?)
            }
            MessageType::Keepalive => Message::Keepalive,
            MessageType::RouteRefresh => Message::RouteRefresh(RouteRefreshMessage::decode(body)?),
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Open(open) => write!(
                f,
                "OPEN [asn={}, hold_time={}, router_id={}]",
                open.asn, open.hold_time, open.router_id
            ),
            Message::Update(update) => write!(
                f,
                "UPDATE [{} withdrawn, {} nlri]",
                update.withdrawn.len(),
                update.nlri.len()
            ),
            Message::Notification(notification) => write!(f, "NOTIFICATION {}", notification),
            Message::Keepalive => write!(f, "KEEPALIVE"),
            Message::RouteRefresh(refresh) => {
                write!(f, "ROUTE-REFRESH [afi={}, safi={}]", refresh.afi, refresh.safi)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(length: u16, kind: u8) -> Vec<u8> {
        let mut buf = MARKER.to_vec();
        buf.extend_from_slice(&length.to_be_bytes());
        buf.push(kind);
        buf
    }

    #[test]
    fn test_encode_keepalive() {
        let bytes = encode_keepalive();
        assert_eq!(bytes.len(), 19);
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.kind, MessageType::Keepalive);
        assert_eq!(header.length, 19);
    }

    #[test]
    fn test_encode_open() {
        let bytes = encode_open(65001, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(bytes.len(), 29);
        assert_eq!(
            &bytes[16..],
            &[0, 29, 1, 4, 0xfd, 0xe9, 0, 180, 1, 1, 1, 1, 0][..]
        );
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.kind, MessageType::Open);
        assert_eq!(header.length, 29);

        let open = decode_open(&bytes[HEADER_LEN..]).unwrap();
        assert_eq!(open.version, 4);
        assert_eq!(open.asn, 65001);
        assert_eq!(open.hold_time, 180);
        assert_eq!(open.router_id, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(open.opt_params_len, 0);
    }

    #[test]
    fn test_open_four_byte_asn() {
        let open = OpenMessage::new(4_200_000_000, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(open.asn, AS_TRANS);
    }

    #[test]
    fn test_decode_open_truncated() {
        let bytes = encode_open(65001, Ipv4Addr::new(1, 1, 1, 1));
        match decode_open(&bytes[HEADER_LEN..HEADER_LEN + 9]) {
            Err(Error::Truncated(_)) => (),
            other => panic!("Expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_route_refresh() {
        let bytes = encode_route_refresh();
        assert_eq!(bytes.len(), 23);
        assert_eq!(&bytes[16..], &[0, 23, 5, 0, 1, 0, 1][..]);
        assert_eq!(parse_header(&bytes).unwrap().kind, MessageType::RouteRefresh);
    }

    #[test]
    fn test_parse_header_bad_marker() {
        let mut bytes = encode_keepalive().to_vec();
        bytes[7] = 0xfe;
        match parse_header(&bytes) {
            Err(Error::InvalidMarker) => (),
            other => panic!("Expected InvalidMarker, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_header_short_buffer() {
        let bytes = encode_keepalive();
        match parse_header(&bytes[..18]) {
            Err(Error::InvalidLength(18)) => (),
            other => panic!("Expected InvalidLength, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_header_length_bounds() {
        for length in &[18u16, 4097] {
            match parse_header(&header(*length, 4)) {
                Err(Error::InvalidLength(l)) => assert_eq!(l, usize::from(*length)),
                other => panic!("Expected InvalidLength, got {:?}", other),
            }
        }
        for length in &[19u16, 4096] {
            let parsed = parse_header(&header(*length, 2)).unwrap();
            assert_eq!(parsed.length, *length);
            assert_eq!(parsed.kind, MessageType::Update);
        }
    }

    #[test]
    fn test_parse_header_unknown_type() {
        for kind in &[0u8, 6, 255] {
            match parse_header(&header(19, *kind)) {
                Err(Error::UnknownType(k)) => assert_eq!(k, *kind),
                other => panic!("Expected UnknownType, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_update_encode_decode() {
        let update = UpdateMessage {
            withdrawn: vec!["10.9.0.0/16".parse().unwrap()],
            attributes: PathAttributes {
                origin: Origin::Igp,
                as_path: vec![65001, 65010],
                next_hop: Some(Ipv4Addr::new(1, 1, 1, 1)),
                med: Some(50),
                local_pref: None,
            },
            nlri: vec![
                "10.0.0.0/24".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                "0.0.0.0/0".parse().unwrap(),
            ],
        };
        let bytes = Message::Update(update.clone()).to_bytes();
        assert_eq!(bytes.len(), update.encoded_len());
        let header = parse_header(&bytes).unwrap();
        assert_eq!(usize::from(header.length), bytes.len());
        let decoded = Message::decode(&header, &bytes[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, Message::Update(update));
    }

    #[test]
    fn test_update_withdraw_only_has_no_attributes() {
        let update = UpdateMessage {
            withdrawn: vec!["10.0.0.0/8".parse().unwrap()],
            ..Default::default()
        };
        let bytes = Message::Update(update).to_bytes();
        // header + withdrawn len (2) + /8 prefix (2) + attr len (2)
        assert_eq!(bytes.len(), 19 + 2 + 2 + 2);
        assert_eq!(&bytes[19..], &[0, 2, 8, 10, 0, 0][..]);
    }

    #[test]
    fn test_update_truncated() {
        let body = [0u8, 5, 24];
        match UpdateMessage::decode(&body) {
            Err(Error::Truncated("UPDATE")) => (),
            other => panic!("Expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_notification() {
        let bytes = Message::Notification(NotificationMessage::hold_timer_expired()).to_bytes();
        assert_eq!(bytes.len(), 21);
        let header = parse_header(&bytes).unwrap();
        match Message::decode(&header, &bytes[HEADER_LEN..]).unwrap() {
            Message::Notification(n) => {
                assert_eq!((n.code, n.subcode), (4, 0));
                assert_eq!(n.to_string(), "Hold Timer Expired [4/0]");
            }
            other => panic!("Expected Notification, got {}", other),
        }
    }
}
