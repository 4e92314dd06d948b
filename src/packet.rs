//! DHCP message decoding and encoding per RFC 2131.
//!
//! A DHCP message consists of a fixed 236-byte header followed by a 4-byte
//! magic cookie, a TLV option tail and a single End byte. This module maps
//! that layout to [`DhcpMessage`] and back without losing a byte: padding
//! areas and the option tail are kept verbatim. Options are parsed on
//! demand, so a message whose tail is not a clean TLV sequence (Pad bytes
//! before End, zero padding after it) still decodes.
//!
//! # Message Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          chaddr (16)                          |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (variable)                   |
//! +---------------------------------------------------------------+
//! |                          end (1) = 255                        |
//! +---------------------------------------------------------------+
//! ```
//!
//! # References
//!
//! - RFC 2131: Dynamic Host Configuration Protocol

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::options::{
    DhcpOption, MessageType, OptionCode, OptionSet, parse_options, serialize_options,
};

/// DHCP magic cookie that identifies DHCP messages (vs BOOTP).
pub const DHCP_MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

const DHCP_OP_HTYPE_HLEN_HOPS_SIZE: usize = 4;
const DHCP_XID_SIZE: usize = 4;
const DHCP_SECS_SIZE: usize = 2;
const DHCP_FLAGS_SIZE: usize = 2;
const DHCP_CIADDR_SIZE: usize = 4;
const DHCP_YIADDR_SIZE: usize = 4;
const DHCP_SIADDR_SIZE: usize = 4;
const DHCP_GIADDR_SIZE: usize = 4;
const DHCP_CHADDR_SIZE: usize = 16;
const DHCP_SNAME_SIZE: usize = 64;
const DHCP_FILE_SIZE: usize = 128;

/// Offset of the relay agent address (giaddr) in the fixed header.
pub const DHCP_GIADDR_OFFSET: usize = DHCP_OP_HTYPE_HLEN_HOPS_SIZE
    + DHCP_XID_SIZE
    + DHCP_SECS_SIZE
    + DHCP_FLAGS_SIZE
    + DHCP_CIADDR_SIZE
    + DHCP_YIADDR_SIZE
    + DHCP_SIADDR_SIZE;

const DHCP_CHADDR_OFFSET: usize = DHCP_GIADDR_OFFSET + DHCP_GIADDR_SIZE;

const DHCP_SNAME_OFFSET: usize = DHCP_CHADDR_OFFSET + DHCP_CHADDR_SIZE;

const DHCP_FILE_OFFSET: usize = DHCP_SNAME_OFFSET + DHCP_SNAME_SIZE;

const DHCP_MAGIC_COOKIE_OFFSET: usize = DHCP_FILE_OFFSET + DHCP_FILE_SIZE;

/// Size of the fixed header portion including magic cookie.
pub const DHCP_FIXED_HEADER_SIZE: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Initial capacity for the encoding buffer.
///
/// 576 bytes is the minimum datagram size all hosts must accept per RFC 791.
const DHCP_ENCODE_CAPACITY: usize = 576;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// Hardware type for Ethernet (most common).
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet (6 bytes).
pub const HLEN_ETHERNET: u8 = 6;

/// A decoded DHCP message.
///
/// This struct represents both client requests and server replies. Use
/// [`decode`](Self::decode) for incoming datagrams and the functions in
/// [`reply`](crate::reply) to derive responses.
///
/// Multi-byte fields are converted with network byte order only, so every
/// field encodes back to the exact bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    /// Operation code: [`BOOTREQUEST`] (1) or [`BOOTREPLY`] (2).
    pub op: u8,

    /// Hardware address type. [`HTYPE_ETHERNET`] (1) for Ethernet.
    pub htype: u8,

    /// Hardware address length. [`HLEN_ETHERNET`] (6) for Ethernet.
    pub hlen: u8,

    /// Hop count, incremented by relay agents.
    pub hops: u8,

    /// Transaction ID chosen by client, echoed in replies.
    pub xid: u32,

    /// Seconds elapsed since client began address acquisition.
    pub secs: u16,

    /// Flags. Bit 15 (0x8000) = broadcast flag.
    pub flags: u16,

    /// Client IP address (set by client in RENEWING/REBINDING states).
    pub ciaddr: Ipv4Addr,

    /// "Your" IP address - the address being assigned to the client.
    pub yiaddr: Ipv4Addr,

    /// Server IP address.
    pub siaddr: Ipv4Addr,

    /// Gateway IP address - set by relay agents.
    pub giaddr: Ipv4Addr,

    /// Client hardware address plus padding, kept verbatim.
    pub chaddr: [u8; 16],

    /// Server host name area, opaque to this server.
    pub sname: [u8; 64],

    /// Boot file name area, opaque to this server.
    pub file: [u8; 128],

    /// Magic cookie as received. Not validated on decode.
    pub magic: [u8; 4],

    /// Raw option tail (everything between the magic cookie and the final
    /// byte), kept verbatim. See [`option_entries`](Self::option_entries).
    pub options: Vec<u8>,
}

impl DhcpMessage {
    /// Decodes a DHCP message from raw bytes.
    ///
    /// The option tail is everything between the fixed header and the last
    /// byte of `data`. The last byte is assumed to be the End marker and is
    /// dropped without being checked. The magic cookie is not checked
    /// either; see [`has_magic_cookie`](Self::has_magic_cookie).
    ///
    /// The tail is not parsed here, so any buffer of at least 240 bytes
    /// decodes and encodes back to itself provided it ends in End.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if `data` is shorter than 240 bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_FIXED_HEADER_SIZE {
            return Err(Error::MalformedMessage { length: data.len() });
        }

        let op = data[0];
        let htype = data[1];
        let hlen = data[2];
        let hops = data[3];

        let xid = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let secs = u16::from_be_bytes([data[8], data[9]]);
        let flags = u16::from_be_bytes([data[10], data[11]]);

        let ciaddr = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let yiaddr = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
        let siaddr = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let giaddr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[DHCP_CHADDR_OFFSET..DHCP_CHADDR_OFFSET + DHCP_CHADDR_SIZE]);

        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[DHCP_SNAME_OFFSET..DHCP_SNAME_OFFSET + DHCP_SNAME_SIZE]);

        let mut file = [0u8; 128];
        file.copy_from_slice(&data[DHCP_FILE_OFFSET..DHCP_FILE_OFFSET + DHCP_FILE_SIZE]);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[DHCP_MAGIC_COOKIE_OFFSET..DHCP_FIXED_HEADER_SIZE]);

        let tail_end = (data.len() - 1).max(DHCP_FIXED_HEADER_SIZE);
        let options = data[DHCP_FIXED_HEADER_SIZE..tail_end].to_vec();

        Ok(Self {
            op,
            htype,
            hlen,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            sname,
            file,
            magic,
            options,
        })
    }

    /// Encodes the message to bytes for transmission.
    ///
    /// The option tail is written as stored followed by exactly one End
    /// byte. No padding is added after the End byte.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(DHCP_ENCODE_CAPACITY);

        packet.push(self.op);
        packet.push(self.htype);
        packet.push(self.hlen);
        packet.push(self.hops);

        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());

        packet.extend_from_slice(&self.ciaddr.octets());
        packet.extend_from_slice(&self.yiaddr.octets());
        packet.extend_from_slice(&self.siaddr.octets());
        packet.extend_from_slice(&self.giaddr.octets());

        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);

        packet.extend_from_slice(&self.magic);

        packet.extend_from_slice(&self.options);

        packet.push(OptionCode::End as u8);

        packet
    }

    /// Returns true if the magic cookie is 99.130.83.99.
    ///
    /// A message without it is plain BOOTP and its option tail should not
    /// be trusted as DHCP options.
    pub fn has_magic_cookie(&self) -> bool {
        self.magic == DHCP_MAGIC_COOKIE
    }

    /// Parses the option tail into entries in wire order, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedOption`] if the tail is not a complete TLV
    /// sequence.
    pub fn option_entries(&self) -> Result<Vec<DhcpOption>> {
        parse_options(&self.options)
    }

    /// Parses the option tail as a last-wins mapping.
    pub fn option_set(&self) -> Result<OptionSet> {
        OptionSet::parse(&self.options)
    }

    /// Replaces the option tail with `entries`, serialized in order.
    pub fn set_options(&mut self, entries: &[DhcpOption]) {
        self.options = serialize_options(entries);
    }

    /// Returns the DHCP message type (Option 53) if present.
    ///
    /// When Option 53 repeats, the last occurrence is used. A tail that
    /// does not parse has no message type.
    pub fn message_type(&self) -> Option<MessageType> {
        self.option_set().ok()?.message_type()
    }

    /// Returns the client hardware address bytes (respecting hlen).
    pub fn chaddr_bytes(&self) -> &[u8] {
        let len = (self.hlen as usize).min(self.chaddr.len());
        &self.chaddr[..len]
    }

    /// Formats the client hardware address as a colon-separated string.
    ///
    /// For Ethernet, returns format like "aa:bb:cc:dd:ee:ff".
    pub fn format_mac(&self) -> String {
        self.chaddr_bytes()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Returns true if the broadcast flag (bit 15) is set.
    pub fn is_broadcast(&self) -> bool {
        (self.flags & 0x8000) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_packet(message_type: MessageType) -> Vec<u8> {
        let mut packet = vec![0u8; DHCP_FIXED_HEADER_SIZE];

        packet[0] = BOOTREQUEST;
        packet[1] = HTYPE_ETHERNET;
        packet[2] = HLEN_ETHERNET;
        packet[3] = 1;
        packet[4..8].copy_from_slice(&0xFEFEFEFEu32.to_be_bytes());
        packet[10..12].copy_from_slice(&0x8000u16.to_be_bytes());
        packet[24..28].copy_from_slice(&[0x0A, 0x01, 0x02, 0x00]);
        packet[28..34].copy_from_slice(&[0xca, 0x02, 0x8d, 0xbf, 0x00, 0x08]);
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        packet.extend_from_slice(&[OptionCode::MessageType as u8, 1, message_type as u8]);
        packet.extend_from_slice(&[OptionCode::ParameterRequestList as u8, 3, 1, 3, 6]);
        packet.push(OptionCode::End as u8);
        packet
    }

    #[test]
    fn test_decode_fields() {
        let data = create_test_packet(MessageType::Discover);
        let message = DhcpMessage::decode(&data).unwrap();

        assert_eq!(message.op, BOOTREQUEST);
        assert_eq!(message.htype, HTYPE_ETHERNET);
        assert_eq!(message.hlen, HLEN_ETHERNET);
        assert_eq!(message.hops, 1);
        assert_eq!(message.xid, 0xFEFEFEFE);
        assert!(message.is_broadcast());
        assert_eq!(message.giaddr, Ipv4Addr::new(10, 1, 2, 0));
        assert_eq!(message.format_mac(), "ca:02:8d:bf:00:08");
        assert!(message.has_magic_cookie());
        assert_eq!(message.message_type(), Some(MessageType::Discover));
        assert_eq!(message.option_entries().unwrap().len(), 2);
    }

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let data = create_test_packet(MessageType::Discover);
        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_roundtrip_preserves_padding_areas() {
        let mut data = create_test_packet(MessageType::Request);
        for (index, byte) in data[34..236].iter_mut().enumerate() {
            *byte = index as u8;
        }

        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(&message.chaddr[6..], &data[34..44]);
        assert_eq!(&message.sname[..], &data[44..108]);
        assert_eq!(&message.file[..], &data[108..236]);
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_roundtrip_keeps_duplicate_options() {
        let mut data = create_test_packet(MessageType::Discover);
        data.pop();
        data.extend_from_slice(&[53, 1, 3, 255]);

        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(message.option_entries().unwrap().len(), 3);
        assert_eq!(message.message_type(), Some(MessageType::Request));
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_short_packet_rejected() {
        let result = DhcpMessage::decode(&[0u8; 10]);
        assert!(matches!(
            result,
            Err(Error::MalformedMessage { length: 10 })
        ));

        let result = DhcpMessage::decode(&[0u8; 239]);
        assert!(matches!(
            result,
            Err(Error::MalformedMessage { length: 239 })
        ));
    }

    #[test]
    fn test_header_only_packet() {
        let mut data = vec![0u8; DHCP_FIXED_HEADER_SIZE];
        data[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        let message = DhcpMessage::decode(&data).unwrap();
        assert!(message.options.is_empty());

        let encoded = message.encode();
        assert_eq!(encoded.len(), DHCP_FIXED_HEADER_SIZE + 1);
        assert_eq!(&encoded[..DHCP_FIXED_HEADER_SIZE], &data[..]);
        assert_eq!(encoded[DHCP_FIXED_HEADER_SIZE], 255);
    }

    #[test]
    fn test_only_end_option() {
        let mut data = vec![0u8; DHCP_FIXED_HEADER_SIZE];
        data[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);
        data.push(255);

        let message = DhcpMessage::decode(&data).unwrap();
        assert!(message.options.is_empty());
        assert_eq!(message.message_type(), None);
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_bad_magic_cookie_is_advisory() {
        let mut data = create_test_packet(MessageType::Discover);
        data[236..240].copy_from_slice(&[1, 2, 3, 4]);

        let message = DhcpMessage::decode(&data).unwrap();
        assert!(!message.has_magic_cookie());
        assert_eq!(message.magic, [1, 2, 3, 4]);
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_trailing_byte_not_validated() {
        let mut data = create_test_packet(MessageType::Discover);
        let last = data.len() - 1;
        data[last] = 0x00;

        let message = DhcpMessage::decode(&data).unwrap();
        let encoded = message.encode();
        assert_eq!(&encoded[..last], &data[..last]);
        assert_eq!(encoded[last], 255);
    }

    #[test]
    fn test_truncated_option_decodes_but_does_not_parse() {
        let mut data = create_test_packet(MessageType::Discover);
        data.pop();
        data.extend_from_slice(&[51, 4, 0, 1, 255]);

        let message = DhcpMessage::decode(&data).unwrap();
        assert!(matches!(
            message.option_set(),
            Err(Error::TruncatedOption { code: 51, .. })
        ));
        assert_eq!(message.message_type(), None);
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_pad_before_end_roundtrips() {
        let mut data = create_test_packet(MessageType::Discover);
        data.truncate(DHCP_FIXED_HEADER_SIZE);
        data.extend_from_slice(&[53, 1, 1, 0, 255]);

        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(message.options, vec![53, 1, 1, 0]);
        assert!(matches!(
            message.option_entries(),
            Err(Error::TruncatedOption { code: 0, offset: 3 })
        ));
        assert_eq!(message.encode(), data);
    }

    #[test]
    fn test_zero_padding_after_end_roundtrips() {
        for padding in 1..=4 {
            let mut data = create_test_packet(MessageType::Discover);
            data.extend(std::iter::repeat_n(0u8, padding));
            data.push(255);

            let message = DhcpMessage::decode(&data).unwrap();
            assert_eq!(message.encode(), data, "padding {}", padding);
        }
    }

    #[test]
    fn test_set_options_serializes_in_order() {
        let data = create_test_packet(MessageType::Discover);
        let mut message = DhcpMessage::decode(&data).unwrap();

        message.set_options(&[
            DhcpOption::message_type(MessageType::Offer),
            DhcpOption::lease_time(60),
        ]);

        assert_eq!(message.options, vec![53, 1, 2, 51, 4, 0, 0, 0, 60]);
        assert_eq!(message.message_type(), Some(MessageType::Offer));
    }

    #[test]
    fn test_hops_and_hlen_not_validated() {
        let mut data = create_test_packet(MessageType::Discover);
        data[2] = 4;
        data[3] = 200;

        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(message.hops, 200);
        assert_eq!(message.chaddr_bytes(), &[0xca, 0x02, 0x8d, 0xbf]);
    }

    #[test]
    fn test_chaddr_bytes_clamps_hlen() {
        let mut data = create_test_packet(MessageType::Discover);
        data[2] = 40;

        let message = DhcpMessage::decode(&data).unwrap();
        assert_eq!(message.chaddr_bytes().len(), 16);
    }

    #[test]
    fn test_packet_field_offsets_correct() {
        assert_eq!(DHCP_GIADDR_OFFSET, 24);
        assert_eq!(DHCP_CHADDR_OFFSET, 28);
        assert_eq!(DHCP_SNAME_OFFSET, 44);
        assert_eq!(DHCP_FILE_OFFSET, 108);
        assert_eq!(DHCP_MAGIC_COOKIE_OFFSET, 236);
        assert_eq!(DHCP_FIXED_HEADER_SIZE, 240);
    }

    #[test]
    fn test_encode_produces_correct_offsets() {
        let message = DhcpMessage {
            op: BOOTREPLY,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid: 0x12345678,
            secs: 0x0102,
            flags: 0x8000,
            ciaddr: Ipv4Addr::new(1, 2, 3, 4),
            yiaddr: Ipv4Addr::new(5, 6, 7, 8),
            siaddr: Ipv4Addr::new(9, 10, 11, 12),
            giaddr: Ipv4Addr::new(13, 14, 15, 16),
            chaddr: [0xaa; 16],
            sname: [0x11; 64],
            file: [0x22; 128],
            magic: DHCP_MAGIC_COOKIE,
            options: DhcpOption::message_type(MessageType::Offer).encode(),
        };

        let encoded = message.encode();
        assert_eq!(encoded.len(), 244);
        assert_eq!(encoded[0], BOOTREPLY);
        assert_eq!(&encoded[4..8], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&encoded[8..10], &[0x01, 0x02]);
        assert_eq!(&encoded[10..12], &[0x80, 0x00]);
        assert_eq!(&encoded[12..16], &[1, 2, 3, 4]);
        assert_eq!(&encoded[16..20], &[5, 6, 7, 8]);
        assert_eq!(&encoded[20..24], &[9, 10, 11, 12]);
        assert_eq!(&encoded[24..28], &[13, 14, 15, 16]);
        assert_eq!(&encoded[28..44], &[0xaa; 16]);
        assert_eq!(&encoded[44..108], &[0x11; 64]);
        assert_eq!(&encoded[108..236], &[0x22; 128]);
        assert_eq!(&encoded[236..240], &DHCP_MAGIC_COOKIE);
        assert_eq!(&encoded[240..], &[53, 1, 2, 255]);
    }
}
