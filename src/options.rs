//! DHCP options as defined in RFC 2132.
//!
//! Options follow the fixed header as a sequence of TLV entries: a code
//! (1 byte), a length (1 byte) and `length` bytes of data.
//!
//! Parsing is deliberately literal. Every byte pair is read as a code and a
//! length, so neither Pad (0) nor End (255) is special-cased; the caller
//! strips the trailing End marker before parsing. When a code repeats, the
//! later value replaces the earlier one in an [`OptionSet`].
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Maximum length of a single option value (1-byte length field).
const MAX_OPTION_LEN: usize = 255;

/// DHCP option codes as defined in RFC 2132.
///
/// Only codes this server reads or emits are named; every other code is
/// carried as raw bytes in a [`DhcpOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Router = 3,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Parameter request list (RFC 2132 §9.8).
    ParameterRequestList = 55,
    /// End of options marker.
    End = 255,
}

impl TryFrom<u8> for OptionCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pad),
            1 => Ok(Self::SubnetMask),
            3 => Ok(Self::Router),
            50 => Ok(Self::RequestedIpAddress),
            51 => Ok(Self::LeaseTime),
            53 => Ok(Self::MessageType),
            54 => Ok(Self::ServerIdentifier),
            55 => Ok(Self::ParameterRequestList),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
///
/// These values indicate the purpose of a DHCP message in the protocol exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

/// A single TLV option entry, kept as raw bytes.
///
/// Values are never reinterpreted on the way through, so an entry decoded
/// from the wire encodes back to exactly the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOption {
    /// Option code (first byte of the TLV).
    pub code: u8,
    /// Option value (after code and length bytes).
    pub data: Vec<u8>,
}

impl DhcpOption {
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        Self { code, data }
    }

    /// Message type option (53) with a single type byte.
    pub fn message_type(message_type: MessageType) -> Self {
        Self::new(OptionCode::MessageType as u8, vec![message_type as u8])
    }

    /// Server identifier option (54).
    pub fn server_identifier(addr: Ipv4Addr) -> Self {
        Self::new(OptionCode::ServerIdentifier as u8, addr.octets().to_vec())
    }

    /// Lease time option (51), 4-byte big-endian seconds.
    pub fn lease_time(seconds: u32) -> Self {
        Self::new(OptionCode::LeaseTime as u8, seconds.to_be_bytes().to_vec())
    }

    /// Subnet mask option (1).
    pub fn subnet_mask(mask: Ipv4Addr) -> Self {
        Self::new(OptionCode::SubnetMask as u8, mask.octets().to_vec())
    }

    /// Router option (3) carrying a single gateway address.
    pub fn router(gateway: Ipv4Addr) -> Self {
        Self::new(OptionCode::Router as u8, gateway.octets().to_vec())
    }

    /// Appends the option in wire format (code + length + data) to `buffer`.
    ///
    /// Values longer than 255 bytes are truncated to fit the length byte.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        let len = self.data.len().min(MAX_OPTION_LEN);
        buffer.push(self.code);
        buffer.push(len as u8);
        buffer.extend_from_slice(&self.data[..len]);
    }

    /// Encodes the option to its wire format (code + length + data).
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(2 + self.data.len());
        self.encode_into(&mut result);
        result
    }
}

/// Parses a TLV option tail into its entries, in wire order.
///
/// Duplicate codes are all kept; use [`OptionSet::parse`] for the
/// last-wins view.
///
/// # Errors
///
/// Returns [`Error::TruncatedOption`] if a length byte is missing or a
/// declared length runs past the end of `data`.
pub fn parse_options(data: &[u8]) -> Result<Vec<DhcpOption>> {
    let mut options = Vec::new();
    let mut index = 0;

    while index < data.len() {
        let code = data[index];

        if index + 1 >= data.len() {
            return Err(Error::TruncatedOption {
                code,
                offset: index,
            });
        }

        let length = data[index + 1] as usize;

        if index + 2 + length > data.len() {
            return Err(Error::TruncatedOption {
                code,
                offset: index,
            });
        }

        options.push(DhcpOption::new(
            code,
            data[index + 2..index + 2 + length].to_vec(),
        ));

        index += 2 + length;
    }

    Ok(options)
}

/// Serializes option entries in the given order.
///
/// No sorting or deduplication happens here; callers control the order.
/// The End marker is not appended.
pub fn serialize_options(options: &[DhcpOption]) -> Vec<u8> {
    let capacity = options.iter().map(|opt| 2 + opt.data.len()).sum();
    let mut result = Vec::with_capacity(capacity);
    for option in options {
        option.encode_into(&mut result);
    }
    result
}

fn ipv4_from(data: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = data.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

/// An ordered mapping from option code to value.
///
/// A code keeps the position of its first appearance and the value of its
/// last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<DhcpOption>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TLV option tail, letting later duplicates overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedOption`] under the same conditions as
    /// [`parse_options`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(parse_options(data)?.into_iter().collect())
    }

    /// Stores `data` under `code`, returning the value it replaced.
    pub fn insert(&mut self, code: u8, data: Vec<u8>) -> Option<Vec<u8>> {
        match self.entries.iter_mut().find(|opt| opt.code == code) {
            Some(existing) => Some(std::mem::replace(&mut existing.data, data)),
            None => {
                self.entries.push(DhcpOption::new(code, data));
                None
            }
        }
    }

    pub fn get(&self, code: u8) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|opt| opt.code == code)
            .map(|opt| opt.data.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DhcpOption> {
        self.entries.iter()
    }

    /// Returns the DHCP message type (Option 53) if present and known.
    pub fn message_type(&self) -> Option<MessageType> {
        match self.get(OptionCode::MessageType as u8)? {
            [value] => MessageType::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the subnet mask (Option 1) if present and 4 bytes long.
    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        ipv4_from(self.get(OptionCode::SubnetMask as u8)?)
    }

    /// Returns the server identifier (Option 54) if present and 4 bytes long.
    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        ipv4_from(self.get(OptionCode::ServerIdentifier as u8)?)
    }

    /// Returns the lease time in seconds (Option 51) if present and 4 bytes long.
    pub fn lease_time(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.get(OptionCode::LeaseTime as u8)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Serializes the set in its stored order.
    pub fn serialize(&self) -> Vec<u8> {
        serialize_options(&self.entries)
    }
}

impl FromIterator<DhcpOption> for OptionSet {
    fn from_iter<I: IntoIterator<Item = DhcpOption>>(iter: I) -> Self {
        let mut set = Self::new();
        for option in iter {
            set.insert(option.code, option.data);
        }
        set
    }
}

impl From<OptionSet> for Vec<DhcpOption> {
    fn from(set: OptionSet) -> Self {
        set.entries
    }
}
