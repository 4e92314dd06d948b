//! Construction of OFFER and ACK replies.
//!
//! Replies are built field by field from the client's message. Only `op`,
//! `yiaddr`, `siaddr` and the option list differ from the request; the
//! transaction id, hardware address, relay address and both padding areas
//! are echoed unchanged so the relay agent and the client can match the
//! reply to their request.
//!
//! Every function here is pure.

use std::net::Ipv4Addr;

use crate::options::{DhcpOption, MessageType, OptionCode, serialize_options};
use crate::packet::{BOOTREPLY, DhcpMessage};

/// Server-chosen parameters advertised in every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Address leased to the client (yiaddr).
    pub your_ip: Ipv4Addr,
    /// This server's address (siaddr and Option 54).
    pub server_ip: Ipv4Addr,
    /// Subnet mask for the leased address (Option 1).
    pub subnet_mask: Ipv4Addr,
    /// Lease duration (Option 51).
    pub lease_seconds: u32,
}

/// The fixed option list sent in every reply, in wire order.
///
/// The router option carries the relay address from the request.
fn reply_options(
    message_type: MessageType,
    server_ip: Ipv4Addr,
    lease_seconds: u32,
    subnet_mask: Ipv4Addr,
    router: Ipv4Addr,
) -> Vec<DhcpOption> {
    vec![
        DhcpOption::message_type(message_type),
        DhcpOption::server_identifier(server_ip),
        DhcpOption::lease_time(lease_seconds),
        DhcpOption::subnet_mask(subnet_mask),
        DhcpOption::router(router),
    ]
}

fn build_reply(
    reference: &DhcpMessage,
    your_ip: Ipv4Addr,
    server_ip: Ipv4Addr,
    options: &[DhcpOption],
) -> DhcpMessage {
    DhcpMessage {
        op: BOOTREPLY,
        htype: reference.htype,
        hlen: reference.hlen,
        hops: reference.hops,
        xid: reference.xid,
        secs: reference.secs,
        flags: reference.flags,
        ciaddr: reference.ciaddr,
        yiaddr: your_ip,
        siaddr: server_ip,
        giaddr: reference.giaddr,
        chaddr: reference.chaddr,
        sname: reference.sname,
        file: reference.file,
        magic: reference.magic,
        options: serialize_options(options),
    }
}

/// Builds the OFFER for a DISCOVER.
///
/// The option list is always message type, server identifier, lease time,
/// subnet mask and router, whatever the DISCOVER asked for.
pub fn build_offer(discover: &DhcpMessage, assignment: &Assignment) -> DhcpMessage {
    let options = reply_options(
        MessageType::Offer,
        assignment.server_ip,
        assignment.lease_seconds,
        assignment.subnet_mask,
        discover.giaddr,
    );

    build_reply(discover, assignment.your_ip, assignment.server_ip, &options)
}

/// Builds the ACK that follows an OFFER.
///
/// The result equals `offer` except that every Option 53 value becomes
/// ACK. If `offer` has no Option 53, or its option tail does not parse,
/// an ACK message type is prepended to the tail as is.
pub fn build_ack(offer: &DhcpMessage) -> DhcpMessage {
    let code = OptionCode::MessageType as u8;
    let mut ack = offer.clone();

    match offer.option_entries() {
        Ok(entries) if entries.iter().any(|opt| opt.code == code) => {
            let entries: Vec<DhcpOption> = entries
                .into_iter()
                .map(|opt| {
                    if opt.code == code {
                        DhcpOption::message_type(MessageType::Ack)
                    } else {
                        opt
                    }
                })
                .collect();
            ack.set_options(&entries);
        }
        _ => {
            let mut options = DhcpOption::message_type(MessageType::Ack).encode();
            options.extend_from_slice(&offer.options);
            ack.options = options;
        }
    }

    ack
}

/// Rebuilds an ACK from scratch out of a reference message.
///
/// Addresses come from the reference header. The subnet mask and lease
/// time come from the reference's Options 1 and 51 when present, otherwise
/// from `defaults`; a reference whose option tail does not parse gets
/// the defaults for both. Prefer [`build_ack`] when the OFFER is at hand.
pub fn build_ack_from_reference(reference: &DhcpMessage, defaults: &Assignment) -> DhcpMessage {
    let options = reference.option_set().unwrap_or_default();
    let subnet_mask = options.subnet_mask().unwrap_or(defaults.subnet_mask);
    let lease_seconds = options.lease_time().unwrap_or(defaults.lease_seconds);

    let reply_options = reply_options(
        MessageType::Ack,
        reference.siaddr,
        lease_seconds,
        subnet_mask,
        reference.giaddr,
    );

    build_reply(reference, reference.yiaddr, reference.siaddr, &reply_options)
}
