//! # relaydhcp
//!
//! A minimal DHCP server (RFC 2131/2132) for clients reached through a relay
//! agent. Every client is offered the same configured address, server
//! identifier, subnet mask and lease time; the relay agent's own address is
//! advertised as the router.
//!
//! ## Features
//!
//! - Byte-exact decoding and encoding of the 240-byte header and TLV options
//! - OFFER and ACK construction that echoes the client's xid, chaddr and giaddr
//! - A single-transaction DISCOVER → OFFER → REQUEST → ACK loop
//! - Optional deadline for the REQUEST so a silent client cannot stall the server
//! - Async/await with Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use relaydhcp::{Config, DhcpServer};
//!
//! #[tokio::main]
//! async fn main() -> relaydhcp::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let mut server = DhcpServer::bind(config)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`DhcpMessage`] - Message decoding and encoding
//! - [`OptionSet`] - TLV option parsing with last-wins semantics
//! - [`reply`] - OFFER/ACK construction
//! - [`DhcpServer`] - The transaction loop over a [`Transport`]
//! - [`Config`] - Server configuration

pub mod capture;
pub mod config;
pub mod error;
pub mod options;
pub mod packet;
pub mod reply;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use options::{DhcpOption, MessageType, OptionSet};
pub use packet::DhcpMessage;
pub use reply::{Assignment, build_ack, build_offer};
pub use server::{DhcpServer, State, Transport};
