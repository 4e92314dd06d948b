//! The DORA transaction loop.
//!
//! The server handles one client at a time. After sending an OFFER it
//! waits for the next datagram and answers it with an ACK, whatever that
//! datagram is. DISCOVERs arriving meanwhile are taken as the REQUEST.
//! Without a request timeout, a client that never follows up stalls the
//! server indefinitely.
//!
//! Replies always go to the relay agent named in `giaddr`, never to the
//! UDP source of the datagram.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::options::MessageType;
use crate::packet::{DHCP_FIXED_HEADER_SIZE, DHCP_GIADDR_OFFSET, DhcpMessage};
use crate::reply::{Assignment, build_ack, build_offer};

/// Datagram transport used by the transaction loop.
///
/// Implemented for [`tokio::net::UdpSocket`]; tests substitute an
/// in-memory transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn recv_from(&self, buffer: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;

    async fn send_to(&self, data: &[u8], target: SocketAddr) -> std::io::Result<usize>;
}

#[async_trait]
impl Transport for UdpSocket {
    async fn recv_from(&self, buffer: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buffer).await
    }

    async fn send_to(&self, data: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        UdpSocket::send_to(self, data, target).await
    }
}

/// Creates the server socket: IPv4 UDP with address reuse and broadcast.
///
/// Must be called from within a tokio runtime.
pub fn create_socket(config: &Config) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

    socket
        .set_reuse_address(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

    socket
        .set_broadcast(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

    socket
        .set_nonblocking(true)
        .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

    let bind_addr = SocketAddrV4::new(config.bind_address, config.server_port);
    socket
        .bind(&bind_addr.into())
        .map_err(|error| Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error)))?;

    let std_socket: std::net::UdpSocket = socket.into();
    let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
        Error::Socket(format!("Failed to convert to tokio socket: {}", error))
    })?;

    Ok(tokio_socket)
}

/// Reads the relay agent address (giaddr, bytes 24..28) from a raw datagram.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the datagram is shorter than the
/// fixed header.
pub fn relay_address(datagram: &[u8]) -> Result<Ipv4Addr> {
    if datagram.len() < DHCP_FIXED_HEADER_SIZE {
        return Err(Error::MalformedMessage {
            length: datagram.len(),
        });
    }

    let octets: [u8; 4] = [
        datagram[DHCP_GIADDR_OFFSET],
        datagram[DHCP_GIADDR_OFFSET + 1],
        datagram[DHCP_GIADDR_OFFSET + 2],
        datagram[DHCP_GIADDR_OFFSET + 3],
    ];
    Ok(Ipv4Addr::from(octets))
}

/// The transaction in flight between OFFER and ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction id captured from the DISCOVER.
    pub xid: u32,
    /// Where the OFFER went and where the ACK will go.
    pub relay: SocketAddrV4,
    /// The OFFER already sent; the ACK is derived from it.
    pub offer: DhcpMessage,
    /// When the transaction is abandoned if no datagram has arrived.
    pub deadline: Option<Instant>,
}

/// Position of the loop in the DORA exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    AwaitDiscover,
    AwaitRequest(Transaction),
}

impl State {
    pub fn is_awaiting_discover(&self) -> bool {
        matches!(self, Self::AwaitDiscover)
    }
}

pub struct DhcpServer<T = UdpSocket> {
    config: Config,
    assignment: Assignment,
    transport: T,
    state: State,
    buffer: Vec<u8>,
}

impl DhcpServer<UdpSocket> {
    /// Validates `config` and binds the server socket.
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let socket = create_socket(&config)?;

        info!(
            "DHCP server starting on {}:{}",
            config.bind_address, config.server_port
        );

        Ok(Self::new(config, socket))
    }
}

impl<T: Transport> DhcpServer<T> {
    pub fn new(config: Config, transport: T) -> Self {
        info!(
            "Offering {}/{} from {} for {}s",
            config.your_ip, config.subnet_mask, config.server_ip, config.lease_duration_seconds
        );

        Self {
            assignment: config.assignment(),
            buffer: vec![0u8; config.recv_buffer_size],
            config,
            transport,
            state: State::AwaitDiscover,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs transactions until the transport fails.
    ///
    /// Malformed datagrams are logged and dropped; only transport failures
    /// end the loop.
    pub async fn run(&mut self) -> Result<()> {
        info!("DHCP server ready and listening");

        loop {
            self.step().await?;
        }
    }

    /// Waits for one datagram (or the request deadline) and advances the
    /// state machine.
    ///
    /// A transport failure abandons any transaction in flight.
    pub async fn step(&mut self) -> Result<()> {
        let next = match std::mem::replace(&mut self.state, State::AwaitDiscover) {
            State::AwaitDiscover => self.await_discover().await,
            State::AwaitRequest(transaction) => self.await_request(transaction).await,
        };
        self.state = next?;
        Ok(())
    }

    async fn await_discover(&mut self) -> Result<State> {
        debug!("Waiting for DISCOVER");
        let (datagram, source) = self.receive().await?;

        let transaction = match self.prepare_offer(&datagram, source) {
            Ok(transaction) => transaction,
            Err(error) if error.is_datagram_local() => {
                warn!("Dropping datagram from {}: {}", source, error);
                return Ok(State::AwaitDiscover);
            }
            Err(error) => return Err(error),
        };

        self.send(&transaction.offer, transaction.relay).await?;

        info!(
            "OFFER {} to {} via {} (xid {:#010x})",
            transaction.offer.yiaddr,
            transaction.offer.format_mac(),
            transaction.relay,
            transaction.xid
        );

        Ok(State::AwaitRequest(transaction))
    }

    fn prepare_offer(&self, datagram: &[u8], source: SocketAddr) -> Result<Transaction> {
        let discover = self.decode_datagram(datagram)?;
        let relay_ip = relay_address(datagram)?;

        if !discover.has_magic_cookie() {
            warn!("No DHCP magic cookie from {}, treating as BOOTP", source);
        }
        if relay_ip.is_unspecified() {
            warn!("Datagram from {} was not relayed (giaddr 0.0.0.0)", source);
        }

        let message_type = match discover.option_set() {
            Ok(options) => options.message_type(),
            Err(error) => {
                warn!("Ignoring malformed options from {}: {}", source, error);
                None
            }
        };

        info!(
            "{} from {} ({}) xid {:#010x}",
            describe(message_type),
            discover.format_mac(),
            source,
            discover.xid
        );
        if discover.is_broadcast() {
            debug!(
                "{} set the broadcast flag; delivery is left to the relay agent",
                discover.format_mac()
            );
        }

        let offer = build_offer(&discover, &self.assignment);

        Ok(Transaction {
            xid: discover.xid,
            relay: SocketAddrV4::new(relay_ip, self.config.relay_port),
            offer,
            deadline: self
                .config
                .request_timeout()
                .map(|timeout| Instant::now() + timeout),
        })
    }

    async fn await_request(&mut self, transaction: Transaction) -> Result<State> {
        debug!("Waiting for REQUEST (xid {:#010x})", transaction.xid);

        let received = match transaction.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.receive()).await {
                Ok(received) => received?,
                Err(_) => {
                    warn!(
                        "No REQUEST for xid {:#010x} before deadline, abandoning transaction",
                        transaction.xid
                    );
                    return Ok(State::AwaitDiscover);
                }
            },
            None => self.receive().await?,
        };
        let (datagram, source) = received;

        let request = match self.decode_datagram(&datagram) {
            Ok(request) => request,
            Err(error) if error.is_datagram_local() => {
                warn!("Dropping datagram from {}: {}", source, error);
                return Ok(State::AwaitRequest(transaction));
            }
            Err(error) => return Err(error),
        };

        match request.option_set() {
            Ok(options) => {
                let message_type = options.message_type();
                if message_type != Some(MessageType::Request) {
                    warn!(
                        "Expected REQUEST from {}, got {}; answering it as the request",
                        source,
                        describe(message_type)
                    );
                }
                if let Some(server_id) = options
                    .server_identifier()
                    .filter(|server_id| *server_id != self.assignment.server_ip)
                {
                    warn!(
                        "Request from {} names server {}; answering anyway",
                        source, server_id
                    );
                }
            }
            Err(error) => {
                warn!(
                    "Malformed options in datagram from {}: {}; answering it as the request",
                    source, error
                );
            }
        }

        if request.xid != transaction.xid {
            warn!(
                "Request xid {:#010x} does not match offer xid {:#010x}; answering anyway",
                request.xid, transaction.xid
            );
        }

        let ack = build_ack(&transaction.offer);
        self.send(&ack, transaction.relay).await?;

        info!(
            "ACK {} to {} via {} (xid {:#010x})",
            ack.yiaddr,
            ack.format_mac(),
            transaction.relay,
            ack.xid
        );

        Ok(State::AwaitDiscover)
    }

    /// Decodes a received datagram, refusing one that filled the receive
    /// buffer since its tail may have been cut off.
    fn decode_datagram(&self, datagram: &[u8]) -> Result<DhcpMessage> {
        if datagram.len() >= self.buffer.len() {
            return Err(Error::OversizedDatagram {
                size: datagram.len(),
            });
        }
        DhcpMessage::decode(datagram)
    }

    async fn receive(&mut self) -> Result<(Vec<u8>, SocketAddr)> {
        let (size, source) = self
            .transport
            .recv_from(&mut self.buffer)
            .await
            .map_err(Error::Transport)?;

        debug!("Received {} bytes from {}", size, source);
        Ok((self.buffer[..size].to_vec(), source))
    }

    async fn send(&self, message: &DhcpMessage, target: SocketAddrV4) -> Result<()> {
        let encoded = message.encode();
        self.transport
            .send_to(&encoded, SocketAddr::V4(target))
            .await
            .map_err(Error::Transport)?;
        Ok(())
    }
}

fn describe(message_type: Option<MessageType>) -> String {
    match message_type {
        Some(message_type) => message_type.to_string(),
        None => "BOOTP".to_string(),
    }
}
