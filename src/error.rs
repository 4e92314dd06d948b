//! Error types for the relay DHCP server.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.

/// Errors that can occur while decoding datagrams or running the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Datagram is shorter than the 240-byte fixed header.
    #[error("Malformed DHCP message: {length} bytes (minimum 240)")]
    MalformedMessage { length: usize },

    /// A TLV option declares more bytes than remain in the option tail.
    ///
    /// Also raised when a type byte is the last byte of the tail and has
    /// no length byte after it.
    #[error("Truncated option {code} at offset {offset}")]
    TruncatedOption { code: u8, offset: usize },

    /// Datagram filled the whole receive buffer and may have been cut short.
    #[error("Datagram of {size} bytes filled the receive buffer and may be truncated")]
    OversizedDatagram { size: usize },

    /// Sending or receiving on the transport failed.
    ///
    /// This is the only error kind that stops the transaction loop.
    #[error("Transport failure: {0}")]
    Transport(std::io::Error),

    /// File system I/O error (config or capture files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without administrator privileges.
    #[error("Socket error: {0}")]
    Socket(String),

    /// A hexdump capture file could not be parsed.
    #[error("Invalid capture: {0}")]
    InvalidCapture(String),
}

impl Error {
    /// Returns true for errors confined to the datagram being processed.
    ///
    /// The transaction loop drops the datagram and keeps its state for
    /// these; everything else is propagated to the caller.
    pub fn is_datagram_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. }
                | Self::TruncatedOption { .. }
                | Self::OversizedDatagram { .. }
        )
    }
}

/// A specialized Result type for DHCP operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_local_classification() {
        assert!(Error::MalformedMessage { length: 10 }.is_datagram_local());
        assert!(
            Error::TruncatedOption {
                code: 53,
                offset: 0
            }
            .is_datagram_local()
        );
        assert!(Error::OversizedDatagram { size: 1024 }.is_datagram_local());

        let transport = Error::Transport(std::io::Error::other("socket closed"));
        assert!(!transport.is_datagram_local());
        assert!(!Error::InvalidConfig("bad".to_string()).is_datagram_local());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::MalformedMessage { length: 10 }.to_string(),
            "Malformed DHCP message: 10 bytes (minimum 240)"
        );
        assert_eq!(
            Error::TruncatedOption {
                code: 51,
                offset: 4
            }
            .to_string(),
            "Truncated option 51 at offset 4"
        );
    }
}
