//! Connection options.

use crate::protocol::FramerConfig;

/// Options for [`super::ImapClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server hostname, also used for TLS verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Use TLS from the start instead of a plaintext connection.
    pub use_secure_transport: bool,
    /// Extra trusted certificates (DER).
    pub ca: Vec<Vec<u8>>,
    /// Identifier included in every log line of this connection.
    pub session_id: String,
    /// Framer timers.
    pub framer: FramerConfig,
}

impl ClientOptions {
    /// Creates options for `host:port`. TLS is enabled for port 993.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_secure_transport: port == 993,
            ca: Vec::new(),
            session_id: String::new(),
            framer: FramerConfig::default(),
        }
    }

    /// Enables or disables TLS from the start.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.use_secure_transport = secure;
        self
    }

    /// Adds trusted certificates.
    #[must_use]
    pub fn ca(mut self, ca: Vec<Vec<u8>>) -> Self {
        self.ca = ca;
        self
    }

    /// Sets the session identifier used in logs.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the framer timers.
    #[must_use]
    pub fn framer(mut self, framer: FramerConfig) -> Self {
        self.framer = framer;
        self
    }
}
