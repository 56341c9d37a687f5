//! Session configuration.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use browserbox_imap::{ClientOptions, FramerConfig};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns the next process-wide session identifier, `[1]`, `[2]`, ...
fn next_session_id() -> String {
    format!("[{}]", SESSION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}

/// Credentials for LOGIN or AUTHENTICATE XOAUTH2.
#[derive(Clone, Default)]
pub struct Auth {
    /// User name.
    pub user: String,
    /// Password for LOGIN.
    pub pass: Option<String>,
    /// OAuth2 access token; used if the server advertises `AUTH=XOAUTH2`.
    pub xoauth2: Option<String>,
}

impl Auth {
    /// Password credentials.
    #[must_use]
    pub fn login(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: Some(pass.into()),
            xoauth2: None,
        }
    }

    /// OAuth2 bearer token credentials.
    #[must_use]
    pub fn xoauth2(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: None,
            xoauth2: Some(token.into()),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "***"))
            .field("xoauth2", &self.xoauth2.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Session timers.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Time allowed for the server greeting.
    pub connection: Duration,
    /// Interval between NOOPs when the server lacks IDLE.
    pub noop: Duration,
    /// How long an IDLE runs before `DONE` is sent.
    pub idle: Duration,
    /// Quiet time before idling starts.
    pub enter_idle: Duration,
    /// Minimum wait for data after a write.
    pub socket_lower_bound: Duration,
    /// Extra wait per written byte.
    pub socket_per_byte: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let framer = FramerConfig::default();
        Self {
            connection: Duration::from_secs(90),
            noop: Duration::from_secs(60),
            idle: Duration::from_secs(60),
            enter_idle: framer.enter_idle,
            socket_lower_bound: framer.socket_timeout_lower_bound,
            socket_per_byte: framer.socket_timeout_per_byte,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// TLS from the start.
    pub use_secure_transport: bool,
    /// Credentials.
    pub auth: Option<Auth>,
    /// Client ID sent with the ID command (RFC 2971).
    pub id: Option<Vec<(String, String)>>,
    /// Extra trusted certificates (DER).
    pub ca: Vec<Vec<u8>>,
    /// Run STARTTLS even if not advertised and fail if it is refused.
    pub require_tls: bool,
    /// Never run STARTTLS.
    pub ignore_tls: bool,
    /// Identifier included in every log line.
    pub session_id: String,
    /// Timers.
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new("localhost").build()
    }
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Transport options for this configuration.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let framer = FramerConfig {
            enter_idle: self.timeouts.enter_idle,
            socket_timeout_lower_bound: self.timeouts.socket_lower_bound,
            socket_timeout_per_byte: self.timeouts.socket_per_byte,
            ..FramerConfig::default()
        };
        ClientOptions::new(self.host.clone(), self.port)
            .secure(self.use_secure_transport)
            .ca(self.ca.clone())
            .session_id(self.session_id.clone())
            .framer(framer)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    use_secure_transport: Option<bool>,
    auth: Option<Auth>,
    id: Option<Vec<(String, String)>>,
    ca: Vec<Vec<u8>>,
    require_tls: bool,
    ignore_tls: bool,
    session_id: Option<String>,
    timeouts: Timeouts,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            use_secure_transport: None,
            auth: None,
            id: None,
            ca: Vec::new(),
            require_tls: false,
            ignore_tls: false,
            session_id: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Sets the port. Defaults to 993 with TLS and 143 without.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enables TLS from the start. Defaults to `port == 993`.
    #[must_use]
    pub const fn use_secure_transport(mut self, secure: bool) -> Self {
        self.use_secure_transport = Some(secure);
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the client ID fields, e.g. `("name", "myclient")`.
    #[must_use]
    pub fn id<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.id = Some(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Adds a trusted certificate (DER).
    #[must_use]
    pub fn ca(mut self, der: Vec<u8>) -> Self {
        self.ca.push(der);
        self
    }

    /// Requires STARTTLS.
    #[must_use]
    pub const fn require_tls(mut self, require: bool) -> Self {
        self.require_tls = require;
        self
    }

    /// Disables STARTTLS.
    #[must_use]
    pub const fn ignore_tls(mut self, ignore: bool) -> Self {
        self.ignore_tls = ignore;
        self
    }

    /// Sets the session identifier used in logs.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the timers.
    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let (port, use_secure_transport) = match (self.port, self.use_secure_transport) {
            (Some(port), Some(secure)) => (port, secure),
            (Some(port), None) => (port, port == 993),
            (None, Some(true)) => (993, true),
            (None, Some(false) | None) => (143, false),
        };
        Config {
            host: self.host,
            port,
            use_secure_transport,
            auth: self.auth,
            id: self.id,
            ca: self.ca,
            require_tls: self.require_tls,
            ignore_tls: self.ignore_tls,
            session_id: self.session_id.unwrap_or_else(next_session_id),
            timeouts: self.timeouts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = Config::builder("imap.example.com").build();
        assert_eq!(config.port, 143);
        assert!(!config.use_secure_transport);

        let config = Config::builder("imap.example.com")
            .use_secure_transport(true)
            .build();
        assert_eq!(config.port, 993);

        let config = Config::builder("imap.example.com").port(993).build();
        assert!(config.use_secure_transport);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.timeouts.connection, Duration::from_secs(90));
        assert_eq!(config.timeouts.noop, Duration::from_secs(60));
        assert_eq!(config.timeouts.idle, Duration::from_secs(60));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Config::builder("localhost").build().session_id;
        let b = Config::builder("localhost").build().session_id;
        assert_ne!(a, b);
        assert!(a.starts_with('[') && a.ends_with(']'));

        let named = Config::builder("localhost").session_id("[mine]").build();
        assert_eq!(named.session_id, "[mine]");
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let auth = Auth::login("user", "hunter2");
        let debug = format!("{auth:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_client_options() {
        let config = Config::builder("imap.example.com")
            .port(1143)
            .session_id("[7]")
            .build();
        let options = config.client_options();
        assert_eq!(options.port, 1143);
        assert_eq!(options.session_id, "[7]");
        assert_eq!(options.framer.enter_idle, Duration::from_millis(1000));
    }
}
