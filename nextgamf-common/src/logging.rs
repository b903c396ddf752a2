//! Logging setup and protocol message tracing
//!
//! Logging goes through `tracing`. The subscriber is installed once by the
//! binary (or by test helpers); `RUST_LOG` always wins over the configured
//! level so individual crates can be turned up without a rebuild.
//!
//! Every NGAP PDU crossing an association and every NAS PDU carried inside
//! one is logged at debug level by name, and at trace level with its bytes.

use std::fmt;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Payload bytes shown in a trace line before it is cut short.
pub const MAX_TRACE_BYTES: usize = 256;

/// Verbosity accepted by `--log-level` and the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "warning" {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level '{s}'"))
    }
}

/// Installs the global subscriber at `level`.
///
/// Returns `false` if a subscriber was already installed.
///
/// ```
/// use nextgamf_common::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) -> bool {
    init_logging_with_filter(level.as_str())
}

/// Installs the global subscriber with a directive string such as
/// `"info,nextgamf_ngap=debug"`.
pub fn init_logging_with_filter(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Which way a PDU travels, seen from the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the radio node (or the UE behind it)
    Rx,
    /// Towards the radio node
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Rx => "<-",
            Direction::Tx => "->",
        })
    }
}

/// Signaling layer a logged PDU belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ngap,
    Nas,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Ngap => "NGAP",
            Protocol::Nas => "NAS",
        })
    }
}

/// Logs a PDU by name at debug level and its bytes at trace level.
pub fn log_pdu(protocol: Protocol, direction: Direction, name: &str, data: &[u8]) {
    tracing::debug!(
        protocol = %protocol,
        len = data.len(),
        "{} {} {}",
        direction,
        protocol,
        name
    );
    tracing::trace!(
        protocol = %protocol,
        "{} {} bytes: {}",
        protocol,
        name,
        HexDump::truncated(data, MAX_TRACE_BYTES)
    );
}

pub fn log_ngap_message(direction: Direction, name: &str, data: &[u8]) {
    log_pdu(Protocol::Ngap, direction, name, data);
}

pub fn log_nas_message(direction: Direction, name: &str, data: &[u8]) {
    log_pdu(Protocol::Nas, direction, name, data);
}

/// Lazily formatted hex, optionally grouped and cut short.
///
/// Nothing is allocated unless the value is actually formatted, so it can
/// be passed to disabled log levels for free.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    data: &'a [u8],
    group: usize,
    limit: Option<usize>,
}

impl<'a> HexDump<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            group: 0,
            limit: None,
        }
    }

    /// Shows at most `limit` bytes followed by the count left out.
    pub fn truncated(data: &'a [u8], limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(data)
        }
    }

    /// Separates every `group` bytes with a space (0: no separation).
    pub fn grouped(mut self, group: usize) -> Self {
        self.group = group;
        self
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data.is_empty() {
            return f.write_str("(empty)");
        }
        let shown = match self.limit {
            Some(limit) => &self.data[..self.data.len().min(limit)],
            None => self.data,
        };
        if self.group == 0 {
            f.write_str(&hex::encode(shown))?;
        } else {
            for (i, chunk) in shown.chunks(self.group).enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(&hex::encode(chunk))?;
            }
        }
        let hidden = self.data.len() - shown.len();
        if hidden > 0 {
            write!(f, " (+{hidden} bytes)")?;
        }
        Ok(())
    }
}
