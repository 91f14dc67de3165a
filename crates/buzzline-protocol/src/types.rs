//! Identifier types shared by every Buzzline layer.
//!
//! These are the values that appear in URLs, logs, and view data: the
//! client's stable [`ClientId`], a lobby's [`Pin`], and the coarse
//! [`LobbyPhase`] a lobby is in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ClientId
// ---------------------------------------------------------------------------

/// Maximum length of a client id in bytes.
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// Stable opaque identifier for one browser or device.
///
/// The transport assigns it on first contact and the client presents it
/// again on every reconnect; the lobby runtime never generates one. It has
/// no ordering and equality is bytewise.
///
/// Serde goes through [`TryFrom<String>`], so a deserialized `ClientId`
/// is validated exactly like one built with [`ClientId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Creates a client id, rejecting empty strings and anything longer
    /// than [`MAX_CLIENT_ID_LEN`] bytes.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::InvalidClientId(
                "client id cannot be empty".into(),
            ));
        }
        if id.len() > MAX_CLIENT_ID_LEN {
            return Err(ProtocolError::InvalidClientId(format!(
                "client id is {} bytes, limit is {MAX_CLIENT_ID_LEN}",
                id.len()
            )));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Pin
// ---------------------------------------------------------------------------

/// A lobby's 4-digit PIN, `0000` through `9999`.
///
/// Stored as a number, always rendered zero-padded. On the wire it is the
/// 4-character string, so `Pin::new(42)` serializes as `"0042"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(u16);

impl Pin {
    /// Largest valid PIN value.
    pub const MAX: u16 = 9999;

    /// Creates a PIN from its numeric value.
    pub fn new(value: u16) -> Result<Self, ProtocolError> {
        if value > Self::MAX {
            return Err(ProtocolError::InvalidPin(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl FromStr for Pin {
    type Err = ProtocolError;

    /// Parses exactly four ASCII digits. `"42"` and `"00042"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidPin(s.to_owned()));
        }
        s.parse::<u16>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidPin(s.to_owned()))
    }
}

impl TryFrom<String> for Pin {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.to_string()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LobbyPhase
// ---------------------------------------------------------------------------

/// The coarse phase a lobby is in, derived from its game state.
///
/// ```text
/// WaitingForPlayers ──→ Question ⇄ Answer ──→ Finished
/// ```
///
/// The phase is not stored anywhere; the lobby computes it on demand and
/// ships it inside every view so clients can tell where the game is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyPhase {
    /// Game not started. Players pick usernames.
    WaitingForPlayers,
    /// A round is live.
    Question,
    /// The last round ended; correct answers and points are revealed.
    Answer,
    /// The game is over and archived.
    Finished,
}

impl LobbyPhase {
    /// Whether a lobby in this phase still accepts new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::WaitingForPlayers)
    }
}

impl fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::Question => write!(f, "Question"),
            Self::Answer => write!(f, "Answer"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
