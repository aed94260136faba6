/*!
Handshake state management.

This module defines handshake states, endpoint roles and the state manager
that validates transitions between them.
*/

use std::fmt;

use tracing::{debug, warn};

use crate::core::{
    crypto::registry::AlgorithmKind,
    error::{Error, Result},
};

/// Why a handshake ended in [`HandshakeState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoCommonAlgorithm(AlgorithmKind),
    AuthenticationFailed,
    InvalidKeyLength,
    Timeout,
    Cancelled,
    PeerClosed,
    ProtocolViolation,
    ProviderFailure,
    Io,
}

impl From<&Error> for FailureReason {
    fn from(error: &Error) -> Self {
        match error {
            Error::NoCommonAlgorithm(kind) => FailureReason::NoCommonAlgorithm(*kind),
            Error::Authentication(_) => FailureReason::AuthenticationFailed,
            Error::InvalidKeyLength { .. } | Error::LengthMismatch { .. } => FailureReason::InvalidKeyLength,
            Error::Timeout(_) => FailureReason::Timeout,
            Error::Cancelled => FailureReason::Cancelled,
            Error::PeerClosed => FailureReason::PeerClosed,
            Error::Io(_) => FailureReason::Io,
            Error::ProviderUnavailable(_)
            | Error::ProviderMismatch(_)
            | Error::ProviderOperationFailed { .. }
            | Error::UnsupportedAlgorithm(_)
            | Error::UnknownAlgorithm(_)
            | Error::Crypto(_)
            | Error::Config(_) => FailureReason::ProviderFailure,
            Error::Protocol(_) | Error::InvalidFormat(_) | Error::UnsupportedVersion(_) => {
                FailureReason::ProtocolViolation
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoCommonAlgorithm(kind) => write!(f, "no common {} algorithm", kind),
            FailureReason::AuthenticationFailed => write!(f, "authentication failed"),
            FailureReason::InvalidKeyLength => write!(f, "invalid key length"),
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::PeerClosed => write!(f, "peer closed"),
            FailureReason::ProtocolViolation => write!(f, "protocol violation"),
            FailureReason::ProviderFailure => write!(f, "provider failure"),
            FailureReason::Io => write!(f, "i/o error"),
        }
    }
}

/// Handshake state for tracking connection progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent or received yet
    Start,
    /// Initiator sent ClientHello
    AwaitServerHello,
    /// Initiator verified ServerHello and is building ClientFinish
    SendFinish,
    /// Responder is waiting for the offer
    AwaitClientHello,
    /// Responder sent ServerHello
    AwaitClientFinish,
    /// Shared secret agreed
    Established,
    /// Handshake aborted
    Failed(FailureReason),
}

impl HandshakeState {
    /// Established and Failed are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Established | HandshakeState::Failed(_))
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Start => write!(f, "Start"),
            HandshakeState::AwaitServerHello => write!(f, "AwaitServerHello"),
            HandshakeState::SendFinish => write!(f, "SendFinish"),
            HandshakeState::AwaitClientHello => write!(f, "AwaitClientHello"),
            HandshakeState::AwaitClientFinish => write!(f, "AwaitClientFinish"),
            HandshakeState::Established => write!(f, "Established"),
            HandshakeState::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}

/// Endpoint role in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends ClientHello
    Initiator,
    /// Accepts the connection and answers
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "Initiator"),
            Role::Responder => write!(f, "Responder"),
        }
    }
}

/// Handshake state manager
///
/// Only the edges of the role's own path are accepted; any non-terminal
/// state may fail.
#[derive(Debug, Clone, Copy)]
pub struct StateManager {
    state: HandshakeState,
    role: Role,
}

impl StateManager {
    /// Create a new state manager
    pub fn new(role: Role) -> Self {
        Self {
            state: HandshakeState::Start,
            role,
        }
    }

    /// Get the current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Get the role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check if the handshake is in the given state
    pub fn is_state(&self, state: HandshakeState) -> bool {
        self.state == state
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    fn allowed(&self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        match (self.role, self.state, next) {
            (_, current, Failed(_)) => !current.is_terminal(),
            (Role::Initiator, Start, AwaitServerHello)
            | (Role::Initiator, AwaitServerHello, SendFinish)
            | (Role::Initiator, SendFinish, Established)
            | (Role::Responder, Start, AwaitClientHello)
            | (Role::Responder, AwaitClientHello, AwaitClientFinish)
            | (Role::Responder, AwaitClientFinish, Established) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting edges outside the role's path
    pub fn transition(&mut self, next: HandshakeState) -> Result<()> {
        if !self.allowed(next) {
            return Err(Error::Protocol(format!(
                "{} cannot move from {} to {}",
                self.role, self.state, next
            )));
        }
        debug!(role = %self.role, from = %self.state, to = %next, "handshake transition");
        self.state = next;
        Ok(())
    }

    /// Require the current state before handling a message
    pub fn expect(&self, state: HandshakeState) -> Result<()> {
        if self.state != state {
            return Err(Error::Protocol(format!(
                "{} received a message in state {}, expected {}",
                self.role, self.state, state
            )));
        }
        Ok(())
    }

    /// Enter Failed unless already terminal
    pub fn fail(&mut self, reason: FailureReason) {
        if !self.state.is_terminal() {
            warn!(role = %self.role, state = %self.state, %reason, "handshake failed");
            self.state = HandshakeState::Failed(reason);
        }
    }
}
