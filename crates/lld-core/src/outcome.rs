//! Raw request outcomes and the shared classification policy
//!
//! Every transport call (SNMP get/get-next, DNS query, raw datagram) reports a
//! [`ProbeOutcome`]. Call sites never inspect it directly; they run it through
//! [`ProbeOutcome::classify`] so that DNS and SNMP degrade the same way:
//!
//! | Outcome          | Resolution     | Liveness       |
//! |------------------|----------------|----------------|
//! | `Success`        | deliver        | deliver        |
//! | `Timeout`        | unavailable    | unavailable    |
//! | `EmptyAnswer`    | unavailable    | **available**  |
//! | `ProtocolError`  | unavailable    | unavailable    |
//! | `TransportError` | unavailable    | unavailable    |
//!
//! Nothing here retries.

use std::fmt;
use tracing::{debug, warn};

/// Raw outcome of a single transport call
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome<T> {
    /// The call succeeded and produced a payload
    Success(T),
    /// Socket or transport-level failure
    TransportError(String),
    /// No reply within the per-call timeout
    Timeout,
    /// The responder answered with an error status
    ProtocolError {
        /// SNMP error-status / DNS rcode
        code: i32,
        /// Offending varbind index or extra detail from the responder
        detail: String,
    },
    /// The responder answered, but with a negative or empty answer
    EmptyAnswer,
}

/// What the caller is trying to learn from the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// The payload is what matters (resolution, SNMP get, walk step)
    Resolution,
    /// Any well-formed answer proves the responder is alive
    Liveness,
}

/// Why a call did not deliver a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport(String),
    Protocol(i32),
    EmptyAnswer,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Transport(cause) => write!(f, "transport error: {}", cause),
            FailureKind::Protocol(code) => write!(f, "protocol error {}", code),
            FailureKind::EmptyAnswer => write!(f, "empty answer"),
        }
    }
}

/// Classified outcome handed back to the call site
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    /// Payload delivered
    Deliver(T),
    /// No payload, but the responder is alive
    Available,
    /// No payload and no proof of life
    Unavailable(FailureKind),
}

impl<T> Verdict<T> {
    /// Liveness view of the verdict
    pub fn is_available(&self) -> bool {
        !matches!(self, Verdict::Unavailable(_))
    }

    /// The payload, if one was delivered
    pub fn into_payload(self) -> Option<T> {
        match self {
            Verdict::Deliver(payload) => Some(payload),
            _ => None,
        }
    }
}

impl<T> ProbeOutcome<T> {
    /// Apply the shared policy, logging negative outcomes with their context
    ///
    /// `target` names the host or server, `subject` the OID or query that was
    /// sent.
    pub fn classify(self, mode: ProbeMode, target: &str, subject: &str) -> Verdict<T> {
        match self {
            ProbeOutcome::Success(payload) => Verdict::Deliver(payload),
            ProbeOutcome::Timeout => {
                warn!("{}: request for {} timed out", target, subject);
                Verdict::Unavailable(FailureKind::Timeout)
            }
            ProbeOutcome::EmptyAnswer => match mode {
                ProbeMode::Liveness => {
                    debug!("{}: negative answer for {}, responder is live", target, subject);
                    Verdict::Available
                }
                ProbeMode::Resolution => {
                    debug!("{}: empty answer for {}", target, subject);
                    Verdict::Unavailable(FailureKind::EmptyAnswer)
                }
            },
            ProbeOutcome::ProtocolError { code, detail } => {
                warn!("{}: protocol error {} at {} ({})", target, code, subject, detail);
                Verdict::Unavailable(FailureKind::Protocol(code))
            }
            ProbeOutcome::TransportError(cause) => {
                warn!("{}: failed to get {}: {}", target, subject, cause);
                Verdict::Unavailable(FailureKind::Transport(cause))
            }
        }
    }

    /// Map the success payload, leaving failures untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProbeOutcome<U> {
        match self {
            ProbeOutcome::Success(payload) => ProbeOutcome::Success(f(payload)),
            ProbeOutcome::TransportError(cause) => ProbeOutcome::TransportError(cause),
            ProbeOutcome::Timeout => ProbeOutcome::Timeout,
            ProbeOutcome::ProtocolError { code, detail } => ProbeOutcome::ProtocolError { code, detail },
            ProbeOutcome::EmptyAnswer => ProbeOutcome::EmptyAnswer,
        }
    }
}
