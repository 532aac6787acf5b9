//! Bounded subtree walk
//!
//! A [`TableWalk`] issues repeated get-next requests starting at a table's
//! base OID and yields one [`TableRow`] per response until the response
//! leaves the subtree.
//!
//! ## State Machine
//!
//! ```text
//!  Start ──(boundary computed)──► Stepping ──(outside / failure)──► Stopped
//!                                   │  ▲
//!                                   └──┘ row yielded, cursor advanced
//! ```
//!
//! The boundary is the base's next sibling and is fixed when the walk is
//! created. `Stopped` is terminal: no request is issued after it.

use crate::oid::{OidAddress, OidOrdering};
use crate::outcome::{FailureKind, ProbeMode, Verdict};
use crate::traits::{SnmpTransport, SnmpValue};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// One row of a walked table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Full OID of the cell
    pub oid: OidAddress,
    /// Row index (trailing OID arc)
    pub index: u32,
    /// Cell value
    pub value: SnmpValue,
}

/// Why a walk stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The agent answered with an OID at or past the boundary
    EndOfSubtree,
    /// The agent reported the end of its MIB view
    EndOfMibView,
    /// A get-next request failed
    Failure(FailureKind),
    /// The agent answered with an OID that does not advance past the cursor
    NonAdvancing(OidAddress),
    /// The base OID has no next sibling
    InvalidBase(String),
}

#[derive(Debug)]
enum WalkState {
    Stepping,
    Stopped(StopReason),
}

/// Finite, non-restartable lazy sequence of table rows
pub struct TableWalk<'a> {
    transport: &'a dyn SnmpTransport,
    ordering: OidOrdering,
    base: OidAddress,
    boundary: Option<OidAddress>,
    cursor: OidAddress,
    state: WalkState,
    rows_yielded: usize,
}

impl<'a> TableWalk<'a> {
    /// Start a walk of `base` over `transport`
    pub fn new(transport: &'a dyn SnmpTransport, base: OidAddress, ordering: OidOrdering) -> Self {
        let (boundary, state) = match base.next_sibling() {
            Ok(boundary) => (Some(boundary), WalkState::Stepping),
            Err(e) => {
                warn!("{}: cannot walk {}: {}", transport.target(), base, e);
                (None, WalkState::Stopped(StopReason::InvalidBase(e.to_string())))
            }
        };

        Self {
            transport,
            ordering,
            cursor: base.clone(),
            base,
            boundary,
            state,
            rows_yielded: 0,
        }
    }

    /// Boundary computed at start (`None` if the base had no sibling)
    pub fn boundary(&self) -> Option<&OidAddress> {
        self.boundary.as_ref()
    }

    /// Number of rows handed out so far
    pub fn rows_yielded(&self) -> usize {
        self.rows_yielded
    }

    /// Why the walk stopped, once it has
    pub fn stop_reason(&self) -> Option<&StopReason> {
        match &self.state {
            WalkState::Stepping => None,
            WalkState::Stopped(reason) => Some(reason),
        }
    }

    /// Whether the walk has reached its terminal state
    pub fn is_stopped(&self) -> bool {
        matches!(self.state, WalkState::Stopped(_))
    }

    /// Fetch the next row, or `None` once the walk has stopped
    pub async fn next(&mut self) -> Option<TableRow> {
        if self.is_stopped() {
            return None;
        }
        let boundary = self.boundary.clone()?;

        let target = self.transport.target();
        let subject = self.cursor.to_string();

        let binding = match self
            .transport
            .get_next(&self.cursor)
            .await
            .classify(ProbeMode::Resolution, &target, &subject)
        {
            Verdict::Deliver(binding) => binding,
            Verdict::Unavailable(FailureKind::EmptyAnswer) => {
                return self.stop(StopReason::EndOfMibView);
            }
            Verdict::Unavailable(kind) => return self.stop(StopReason::Failure(kind)),
            Verdict::Available => return self.stop(StopReason::EndOfMibView),
        };

        if !self.ordering.is_before_boundary(&binding.oid, &boundary) {
            debug!("{}: {} is past {}, walk of {} done", target, binding.oid, boundary, self.base);
            return self.stop(StopReason::EndOfSubtree);
        }

        // get-next must move forward in the agent's (numeric) OID order
        if binding.oid.cmp(&self.cursor) != Ordering::Greater {
            warn!(
                "{}: get-next from {} returned {}, agent is not advancing",
                target, self.cursor, binding.oid
            );
            return self.stop(StopReason::NonAdvancing(binding.oid));
        }

        let Some(index) = binding.oid.last_arc() else {
            return self.stop(StopReason::NonAdvancing(binding.oid));
        };

        debug!("{}: {} = {}", target, binding.oid, binding.value);

        self.cursor = binding.oid.clone();
        self.rows_yielded += 1;

        Some(TableRow {
            oid: binding.oid,
            index,
            value: binding.value,
        })
    }

    /// Drain the remaining rows
    pub async fn collect(mut self) -> Vec<TableRow> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row);
        }
        rows
    }

    fn stop(&mut self, reason: StopReason) -> Option<TableRow> {
        debug!(
            "walk of {} stopped after {} rows: {:?}",
            self.base, self.rows_yielded, reason
        );
        self.state = WalkState::Stopped(reason);
        None
    }
}

impl std::fmt::Debug for TableWalk<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableWalk")
            .field("target", &self.transport.target())
            .field("base", &self.base)
            .field("boundary", &self.boundary)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("rows_yielded", &self.rows_yielded)
            .finish()
    }
}
