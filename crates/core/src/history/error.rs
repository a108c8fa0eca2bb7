use core::fmt::{self, Display, Formatter};

use super::types::{Event, EventId, TransactionId};

/// A violation of the history contract.
///
/// Loaders promise committed-only transactions whose reads observe a
/// unique producing write; these variants describe every way that promise
/// can be broken. All of them are fatal: the verifier reports the error
/// and never builds a precedence graph.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<Variable, Version> {
    /// The history contains a transaction that never committed.
    UncommittedTransaction { id: TransactionId },
    /// A read observes a `(variable, version)` pair nothing wrote.
    IncompleteRead {
        event: Event<Variable, Version>,
        id: EventId,
    },
    /// Two writes produced the same `(variable, version)` pair, making the
    /// reads-from relation ambiguous.
    DuplicateWrite {
        event: Event<Variable, Version>,
        ids: [EventId; 2],
    },
    /// A read observes a write that occurs later in its own transaction.
    FutureRead {
        read_event: Event<Variable, Version>,
        read_event_id: EventId,
        write_event_id: EventId,
    },
    /// A read observes a write that is not the latest one: either an
    /// earlier same-transaction write of the variable was overwritten
    /// before the read, or an external transaction overwrote the observed
    /// version before committing.
    StaleRead {
        read_event: Event<Variable, Version>,
        read_event_id: EventId,
        write_event_id: EventId,
    },
}

impl<Variable, Version> Display for Error<Variable, Version>
where
    Variable: Display,
    Version: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::UncommittedTransaction { id } => {
                write!(f, "transaction {id} did not commit")
            }
            Self::IncompleteRead { event, id } => {
                write!(f, "{event} at {id:?} has no corresponding write")
            }
            Self::DuplicateWrite { event, ids } => {
                write!(f, "{event} written twice, at {:?} and {:?}", ids[0], ids[1])
            }
            Self::FutureRead {
                read_event,
                read_event_id,
                write_event_id,
            } => write!(
                f,
                "{read_event} at {read_event_id:?} reads from a later write at {write_event_id:?}"
            ),
            Self::StaleRead {
                read_event,
                read_event_id,
                write_event_id,
            } => write!(
                f,
                "{read_event} at {read_event_id:?} does not read from the latest write \
                 ({write_event_id:?} is overwritten)"
            ),
        }
    }
}
