//! Internal-consistency check: before any graph reasoning, every read must
//! observe the latest applicable write of its variable.

use core::hash::Hash;

use hashbrown::HashMap;

use crate::history::error::Error;
use crate::history::types::{transactions, Event, EventId, Session, TransactionId};

/// Verifies the read-your-writes and read-from-committed-last-write
/// requirements assumed by the snapshot-isolation check.
///
/// For every read of `(variable, version)` at index `i` in transaction `t`:
///
/// - a producing write must exist and be unique across the history;
/// - if the producer is in `t` itself, it must occur before the read and be
///   the latest write of the variable before index `i`;
/// - if the producer is external, it must be the last write of the variable
///   in its transaction.
///
/// # Errors
///
/// Returns the first violation found, in session/event order. Histories
/// containing uncommitted transactions are rejected before any read is
/// inspected.
pub fn check_internal_consistency<Variable, Version>(
    sessions: &[Session<Variable, Version>],
) -> Result<(), Error<Variable, Version>>
where
    Variable: Eq + Hash + Clone,
    Version: Eq + Hash + Clone,
{
    for (id, txn) in transactions(sessions) {
        if !txn.committed {
            return Err(Error::UncommittedTransaction { id });
        }
    }

    // (variable, version) -> the event id of the unique producing write.
    let mut writes: HashMap<(&Variable, &Version), EventId> = HashMap::new();
    // (transaction, variable) -> indices of that transaction's writes,
    // ascending by construction.
    let mut transaction_writes: HashMap<(TransactionId, &Variable), Vec<u64>> = HashMap::new();

    for (id, txn) in transactions(sessions) {
        for (i_event, event) in (0..).zip(txn.events.iter()) {
            let Event::Write { variable, version } = event else {
                continue;
            };
            let event_id = EventId {
                session_id: id.session_id,
                session_height: id.session_height,
                transaction_height: i_event,
            };
            if let Some(&previous) = writes.get(&(variable, version)) {
                return Err(Error::DuplicateWrite {
                    event: event.clone(),
                    ids: [previous, event_id],
                });
            }
            writes.insert((variable, version), event_id);
            transaction_writes
                .entry((id, variable))
                .or_default()
                .push(i_event);
        }
    }

    for (id, txn) in transactions(sessions) {
        for (i_event, event) in (0..).zip(txn.events.iter()) {
            let Event::Read { variable, version } = event else {
                continue;
            };
            let read_event_id = EventId {
                session_id: id.session_id,
                session_height: id.session_height,
                transaction_height: i_event,
            };

            let Some(&write_event_id) = writes.get(&(variable, version)) else {
                return Err(Error::IncompleteRead {
                    event: event.clone(),
                    id: read_event_id,
                });
            };

            let write_indices = &transaction_writes[&(write_event_id.transaction_id(), variable)];
            let position = write_indices
                .binary_search(&write_event_id.transaction_height)
                .expect("producing write is indexed");
            let is_last = position == write_indices.len() - 1;

            if write_event_id.transaction_id() == id {
                if write_event_id.transaction_height > i_event {
                    return Err(Error::FutureRead {
                        read_event: event.clone(),
                        read_event_id,
                        write_event_id,
                    });
                }
                if !is_last && write_indices[position + 1] < i_event {
                    return Err(Error::StaleRead {
                        read_event: event.clone(),
                        read_event_id,
                        write_event_id,
                    });
                }
            } else if !is_last {
                return Err(Error::StaleRead {
                    read_event: event.clone(),
                    read_event_id,
                    write_event_id,
                });
            }
        }
    }

    Ok(())
}
