use core::fmt::{self, Display, Formatter};

/// A single read or write operation within a transaction.
///
/// Generic over the key (`Variable`) and value (`Version`) types so that
/// loaders can keep their native representation (the text loader uses
/// `u64` for both, tests use `&str` keys).
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event<Variable, Version> {
    Read { variable: Variable, version: Version },
    Write { variable: Variable, version: Version },
}

impl<Variable, Version> Event<Variable, Version> {
    pub const fn read(variable: Variable, version: Version) -> Self {
        Self::Read { variable, version }
    }

    pub const fn write(variable: Variable, version: Version) -> Self {
        Self::Write { variable, version }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    #[must_use]
    pub const fn variable(&self) -> &Variable {
        match self {
            Self::Read { variable, .. } | Self::Write { variable, .. } => variable,
        }
    }

    #[must_use]
    pub const fn version(&self) -> &Version {
        match self {
            Self::Read { version, .. } | Self::Write { version, .. } => version,
        }
    }
}

impl<Variable, Version> Display for Event<Variable, Version>
where
    Variable: Display,
    Version: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Write { variable, version } => write!(f, "{variable}:={version}"),
            Self::Read { variable, version } => write!(f, "{variable}=={version}"),
        }
    }
}

/// A sequence of events executed atomically.
///
/// Verification only accepts histories in which every transaction is
/// committed; `committed: false` is representable so loaders can surface
/// the violation as a structured error instead of panicking.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction<Variable, Version> {
    pub events: Vec<Event<Variable, Version>>,
    pub committed: bool,
}

impl<Variable, Version> Transaction<Variable, Version> {
    #[must_use]
    pub const fn committed(events: Vec<Event<Variable, Version>>) -> Self {
        Self {
            events,
            committed: true,
        }
    }

    #[must_use]
    pub const fn uncommitted(events: Vec<Event<Variable, Version>>) -> Self {
        Self {
            events,
            committed: false,
        }
    }
}

impl<Variable, Version> Display for Transaction<Variable, Version>
where
    Variable: Display,
    Version: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{event}")?;
        }
        write!(f, "]")?;
        if !self.committed {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// An ordered sequence of transactions from a single client.
pub type Session<Variable, Version> = Vec<Transaction<Variable, Version>>;

/// Identifies a transaction by its position in the history.
///
/// `session_id` is the 0-based index of the session, `session_height` the
/// 0-based position of the transaction within it. Ordering is
/// lexicographic, which gives every collection keyed by `TransactionId` a
/// stable iteration order.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId {
    pub session_id: u64,
    pub session_height: u64,
}

impl TransactionId {
    #[must_use]
    pub const fn new(session_id: u64, session_height: u64) -> Self {
        Self {
            session_id,
            session_height,
        }
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.session_id, self.session_height)
    }
}

/// Identifies a single event by session, transaction, and position.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId {
    pub session_id: u64,
    pub session_height: u64,
    pub transaction_height: u64,
}

impl EventId {
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId {
        TransactionId {
            session_id: self.session_id,
            session_height: self.session_height,
        }
    }
}

/// Iterate all transactions of a history with their ids, in session order.
pub fn transactions<Variable, Version>(
    sessions: &[Session<Variable, Version>],
) -> impl Iterator<Item = (TransactionId, &Transaction<Variable, Version>)> {
    sessions.iter().enumerate().flat_map(|(i_session, session)| {
        session.iter().enumerate().map(move |(i_txn, txn)| {
            (
                TransactionId::new(i_session as u64, i_txn as u64),
                txn,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accessors() {
        let w: Event<&str, u64> = Event::write("x", 1);
        assert!(w.is_write());
        assert_eq!(*w.variable(), "x");
        assert_eq!(*w.version(), 1);

        let r: Event<&str, u64> = Event::read("y", 2);
        assert!(!r.is_write());
        assert_eq!(*r.variable(), "y");
        assert_eq!(*r.version(), 2);
    }

    #[test]
    fn event_display() {
        assert_eq!(format!("{}", Event::<&str, u64>::write("x", 1)), "x:=1");
        assert_eq!(format!("{}", Event::<&str, u64>::read("x", 1)), "x==1");
    }

    #[test]
    fn transaction_display() {
        let txn = Transaction::committed(vec![Event::write("x", 1), Event::read("y", 2)]);
        assert_eq!(format!("{txn}"), "[x:=1 y==2]");
        let txn = Transaction::uncommitted(vec![Event::write("x", 1)]);
        assert_eq!(format!("{txn}"), "[x:=1]!");
    }

    #[test]
    fn transaction_iteration_order() {
        let sessions: Vec<Session<&str, u64>> = vec![
            vec![
                Transaction::committed(vec![Event::write("x", 1)]),
                Transaction::committed(vec![Event::write("x", 2)]),
            ],
            vec![Transaction::committed(vec![Event::read("x", 2)])],
        ];
        let ids: Vec<TransactionId> = transactions(&sessions).map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                TransactionId::new(0, 0),
                TransactionId::new(0, 1),
                TransactionId::new(1, 0),
            ]
        );
    }

    #[test]
    fn event_id_projects_transaction_id() {
        let event_id = EventId {
            session_id: 1,
            session_height: 2,
            transaction_height: 3,
        };
        assert_eq!(event_id.transaction_id(), TransactionId::new(1, 2));
    }
}
