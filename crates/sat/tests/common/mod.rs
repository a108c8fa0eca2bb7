//! Compact DSL for building test histories.
//!
//! ```ignore
//! let sessions = history![
//!     [{ w(x, 1), w(y, 1) }],            // one session, one transaction
//!     [{ r(x, 1) }, { w(y, 2) }],        // one session, two transactions
//! ];
//! ```
//!
//! `w(var, val)` writes, `r(var, val)` reads; variables become `&'static
//! str`, values `u64`. All transactions are committed; uncommitted ones
//! are built directly where a test needs them.

/// Build a single committed-history event.
#[macro_export]
macro_rules! ev {
    (w($var:ident, $val:expr)) => {
        sicheck_core::history::types::Event::<&'static str, u64>::write(stringify!($var), $val)
    };
    (r($var:ident, $val:expr)) => {
        sicheck_core::history::types::Event::<&'static str, u64>::read(stringify!($var), $val)
    };
}

/// Build a full history: sessions in brackets, transactions in braces.
#[macro_export]
macro_rules! history {
    ($( [ $( { $($e:ident($($args:tt)*)),* $(,)? } ),* $(,)? ] ),* $(,)?) => {
        vec![
            $(
                vec![
                    $(
                        sicheck_core::history::types::Transaction::committed(
                            vec![ $( $crate::ev!($e($($args)*)) ),* ],
                        )
                    ),*
                ]
            ),*
        ]
    };
}
