//! Classification of transport failures into integration errors.

use std::error::Error as StdError;
use std::io;

/// Known transport failures surfaced to callers of [`super::PostClient`].
///
/// These travel inside `anyhow::Error`; test for them with
/// `err.downcast_ref::<IntegrationError>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationError {
    /// The call did not finish before its deadline (connect or request).
    ConnectionTimeout,
    /// The remote side actively refused the connection.
    ConnectionRefused,
}

impl std::fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationError::ConnectionTimeout => {
                write!(f, "connection timed out for integration")
            }
            IntegrationError::ConnectionRefused => {
                write!(f, "integration connection refused")
            }
        }
    }
}

impl std::error::Error for IntegrationError {}

fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// Returns true if any error in the source chain is a refused connection.
pub fn is_conn_refused(err: &(dyn StdError + 'static)) -> bool {
    chain(err).any(|e| {
        e.downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::ConnectionRefused)
    })
}

/// Returns true if any error in the source chain reports an expired deadline.
pub fn is_deadline_exceeded(err: &(dyn StdError + 'static)) -> bool {
    chain(err).any(|e| {
        if e.downcast_ref::<reqwest::Error>()
            .is_some_and(|r| r.is_timeout())
        {
            return true;
        }
        if e.downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }
        if e.is::<tokio::time::error::Elapsed>() {
            return true;
        }
        e.to_string().contains("deadline exceeded")
    })
}

/// Maps a transport error onto an [`IntegrationError`] when it is a known
/// condition. Refused connections win over timeouts; anything else is
/// returned unchanged.
pub fn classify(error: reqwest::Error) -> anyhow::Error {
    match known_error(&error) {
        Some(known) => anyhow::Error::from(known),
        None => anyhow::Error::from(error),
    }
}

/// Returns the [`IntegrationError`] matching `err`, if any.
pub fn known_error(err: &(dyn StdError + 'static)) -> Option<IntegrationError> {
    if is_conn_refused(err) {
        Some(IntegrationError::ConnectionRefused)
    } else if is_deadline_exceeded(err) {
        Some(IntegrationError::ConnectionTimeout)
    } else {
        None
    }
}
