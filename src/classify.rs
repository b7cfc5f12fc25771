//! Classification of transport errors into transient and terminal failures.

use std::{error::Error as StdError, io};

use crate::ClientError;

/// Returns `true` if a transport error is worth retrying.
///
/// The whole source chain is inspected. Cancellation and deadline errors are never
/// retried, wherever they appear in the chain. Closed or reset connections, timeouts,
/// unreachable networks, broken pipes, truncated streams and temporary DNS failures are
/// retried. Everything else (malformed URLs, TLS failures, ...) is terminal.
pub fn is_retryable_transport_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    let mut retryable = false;

    while let Some(err) = current {
        if err
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_context_error)
        {
            return false;
        }
        retryable = retryable || is_transient(err);
        current = err.source();
    }

    retryable
}

fn is_transient(err: &(dyn StdError + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<reqwest::Error>() {
        return err.is_timeout();
    }
    if let Some(err) = err.downcast_ref::<hyper::Error>() {
        return err.is_closed()
            || err.is_incomplete_message()
            || err.is_canceled()
            || err.is_timeout();
    }
    if let Some(err) = err.downcast_ref::<io::Error>() {
        return is_transient_io(err) || is_temporary_dns_failure(err);
    }
    if err.is::<tokio::time::error::Elapsed>() {
        return true;
    }
    is_temporary_dns_failure(err)
}

fn is_transient_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
    )
}

// Resolvers only surface EAI_AGAIN through the error message.
fn is_temporary_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("temporary failure in name resolution")
        || (message.contains("dns") && message.contains("try again"))
}
