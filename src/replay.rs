//! Makes request bodies re-sendable across attempts.

use tokio::io::AsyncReadExt as _;

use crate::{
    request::{BodyProducer, BodyReader},
    ClientError, RequestBody, RequestContext, Result,
};

/// Turns a request body into a producer that yields the same bytes for every attempt.
///
/// Replayable bodies are returned untouched. One-shot readers are drained into memory,
/// failing with [`ClientError::ReplayBodyTooLarge`] when they hold more than `limit` bytes.
pub(crate) async fn prepare_replay(
    ctx: &RequestContext,
    body: RequestBody,
    limit: Option<u64>,
) -> Result<Option<BodyProducer>> {
    match body {
        RequestBody::Empty => Ok(None),
        RequestBody::Replayable(producer) => Ok(Some(producer)),
        RequestBody::OneShot(reader) => {
            let buffered = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                buffered = buffer_body(reader, limit) => buffered?,
            };
            Ok(Some(BodyProducer::from_bytes(buffered)))
        }
    }
}

async fn buffer_body(mut reader: BodyReader, limit: Option<u64>) -> Result<Vec<u8>> {
    let mut buffered = Vec::new();
    match limit {
        Some(limit) => {
            // One byte past the limit is enough to tell that the body is too large.
            reader
                .take(limit.saturating_add(1))
                .read_to_end(&mut buffered)
                .await
                .map_err(ClientError::BodyRead)?;
            if buffered.len() as u64 > limit {
                return Err(ClientError::ReplayBodyTooLarge { limit });
            }
        }
        None => {
            reader
                .read_to_end(&mut buffered)
                .await
                .map_err(ClientError::BodyRead)?;
        }
    }
    Ok(buffered)
}
