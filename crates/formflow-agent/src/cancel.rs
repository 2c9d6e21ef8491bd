//! Cancellation of collaborator calls and streamed replies.

use crate::FlowError;
use formflow_contract::{CollaboratorError, MessageStream};
use futures::StreamExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub type RunCancellationToken = CancellationToken;

pub fn is_cancelled(token: Option<&RunCancellationToken>) -> bool {
    token.is_some_and(RunCancellationToken::is_cancelled)
}

/// Run `fut` unless the token fires first.
///
/// An already-cancelled token wins without polling `fut`. Without a token the
/// future simply runs.
pub async fn cancellable<T, F>(
    token: Option<&RunCancellationToken>,
    fut: F,
) -> Result<T, FlowError>
where
    F: Future<Output = T>,
{
    let Some(token) = token else {
        return Ok(fut.await);
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(FlowError::Cancelled),
        value = fut => Ok(value),
    }
}

/// End `messages` with an error chunk once the token fires.
pub fn cancellable_stream(
    token: Option<&RunCancellationToken>,
    messages: MessageStream,
) -> MessageStream {
    let Some(token) = token.cloned() else {
        return messages;
    };
    Box::pin(async_stream::stream! {
        let mut messages = messages;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                chunk = messages.next() => Some(chunk),
            };
            match next {
                Some(Some(chunk)) => yield chunk,
                Some(None) => break,
                None => {
                    yield Err(CollaboratorError::msg("dialogue_generator", "turn cancelled"));
                    break;
                }
            }
        }
    })
}
