use std::future::Future;
use std::time::Duration;
use tap_types::{LedgerError, LedgerResult, TapError, TapResult};
use tracing::warn;

/// Run one ledger call under `limit`.
///
/// Ledger failures keep their original form inside the resulting `TapError`.
pub(crate) async fn ledger_call<T, F>(op: &'static str, limit: Duration, call: F) -> TapResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(|e| {
            warn!(op, error = %e, "ledger call failed");
            TapError::from(e)
        }),
        Err(_) => {
            warn!(op, ?limit, "ledger call timed out");
            Err(TapError::LedgerUnavailable(LedgerError::Timeout(limit)))
        }
    }
}

/// True for failures where the ledger's answer is unknown rather than negative.
pub(crate) fn is_unreachable(err: &TapError) -> bool {
    matches!(
        err,
        TapError::LedgerUnavailable(LedgerError::Transport(_) | LedgerError::Timeout(_))
    )
}
