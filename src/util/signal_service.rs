use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Token that is cancelled on the first Ctrl-C. The fetch loop only looks at
/// it between items, so an in-flight request always finishes first. A second
/// Ctrl-C exits with status 130 straight away.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn(watch_interrupts(
        tokio::signal::ctrl_c,
        token.clone(),
        || {
            std::process::exit(130);
        },
    ));
    token
}

async fn watch_interrupts<S, Fut, E>(mut signal: S, token: CancellationToken, force_exit: E)
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
    E: FnOnce(),
{
    if let Err(e) = signal().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        return;
    }
    tracing::info!("Interrupt received, stopping after the current comment...");
    tracing::info!("Press Ctrl-C again to exit immediately");
    token.cancel();

    if signal().await.is_ok() {
        tracing::warn!("Second interrupt, exiting without a final save");
        force_exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Fires `times` signals, then never fires again.
    fn signals(times: usize) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> {
        let mut fired = 0;
        move || {
            fired += 1;
            let n = fired;
            Box::pin(async move {
                if n <= times {
                    Ok(())
                } else {
                    std::future::pending().await
                }
            })
        }
    }

    #[tokio::test]
    async fn first_interrupt_only_cancels() {
        let token = CancellationToken::new();
        let exited = AtomicBool::new(false);

        let watcher = watch_interrupts(signals(1), token.clone(), || {
            exited.store(true, Ordering::SeqCst)
        });
        let result = tokio::time::timeout(Duration::from_millis(50), watcher).await;

        assert!(result.is_err());
        assert!(token.is_cancelled());
        assert!(!exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn second_interrupt_forces_exit() {
        let token = CancellationToken::new();
        let exited = AtomicBool::new(false);

        watch_interrupts(signals(2), token.clone(), || {
            exited.store(true, Ordering::SeqCst)
        })
        .await;

        assert!(token.is_cancelled());
        assert!(exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn listener_failure_leaves_the_token_alone() {
        let token = CancellationToken::new();
        let exited = AtomicBool::new(false);

        watch_interrupts(
            || async { Err(std::io::Error::other("no handler")) },
            token.clone(),
            || exited.store(true, Ordering::SeqCst),
        )
        .await;

        assert!(!token.is_cancelled());
        assert!(!exited.load(Ordering::SeqCst));
    }
}
