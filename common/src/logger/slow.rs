use std::future::Future;
use std::time::{Duration, Instant};

/// Awaits `fut` and emits a `performance` warning when it takes longer
/// than `max`. The output is passed through untouched.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn fast_operation_is_silent() {
        let v = warn_if_slow("fast", Duration::from_secs(5), async { 7 }).await;
        assert_eq!(v, 7);
        assert!(!logs_contain("slow operation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn slow_operation_is_reported() {
        let v = warn_if_slow("sleepy", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "done"
        })
        .await;
        assert_eq!(v, "done");
        assert!(logs_contain("slow operation detected"));
    }
}
