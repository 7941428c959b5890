pub mod cache;
pub mod query;
pub mod video;

use crate::domain::error::FinsightError;
use std::future::Future;
use std::time::Duration;

/// Run a store operation, failing with `Timeout` once `limit` elapses
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, FinsightError>
where
    F: Future<Output = Result<T, FinsightError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(FinsightError::Timeout(operation)),
    }
}

/// First 50 characters, for log lines
pub(crate) fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("AAPL price"), "AAPL price");
        let long = "股".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "股".repeat(50)));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), FinsightError> = bounded(Duration::from_millis(10), "sleep", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(FinsightError::Timeout("sleep"))));
    }
}
