use crate::stack::ComposedStack;
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_TIMEOUT: u64 = 5;
const READ_TIMEOUT: u64 = 60;
const RETRIES: usize = 3;

/// Hands the composed stack to the provisioning engine. Composition is pure,
/// so re-posting the same document is always safe.
pub async fn post_stack(endpoint: &str, stack: &ComposedStack) -> Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
        .timeout(Duration::from_secs(READ_TIMEOUT))
        .build()?;

    let mut last = None;
    for attempt in 1..=RETRIES {
        match client.post(endpoint).json(stack).send().await {
            Ok(r) if r.status().is_success() => {
                info!(endpoint, attempt, "stack delivered");
                return Ok(());
            }
            // 4xx means the document was rejected; retrying won't help
            Ok(r) if r.status().is_client_error() => {
                let code = r.status();
                let body = r.text().await.unwrap_or_default();
                return Err(anyhow!("POST {endpoint} rejected: {code} - {body}"));
            }
            Ok(r) => last = Some(anyhow!("HTTP {} {}", r.status(), r.text().await.unwrap_or_default())),
            Err(e) => last = Some(anyhow!(e)),
        }
        warn!(endpoint, attempt, "stack delivery failed, retrying");
        tokio::time::sleep(Duration::from_millis(300 * attempt as u64)).await;
    }
    Err(last.unwrap_or_else(|| anyhow!("stack delivery failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let stack = mock::stack().unwrap();
        // port 9 (discard) on loopback is closed in test environments
        let res = post_stack("http://127.0.0.1:9/api/stacks", &stack).await;
        assert!(res.is_err());
    }
}
