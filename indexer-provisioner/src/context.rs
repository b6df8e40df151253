use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sts as sts;
use aws_types::region::Region;
use tracing::debug;

use crate::types::AccountContext;

/// Source of the account/region the stack is composed for.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self) -> Result<AccountContext>;
}

/// Explicit values (env overrides or mock fixtures).
pub struct StaticContextResolver {
    account_id: String,
    region: String,
}

impl StaticContextResolver {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), region: region.into() }
    }
}

#[async_trait]
impl ContextResolver for StaticContextResolver {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self) -> Result<AccountContext> {
        Ok(AccountContext::new(self.account_id.clone(), self.region.clone())?)
    }
}

/// Caller identity from STS; region from the default provider chain unless
/// pinned.
pub struct StsContextResolver {
    region: Option<String>,
}

impl StsContextResolver {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

#[async_trait]
impl ContextResolver for StsContextResolver {
    fn name(&self) -> &'static str {
        "sts"
    }

    async fn resolve(&self) -> Result<AccountContext> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(r) = &self.region {
            loader = loader.region(Region::new(r.clone()));
        }
        let conf = loader.load().await;
        let region = conf
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| anyhow!("no AWS region configured"))?;

        let who = sts::Client::new(&conf).get_caller_identity().send().await?;
        let account = who.account().ok_or_else(|| anyhow!("STS returned no account id"))?;
        debug!(account, region = %region, "resolved caller identity");
        Ok(AccountContext::new(account, region)?)
    }
}

/// Static when both values are given, STS otherwise.
pub fn resolver_for(account_id: Option<String>, region: Option<String>) -> Box<dyn ContextResolver> {
    match (account_id, region) {
        (Some(account), Some(region)) => Box::new(StaticContextResolver::new(account, region)),
        (_, region) => Box::new(StsContextResolver::new(region)),
    }
}
