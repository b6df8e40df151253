use anyhow::Result;
use indexer_provisioner::config::ProvisionerConfig;
use indexer_provisioner::context::resolver_for;
use indexer_provisioner::out::{self, OutMode};
use indexer_provisioner::{compose_stack, mock};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = ProvisionerConfig::from_env()?;

    let stack = if cfg.mock {
        info!("mock mode: composing from built-in fixtures");
        mock::stack_for(&cfg.node_specs, &cfg.cluster)?
    } else {
        let resolver = resolver_for(cfg.account_id.clone(), cfg.region.clone());
        let ctx = resolver.resolve().await?;
        info!(resolver = resolver.name(), account = %ctx.account_id, region = %ctx.region, "account context");

        compose_stack(
            &ctx,
            &cfg.placement()?,
            &cfg.cluster,
            &cfg.node_specs,
            &cfg.load_assets()?,
            &cfg.load_template()?,
        )?
    };

    match cfg.out {
        OutMode::Stdout => out::emit_stdout(&stack)?,
        OutMode::Http => out::http::post_stack(&cfg.endpoint, &stack).await?,
    }
    Ok(())
}
