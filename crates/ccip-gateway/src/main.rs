use std::{net::SocketAddr, sync::Arc};

use clap::Parser;

use ccip_gateway::{
    api::{build_router, AppState},
    config::Config,
    functions::StaticPricefeed,
    registry::ComputeRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccip_gateway=info".parse().unwrap()),
        )
        .init();

    let config = Config::parse();

    if config.is_placeholder_key() {
        tracing::warn!(
            "GATEWAY_PRIVATE_KEY is unset or all-zero. Signing with the built-in \
             development key; on-chain verifiers pinned to a production signer \
             will reject these responses. Set GATEWAY_PRIVATE_KEY in production."
        );
    }
    let signer = config.signer()?;
    tracing::info!(signer = %signer.address_hex(), "compute gateway starting");

    let mut registry = ComputeRegistry::new();
    registry.register("pricefeed", Arc::new(StaticPricefeed))?;
    tracing::info!(functions = ?registry.names(), "compute registry ready");

    let state = AppState::new(
        signer,
        registry,
        config.provider.clone(),
        config.gateway_name.clone(),
    );
    state.spawn_sweeper();

    let addr = config.listen_addr()?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
