pub mod clock;
pub mod config;
#[cfg(target_arch = "wasm32")]
pub mod injected;
pub mod node;
pub mod service;
pub mod surface;

pub use clock::SystemClockAdapter;
pub use config::AdapterConfig;
#[cfg(target_arch = "wasm32")]
pub use injected::InjectedProviderAdapter;
pub use node::NodeRpcAdapter;
pub use service::CustodyServiceAdapter;
#[cfg(target_arch = "wasm32")]
pub use surface::BrowserSurfaceHost;
pub use surface::InProcessSurfaceHost;

use custody_bridge_core::{
    ChainTable, Provider, ProviderConfig, ProviderError, ProviderOptions, SurfaceHost,
};

pub type CustodyProvider<H> = Provider<NodeRpcAdapter, CustodyServiceAdapter, H, SystemClockAdapter>;

/// Resolves configuration and wires the HTTP adapters around `host`.
pub fn connect_provider<H: SurfaceHost>(
    options: &ProviderOptions,
    host: H,
    config: &AdapterConfig,
) -> Result<CustodyProvider<H>, ProviderError> {
    let resolved = ProviderConfig::resolve(options, &config.env, &ChainTable::builtin())?;
    let client = config.http_client()?;
    let node = NodeRpcAdapter::new(resolved.node_endpoint.clone(), client.clone());
    let service = CustodyServiceAdapter::new(resolved.service_endpoint.as_deref(), client)?;
    tracing::info!(
        chain_id = resolved.chain_id,
        chain = resolved.chain_name(),
        node = %resolved.node_endpoint,
        "custody provider configured"
    );
    let provider = Provider::new(resolved, node, service, host, SystemClockAdapter)
        .with_poll_interval(config.poll_interval());
    Ok(with_injected_provider(provider, config))
}

/// Browser entry point: iframe surfaces plus process-level overrides.
#[cfg(target_arch = "wasm32")]
pub fn connect_browser_provider(
    options: &ProviderOptions,
) -> Result<CustodyProvider<BrowserSurfaceHost>, ProviderError> {
    connect_provider(options, BrowserSurfaceHost::new(), &AdapterConfig::from_env())
}

#[cfg(target_arch = "wasm32")]
fn with_injected_provider<H: SurfaceHost>(
    provider: CustodyProvider<H>,
    config: &AdapterConfig,
) -> CustodyProvider<H> {
    match InjectedProviderAdapter::detect(&config.host_provider_marker) {
        Some(injected) => provider.with_host_provider(Box::new(injected)),
        None => provider,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn with_injected_provider<H: SurfaceHost>(
    provider: CustodyProvider<H>,
    _config: &AdapterConfig,
) -> CustodyProvider<H> {
    provider
}
