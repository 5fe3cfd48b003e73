//! Chain metadata consumed by the configuration resolver.

const MAINNET_SERVICE: &str = "https://wallet.blocto.app";
const TESTNET_SERVICE: &str = "https://wallet-testnet.blocto.app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: u64,
    /// Chain name used in service paths, e.g. `/api/{chain}/accounts`.
    pub name: String,
    /// Network label (`mainnet`, `testnet`).
    pub network: String,
    /// Network id reported by `net_version`; `None` falls back to the chain id.
    pub network_id: Option<u64>,
    pub default_rpc: Option<String>,
    pub default_service: Option<String>,
}

impl ChainInfo {
    pub fn new(chain_id: u64, name: &str, network: &str) -> Self {
        Self {
            chain_id,
            name: name.to_owned(),
            network: network.to_owned(),
            network_id: None,
            default_rpc: None,
            default_service: None,
        }
    }

    pub fn with_rpc(mut self, rpc: &str) -> Self {
        self.default_rpc = Some(rpc.to_owned());
        self
    }

    pub fn with_service(mut self, service: &str) -> Self {
        self.default_service = Some(service.to_owned());
        self
    }

    pub fn with_network_id(mut self, network_id: u64) -> Self {
        self.network_id = Some(network_id);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    chains: Vec<ChainInfo>,
}

impl ChainTable {
    pub fn new(chains: Vec<ChainInfo>) -> Self {
        Self { chains }
    }

    /// Chains the hosted custody service supports out of the box.
    ///
    /// Ethereum mainnet deliberately ships without a node endpoint; callers
    /// must bring their own.
    pub fn builtin() -> Self {
        Self::new(vec![
            ChainInfo::new(1, "ethereum", "mainnet").with_service(MAINNET_SERVICE),
            ChainInfo::new(5, "ethereum", "testnet")
                .with_rpc("https://rpc.ankr.com/eth_goerli")
                .with_service(TESTNET_SERVICE),
            ChainInfo::new(56, "bsc", "mainnet")
                .with_rpc("https://bsc-dataseed.binance.org")
                .with_service(MAINNET_SERVICE),
            ChainInfo::new(97, "bsc", "testnet")
                .with_rpc("https://data-seed-prebsc-1-s1.binance.org:8545")
                .with_service(TESTNET_SERVICE),
            ChainInfo::new(137, "polygon", "mainnet")
                .with_rpc("https://polygon-rpc.com")
                .with_service(MAINNET_SERVICE),
            ChainInfo::new(80001, "polygon", "testnet")
                .with_rpc("https://rpc-mumbai.maticvigil.com")
                .with_service(TESTNET_SERVICE),
            ChainInfo::new(43114, "avalanche", "mainnet")
                .with_rpc("https://api.avax.network/ext/bc/C/rpc")
                .with_service(MAINNET_SERVICE),
            ChainInfo::new(43113, "avalanche", "testnet")
                .with_rpc("https://api.avax-test.network/ext/bc/C/rpc")
                .with_service(TESTNET_SERVICE),
        ])
    }

    pub fn lookup(&self, chain_id: u64) -> Option<&ChainInfo> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chains.iter().map(|c| c.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique() {
        let table = ChainTable::builtin();
        let mut ids: Vec<u64> = table.chain_ids().collect();
        let len = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), len);
    }

    #[test]
    fn mainnet_has_no_default_rpc() {
        let table = ChainTable::builtin();
        let mainnet = table.lookup(1).expect("mainnet present");
        assert!(mainnet.default_rpc.is_none());
        assert!(mainnet.default_service.is_some());
        assert!(table.lookup(424242).is_none());
    }
}
