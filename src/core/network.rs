//! Network-specific parameter bundles.
//!
//! Every value that differs between mainnet and testnet4 lives here so the
//! network choice propagates to every generated config from one place.

/// All values that change between networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    /// bitcoin.conf directive selecting the chain (empty for mainnet)
    pub bitcoin_conf_flag: &'static str,
    /// lnd.conf chain flag
    pub lnd_chain_flag: &'static str,
    pub rpc_port: u16,
    pub p2p_port: u16,
    pub zmq_block_port: u16,
    pub zmq_tx_port: u16,
    /// --network flag for lncli
    pub lncli_network: &'static str,
    /// RPC auth cookie path relative to the data directory
    pub cookie_path: &'static str,
    /// chain data subdirectory under the data directory (empty for mainnet)
    pub data_subdir: &'static str,
}

pub const MAINNET: NetworkParams = NetworkParams {
    name: "mainnet",
    bitcoin_conf_flag: "",
    lnd_chain_flag: "bitcoin.mainnet=true",
    rpc_port: 8332,
    p2p_port: 8333,
    zmq_block_port: 28332,
    zmq_tx_port: 28333,
    lncli_network: "mainnet",
    cookie_path: ".cookie",
    data_subdir: "",
};

pub const TESTNET4: NetworkParams = NetworkParams {
    name: "testnet4",
    bitcoin_conf_flag: "testnet4=1",
    lnd_chain_flag: "bitcoin.testnet4=true",
    rpc_port: 48332,
    p2p_port: 48333,
    zmq_block_port: 28334,
    zmq_tx_port: 28335,
    lncli_network: "testnet4",
    cookie_path: "testnet4/.cookie",
    data_subdir: "testnet4",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networks_use_distinct_ports() {
        assert_ne!(MAINNET.rpc_port, TESTNET4.rpc_port);
        assert_ne!(MAINNET.p2p_port, TESTNET4.p2p_port);
        assert_ne!(MAINNET.zmq_block_port, TESTNET4.zmq_block_port);
        assert_ne!(MAINNET.zmq_tx_port, TESTNET4.zmq_tx_port);
    }

    #[test]
    fn mainnet_has_no_chain_flag() {
        assert!(MAINNET.bitcoin_conf_flag.is_empty());
        assert!(MAINNET.data_subdir.is_empty());
        assert_eq!(TESTNET4.bitcoin_conf_flag, "testnet4=1");
    }
}
