use privnode::status::NodeStatus;
use privnode::{config, status, Error, Result};

/// Report service, onion and storage state for a provisioned node.
pub fn run() -> Result<NodeStatus> {
    if config::needs_install() {
        return Err(Error::preflight_not_installed());
    }
    status::collect()
}
