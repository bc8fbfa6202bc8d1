use std::net::SocketAddr;

use ccip_envelope::GatewaySigner;
use clap::Parser;

/// Value of `GATEWAY_PRIVATE_KEY` when nothing is configured. The zero
/// scalar is not a valid secp256k1 key, so it acts purely as a sentinel:
/// startup warns and signs with [`DEV_PRIVATE_KEY`] instead.
pub const PLACEHOLDER_PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Well-known development key (scalar 1). Its address is
/// 0x7e5f4552091a69125d5dfcb7b8c2659029395bdf.
pub const DEV_PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";

#[derive(Parser, Debug, Clone)]
#[command(name = "ccip-gateway", about = "CCIP-Read off-chain compute gateway")]
pub struct Config {
    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Gateway signing key (32-byte hex, `0x` prefix optional).
    /// Leave unset only in development; lookups are signed with this key
    /// and on-chain verifiers pin the derived address.
    #[arg(long, env = "GATEWAY_PRIVATE_KEY", default_value = PLACEHOLDER_PRIVATE_KEY, hide_default_value = true)]
    pub private_key: String,

    /// Provider identifier stamped into envelope metadata.
    #[arg(long, env = "GATEWAY_PROVIDER", default_value = "ens-compute-gateway")]
    pub provider: String,

    /// Endpoint name used for envelopes when a lookup omits `name`.
    #[arg(long, env = "GATEWAY_NAME", default_value = "pricefeed.eth")]
    pub gateway_name: String,
}

impl Config {
    /// True when the signing key is unset or the all-zero placeholder.
    /// Startup warns on this; the warning is part of the gateway's
    /// observable behavior.
    pub fn is_placeholder_key(&self) -> bool {
        let trimmed = self.private_key.trim().trim_start_matches("0x");
        trimmed.len() == 64 && trimmed.bytes().all(|b| b == b'0')
    }

    /// Load the signing key. The placeholder falls back to the development
    /// key; an explicitly configured but invalid key is fatal.
    pub fn signer(&self) -> anyhow::Result<GatewaySigner> {
        let hex_key = if self.is_placeholder_key() {
            DEV_PRIVATE_KEY
        } else {
            self.private_key.as_str()
        };
        Ok(GatewaySigner::from_hex(hex_key)?)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: &str) -> Config {
        Config::parse_from(["ccip-gateway", "--private-key", key])
    }

    #[test]
    fn default_key_is_placeholder() {
        let config = Config::parse_from(["ccip-gateway"]);
        assert!(config.is_placeholder_key());
        // The placeholder still yields a working signer (the dev key).
        let signer = config.signer().unwrap();
        assert_eq!(
            signer.address_hex(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
        );
    }

    #[test]
    fn placeholder_with_and_without_prefix() {
        assert!(config_with_key(&"0".repeat(64)).is_placeholder_key());
        assert!(config_with_key(PLACEHOLDER_PRIVATE_KEY).is_placeholder_key());
        assert!(!config_with_key(DEV_PRIVATE_KEY).is_placeholder_key());
    }

    #[test]
    fn invalid_configured_key_is_fatal() {
        assert!(config_with_key("not-hex").signer().is_err());
        assert!(config_with_key("0xabcd").signer().is_err());
    }

    #[test]
    fn port_default() {
        let config = Config::parse_from(["ccip-gateway"]);
        assert_eq!(config.port, 3000);
        assert!(config.listen_addr().is_ok());
    }
}
