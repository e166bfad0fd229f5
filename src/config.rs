//! Startup configuration from command line flags or environment variables.

use crate::contract::abi::{DescriptorError, InterfaceDescriptor, MethodNames};
use reqwest::Url;
use std::{
    fmt::{self, Debug, Formatter},
    fs, io,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

#[derive(Clone, clap::Args)]
pub struct Config {
    /// Address of the deployed voting contract.
    #[arg(long, env = "VOTING_CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    /// Node endpoint used for headless signing.
    #[arg(long, env = "VOTING_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Hex encoded private key. Enables headless mode and requires an RPC
    /// URL.
    #[arg(long, env = "VOTING_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: Option<String>,

    /// JSON RPC endpoint of a wallet holding the accounts, for example a node
    /// with unlocked accounts. Falls back to the RPC URL.
    #[arg(long, env = "VOTING_WALLET_URL")]
    pub wallet_url: Option<Url>,

    /// Solidity JSON ABI of the voting contract. The built-in interface is
    /// used when not set.
    #[arg(long, env = "VOTING_ABI_PATH")]
    pub abi_path: Option<PathBuf>,

    /// Interval for polling transaction receipts and wallet accounts.
    #[arg(long, env = "VOTING_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

/// How the client obtains its signing identity.
pub enum Mode {
    /// Sign locally with a private key, talking to a node.
    Headless { key: String, rpc_url: Url },
    /// Ask a wallet provider for account access. Without a wallet endpoint
    /// no provider is present.
    Interactive { wallet_url: Option<Url> },
}

impl Config {
    /// The configured contract address.
    pub fn contract_address(&self) -> Result<&str, ConfigError> {
        self.contract_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or(ConfigError::MissingContractAddress)
    }

    /// Resolves the signing mode.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        match (&self.signing_key, &self.rpc_url) {
            (Some(key), Some(rpc_url)) => Ok(Mode::Headless {
                key: key.clone(),
                rpc_url: rpc_url.clone(),
            }),
            (Some(_), None) => Err(ConfigError::MissingRpcEndpoint),
            (None, rpc_url) => Ok(Mode::Interactive {
                wallet_url: self.wallet_url.clone().or_else(|| rpc_url.clone()),
            }),
        }
    }

    /// Loads the contract interface descriptor.
    pub fn descriptor(&self) -> Result<InterfaceDescriptor, ConfigError> {
        let Some(path) = &self.abi_path else {
            return Ok(InterfaceDescriptor::voting());
        };
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Abi {
            path: path.clone(),
            source,
        })?;
        Ok(InterfaceDescriptor::from_abi_json(
            &json,
            &MethodNames::default(),
        )?)
    }

    /// The polling interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(Duration::from_millis(self.poll_interval_ms))
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("contract_address", &self.contract_address)
            .field("rpc_url", &self.rpc_url.as_ref().map(Url::as_str))
            .field(
                "signing_key",
                &self.signing_key.as_ref().map(|_| "<redacted>"),
            )
            .field("wallet_url", &self.wallet_url.as_ref().map(Url::as_str))
            .field("abi_path", &self.abi_path)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

/// An invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no contract address configured (VOTING_CONTRACT_ADDRESS)")]
    MissingContractAddress,

    #[error("a signing key requires an RPC URL (VOTING_RPC_URL)")]
    MissingRpcEndpoint,

    #[error("poll interval must be positive")]
    ZeroPollInterval,

    #[error("failed to read ABI from {}: {source}", path.display())]
    Abi { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        Cli::try_parse_from(std::iter::once("voting-client").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn contract_address_is_required() {
        let config = parse(&[]);
        assert!(matches!(
            config.contract_address(),
            Err(ConfigError::MissingContractAddress)
        ));

        let config = parse(&["--contract-address", " 0x5FbDB2315678afecb367f032d93F642f64180aa3 "]);
        assert_eq!(
            config.contract_address().unwrap(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
    }

    #[test]
    fn signing_key_requires_rpc_url() {
        let config = parse(&["--signing-key", "0x01"]);
        assert!(matches!(config.mode(), Err(ConfigError::MissingRpcEndpoint)));

        let config = parse(&["--signing-key", "0x01", "--rpc-url", "http://localhost:8545"]);
        assert!(matches!(config.mode(), Ok(Mode::Headless { .. })));
    }

    #[test]
    fn interactive_wallet_falls_back_to_rpc_url() {
        let config = parse(&["--rpc-url", "http://localhost:8545"]);
        let Ok(Mode::Interactive { wallet_url }) = config.mode() else {
            panic!("expected interactive mode");
        };
        assert_eq!(wallet_url.unwrap().as_str(), "http://localhost:8545/");

        let config = parse(&[]);
        assert!(matches!(
            config.mode(),
            Ok(Mode::Interactive { wallet_url: None })
        ));
    }

    #[test]
    fn debug_redacts_signing_key() {
        let config = parse(&["--signing-key", "0xdeadbeef"]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn poll_interval() {
        assert_eq!(
            parse(&[]).poll_interval().unwrap(),
            Duration::from_secs(1)
        );
        assert!(matches!(
            parse(&["--poll-interval-ms", "0"]).poll_interval(),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn missing_abi_file() {
        let config = parse(&["--abi-path", "/nonexistent/voting.json"]);
        assert!(matches!(config.descriptor(), Err(ConfigError::Abi { .. })));
        assert_eq!(
            parse(&[]).descriptor().unwrap(),
            InterfaceDescriptor::voting()
        );
    }
}
