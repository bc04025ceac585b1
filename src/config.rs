use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRaw {
    pub chain_id: u64,
    #[serde(default)]
    pub rpc: Option<String>,
    #[serde(default)]
    pub rpc_env_var: Option<String>,
    pub entry_point: String,
    #[serde(default)]
    pub eip7702_delegate: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    pub entry_point: Address,
    pub eip7702_delegate: Option<Address>,
}

pub fn load_deployment(path: &Path, rpc_override: Option<String>) -> Result<Deployment> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read deployment json at {}", path.display()))?;
    let raw: DeploymentRaw = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse deployment json at {}", path.display()))?;
    resolve(raw, rpc_override)
}

fn resolve(raw: DeploymentRaw, rpc_override: Option<String>) -> Result<Deployment> {
    let rpc_url = if rpc_override.is_some() {
        rpc_override
    } else if let Some(env_var) = raw.rpc_env_var.as_deref() {
        env::var(env_var).ok().or(raw.rpc.clone())
    } else {
        raw.rpc.clone()
    };

    let entry_point = parse_addr(&raw.entry_point).context("invalid entryPoint address")?;
    let eip7702_delegate = raw
        .eip7702_delegate
        .as_deref()
        .map(parse_addr)
        .transpose()
        .context("invalid eip7702Delegate address")?;

    Ok(Deployment {
        chain_id: raw.chain_id,
        rpc_url,
        entry_point,
        eip7702_delegate,
    })
}

pub fn parse_addr(s: &str) -> Result<Address> {
    s.parse::<Address>().map_err(|e| anyhow!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> DeploymentRaw {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn resolves_minimal_deployment() {
        let dep = resolve(
            raw(json!({
                "chainId": 1337,
                "entryPoint": "0x4337084d9e255ff0702461cf8895ce9e3b5ff108"
            })),
            None,
        )
        .unwrap();
        assert_eq!(dep.chain_id, 1337);
        assert!(dep.rpc_url.is_none());
        assert!(dep.eip7702_delegate.is_none());
    }

    #[test]
    fn rpc_override_wins() {
        let dep = resolve(
            raw(json!({
                "chainId": 1,
                "rpc": "http://from-file",
                "entryPoint": "0x4337084d9e255ff0702461cf8895ce9e3b5ff108",
                "eip7702Delegate": "0xd1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1"
            })),
            Some("http://override".to_string()),
        )
        .unwrap();
        assert_eq!(dep.rpc_url.as_deref(), Some("http://override"));
        assert_eq!(dep.eip7702_delegate, Some(Address::repeat_byte(0xd1)));
    }

    #[test]
    fn rejects_bad_addresses() {
        let res = resolve(
            raw(json!({ "chainId": 1, "entryPoint": "0x1234" })),
            None,
        );
        assert!(res.is_err());
    }
}
