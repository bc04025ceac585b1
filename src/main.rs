mod config;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{load_deployment, parse_addr, Deployment};
use ethers::prelude::*;
use ethers::providers::Middleware;
use ethers::utils::to_checksum;
use opensub_userop::encoding::{
    fmt_address, fmt_bytes, fmt_h256, fmt_u256, packed_user_op_to_json, parse_bytes, parse_u256,
};
use opensub_userop::paymaster::{
    encode_paymaster_signature, inspect_trailer, paymaster_signature, PaymasterTrailer,
    PAYMASTER_DATA_OFFSET,
};
use opensub_userop::{
    pack_user_op, sign_user_op, user_op_hash, Authorization, DelegationTransaction,
    PackedUserOperation, SignedAuthorization, SignedDelegationTransaction, UserOperation,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Gas limit for a delegation transaction when none is given.
const DEFAULT_GAS_LIMIT: u64 = 21_000;

#[derive(Parser, Debug)]
#[command(name = "opensub-userop", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack a UserOperation JSON into its EntryPoint v0.7 on-chain form.
    Pack(PackArgs),

    /// Compute the userOpHash of a loose or packed UserOperation.
    Hash(HashArgs),

    /// Hash and sign a UserOperation with the owner key (EIP-191).
    SignOp(HashArgs),

    /// Sign an EIP-7702 authorization delegating the owner EOA to a contract.
    Authorize(AuthorizeArgs),

    /// Recover the authority of a signed EIP-7702 authorization.
    Recover(RecoverArgs),

    /// Build and sign a raw type-4 transaction carrying authorizations.
    ///
    /// The transaction is printed, never broadcast.
    RawTx(RawTxArgs),

    /// Decode a raw type-4 transaction and recover its signers.
    DecodeTx(DecodeTxArgs),

    /// Frame a paymaster signature, or inspect the trailer of paymasterAndData.
    PaymasterSig(PaymasterSigArgs),
}

#[derive(Args, Debug)]
struct ChainArgs {
    /// Optional deployment artifact (chainId, rpc, entryPoint, eip7702Delegate).
    #[arg(long)]
    deployment: Option<PathBuf>,

    /// Chain RPC URL, used only to look up values that were not given.
    #[arg(long, env = "OPENSUB_AA_RPC_URL")]
    rpc: Option<String>,

    /// Chain id (overrides the deployment artifact and the RPC).
    #[arg(long)]
    chain_id: Option<u64>,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// UserOperation JSON file (camelCase, bundler shape).
    #[arg(long)]
    op: PathBuf,
}

#[derive(Args, Debug)]
struct HashArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// UserOperation JSON file.
    #[arg(long)]
    op: PathBuf,

    /// Treat --op as an already-packed operation.
    #[arg(long, default_value_t = false)]
    packed: bool,

    /// EntryPoint address.
    #[arg(long, env = "OPENSUB_AA_ENTRYPOINT")]
    entrypoint: Option<String>,

    /// Delegate contract hashed in place of the factory for EIP-7702 operations.
    #[arg(long, env = "OPENSUB_AA_EIP7702_DELEGATE")]
    eip7702_delegate: Option<String>,

    /// Owner private key (only used by sign-op).
    ///
    /// Recommended: set via env var OPENSUB_AA_OWNER_PRIVATE_KEY.
    #[arg(long, env = "OPENSUB_AA_OWNER_PRIVATE_KEY", hide_env_values = true)]
    owner_private_key: Option<String>,
}

#[derive(Args, Debug)]
struct AuthorizeArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// Contract the EOA delegates its code to.
    #[arg(long, env = "OPENSUB_AA_EIP7702_DELEGATE")]
    delegate: Option<String>,

    /// Authority account nonce at execution time (looked up via --rpc when omitted).
    #[arg(long)]
    nonce: Option<String>,

    /// Owner private key (the authority).
    #[arg(long, env = "OPENSUB_AA_OWNER_PRIVATE_KEY", hide_env_values = true)]
    owner_private_key: Option<String>,
}

#[derive(Args, Debug)]
struct RecoverArgs {
    /// Signed authorization JSON file.
    #[arg(long)]
    auth: PathBuf,
}

#[derive(Args, Debug)]
struct RawTxArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// Destination of the transaction's main call.
    #[arg(long)]
    to: String,

    /// Calldata of the main call.
    #[arg(long, default_value = "0x")]
    data: String,

    /// Value in wei (hex or decimal).
    #[arg(long, default_value = "0")]
    value: String,

    /// Signed authorization JSON file; repeat for several.
    #[arg(long = "auth")]
    auths: Vec<PathBuf>,

    /// Sender nonce (looked up via --rpc when omitted).
    #[arg(long)]
    nonce: Option<String>,

    /// maxFeePerGas in wei (looked up via --rpc when omitted).
    #[arg(long)]
    max_fee_per_gas: Option<String>,

    /// maxPriorityFeePerGas in wei (defaults to maxFeePerGas).
    #[arg(long)]
    max_priority_fee_per_gas: Option<String>,

    #[arg(long)]
    gas_limit: Option<String>,

    /// Sender private key.
    #[arg(long, env = "OPENSUB_AA_OWNER_PRIVATE_KEY", hide_env_values = true)]
    owner_private_key: Option<String>,
}

#[derive(Args, Debug)]
struct DecodeTxArgs {
    /// Raw transaction hex (0x04...).
    #[arg(long)]
    raw: String,
}

#[derive(Args, Debug)]
struct PaymasterSigArgs {
    /// Signature to frame as `sig || len(2) || magic(8)`.
    #[arg(long, conflicts_with = "parse")]
    encode: Option<String>,

    /// paymasterAndData blob whose trailer should be inspected.
    #[arg(long)]
    parse: Option<String>,

    /// Static prefix that can never hold signature bytes.
    #[arg(long, default_value_t = PAYMASTER_DATA_OFFSET)]
    lead_in: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        // stdout carries only the command's JSON output
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Pack(args) => cmd_pack(args),
        Command::Hash(args) => cmd_hash(args, false).await,
        Command::SignOp(args) => cmd_hash(args, true).await,
        Command::Authorize(args) => cmd_authorize(args).await,
        Command::Recover(args) => cmd_recover(args),
        Command::RawTx(args) => cmd_raw_tx(args).await,
        Command::DecodeTx(args) => cmd_decode_tx(args),
        Command::PaymasterSig(args) => cmd_paymaster_sig(args),
    }
}

fn cmd_pack(args: PackArgs) -> Result<()> {
    let op: UserOperation = read_json(&args.op)?;
    let packed = pack_user_op(&op).context("failed to pack userOp")?;
    println!("{}", packed_user_op_to_json(&packed));
    Ok(())
}

async fn cmd_hash(args: HashArgs, sign: bool) -> Result<()> {
    let ctx = ChainContext::load(&args.chain)?;
    let chain_id = ctx.chain_id().await?;

    let entry_point = match args.entrypoint.as_deref() {
        Some(s) => parse_addr(s).context("invalid --entrypoint address")?,
        None => ctx
            .deployment
            .as_ref()
            .map(|d| d.entry_point)
            .ok_or_else(|| anyhow!("missing OPENSUB_AA_ENTRYPOINT (or --entrypoint)"))?,
    };
    let delegate = match args.eip7702_delegate.as_deref() {
        Some(s) => Some(parse_addr(s).context("invalid --eip7702-delegate address")?),
        None => ctx.deployment.as_ref().and_then(|d| d.eip7702_delegate),
    };

    if args.packed {
        if sign {
            return Err(anyhow!("sign-op takes a loose userOp; drop --packed"));
        }
        let op: PackedUserOperation = read_json(&args.op)?;
        let hash = op
            .hash(entry_point, chain_id, delegate)
            .context("failed to hash packed userOp")?;
        println!("{}", serde_json::json!({ "userOpHash": fmt_h256(hash) }));
        return Ok(());
    }

    let op: UserOperation = read_json(&args.op)?;
    let hash =
        user_op_hash(&op, entry_point, chain_id, delegate).context("failed to hash userOp")?;
    tracing::info!(userop_hash = %fmt_h256(hash), chain_id, "computed userOpHash");

    let mut out = serde_json::json!({ "userOpHash": fmt_h256(hash) });
    if sign {
        let wallet = load_owner(args.owner_private_key.as_deref())?;
        let signature = sign_user_op(&wallet, &op, entry_point, chain_id, delegate)
            .context("failed to sign userOp")?;
        out["signer"] = fmt_address(wallet.address()).into();
        out["signature"] = fmt_bytes(&signature).into();
    }
    println!("{out}");
    Ok(())
}

async fn cmd_authorize(args: AuthorizeArgs) -> Result<()> {
    let ctx = ChainContext::load(&args.chain)?;
    let chain_id = ctx.chain_id().await?;
    let wallet = load_owner(args.owner_private_key.as_deref())?;

    let delegate = match args.delegate.as_deref() {
        Some(s) => parse_addr(s).context("invalid --delegate address")?,
        None => ctx
            .deployment
            .as_ref()
            .and_then(|d| d.eip7702_delegate)
            .ok_or_else(|| anyhow!("missing OPENSUB_AA_EIP7702_DELEGATE (or --delegate)"))?,
    };
    let nonce = match args.nonce.as_deref() {
        Some(s) => parse_u256(s).context("invalid --nonce")?,
        None => ctx.account_nonce(wallet.address()).await?,
    };

    let signed = Authorization {
        chain_id: U256::from(chain_id),
        address: delegate,
        nonce,
    }
    .sign(&wallet)
    .context("failed to sign authorization")?;
    tracing::info!(
        authority = %to_checksum(&wallet.address(), None),
        delegate = %fmt_address(delegate),
        %nonce,
        "signed eip-7702 authorization"
    );

    println!("{}", serde_json::to_string(&signed)?);
    Ok(())
}

fn cmd_recover(args: RecoverArgs) -> Result<()> {
    let auth: SignedAuthorization = read_json(&args.auth)?;
    let authority = auth
        .recover_authority_checksummed()
        .context("failed to recover authority")?;
    println!("{}", serde_json::json!({ "authority": authority }));
    Ok(())
}

async fn cmd_raw_tx(args: RawTxArgs) -> Result<()> {
    let ctx = ChainContext::load(&args.chain)?;
    let chain_id = ctx.chain_id().await?;
    let wallet = load_owner(args.owner_private_key.as_deref())?;

    let authorization_list = args
        .auths
        .iter()
        .map(|p| read_json::<SignedAuthorization>(p))
        .collect::<Result<Vec<_>>>()?;
    if authorization_list.is_empty() {
        tracing::warn!("no --auth given; the transaction installs no delegation");
    }

    let nonce = match args.nonce.as_deref() {
        Some(s) => parse_u256(s).context("invalid --nonce")?,
        None => ctx.account_nonce(wallet.address()).await?,
    };
    let max_fee_per_gas = match args.max_fee_per_gas.as_deref() {
        Some(s) => parse_u256(s).context("invalid --max-fee-per-gas")?,
        None => ctx.gas_price().await?,
    };
    let max_priority_fee_per_gas = match args.max_priority_fee_per_gas.as_deref() {
        Some(s) => parse_u256(s).context("invalid --max-priority-fee-per-gas")?,
        None => max_fee_per_gas,
    };
    let gas_limit = match args.gas_limit.as_deref() {
        Some(s) => parse_u256(s).context("invalid --gas-limit")?,
        None => U256::from(DEFAULT_GAS_LIMIT),
    };

    let tx = DelegationTransaction {
        chain_id: U256::from(chain_id),
        nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit,
        to: parse_addr(&args.to).context("invalid --to address")?,
        value: parse_u256(&args.value).context("invalid --value")?,
        data: parse_bytes(&args.data).context("invalid --data hex")?,
        authorization_list,
    };
    let signed = tx.sign(&wallet).context("failed to sign transaction")?;

    println!(
        "{}",
        serde_json::json!({
            "raw": fmt_bytes(&signed.encode()),
            "hash": fmt_h256(signed.hash()),
            "from": fmt_address(wallet.address()),
        })
    );
    Ok(())
}

fn cmd_decode_tx(args: DecodeTxArgs) -> Result<()> {
    let raw = parse_bytes(&args.raw).context("invalid --raw hex")?;
    let signed = SignedDelegationTransaction::decode(&raw).context("failed to decode transaction")?;
    let from = signed
        .recover_sender()
        .context("failed to recover sender")?;

    let mut authorities = Vec::with_capacity(signed.tx.authorization_list.len());
    for auth in &signed.tx.authorization_list {
        // an invalid authorization is skipped on-chain, not fatal
        let authority = match auth.recover_authority_checksummed() {
            Ok(a) => serde_json::Value::from(a),
            Err(e) => {
                tracing::warn!(error = %e, "authorization does not recover");
                serde_json::Value::Null
            }
        };
        authorities.push(authority);
    }

    println!(
        "{}",
        serde_json::json!({
            "hash": fmt_h256(signed.hash()),
            "from": to_checksum(&from, None),
            "tx": signed.tx,
            "yParity": fmt_u256(U256::from(signed.y_parity)),
            "r": fmt_u256(signed.r),
            "s": fmt_u256(signed.s),
            "authorities": authorities,
        })
    );
    Ok(())
}

fn cmd_paymaster_sig(args: PaymasterSigArgs) -> Result<()> {
    if let Some(sig) = args.encode.as_deref() {
        let sig = parse_bytes(sig).context("invalid --encode hex")?;
        let framed = encode_paymaster_signature(&sig)?;
        println!("{}", serde_json::json!({ "suffix": fmt_bytes(&framed) }));
        return Ok(());
    }

    let blob = args
        .parse
        .as_deref()
        .ok_or_else(|| anyhow!("pass --encode <sig> or --parse <paymasterAndData>"))?;
    let blob = parse_bytes(blob).context("invalid --parse hex")?;
    let out = match inspect_trailer(&blob, args.lead_in)? {
        PaymasterTrailer::TooShort => serde_json::json!({ "framed": false, "tooShort": true }),
        PaymasterTrailer::Unframed => serde_json::json!({ "framed": false, "tooShort": false }),
        PaymasterTrailer::Framed { len } => serde_json::json!({
            "framed": true,
            "length": len,
            "signature": fmt_bytes(paymaster_signature(&blob, args.lead_in)?),
        }),
    };
    println!("{out}");
    Ok(())
}

/// Chain-level values from flags, the deployment artifact and, as a last
/// resort, the RPC.
struct ChainContext {
    chain_id: Option<u64>,
    deployment: Option<Deployment>,
    provider: Option<Provider<Http>>,
}

impl ChainContext {
    fn load(args: &ChainArgs) -> Result<Self> {
        let deployment = args
            .deployment
            .as_deref()
            .map(|p| load_deployment(p, args.rpc.clone()))
            .transpose()?;
        let rpc_url = match deployment.as_ref() {
            Some(d) => d.rpc_url.clone(),
            None => args.rpc.clone(),
        };
        let provider = rpc_url
            .as_deref()
            .map(|url| {
                Provider::<Http>::try_from(url)
                    .map(|p| p.interval(Duration::from_millis(350)))
                    .with_context(|| format!("invalid RPC url {url}"))
            })
            .transpose()?;

        Ok(Self {
            chain_id: args.chain_id.or(deployment.as_ref().map(|d| d.chain_id)),
            deployment,
            provider,
        })
    }

    fn provider(&self, what: &str) -> Result<&Provider<Http>> {
        self.provider
            .as_ref()
            .ok_or_else(|| anyhow!("{what} not given and no RPC configured (--rpc or OPENSUB_AA_RPC_URL)"))
    }

    async fn chain_id(&self) -> Result<u64> {
        let rpc_chain_id = match self.provider.as_ref() {
            Some(p) => Some(p.get_chainid().await.context("eth_chainId failed")?.as_u64()),
            None => None,
        };
        match (self.chain_id, rpc_chain_id) {
            (Some(want), Some(got)) if want != got => Err(anyhow!(
                "chainId mismatch: configured {}, RPC returned {}",
                want,
                got
            )),
            (Some(id), _) | (None, Some(id)) => Ok(id),
            (None, None) => Err(anyhow!(
                "chain id not given (--chain-id, --deployment or --rpc)"
            )),
        }
    }

    async fn account_nonce(&self, account: Address) -> Result<U256> {
        let nonce = self
            .provider("nonce")?
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .context("eth_getTransactionCount failed")?;
        tracing::info!(account = %fmt_address(account), %nonce, "fetched account nonce");
        Ok(nonce)
    }

    async fn gas_price(&self) -> Result<U256> {
        let price = self
            .provider("max fee")?
            .get_gas_price()
            .await
            .context("eth_gasPrice failed")?;
        tracing::info!(gas_price = %price, "fetched gas price");
        Ok(price)
    }
}

fn load_owner(key: Option<&str>) -> Result<LocalWallet> {
    let key = key.ok_or_else(|| {
        anyhow!("missing OPENSUB_AA_OWNER_PRIVATE_KEY (or --owner-private-key)")
    })?;
    LocalWallet::from_str(key).context("invalid owner private key")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
