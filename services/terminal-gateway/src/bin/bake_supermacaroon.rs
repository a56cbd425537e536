//! Bake a super macaroon through the core daemon's signing authority.
//!
//! The daemon address and admin macaroon come from the same environment as
//! the gateway itself (`LND_RPC_URL`, `LND_MACAROON_PATH`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rand::RngCore;
use tracing::info;

use terminal_gateway::app::core_authority;
use terminal_gateway::bakery::{BakeRequest, DeclaredPermissions, SuperMacaroonBaker};
use terminal_gateway::endpoints::EndpointRegistry;
use terminal_gateway::observability::init_logging;
use terminal_gateway::rootkey::RootKeyId;
use terminal_gateway::Config;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "bake-supermacaroon", version, about)]
struct Args {
    /// Grant only read permissions
    #[arg(long)]
    read_only: bool,

    /// Lower four bytes of the root key ID as 8 hex characters; random if omitted
    #[arg(long, value_parser = parse_suffix)]
    root_key_suffix: Option<[u8; 4]>,

    /// Extra first-party caveat, may be repeated
    #[arg(long = "caveat")]
    caveats: Vec<String>,

    /// File the hex-encoded macaroon is written to
    #[arg(long, short)]
    output: PathBuf,
}

fn parse_suffix(value: &str) -> Result<[u8; 4], String> {
    let bytes = hex::decode(value).map_err(|e| format!("invalid hex: {e}"))?;
    <[u8; 4]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 4 bytes, got {}", bytes.len()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_logging(&config.log).context("unable to install logging")?;

    if args.output.exists() {
        bail!("{} already exists", args.output.display());
    }

    let suffix = args.root_key_suffix.unwrap_or_else(|| {
        let mut suffix = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut suffix);
        suffix
    });

    let (_, authority) = core_authority(&config)?;
    let endpoints = Arc::new(EndpointRegistry::builtin());
    let baker = SuperMacaroonBaker::new(
        Arc::new(authority),
        DeclaredPermissions::all(&endpoints),
        config.backend_timeout,
    );

    let mut request = BakeRequest::new(RootKeyId::new_super(suffix)).read_only(args.read_only);
    for caveat in args.caveats {
        request = request.with_caveat(caveat);
    }

    let baked = baker.bake(request).await?;
    baked
        .write_to_file(&args.output)
        .with_context(|| format!("unable to write {}", args.output.display()))?;

    info!(
        path = %args.output.display(),
        root_key_id = ?baked.root_key_id(),
        permissions = baked.permissions().len(),
        "Super macaroon written"
    );
    Ok(())
}
