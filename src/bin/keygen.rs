//! Trusted key-generation CLI: generates a fresh 2-of-2 threshold ElGamal
//! keypair and, for SUM/SS/deletion runs, a 2-of-2 threshold Paillier
//! keypair, and writes one key bundle per party under `--out`.
//!
//! Layout written: `<out>/party0/*.json` and `<out>/party1/*.json`, plus a
//! PRF key pair (`prf_insert.json`, `prf_probe.json`) shared by both
//! parties since the tree-synchronizing PRF is symmetric.

#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use upsi::crypto::elgamal::{combine_public_key, ElGamalKeyShare};
use upsi::crypto::paillier::generate_keypair;
use upsi::prf::PrfKey;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "keygen=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let out_dir = PathBuf::from(
        parse_flag(&args, "--out").unwrap_or_else(|| "keys".to_string()),
    );
    let paillier_bits: u64 = parse_flag(&args, "--paillier-bits")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1024);
    let with_paillier = parse_flag(&args, "--with-paillier")
        .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
        .unwrap_or(true);
    let seed = parse_flag(&args, "--seed").and_then(|s| s.parse::<u64>().ok());

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let party0_dir = out_dir.join("party0");
    let party1_dir = out_dir.join("party1");
    fs::create_dir_all(&party0_dir)?;
    fs::create_dir_all(&party1_dir)?;

    let elgamal0 = ElGamalKeyShare::random(&mut rng);
    let elgamal1 = ElGamalKeyShare::random(&mut rng);
    let elgamal_pk = combine_public_key(&elgamal0, &elgamal1);

    write_json(&party0_dir.join("elgamal_share.json"), &elgamal0)?;
    write_json(&party1_dir.join("elgamal_share.json"), &elgamal1)?;
    write_json(&party0_dir.join("elgamal_pk.json"), &elgamal_pk)?;
    write_json(&party1_dir.join("elgamal_pk.json"), &elgamal_pk)?;

    if with_paillier {
        let kp = generate_keypair(paillier_bits, &mut rng);
        write_json(&party0_dir.join("paillier_share.json"), &kp.share0)?;
        write_json(&party1_dir.join("paillier_share.json"), &kp.share1)?;
        write_json(&party0_dir.join("paillier_pk.json"), &kp.public)?;
        write_json(&party1_dir.join("paillier_pk.json"), &kp.public)?;
        tracing::info!(bits = paillier_bits, "generated threshold Paillier keypair");
    }

    let mut insert_seed = [0u8; 32];
    rng.fill_bytes(&mut insert_seed);
    let mut probe_seed = [0u8; 32];
    rng.fill_bytes(&mut probe_seed);
    let insert_key = PrfKey::from_seed(&insert_seed);
    let probe_key = PrfKey::from_seed(&probe_seed);
    write_json(&out_dir.join("prf_insert.json"), &insert_key)?;
    write_json(&out_dir.join("prf_probe.json"), &probe_key)?;

    tracing::info!(out = %out_dir.display(), "wrote key bundle for party0 and party1");
    Ok(())
}
