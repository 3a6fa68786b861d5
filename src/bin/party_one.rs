//! P1 (server) CLI driver: parses flags, loads keys, listens for a
//! single `party_zero` connection, and drives each day's responder side of
//! the protocol as requests arrive, printing the final result and metrics
//! once the connection closes.

#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use upsi::bucket::{Element, ElementAndPayload, Payload};
use upsi::config::{Config, Functionality, Role};
use upsi::crypto::elgamal::{ElGamalKeyShare, ElGamalPublicKey};
use upsi::crypto::paillier::{PaillierPrivateShare, PaillierPublicKey};
use upsi::party::{Keys, Party};
use upsi::prf::PrfKey;
use upsi::transport::serve_one;
use upsi::wire::{Ack, ClientRequest, ServerResponse};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn parse_functionality(s: &str) -> anyhow::Result<Functionality> {
    match s.to_ascii_uppercase().as_str() {
        "PSI" => Ok(Functionality::Psi),
        "CA" => Ok(Functionality::CardinalityOnly),
        "SUM" => Ok(Functionality::Sum),
        "SS" => Ok(Functionality::SecretShare),
        other => Err(anyhow::anyhow!("unknown --func `{other}` (want PSI|CA|SUM|SS)")),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn load_keys(key_dir: &Path, role: Role, functionality: Functionality) -> anyhow::Result<Keys> {
    let subdir = key_dir.join(match role {
        Role::PartyZero => "party0",
        Role::PartyOne => "party1",
    });
    let elgamal_share: ElGamalKeyShare = read_json(&subdir.join("elgamal_share.json"))?;
    let elgamal_pk: ElGamalPublicKey = read_json(&subdir.join("elgamal_pk.json"))?;
    let needs_paillier = functionality == Functionality::SecretShare;
    let (paillier_share, paillier_pk) = if needs_paillier {
        let share: PaillierPrivateShare = read_json(&subdir.join("paillier_share.json"))?;
        let pk: PaillierPublicKey = read_json(&subdir.join("paillier_pk.json"))?;
        (Some(share), Some(pk))
    } else {
        (None, None)
    };
    Ok(Keys {
        elgamal_share,
        elgamal_pk,
        paillier_share,
        paillier_pk,
    })
}

fn load_prf_keys(key_dir: &Path) -> anyhow::Result<(PrfKey, PrfKey)> {
    let insert: PrfKey = read_json(&key_dir.join("prf_insert.json"))?;
    let probe: PrfKey = read_json(&key_dir.join("prf_probe.json"))?;
    Ok((insert, probe))
}

fn load_day_batch(data_dir: &Path, day: usize) -> anyhow::Result<Vec<ElementAndPayload>> {
    let path = data_dir.join(format!("day{day}.csv"));
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut cols = line.splitn(2, ',');
        let elem = cols.next().unwrap().trim();
        let element = Element::from_str(elem);
        let payload = match cols.next() {
            Some(v) => {
                let v: i64 = v.trim().parse().map_err(|e| {
                    anyhow::anyhow!("{}:{}: bad value `{}`: {e}", path.display(), lineno + 1, v)
                })?;
                Payload::Value(v)
            }
            None => Payload::None,
        };
        out.push(ElementAndPayload::new(element, payload));
    }
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "party_one=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let port: u16 = parse_flag(&args, "--port").and_then(|s| s.parse().ok()).unwrap_or(7878);
    let key_dir = PathBuf::from(parse_flag(&args, "--keys").unwrap_or_else(|| "keys".to_string()));
    let data_dir = PathBuf::from(parse_flag(&args, "--data").unwrap_or_else(|| "data/party1".to_string()));
    let functionality = parse_functionality(&parse_flag(&args, "--func").unwrap_or_else(|| "PSI".to_string()))?;
    let total_days: usize = parse_flag(&args, "--days")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    let mut config = Config::new(functionality, total_days, key_dir.clone(), data_dir.clone());
    if has_flag(&args, "--delete") {
        if functionality != Functionality::SecretShare {
            return Err(anyhow::anyhow!("--delete is only meaningful with --func SS"));
        }
        #[cfg(feature = "deletion")]
        {
            config.deletion_enabled = true;
        }
        #[cfg(not(feature = "deletion"))]
        return Err(anyhow::anyhow!("--delete requires the `deletion` feature"));
    }
    config.validate()?;

    let keys = load_keys(&key_dir, Role::PartyOne, functionality)?;
    let (insert_key, probe_key) = load_prf_keys(&key_dir)?;
    let party = Party::new(config, Role::PartyOne, keys, probe_key, insert_key);

    // Shared with the dispatcher thread ("current_day"/"day_finished"
    // cross-thread touches): the main thread only reads it back after the
    // connection closes, to print the final result.
    let party = std::sync::Arc::new(std::sync::Mutex::new(party));
    let party_for_handler = party.clone();

    let listener = TcpListener::bind(("0.0.0.0", port))?;
    tracing::info!(port, "listening for party_zero");

    let mut current_day = 1usize;
    let mut rng = StdRng::from_entropy();

    let handle = serve_one::<ClientRequest, ServerResponse, _>(&listener, move |req| {
        let mut party = party_for_handler.lock().expect("party mutex poisoned");
        match req {
            ClientRequest::MessageI(msg) => {
                let batch = load_day_batch(&data_dir, current_day).unwrap_or_default();
                tracing::info!(day = current_day, batch_len = batch.len(), "handling MessageI");
                let msg_ii = party.handle_message_i(msg, batch, &mut rng)?;
                if !party.config.functionality.has_round_two() {
                    party.advance_day()?;
                    current_day += 1;
                }
                Ok(ServerResponse::MessageII(msg_ii))
            }
            ClientRequest::MessageIIISum(msg) => {
                let msg_iv = party.handle_message_iii_sum(msg)?;
                party.advance_day()?;
                current_day += 1;
                Ok(ServerResponse::MessageIV(msg_iv))
            }
            ClientRequest::MessageIIISs(msg) => {
                party.handle_message_iii_ss(msg)?;
                party.advance_day()?;
                current_day += 1;
                Ok(ServerResponse::Ack(Ack))
            }
        }
    })?;

    match handle.join() {
        Ok(Ok(())) => tracing::info!("session finished cleanly"),
        Ok(Err(e)) => return Err(anyhow::anyhow!("transport error: {e}")),
        Err(_) => return Err(anyhow::anyhow!("dispatcher thread panicked")),
    }

    let party = party.lock().expect("party mutex poisoned");
    println!("{}", party.metrics.report());
    if functionality == Functionality::SecretShare {
        println!("shares ({}):", party.output.shares.len());
        for s in &party.output.shares {
            println!("  {s}");
        }
    }

    Ok(())
}
