//! P0 (client) CLI driver: parses flags, loads keys and daily CSV
//! batches, and drives the day loop against a running `party_one` over the
//! blocking TCP transport, printing the final result and metrics.

#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use upsi::bucket::{Element, ElementAndPayload, Payload};
use upsi::config::{Config, Functionality, Role};
use upsi::crypto::elgamal::{ElGamalKeyShare, ElGamalPublicKey};
use upsi::crypto::paillier::{PaillierPrivateShare, PaillierPublicKey};
use upsi::party::{Keys, MessageIIIEnvelope, Party};
use upsi::prf::PrfKey;
use upsi::transport::Channel;
use upsi::wire::{ClientRequest, ServerResponse};

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

/// Parse one day's CSV: `element[,value]` per line. Blank lines and `#`
/// comments are skipped. A missing file means an empty batch for that day.
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
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "party_zero=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let addr = parse_flag(&args, "--connect").unwrap_or_else(|| "127.0.0.1:7878".to_string());
    let key_dir = PathBuf::from(parse_flag(&args, "--keys").unwrap_or_else(|| "keys".to_string()));
    let data_dir = PathBuf::from(parse_flag(&args, "--data").unwrap_or_else(|| "data/party0".to_string()));
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

    let keys = load_keys(&key_dir, Role::PartyZero, functionality)?;
    let (insert_key, probe_key) = load_prf_keys(&key_dir)?;

    let mut party = Party::new(config, Role::PartyZero, keys, probe_key, insert_key);
    let mut rng = StdRng::from_entropy();
    let mut channel = Channel::connect(&addr)?;

    for day in 1..=total_days {
        let batch = load_day_batch(&data_dir, day)?;
        tracing::info!(day, batch_len = batch.len(), "building MessageI");

        let msg_i = party.build_message_i(batch, &mut rng)?;
        let resp: ServerResponse = channel.request(&ClientRequest::MessageI(msg_i))?;
        let msg_ii = match resp {
            ServerResponse::MessageII(m) => m,
            other => return Err(anyhow::anyhow!("expected MessageII, got {other:?}")),
        };

        match party.handle_message_ii(msg_ii, &mut rng)? {
            None => {}
            Some(MessageIIIEnvelope::Sum(msg_iii)) => {
                let resp: ServerResponse =
                    channel.request(&ClientRequest::MessageIIISum(msg_iii))?;
                let msg_iv = match resp {
                    ServerResponse::MessageIV(m) => m,
                    other => return Err(anyhow::anyhow!("expected MessageIV, got {other:?}")),
                };
                party.handle_message_iv(msg_iv)?;
            }
            Some(MessageIIIEnvelope::Ss(msg_iii)) => {
                let _resp: ServerResponse =
                    channel.request(&ClientRequest::MessageIIISs(msg_iii))?;
                party.finish_ss_day_locally()?;
            }
        }

        party.advance_day()?;
        tracing::info!(day, "day complete");
    }

    println!("{}", party.metrics.report());
    match functionality {
        Functionality::Psi => {
            println!("intersection ({} elements):", party.output.intersection.len());
            for e in &party.output.intersection {
                println!("  {}", String::from_utf8_lossy(e.as_bytes()));
            }
        }
        Functionality::CardinalityOnly => {
            println!("cardinality: {}", party.output.cardinality);
        }
        Functionality::Sum => {
            println!("sum: {}", party.output.sum);
        }
        Functionality::SecretShare => {
            println!("shares ({}):", party.output.shares.len());
            for s in &party.output.shares {
                println!("  {s}");
            }
        }
    }

    Ok(())
}
