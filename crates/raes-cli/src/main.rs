//! Command-line interface for the round-shared AES core model.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use aes_core::{encrypt_block, expand_key, Block, CipherKey, CipherMode};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use raes_config::{CoreParams, KeyScheduleKind, ModePolicy, PipeStages, SizePreset};
use raes_sim::{AesCore, CoreInput};
use serde::{Deserialize, Serialize};

/// Round-shared AES core CLI.
#[derive(Parser)]
#[command(
    name = "raes",
    version,
    author,
    about = "Configure and exercise the round-shared AES cipher-core model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Architecture switches shared by the subcommands.
#[derive(Args, Clone)]
struct CoreArgs {
    /// AES mode: 128, 192, 256, or all (run-time selectable).
    #[arg(long, default_value = "128")]
    mode: String,
    /// Explicit physical round-unit count.
    #[arg(long, conflicts_with = "size")]
    units: Option<usize>,
    /// Unit-count preset: xs (1), s (2), m (rounds/2), l (rounds).
    #[arg(long, default_value = "xs")]
    size: String,
    /// Micro-stage register mask, 0..=7.
    #[arg(long, default_value_t = 0)]
    pipe: u8,
    /// Select subkeys from an externally expanded table instead of the
    /// online expander.
    #[arg(long)]
    precomputed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt hex blocks through a configured core.
    Encrypt {
        #[command(flatten)]
        core: CoreArgs,
        /// Cipher key as 32, 48 or 64 hex characters.
        #[arg(long, value_name = "HEX")]
        key_hex: String,
        /// Plaintext as a multiple of 32 hex characters.
        #[arg(long, value_name = "HEX")]
        data_hex: String,
    },
    /// Compare the core against the reference cipher.
    Check {
        #[command(flatten)]
        core: CoreArgs,
        /// Number of random sample blocks per architecture.
        #[arg(long, default_value_t = 8)]
        samples: usize,
        /// RNG seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
        /// Sweep every unit count and register depth for the mode.
        #[arg(long)]
        sweep: bool,
        /// Reload the parameters saved by a previous run.
        #[arg(long, value_name = "DIR", conflicts_with_all = ["seed", "sweep"])]
        last: Option<PathBuf>,
        /// Save the effective parameters as <seed>.json in this directory.
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },
    /// Seeded end-to-end run reporting latency and throughput.
    Demo {
        #[command(flatten)]
        core: CoreArgs,
        /// RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
        /// Number of blocks streamed through the core.
        #[arg(long, default_value_t = 8)]
        blocks: usize,
    },
    /// Write the test-parameter file without running anything.
    Config {
        #[command(flatten)]
        core: CoreArgs,
        /// Directory receiving <seed>.json.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
        /// RNG seed recorded in the file.
        #[arg(long)]
        seed: Option<u64>,
        /// Number of random sample blocks recorded in the file.
        #[arg(long, default_value_t = 8)]
        samples: usize,
    },
}

/// Test parameters persisted between runs, named by seed.
#[derive(Serialize, Deserialize)]
struct TestConfig {
    mode: ModePolicy,
    units: usize,
    pipe: u8,
    key_schedule: KeyScheduleKind,
    seed: u64,
    samples: usize,
}

impl TestConfig {
    fn params(&self) -> Result<CoreParams> {
        Ok(CoreParams {
            mode: self.mode,
            units: self.units,
            pipe: PipeStages::from_mask(self.pipe)?,
            key_schedule: self.key_schedule,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Encrypt {
            core,
            key_hex,
            data_hex,
        } => cmd_encrypt(&core, &key_hex, &data_hex),
        Commands::Check {
            core,
            samples,
            seed,
            sweep,
            last,
            save,
        } => cmd_check(&core, samples, seed, sweep, last.as_deref(), save.as_deref()),
        Commands::Demo { core, seed, blocks } => cmd_demo(&core, seed, blocks),
        Commands::Config {
            core,
            out,
            seed,
            samples,
        } => cmd_config(&core, &out, seed, samples),
    }
}

fn parse_policy(mode: &str) -> Result<ModePolicy> {
    Ok(match mode.to_ascii_lowercase().as_str() {
        "128" => ModePolicy::Fixed(CipherMode::Aes128),
        "192" => ModePolicy::Fixed(CipherMode::Aes192),
        "256" => ModePolicy::Fixed(CipherMode::Aes256),
        "all" => ModePolicy::Any,
        other => bail!("unknown mode '{other}': expected 128, 192, 256 or all"),
    })
}

fn parse_size(size: &str) -> Result<SizePreset> {
    Ok(match size.to_ascii_lowercase().as_str() {
        "xs" => SizePreset::Xs,
        "s" => SizePreset::S,
        "m" => SizePreset::M,
        "l" => SizePreset::L,
        other => bail!("unknown size '{other}': expected xs, s, m or l"),
    })
}

impl CoreArgs {
    fn params(&self) -> Result<CoreParams> {
        let mode = parse_policy(&self.mode)?;
        let units = match self.units {
            Some(units) => units,
            None => parse_size(&self.size)?.units(&mode)?,
        };
        let params = CoreParams {
            mode,
            units,
            pipe: PipeStages::from_mask(self.pipe)?,
            key_schedule: if self.precomputed {
                KeyScheduleKind::Precomputed
            } else {
                KeyScheduleKind::Online
            },
        };
        params.validate().context("invalid core configuration")?;
        Ok(params)
    }
}

fn parse_key_hex(hex_str: &str) -> Result<CipherKey> {
    let bytes = hex::decode(hex_str.trim()).context("decode key hex")?;
    CipherKey::from_slice(&bytes)
        .with_context(|| format!("key must be 16, 24 or 32 bytes, got {}", bytes.len()))
}

fn seeded_rng(seed: Option<u64>) -> (u64, ChaCha20Rng) {
    let seed = seed.unwrap_or_else(|| {
        let mut bytes = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    });
    let mut seed_bytes = [0u8; 32];
    seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
    (seed, ChaCha20Rng::from_seed(seed_bytes))
}

fn random_key(mode: CipherMode, rng: &mut ChaCha20Rng) -> CipherKey {
    let mut bytes = vec![0u8; mode.key_bytes()];
    rng.fill_bytes(&mut bytes);
    CipherKey::from_slice(&bytes).expect("generated length is valid")
}

fn cmd_encrypt(core_args: &CoreArgs, key_hex: &str, data_hex: &str) -> Result<()> {
    let key = parse_key_hex(key_hex)?;
    let params = core_args.params()?;
    let data = hex::decode(data_hex.trim()).context("decode data hex")?;
    if data.is_empty() || data.len() % 16 != 0 {
        bail!("data length must be a non-zero multiple of 16 bytes");
    }

    let mut core = AesCore::new(params)?;
    core.load_key(&key)
        .context("the configured mode policy does not cover this key")?;

    let blocks: Vec<Block> = data
        .chunks_exact(16)
        .map(|chunk| {
            let mut block = [0u8; 16];
            block.copy_from_slice(chunk);
            block
        })
        .collect();
    for cipher_text in core.encrypt_blocks(&blocks) {
        println!("{}", hex::encode(cipher_text));
    }
    Ok(())
}

fn check_architecture(
    params: CoreParams,
    mode: CipherMode,
    samples: usize,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let mut core = AesCore::new(params)?;
    let key = random_key(mode, rng);
    let reference = expand_key(&key);
    core.load_key(&key)?;

    let mut blocks = vec![[0u8; 16]; samples.max(1)];
    for block in &mut blocks {
        rng.fill_bytes(block);
    }
    let expected: Vec<Block> = blocks.iter().map(|b| encrypt_block(b, &reference)).collect();
    let actual = core.encrypt_blocks(&blocks);
    if actual != expected {
        bail!(
            "mismatch against the reference cipher ({mode:?}, {} units, pipe {:#05b})",
            params.units,
            params.pipe.mask()
        );
    }
    Ok(())
}

fn cmd_check(
    core_args: &CoreArgs,
    samples: usize,
    seed: Option<u64>,
    sweep: bool,
    last: Option<&Path>,
    save: Option<&Path>,
) -> Result<()> {
    let (params, samples, seed) = match last {
        Some(dir) => {
            let config = load_last_config(dir)?;
            (config.params()?, config.samples, Some(config.seed))
        }
        None => (core_args.params()?, samples, seed),
    };
    let (seed, mut rng) = seeded_rng(seed);

    let modes = params.mode.modes().to_vec();
    let mut checked = 0usize;
    for &mode in &modes {
        if sweep {
            for units in 1..=mode.rounds() {
                for mask in 0..=0b111u8 {
                    let swept = CoreParams {
                        units,
                        pipe: PipeStages::from_mask(mask)?,
                        ..params
                    };
                    if swept.validate().is_err() {
                        continue;
                    }
                    check_architecture(swept, mode, samples, &mut rng)?;
                    checked += 1;
                }
            }
        } else {
            check_architecture(params, mode, samples, &mut rng)?;
            checked += 1;
        }
    }

    if let Some(dir) = save {
        let config = TestConfig {
            mode: params.mode,
            units: params.units,
            pipe: params.pipe.mask(),
            key_schedule: params.key_schedule,
            seed,
            samples,
        };
        let path = save_config(dir, &config)?;
        println!("saved test parameters to {}", path.display());
    }
    println!("check passed: {checked} architecture(s), {samples} samples each, seed {seed}");
    Ok(())
}

fn cmd_demo(core_args: &CoreArgs, seed: Option<u64>, blocks: usize) -> Result<()> {
    let params = core_args.params()?;
    let (seed, mut rng) = seeded_rng(seed);
    let mode = params.mode.initial_mode();
    let key = random_key(mode, &mut rng);

    let mut core = AesCore::new(params)?;
    core.load_key(&key)?;

    let mut plain = vec![[0u8; 16]; blocks.max(1)];
    for block in &mut plain {
        rng.fill_bytes(block);
    }

    // Stream with continuous ingress pressure and immediate acknowledges.
    let mut pending = plain.iter();
    let mut next = pending.next().copied();
    let mut first_latency = None;
    let mut last_block = None;
    let mut completions = 0usize;
    let mut steps = 0usize;
    while completions < plain.len() {
        let busy = core.busy();
        let out = core.step(&CoreInput {
            block_in: if busy { None } else { next },
            ack: true,
            ..CoreInput::default()
        });
        if !busy && next.is_some() {
            next = pending.next().copied();
        }
        steps += 1;
        if let Some(block) = out.block_out {
            completions += 1;
            first_latency.get_or_insert(steps);
            last_block = Some(block);
        }
    }

    let reference = expand_key(&key);
    let expected = encrypt_block(plain.last().expect("at least one block"), &reference);
    println!("demo seed: {seed}");
    println!("key: {}", hex::encode(key.bytes()));
    println!(
        "mode: {:?}, units: {}, pipe mask: {:#05b}",
        mode,
        params.units,
        params.pipe.mask()
    );
    println!(
        "first-block latency: {} steps, {} blocks in {} steps",
        first_latency.unwrap_or(0),
        plain.len(),
        steps
    );
    let last_block = last_block.expect("at least one completion");
    println!("last block:  {}", hex::encode(last_block));
    println!("reference:   {}", hex::encode(expected));
    if last_block != expected {
        bail!("demo output does not match the reference cipher");
    }
    Ok(())
}

fn cmd_config(core_args: &CoreArgs, out: &Path, seed: Option<u64>, samples: usize) -> Result<()> {
    let params = core_args.params()?;
    let (seed, _) = seeded_rng(seed);
    let config = TestConfig {
        mode: params.mode,
        units: params.units,
        pipe: params.pipe.mask(),
        key_schedule: params.key_schedule,
        seed,
        samples,
    };
    let path = save_config(out, &config)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn save_config(dir: &Path, config: &TestConfig) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", config.seed));
    let json = serde_json::to_string_pretty(config).context("serialize test parameters")?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

fn load_last_config(dir: &Path) -> Result<TestConfig> {
    let mut configs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            configs.push(path);
        }
    }
    let [path] = configs.as_slice() else {
        bail!(
            "expected exactly one saved .json config in {}, found {}",
            dir.display(),
            configs.len()
        );
    };
    let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&json).context("parse test parameters")
}
