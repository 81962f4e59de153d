use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
mod auth;
use kpcore::config::Settings;
use kpcore::{
    CipherRegistry, CompositeKey, Direction, KeyTransformer, SecretBuffer, Storage,
    TransformParams, otp,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SecretEncoding {
    /// RFC 4648 base32, padding optional
    Base32,
    Hex,
    /// Raw UTF-8 bytes of the argument
    Utf8,
}

#[derive(Debug, clap::Args)]
struct SecretArgs {
    /// Shared OTP secret
    #[arg(long)]
    secret: String,

    #[arg(long, value_enum, default_value_t = SecretEncoding::Base32)]
    encoding: SecretEncoding,

    /// Number of digits in the code (1-9)
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=9))]
    digits: u32,

    /// Copy the code to the clipboard
    #[arg(long, default_value_t = false)]
    copy: bool,
}

impl SecretArgs {
    fn decode(&self) -> Result<Vec<u8>> {
        match self.encoding {
            SecretEncoding::Base32 => {
                let cleaned: String = self
                    .secret
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '=')
                    .map(|c| c.to_ascii_uppercase())
                    .collect();
                data_encoding::BASE32_NOPAD
                    .decode(cleaned.as_bytes())
                    .context("secret is not valid base32")
            }
            SecretEncoding::Hex => hex::decode(self.secret.trim()).context("secret is not valid hex"),
            SecretEncoding::Utf8 => Ok(self.secret.as_bytes().to_vec()),
        }
    }
}

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// 32-byte transformation seed, hex encoded
    #[arg(long, value_name = "HEX")]
    seed: String,

    /// Transformation rounds (default: from config, else 60000)
    #[arg(long)]
    rounds: Option<u64>,
}

impl KdfArgs {
    fn to_params(&self, settings: &Settings) -> Result<TransformParams> {
        let mut seed = [0u8; 32];
        hex::decode_to_slice(self.seed.trim(), &mut seed)
            .context("seed must be 32 hex-encoded bytes")?;
        Ok(TransformParams::new(
            seed,
            self.rounds.unwrap_or(settings.rounds),
        ))
    }
}

#[derive(Debug, Parser)]
#[command(name = "kpcore")]
#[command(
    version,
    about = "Security core of a KeePass-compatible credential store: key transformation, OTP codes and transactional encrypted saves."
)]
struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, value_name = "PATH", env = "KPCORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generates an HOTP code
    Hotp {
        #[command(flatten)]
        secret: SecretArgs,

        /// Moving factor
        #[arg(long)]
        counter: u64,

        /// Append a Luhn check digit
        #[arg(long, default_value_t = false)]
        checksum: bool,

        /// Fixed truncation offset instead of dynamic truncation
        #[arg(long)]
        offset: Option<usize>,
    },

    /// Generates a TOTP code
    Totp {
        #[command(flatten)]
        secret: SecretArgs,

        /// Time step in seconds
        #[arg(long, default_value_t = otp::DEFAULT_PERIOD, value_parser = clap::value_parser!(u64).range(1..))]
        period: u64,

        /// Unix time to generate the code for (default: now)
        #[arg(long, value_name = "UNIX")]
        at: Option<u64>,
    },

    /// Prints the transformed master key for the given seed
    Transform {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Measures how many transformation rounds fit in a time budget
    Benchmark {
        #[arg(long, default_value_t = 1000)]
        millis: u64,

        /// Rounds per batch between clock checks
        #[arg(long, default_value_t = 1000)]
        step: u64,
    },

    /// Lists the registered payload ciphers
    Ciphers {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Encrypts or decrypts INPUT into OUTPUT with a password-derived key
    #[command(arg_required_else_help = true)]
    Crypt {
        #[command(flatten)]
        kdf: KdfArgs,

        /// Cipher IV, hex encoded
        #[arg(long, value_name = "HEX")]
        iv: String,

        /// Cipher name or UUID (default: from config, else ChaCha20)
        #[arg(long)]
        cipher: Option<String>,

        /// Decrypt INPUT instead of encrypting it
        #[arg(long, short = 'd', default_value_t = false)]
        decrypt: bool,

        /// Write OUTPUT in place instead of through a temporary file
        #[arg(long, default_value_t = false)]
        direct: bool,

        /// Verify the temporary file before replacing OUTPUT
        #[arg(long, env = "KPCORE_EXTRA_SAFE", default_value_t = false)]
        extra_safe: bool,

        input: PathBuf,
        output: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("KPCORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Installs a Ctrl-C handler that raises the returned flag.
fn cancel_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;
    Ok(flag)
}

fn derive_key(kdf: &KdfArgs, settings: &Settings) -> Result<SecretBuffer> {
    let params = kdf.to_params(settings)?;
    let password = auth::read_password()?;
    let key = CompositeKey::from_password(&password)?;

    let cancel = cancel_flag()?;
    let transformer = KeyTransformer::new(params);
    Ok(key.generate_key32_cancellable(&transformer, &cancel)?)
}

fn emit_code(code: String, copy: bool) -> Result<()> {
    if copy {
        let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
        clipboard.set_text(code).context("failed to copy code")?;
        println!("code copied to clipboard");
    } else {
        println!("{code}");
    }
    Ok(())
}

fn now_unix() -> Result<u64> {
    u64::try_from(chrono::Utc::now().timestamp()).context("system clock is before 1970")
}

fn print_ciphers(registry: &CipherRegistry, json: bool) -> Result<()> {
    let descriptors = registry.descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let name_width = descriptors
        .iter()
        .map(|d| d.name().len())
        .chain(std::iter::once("Name".len()))
        .max()
        .unwrap_or(0);

    println!("{:<name_width$}  {:<36}  Key  IV", "Name", "UUID");
    println!("{:-<name_width$}  {:-<36}  ---  --", "", "");
    for d in descriptors {
        println!(
            "{:<name_width$}  {:<36}  {:<3}  {}",
            d.name(),
            d.uuid().to_string(),
            d.key_len(),
            d.iv_len()
        );
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Cli::parse();
    let settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Commands::Hotp {
            secret,
            counter,
            checksum,
            offset,
        } => {
            let key = secret.decode()?;
            let code = otp::generate(&key, counter, secret.digits, checksum, offset);
            emit_code(code, secret.copy)?;
        }
        Commands::Totp { secret, period, at } => {
            let key = secret.decode()?;
            let now = match at {
                Some(t) => t,
                None => now_unix()?,
            };
            let code = otp::totp(&key, now, period, secret.digits);
            emit_code(code, secret.copy)?;
            eprintln!("valid for {}s", otp::remaining_seconds(now, period));
        }
        Commands::Transform { kdf } => {
            let key = derive_key(&kdf, &settings)?;
            let encoded = Zeroizing::new(key.reveal_with(|k| hex::encode(k)));
            println!("{}", encoded.as_str());
        }
        Commands::Benchmark { millis, step } => {
            let transformer = KeyTransformer::new(TransformParams::random(0)?);
            let rounds = transformer.benchmark(Duration::from_millis(millis), step);
            println!("{rounds} rounds in {millis} ms");
        }
        Commands::Ciphers { json } => {
            print_ciphers(&CipherRegistry::with_builtin(), json)?;
        }
        Commands::Crypt {
            kdf,
            iv,
            cipher,
            decrypt,
            direct,
            extra_safe,
            input,
            output,
        } => {
            if same_file(&input, &output) {
                bail!("input and output must be different files");
            }

            let registry = CipherRegistry::with_builtin();
            let descriptor = registry.find(cipher.as_deref().unwrap_or(&settings.cipher))?;
            let iv = hex::decode(iv.trim()).context("iv is not valid hex")?;

            let mut options = settings.write_options();
            if direct {
                options.transacted = false;
            }
            options.extra_safe |= extra_safe;

            let key = derive_key(&kdf, &settings)?;
            let storage = Storage::with_options(output.clone(), options);
            let direction = if decrypt {
                Direction::Decrypt
            } else {
                Direction::Encrypt
            };
            kpcore::crypt_file(&input, &storage, descriptor, &key, &iv, direction)?;
            println!("wrote {}", output.display());
        }
    }

    Ok(())
}
