use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::config::FILE_EXTENSION;
use crate::hash::HashProvider;
use crate::request::FileProcessingRequest;
use crate::storage::StorageService;
use crate::vault::VaultService;

#[derive(Parser)]
#[command(name = "nexplock-rs", version, about = "Encrypt files at rest with chunked AES-256-GCM and a machine-bound wrapped content key.")]
pub struct Cli {
    /// Directory holding the system key vault.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt a file.
    Encrypt {
        /// Input file path.
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (defaults to the input path plus ".nxl").
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base64 master key (prompted for when omitted).
        #[arg(short, long)]
        master_key: Option<String>,
    },

    /// Decrypt a file.
    Decrypt {
        /// Input file path.
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (defaults to the input path without ".nxl").
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base64 master key (prompted for when omitted).
        #[arg(short, long)]
        master_key: Option<String>,
    },
}

#[inline]
pub fn parse() -> Cli {
    Cli::parse()
}

pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let provider = HashProvider::for_host();
    let vault = Arc::new(VaultService::new(absolute(&cli.base_dir)?, provider));
    let storage = StorageService::new(vault, provider);

    match cli.command {
        Commands::Encrypt { input, output, master_key } => {
            let input = absolute(&input)?;
            let output = match output {
                Some(path) => absolute(&path)?,
                None => encrypted_path(&input),
            };
            let key = master_key_input(master_key, true)?;

            storage
                .encrypt(&request_for(&input, &output), &key, &cancel)
                .await
                .with_context(|| format!("failed to encrypt {}", input.display()))?;

            println!("Encrypted: {} -> {}", input.display(), output.display());
        }
        Commands::Decrypt { input, output, master_key } => {
            let input = absolute(&input)?;
            let output = match output {
                Some(path) => absolute(&path)?,
                None => decrypted_path(&input),
            };
            let key = master_key_input(master_key, false)?;

            storage
                .decrypt(&request_for(&input, &output), &key, &cancel)
                .await
                .with_context(|| format!("failed to decrypt {}", input.display()))?;

            println!("Decrypted: {} -> {}", input.display(), output.display());
        }
    }

    Ok(())
}

fn request_for(input: &Path, output: &Path) -> FileProcessingRequest {
    let file_id = input.file_name().map_or_else(|| input.display().to_string(), |n| n.to_string_lossy().into_owned());
    FileProcessingRequest::new(file_id, input, output)
}

fn master_key_input(flag: Option<String>, with_confirmation: bool) -> Result<SecretString> {
    if let Some(key) = flag {
        return Ok(SecretString::from(key));
    }

    let mut prompt = Password::new("Master key (base64)").with_display_mode(PasswordDisplayMode::Masked);
    if with_confirmation {
        prompt = prompt.with_custom_confirmation_message("Confirm master key").with_custom_confirmation_error_message("keys mismatch");
    } else {
        prompt = prompt.without_confirmation();
    }

    Ok(SecretString::from(prompt.prompt().context("input master key")?))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().context("resolve working directory")?;
    Ok(cwd.join(path))
}

#[inline]
#[must_use]
fn encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}

#[inline]
#[must_use]
fn decrypted_path(input: &Path) -> PathBuf {
    input.to_string_lossy().strip_suffix(FILE_EXTENSION).map_or_else(|| input.with_extension("out"), PathBuf::from)
}
