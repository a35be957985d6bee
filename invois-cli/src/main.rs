use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use invois_core::canonical::CanonicalizationMethod;
use invois_core::config::{DocumentFamily, SigningConfig};
use invois_core::credentials::SigningCredentials;
use invois_core::digest::{Digest, DocDigest};
use invois_core::document::CleanDocument;
use invois_core::invoice::{FinalizedInvoice, InvoiceData};
use invois_core::signing::properties::SigningTime;
use invois_core::signing::DocumentSigner;
use invois_core::transport::TransportEncoding;
use invois_core::verify;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "invois")]
#[command(about = "Sign and verify MyInvois e-invoice documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the clean document for an invoice record.
    Build {
        #[arg(long)]
        record: PathBuf,
        #[arg(long, default_value_t = DocumentFamily::Json)]
        family: DocumentFamily,
    },
    /// Print the document digest of a document with any signature removed.
    Digest {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        family: Option<DocumentFamily>,
        #[arg(long)]
        canonicalization: Option<CanonicalizationMethod>,
    },
    Sign {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        certificate: PathBuf,
        #[arg(long)]
        private_key: PathBuf,
        #[arg(long)]
        family: Option<DocumentFamily>,
        #[arg(long)]
        canonicalization: Option<CanonicalizationMethod>,
        /// Fixed signing time (`YYYY-MM-DDTHH:MM:SSZ`); defaults to now.
        #[arg(long)]
        signing_time: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Verify {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        family: Option<DocumentFamily>,
        #[arg(long)]
        canonicalization: Option<CanonicalizationMethod>,
    },
    /// Print the submission encoding of a document file as JSON.
    Transport {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        family: Option<DocumentFamily>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { record, family } => {
            let text = read(&record)?;
            let data: InvoiceData = serde_json::from_str(&text)
                .with_context(|| format!("invalid invoice record {}", record.display()))?;
            let clean = FinalizedInvoice::new(data)?.to_document(family)?;
            println!("{}", family.serialize(clean.as_document())?);
        }
        Commands::Digest {
            document,
            family,
            canonicalization,
        } => {
            let family = family.unwrap_or_else(|| family_for(&document));
            let config = config(family, canonicalization)?;
            let parsed = family.parse(&read(&document)?)?;
            let clean = CleanDocument::strip(&parsed);
            let bytes = invois_core::canonical::canonicalize(
                clean.as_document(),
                config.canonicalization(),
            )?;
            println!("{}", DocDigest::new(Digest::of(&bytes)));
        }
        Commands::Sign {
            document,
            certificate,
            private_key,
            family,
            canonicalization,
            signing_time,
            output,
        } => {
            let family = family.unwrap_or_else(|| family_for(&document));
            let config = config(family, canonicalization)?;
            let credentials =
                SigningCredentials::from_pem(&read(&certificate)?, &read(&private_key)?)?;
            let clean = CleanDocument::new(family.parse(&read(&document)?)?)?;
            let signer = DocumentSigner::new(&credentials, config)?;
            let signed = match signing_time {
                Some(time) => {
                    let time = SigningTime::parse(&time)
                        .with_context(|| format!("invalid signing time `{time}`"))?;
                    signer.sign_at(clean, time)?
                }
                None => signer.sign(clean)?,
            };
            let serialized = signed.serialize()?;
            match output {
                Some(path) => {
                    fs::write(&path, serialized)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    log::info!("wrote signed document to {}", path.display());
                }
                None => println!("{serialized}"),
            }
        }
        Commands::Verify {
            document,
            family,
            canonicalization,
        } => {
            let family = family.unwrap_or_else(|| family_for(&document));
            let config = config(family, canonicalization)?;
            let parsed = family.parse(&read(&document)?)?;
            let verified = verify::verify(&parsed, &config)?;
            println!(
                "signature valid: signed at {}, document digest {}",
                verified.signing_time, verified.doc_digest
            );
        }
        Commands::Transport { document, family } => {
            let family = family.unwrap_or_else(|| family_for(&document));
            let bytes = fs::read(&document)
                .with_context(|| format!("failed to read {}", document.display()))?;
            let encoded = TransportEncoding::encode(family, &bytes);
            println!("{}", serde_json::to_string_pretty(&encoded)?);
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn family_for(path: &Path) -> DocumentFamily {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xml") => DocumentFamily::Xml,
        _ => DocumentFamily::Json,
    }
}

fn config(
    family: DocumentFamily,
    canonicalization: Option<CanonicalizationMethod>,
) -> Result<SigningConfig> {
    let method = canonicalization.unwrap_or_else(|| family.default_canonicalization());
    Ok(SigningConfig::new(family, method)?)
}
