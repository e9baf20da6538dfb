//! aadhaar-extract - pull identity fields out of a password-protected e-Aadhaar PDF
//!
//! Prints a JSON envelope on stdout. Exit code 0 on success, 1 when the
//! pipeline rejects the document, 2 on setup or I/O errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use aadhaar_extract::{
    config, init_tracing, EncryptedDocument, Envelope, IdentityExtractor, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "aadhaar-extract")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the PDF
    file: PathBuf,

    /// Document password
    #[arg(
        short = 'P',
        long,
        env = config::PASSWORD_ENV,
        default_value = "",
        hide_env_values = true
    )]
    password: String,

    /// Directory holding eng.traineddata and tam.traineddata
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let Some(tessdata) = args.tessdata.clone().or_else(config::discover_tessdata_dir) else {
        eprintln!(
            "error: tessdata directory not found; pass --tessdata or set {}",
            config::TESSDATA_DIR_ENV
        );
        return ExitCode::from(2);
    };

    let extractor = match IdentityExtractor::from_engines(&tessdata, PipelineConfig::from_env()) {
        Ok(extractor) => extractor,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let bytes = match tokio::fs::read(&args.file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.file.display());
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        version = config::APP_VERSION,
        file = %args.file.display(),
        "{}",
        config::APP_NAME
    );

    let envelope = Envelope::from_outcome(
        extractor
            .extract(EncryptedDocument::new(bytes, args.password))
            .await,
    );

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&envelope)
    } else {
        serde_json::to_string(&envelope)
    };
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: cannot serialize result: {e}");
            return ExitCode::from(2);
        }
    }

    if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
