//! proto-pack: rebuild the proto2 schema embedded in a bundled web client script.

use clap::Parser;
use proto_pack_lib::{extract_file, summary_json, write_output, ExtractOptions, DEFAULT_PACKAGE};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "proto-pack")]
#[command(about = "Extract the proto2 schema from a bundled app script")]
struct Cli {
    /// Path to the downloaded bundle
    #[arg(default_value = "app.js")]
    input: PathBuf,

    /// Where to write the schema
    #[arg(short, long, default_value = "whatsapp.proto")]
    output: PathBuf,

    /// Package name for the header line
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    package: String,

    /// Also dump metadata, metrics and the schema tree as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print the schema instead of writing the output file
    #[arg(long)]
    stdout: bool,
}

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,proto_pack=info,proto_pack_lib=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let options = ExtractOptions {
        package: cli.package,
    };

    let extraction = match extract_file(&cli.input, &options) {
        Ok(extraction) => extraction,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if cli.stdout {
        println!("{}", extraction.proto);
    } else if let Err(e) = write_output(&cli.output, &extraction.proto) {
        error!("{}", e);
        std::process::exit(1);
    }

    if let Some(json_path) = cli.json {
        let json = match summary_json(&extraction) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to serialize schema: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = write_output(&json_path, &json) {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    info!("done");
}
