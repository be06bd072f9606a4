use clap::{Parser, Subcommand};
use mpak::archive;
use mpak::codec::{Level, Method};
use mpak::entry::LogicalFile;
use mpak::pack_io::{PackOptions, PackReader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mpak", about = "The .mpk multi-part package CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory tree into a .mpk package
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Codec: lz4 (default), zlib, none
        #[arg(short, long, default_value = "lz4")]
        codec: String,
        /// Effort: default or fast
        #[arg(short, long, default_value = "default")]
        level: String,
        /// Directory to archive
        input: PathBuf,
    },
    /// Unpack a .mpk package
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List package contents
    List {
        input: PathBuf,
    },
    /// Show package metadata
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, input, codec, level } => {
            let method = Method::from_name(&codec).unwrap_or_else(|| {
                eprintln!("Unknown codec '{codec}', defaulting to lz4");
                Method::Lz4
            });
            let level = Level::from_name(&level).unwrap_or_else(|| {
                eprintln!("Unknown level '{level}', defaulting to default");
                Level::Default
            });
            let inputs = archive::collect_inputs(&input)?;
            let opts = PackOptions {
                method,
                level,
                ..PackOptions::default()
            };
            let mut progress =
                |name: &str, _done: u64, _total: u64| println!("  packed  {name}");
            let header = archive::pack(&inputs, &output, opts, &mut progress)?;
            println!(
                "Created: {} ({} file(s), {} part(s))",
                output.display(),
                inputs.len(),
                header.num_parts
            );
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir } => {
            let mut progress =
                |name: &str, _done: u64, _total: u64| println!("  unpacked {name}");
            archive::extract_all(&input, &output_dir, &mut progress)?;
            println!("Unpacked to: {}", output_dir.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let reader = PackReader::open(&input)?;
            println!("Package: {}", input.display());
            println!("{:<32} {:>12} {:>12} {:>6} {:>5}", "Name", "Size", "Stored", "Codec", "Part");
            for entry in &reader.entries {
                println!(
                    "{:<32} {:>12} {:>12} {:>6} {:>5}",
                    entry.name(),
                    entry.size(),
                    entry.stored_size(),
                    entry.method().name(),
                    entry.part_index()
                );
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let reader = PackReader::open(&input)?;
            let header = &reader.header;
            println!("── .mpk Package ─────────────────────────────────────────");
            println!("  Path             {}", input.display());
            println!("  Format version   {}", header.version);
            println!("  Package id       {}", header.archive_id);
            println!("  Parts            {}", header.num_parts);
            println!("  Directory offset {} B", header.file_list_offset);
            println!("  Directory size   {} B", header.file_list_size);
            println!("  Entries          {}", reader.entries.len());
        }
    }

    Ok(())
}
