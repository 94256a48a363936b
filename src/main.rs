use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use photolib::config::{Config, CONFIG_ENV};
use photolib::db::Status;
use photolib::export::{export_catalog, ExportFormat};
use photolib::logging::{self, LogTarget};
use photolib::scanner::{self, discovery, metadata, FileKind};
use photolib::{auth, Database, Library, Scanner, Style, ThumbnailCache};

struct Args {
    config_path: Option<PathBuf>,
    verbose: bool,
    log_dir: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        verbose: false,
        log_dir: None,
        command: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photolib {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--verbose" | "-v" => parsed.verbose = true,
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--log-dir" => {
                if i + 1 < args.len() {
                    parsed.log_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --log-dir requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {
                // Everything from the command name on belongs to the command
                parsed.command = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"photolib - photo library ingestion and storage

USAGE:
    photolib [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    import <PATH>...              Move files (or directories of files) into the library
    verify                        Re-hash every stored file against the catalog
    offset <SET-UUID> <MINUTES>   Correct a photo set's capture time
    status <SET-UUID> <STATUS>    Set visibility: private, public or hidden
    info <FILE>                   Print the metadata ingestion would extract
    thumb <PHOTO-UUID> <STYLE>    Render a thumbnail: tiny, small, feed, preview or big
    stats                         Library totals and per-month counts
    dates                         Photo sets per day
    export <json|csv> <OUTPUT>    Dump the catalog
    hash-password <PASSWORD>      Print the stored form of a password

OPTIONS:
    --config, -c PATH   Path to config file
    --verbose, -v       Log to stderr instead of the journal/log file
    --log-dir PATH      Write daily log files to PATH instead of the journal
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOLIB_CONFIG     Path to config file (overrides default location)
    PHOTOLIB_LOG        Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photolib/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();
    let Some((command, rest)) = args.command.split_first() else {
        print_help();
        std::process::exit(1);
    };

    let target = match (args.verbose, args.log_dir) {
        (true, _) => LogTarget::Stderr,
        (false, Some(dir)) => LogTarget::Dir(dir),
        (false, None) => LogTarget::System,
    };
    // Logging is best-effort; the command still runs without it
    let _ = logging::init(target);

    // hash-password needs no library at all
    if command == "hash-password" {
        let [password] = rest else {
            bail!("usage: photolib hash-password <PASSWORD>");
        };
        println!("{}", auth::password_hash(password));
        return Ok(());
    }

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load().with_context(|| format!("Failed to load config (see {})", CONFIG_ENV))?,
    };

    match command.as_str() {
        "import" => cmd_import(&config, rest),
        "verify" => cmd_verify(&config),
        "offset" => cmd_offset(&config, rest),
        "status" => cmd_status(&config, rest),
        "info" => cmd_info(&config, rest),
        "thumb" => cmd_thumb(&config, rest),
        "stats" => cmd_stats(&config),
        "dates" => cmd_dates(&config),
        "export" => cmd_export(&config, rest),
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }
}

fn open_library(config: &Config) -> Result<Library> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open catalog {}", config.db_path.display()))?;
    let library = Library::new(&config.library_path, db)
        .with_context(|| format!("Failed to open library {}", config.library_path.display()))?;
    Ok(library)
}

fn cmd_import(config: &Config, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        bail!("usage: photolib import <PATH>...");
    }
    let library = open_library(config)?;
    let inputs: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    let files = discovery::expand_paths(&inputs);

    let report = Scanner::new(config.scanner.clone()).ingest(&library, &files);

    for (path, key) in &report.duplicates {
        println!("duplicate  {} ({})", path.display(), key);
    }
    for (path, reason) in &report.failures {
        println!("failed     {}: {}", path.display(), reason);
    }
    for (path, reason) in &report.skipped {
        println!("skipped    {}: {}", path.display(), reason);
    }
    println!("{}", report.summary());
    Ok(())
}

fn cmd_verify(config: &Config) -> Result<()> {
    let library = open_library(config)?;
    let report = library.verify()?;

    for photo in &report.mismatched {
        println!("MISMATCH {}", photo.path.display());
    }
    for photo in &report.missing {
        println!("MISSING  {}", photo.path.display());
    }
    println!("{} files verified", report.checked);

    if !report.is_ok() {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_offset(config: &Config, rest: &[String]) -> Result<()> {
    let [uuid, minutes] = rest else {
        bail!("usage: photolib offset <SET-UUID> <MINUTES>");
    };
    let minutes: i32 = minutes
        .parse()
        .with_context(|| format!("Invalid minutes: {}", minutes))?;

    let library = open_library(config)?;
    let before = library
        .db()
        .get_photoset_by_uuid(uuid)?
        .with_context(|| format!("No photo set {}", uuid))?;
    let after = library.set_date_offset(uuid, minutes)?;

    println!("Original date: {}", before.date);
    println!("New date:      {}", after.date);
    Ok(())
}

fn cmd_status(config: &Config, rest: &[String]) -> Result<()> {
    let [uuid, status] = rest else {
        bail!("usage: photolib status <SET-UUID> <private|public|hidden>");
    };
    let Some(status) = Status::from_str(status) else {
        bail!("Unknown status: {}", status);
    };

    let library = open_library(config)?;
    let set = library.set_status(uuid, status)?;
    println!("{} is now {}", set.uuid, set.status.as_str());
    Ok(())
}

fn cmd_info(config: &Config, rest: &[String]) -> Result<()> {
    let [file] = rest else {
        bail!("usage: photolib info <FILE>");
    };
    let path = PathBuf::from(file);

    let meta = match discovery::kind_of(&path, &config.scanner) {
        Some(FileKind::Image) => scanner::extract_metadata(&path)?,
        _ => {
            let format = metadata::mime_type(&path, &config.scanner.raw_extensions);
            scanner::describe_file(&path, format)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn cmd_thumb(config: &Config, rest: &[String]) -> Result<()> {
    let [uuid, style] = rest else {
        bail!("usage: photolib thumb <PHOTO-UUID> <STYLE>");
    };
    let Some(style) = Style::from_str(style) else {
        bail!("Unknown style: {}", style);
    };

    let library = open_library(config)?;
    let photo = library
        .db()
        .get_photo_by_uuid(uuid)?
        .with_context(|| format!("No photo {}", uuid))?;

    let cache = ThumbnailCache::new(&config.cache_path, library.root(), &config.thumbnails)?;
    match cache.get_or_create(&photo, style) {
        Some(path) => println!("{}", path.display()),
        None => {
            println!("unavailable");
            std::process::exit(2);
        }
    }
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let library = open_library(config)?;
    let db = library.db();

    println!("Photo sets: {}", db.photoset_count()?);
    println!("Files:      {}", db.photo_count()?);
    println!("Total size: {:.1} MiB", db.total_size()? as f64 / (1024.0 * 1024.0));
    println!();
    for month in db.monthly_counts()? {
        println!("{:04}-{:02}  {}", month.year, month.month, month.count);
    }
    Ok(())
}

fn cmd_dates(config: &Config) -> Result<()> {
    let library = open_library(config)?;
    for group in library.db().date_groups()? {
        println!("{}  {}", group.day, group.count);
    }
    Ok(())
}

fn cmd_export(config: &Config, rest: &[String]) -> Result<()> {
    let [format, output] = rest else {
        bail!("usage: photolib export <json|csv> <OUTPUT>");
    };
    let format = ExportFormat::parse(format)?;

    let library = open_library(config)?;
    let count = export_catalog(library.db(), &PathBuf::from(output), format)?;
    println!("Exported {} files to {}", count, output);
    Ok(())
}
