use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tracktidy::config::AppConfig;
use tracktidy::construct::{ConstructStyle, Constructor};
use tracktidy::db::Database;
use tracktidy::db::models::{NewTrackData, TrackRow};
use tracktidy::extract::{ExtractStatus, ExtractedRecord, Extractor};

#[derive(Parser)]
#[command(
    name = "tracktidy",
    version,
    about = "Audio filename normalizer — parse, rename, and catalog loosely-named tracks"
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Simple,
    Block,
}

impl StyleArg {
    fn to_style(self) -> ConstructStyle {
        match self {
            Self::Simple => ConstructStyle::Simple,
            Self::Block => ConstructStyle::Block,
        }
    }
}

/// Config keys the `set` command can change. Closed mapping: each key has a
/// typed setter in `apply_setting`, nothing is dispatched by string lookup.
#[derive(Clone, Copy, ValueEnum)]
enum SettingKey {
    /// Default artist placeholder
    Artist,
    /// Default title placeholder
    Title,
    /// Default features placeholder
    Features,
    /// Default misc placeholder
    Misc,
    /// Default source id placeholder
    SourceId,
    /// Default file extension
    Filetype,
    /// Construction style (simple or block)
    Style,
    /// Comma-separated extension allow-list
    Extensions,
    /// Database path
    Database,
    /// Extractor name
    Extractor,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a single file: extract, preview, catalog, rename
    Format {
        /// File to normalize
        file: String,

        /// Show the candidates without renaming or touching the catalog
        #[arg(long)]
        dry_run: bool,

        /// Override the configured construction style
        #[arg(long, value_enum)]
        style: Option<StyleArg>,
    },

    /// Walk directories, renaming and cataloging every audio file
    Organize {
        /// Directories to organize (defaults to config file music_dirs)
        paths: Vec<String>,

        /// Preview renames without touching files or the catalog
        #[arg(long)]
        dry_run: bool,

        /// Override the configured construction style
        #[arg(long, value_enum)]
        style: Option<StyleArg>,

        /// Write a Markdown report into the organized directory
        #[arg(long)]
        report: bool,
    },

    /// Parse a filename and print the structured record
    Extract {
        /// Filename to parse (directory prefixes are stripped)
        file: String,

        /// Emit the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List catalog artists
    Artists {
        /// Include each artist's tracks
        #[arg(long)]
        tracks: bool,
    },

    /// Search catalog tracks (pass exactly one filter)
    Tracks {
        /// Substring match on artist name
        #[arg(long)]
        artist: Option<String>,

        /// Substring match on track title
        #[arg(long)]
        title: Option<String>,

        /// Substring match on source id
        #[arg(long)]
        source_id: Option<String>,
    },

    /// Change one configuration default and persist it
    Set {
        /// Which setting to change
        #[arg(value_enum)]
        key: SettingKey,

        /// New value
        value: String,

        /// Show the change without writing the config file
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the resolved configuration
    Config,

    /// Show catalog statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Format {
            file,
            dry_run,
            style,
        } => {
            config.resolve_extractor();
            let style = style.map(StyleArg::to_style).unwrap_or(config.style);
            let extractor = Extractor::new(&config);
            let constructor = Constructor::new(&config.defaults, style);

            let record = extractor.extract(&file);
            if record.status == ExtractStatus::Unmatched {
                println!(
                    "Not formatted: no structural pattern matched \"{}\".",
                    record.original_filename
                );
                return Ok(());
            }

            print_record(&record);
            let candidates = constructor.candidates(&record);
            println!();
            println!("Candidates:");
            for (i, candidate) in candidates.iter().enumerate() {
                println!("  {}. {}", i + 1, candidate);
            }
            let Some(chosen) = constructor.auto(&record) else {
                return Ok(());
            };
            println!();
            println!("Chosen: {}", chosen);

            if dry_run {
                println!("(dry run — nothing renamed, nothing cataloged)");
                return Ok(());
            }

            let db = open_db(cli.db_path, &config)?;
            if let Some(data) = NewTrackData::from_record(&record) {
                db.ingest(&data).context("Failed to update catalog")?;
            }

            let path = PathBuf::from(&file);
            if path.file_name().and_then(|s| s.to_str()) == Some(chosen.as_str()) {
                println!("Already canonical, nothing to rename.");
            } else {
                tracktidy::organize::rename_file(&path, &chosen)
                    .with_context(|| format!("Failed to rename {}", path.display()))?;
                println!("Renamed to {}", chosen);
            }
        }

        Commands::Organize {
            paths,
            dry_run,
            style,
            report,
        } => {
            // Resolve target paths: CLI args > config music_dirs
            let target_paths = if !paths.is_empty() {
                paths
            } else if !config.music_dirs.is_empty() {
                config
                    .music_dirs
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            } else {
                anyhow::bail!(
                    "No directories to organize. Pass paths as arguments or set music_dirs in config."
                );
            };

            config.resolve_extractor();
            let style = style.map(StyleArg::to_style).unwrap_or(config.style);
            let extractor = Extractor::new(&config);
            let constructor = Constructor::new(&config.defaults, style);

            let db = open_db(cli.db_path, &config)?;
            if dry_run {
                println!("DRY RUN — no files will be renamed, nothing will be cataloged");
            }
            let result =
                tracktidy::organize::organize(&db, &extractor, &constructor, &target_paths, dry_run)
                    .context("Organize failed")?;

            println!(
                "Organize complete: {} scanned, {} renamed, {} unchanged, {} not formatted, {} errors",
                result.scanned,
                result.renamed.len(),
                result.unchanged.len(),
                result.unmatched.len(),
                result.failed.len()
            );
            if !dry_run {
                let s = result.stats;
                println!(
                    "Catalog: {} new artists, {} new tracks, {} updated",
                    s.new_artists, s.new_tracks, s.updated
                );
            }

            if dry_run && !result.renamed.is_empty() {
                println!();
                println!("Planned renames:");
                for (old, new) in &result.renamed {
                    println!("  {} -> {}", old, new);
                }
            }
            if !result.unmatched.is_empty() {
                println!();
                println!("Not formatted:");
                for name in &result.unmatched {
                    println!("  {}", name);
                }
            }
            if !result.failed.is_empty() {
                println!();
                println!("Errors:");
                for (name, err) in &result.failed {
                    println!("  {}: {}", name, err);
                }
            }

            if report {
                let dir = PathBuf::from(&target_paths[0]);
                let path = tracktidy::organize::write_report(&dir, &result)
                    .context("Failed to write report")?;
                println!();
                println!("Report written to {}", path.display());
            }
        }

        Commands::Extract { file, json } => {
            config.resolve_extractor();
            let extractor = Extractor::new(&config);
            let record = extractor.extract(&file);
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }

        Commands::Artists { tracks } => {
            let db = open_db(cli.db_path, &config)?;
            let artists = db.list_artists().context("Query failed")?;

            if artists.is_empty() {
                println!("No artists in the catalog yet.");
                return Ok(());
            }

            if tracks {
                for artist in &artists {
                    println!("{} ({} tracks)", artist.name, artist.track_count);
                    let rows = db.tracks_for_artist(artist.id).context("Query failed")?;
                    for t in &rows {
                        println!("  - {}", describe_track(t));
                    }
                }
            } else {
                println!("{:<40} {:>6}", "Artist", "Tracks");
                println!("{}", "-".repeat(47));
                for artist in &artists {
                    println!("{:<40} {:>6}", truncate(&artist.name, 40), artist.track_count);
                }
            }
        }

        Commands::Tracks {
            artist,
            title,
            source_id,
        } => {
            let db = open_db(cli.db_path, &config)?;
            let results = match (artist, title, source_id) {
                (Some(a), None, None) => db.search_tracks_by_artist(&a),
                (None, Some(t), None) => db.search_tracks_by_title(&t),
                (None, None, Some(s)) => db.search_tracks_by_source_id(&s),
                _ => anyhow::bail!("Pass exactly one of --artist, --title, --source-id"),
            }
            .context("Query failed")?;

            if results.is_empty() {
                println!("No matching tracks.");
                return Ok(());
            }
            print_track_table(&results);
        }

        Commands::Set {
            key,
            value,
            dry_run,
        } => {
            let path = cli
                .config
                .clone()
                .or_else(AppConfig::config_path)
                .context("Could not resolve a config file path")?;

            let mut config = config;
            let (label, old) = apply_setting(&mut config, key, &value)?;
            println!("{}: {} -> {}", label, old, value);

            if dry_run {
                println!("(dry run — config not written)");
            } else {
                config
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Saved {}", path.display());
            }
        }

        Commands::Config => {
            match cli.config.clone().or_else(AppConfig::config_path) {
                Some(path) => println!("# {}", path.display()),
                None => println!("# (no config path available)"),
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Stats => {
            let db = open_db(cli.db_path, &config)?;
            let stats = db.stats().context("Failed to get stats")?;
            println!("Catalog Statistics");
            println!("==================");
            println!("Artists:           {}", stats.total_artists);
            println!("Tracks:            {}", stats.total_tracks);
            println!("With source id:    {}", stats.tracks_with_source_id);
            println!();

            if !stats.extensions.is_empty() {
                println!("Extensions:");
                for (ext, count) in &stats.extensions {
                    println!("  {:<8} {}", ext, count);
                }
            }
        }
    }

    Ok(())
}

/// Resolve database path (CLI > config > XDG default) and open it.
fn open_db(cli_path: Option<PathBuf>, config: &AppConfig) -> Result<Database> {
    let db_path = cli_path
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(tracktidy::config::default_db_path);
    log::info!("Database: {}", db_path.display());
    Database::open(&db_path).context("Failed to open database")
}

/// Apply one `set` key to the config, returning (label, old value).
/// Invalid values surface as errors naming the offending key.
fn apply_setting(
    config: &mut AppConfig,
    key: SettingKey,
    value: &str,
) -> Result<(&'static str, String)> {
    let replace = |slot: &mut String| std::mem::replace(slot, value.to_string());
    Ok(match key {
        SettingKey::Artist => ("defaults.artist", replace(&mut config.defaults.artist)),
        SettingKey::Title => ("defaults.title", replace(&mut config.defaults.title)),
        SettingKey::Features => ("defaults.features", replace(&mut config.defaults.features)),
        SettingKey::Misc => ("defaults.misc", replace(&mut config.defaults.misc)),
        SettingKey::SourceId => ("defaults.source_id", replace(&mut config.defaults.source_id)),
        SettingKey::Filetype => ("defaults.filetype", replace(&mut config.defaults.filetype)),
        SettingKey::Style => {
            let new: ConstructStyle = value
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid value for key 'style'")?;
            let old = config.style.to_string();
            config.style = new;
            ("style", old)
        }
        SettingKey::Extensions => {
            let exts: Vec<String> = value
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if exts.is_empty() {
                anyhow::bail!("Invalid value for key 'extensions': expected a comma-separated list");
            }
            let old = config.extensions.join(",");
            config.extensions = exts;
            ("extensions", old)
        }
        SettingKey::Database => {
            let old = config
                .db_path
                .take()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string());
            config.db_path = Some(PathBuf::from(value));
            ("db_path", old)
        }
        SettingKey::Extractor => ("extractor", replace(&mut config.extractor)),
    })
}

/// Print an extracted record as an aligned field list.
fn print_record(record: &ExtractedRecord) {
    let status = match record.status {
        ExtractStatus::Matched => "matched",
        ExtractStatus::DefaultFilled => "default-filled",
        ExtractStatus::Unmatched => "unmatched",
    };
    let unset = "-".to_string();
    println!("{:<12} {}", "File:", record.original_filename);
    println!("{:<12} {}", "Status:", status);
    println!("{:<12} {}", "Artist:", record.artist.as_ref().unwrap_or(&unset));
    println!("{:<12} {}", "Title:", record.title.as_ref().unwrap_or(&unset));
    println!(
        "{:<12} {}",
        "Features:",
        if record.features.is_empty() {
            unset.clone()
        } else {
            record.features.join(", ")
        }
    );
    println!(
        "{:<12} {}",
        "Misc:",
        if record.misc.is_empty() {
            unset.clone()
        } else {
            record.misc.join(", ")
        }
    );
    println!(
        "{:<12} {}",
        "Source id:",
        record.source_id.as_ref().unwrap_or(&unset)
    );
    println!(
        "{:<12} {}",
        "Extension:",
        record.file_extension.as_ref().unwrap_or(&unset)
    );
}

/// Print a table of catalog tracks.
fn print_track_table(tracks: &[TrackRow]) {
    println!(
        "{:<25} {:<25} {:<20} {:<15} {:>12} {:>5}",
        "Artist", "Title", "Features", "Misc", "Source", "Ext"
    );
    println!("{}", "-".repeat(107));

    for t in tracks {
        println!(
            "{:<25} {:<25} {:<20} {:<15} {:>12} {:>5}",
            truncate(&t.artist, 25),
            truncate(&t.title, 25),
            truncate(t.features.as_deref().unwrap_or("-"), 20),
            truncate(t.misc.as_deref().unwrap_or("-"), 15),
            truncate(t.source_id.as_deref().unwrap_or("-"), 12),
            t.file_extension.as_deref().unwrap_or("-"),
        );
    }
}

/// One-line track description for the nested artists listing.
fn describe_track(t: &TrackRow) -> String {
    let mut parts = vec![t.title.clone()];
    if let Some(f) = &t.features {
        parts.push(format!("ft. {}", f));
    }
    if let Some(m) = &t.misc {
        parts.push(format!("({})", m));
    }
    if let Some(s) = &t.source_id {
        parts.push(format!("[{}]", s));
    }
    parts.join(" ")
}

/// Truncate long values for table display.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
