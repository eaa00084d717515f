use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde_json::{json, Value};
use tracing::debug;

use crate::changeset::file::{FileChangesetManager, FileUpdate};
use crate::changeset::{parse_key_value, MetadataChangeset};
use crate::conditions::parse_condition;
use crate::config::{self, Config};
use crate::query::{QuerySpecification, SortDirection, MAX_PAGE_SIZE};

use super::error::CliError;
use super::output::{
    self, AppliedData, CountData, ExplainData, MatchData, OutputMode, PendingData, QueuedData,
};

#[derive(Parser)]
#[command(name = "metaquery")]
#[command(about = "Filter JSON metadata records with conditions and apply metadata changesets")]
#[command(version)]
pub struct Cli {
    /// Path to config file (overrides METAQUERY_CONFIG env var and default location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (auto-enabled when stdout is piped)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Force text output even when stdout is piped
    #[arg(long, global = true, conflicts_with = "json")]
    pub no_json: bool,

    /// Suppress all output on success (errors still go to stderr)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log evaluation details to stderr (same as METAQUERY_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// where the condition of a query comes from
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct QueryArgs {
    /// Condition JSON, or @FILE to read it from a file
    #[arg(short = 'w', long = "where", value_name = "CONDITION")]
    pub condition: Option<String>,

    /// Full query JSON (condition, limit, after, sort_by, sort_direction), or @FILE
    #[arg(long, value_name = "QUERY")]
    pub query: Option<String>,

    /// Name of a query saved in the config file
    #[arg(short, long, value_name = "NAME")]
    pub saved: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the records matching a condition
    Match {
        #[command(flatten)]
        query: QueryArgs,

        /// Records as a JSON array, a single object or JSON lines ("-" or omitted reads stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Maximum number of records to return (1-1000)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Dot-path field to sort by
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort direction (defaults to desc when --sort-by is given)
        #[arg(long, value_enum)]
        sort_direction: Option<SortArg>,

        /// Page token returned as next_token by a previous page
        #[arg(long)]
        after: Option<String>,

        /// Print each record with a template, e.g. "{relative_path} {metadata.size}"
        #[arg(long)]
        format: Option<String>,

        /// Only print the number of matching records
        #[arg(long, conflicts_with = "format")]
        count: bool,
    },

    /// Show how a condition reads and which fields it references
    Explain {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Apply tag and metadata changes to records shaped {"metadata": {...}, "tags": [...]}
    Update {
        /// Records as a JSON array, a single object or JSON lines ("-" or omitted reads stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Tags to add (comma-separated or repeated)
        #[arg(long, value_delimiter = ',', action = clap::ArgAction::Append)]
        put_tags: Vec<String>,

        /// Tags to remove (comma-separated or repeated)
        #[arg(long, value_delimiter = ',', action = clap::ArgAction::Append)]
        remove_tags: Vec<String>,

        /// Metadata field to set; VALUE is parsed as JSON when possible
        #[arg(long, value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
        put_metadata: Vec<String>,

        /// Metadata dot-path to remove
        #[arg(long, value_name = "KEY", action = clap::ArgAction::Append)]
        remove_metadata: Vec<String>,

        /// Write the result back to the input file
        #[arg(long, requires = "input")]
        in_place: bool,
    },

    /// Queue metadata changes for files by relative path
    Changeset {
        /// Changeset file (overrides METAQUERY_CHANGESET_FILE and settings.changeset_file)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(subcommand)]
        command: ChangesetCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ChangesetCommands {
    /// Queue tags to add to a file
    PutTags {
        relative_path: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Queue tags to remove from a file
    RemoveTags {
        relative_path: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Queue metadata fields to set on a file
    PutFields {
        relative_path: String,
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Queue metadata fields to remove from a file
    RemoveFields {
        relative_path: String,
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
    /// Queue a new description for a file
    Describe {
        relative_path: String,
        description: String,
    },
    /// Show the combined pending update per file
    Show,
    /// Apply pending updates to records carrying a matching relative_path
    Apply {
        /// Records as a JSON array, a single object or JSON lines ("-" or omitted reads stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write the result back to the input file
        #[arg(long, requires = "input")]
        in_place: bool,

        /// Clear the changeset file afterwards
        #[arg(long)]
        clear: bool,
    },
    /// Drop every pending update
    Clear,
    /// Show changeset file path
    Path,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Set a configuration value
    Set {
        /// settings.limit, settings.pretty, settings.changeset_file or queries.<name>
        key: String,
        value: String,
    },
    /// Reset configuration to defaults
    Reset,
    /// Print a default configuration with example queries
    Default,
    /// Check the config file for invalid queries and settings
    Verify,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortDirection {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortDirection::Ascending,
            SortArg::Desc => SortDirection::Descending,
        }
    }
}

/// layout of a records input, kept so results can be written back the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputShape {
    Single,
    Array,
    Lines,
}

pub fn execute(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    let output_mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet, false);

    match cli.command {
        Commands::Match {
            query,
            input,
            limit,
            sort_by,
            sort_direction,
            after,
            format,
            count,
        } => {
            let config = load_config(config_path)?;
            let mut spec = resolve_query(&query, &config)?;

            if let Some(limit) = limit {
                spec.limit = check_limit(limit)?;
            }
            if sort_by.is_some() {
                spec.sort_by = sort_by;
            }
            if let Some(direction) = sort_direction {
                spec.sort_direction = Some(direction.into());
            }
            if after.is_some() {
                spec.after = after;
            }

            let (records, _) = parse_records(&read_input(input.as_deref())?)?;
            let page = spec.execute(&records)?;

            if count {
                match output_mode {
                    OutputMode::Json => output::print_json(&CountData {
                        matched: page.total_matched,
                    }),
                    OutputMode::Quiet => {}
                    _ => println!("{}", page.total_matched),
                }
                return Ok(());
            }

            let mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet, format.is_some());
            match mode {
                OutputMode::Quiet => {}
                OutputMode::Json => output::print_json(&MatchData {
                    matched: page.total_matched,
                    returned: page.items.len(),
                    next_token: page.next_token.clone(),
                    records: page.items.clone(),
                }),
                OutputMode::Format => {
                    let template = format.as_deref().unwrap_or_default();
                    for record in &page.items {
                        println!("{}", output::format_template(template, record));
                    }
                }
                OutputMode::Text => {
                    for record in &page.items {
                        output::print_document(record, config.settings.pretty);
                    }
                    if let Some(token) = &page.next_token {
                        eprintln!(
                            "{} of {} matching records shown; continue with --after {}",
                            page.items.len(),
                            page.total_matched,
                            token
                        );
                    }
                }
            }
            Ok(())
        }

        Commands::Explain { query } => {
            let config = load_config(config_path)?;
            let spec = resolve_query(&query, &config)?;
            let fields: Vec<String> = spec.fields().into_iter().collect();
            let condition = spec.condition.ok_or_else(|| {
                CliError::invalid_args("explain needs one of --where, --query or --saved")
            })?;

            match output_mode {
                OutputMode::Json => {
                    let data = ExplainData {
                        rendered: condition.to_string(),
                        fields,
                        condition: serde_json::to_value(&condition)
                            .context("Failed to serialize condition")?,
                    };
                    output::print_json(&data);
                }
                OutputMode::Quiet => {}
                _ => {
                    println!("{}", condition);
                    println!();
                    println!("Fields:");
                    for field in &fields {
                        println!("  {}", field);
                    }
                }
            }
            Ok(())
        }

        Commands::Update {
            input,
            put_tags,
            remove_tags,
            put_metadata,
            remove_metadata,
            in_place,
        } => {
            let config = load_config(config_path)?;

            let mut builder = MetadataChangeset::builder();
            for tag in put_tags {
                builder = builder.put_tag(tag);
            }
            for tag in remove_tags {
                builder = builder.remove_tag(tag);
            }
            for pair in &put_metadata {
                let (key, value) = parse_key_value(pair)?;
                builder = builder.put_field(key, value);
            }
            for key in remove_metadata {
                builder = builder.remove_field(key);
            }
            let changeset = builder.build();

            if changeset.is_empty() {
                return Err(CliError::invalid_args(
                    "no changes given; use --put-tags, --remove-tags, --put-metadata or --remove-metadata",
                ));
            }

            let update = FileUpdate {
                description: None,
                metadata_changeset: Some(changeset),
            };

            let (mut records, shape) = parse_records(&read_input(input.as_deref())?)?;
            let updated = apply_update(&update, &mut records)?;
            debug!(updated, "applied metadata changeset");

            finish_records(
                records,
                shape,
                updated,
                in_place.then_some(input.as_deref()).flatten(),
                output_mode,
                config.settings.pretty,
            )
        }

        Commands::Changeset { file, command } => {
            let config = load_config(config_path)?;
            let path = match file {
                Some(path) => path,
                None => config::changeset_file_path(&config)
                    .map_err(|e| CliError::config(format!("{:#}", e)))?,
            };

            if let ChangesetCommands::Path = command {
                println!("{}", path.display());
                return Ok(());
            }

            let manager = FileChangesetManager::open(path)?;
            run_changeset(command, &manager, output_mode, config.settings.pretty)
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = load_config(config_path)?;
                let json =
                    serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("{}", json);
                Ok(())
            }
            ConfigCommands::Path => {
                let path = config::get_config_path_with_override(config_path)?;
                println!("{}", path.display());
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                let mut config = load_config(config_path)?;
                config::set_value(&mut config, &key, &value)
                    .map_err(|e| CliError::invalid_args(format!("{:#}", e)))?;
                config::save_with_override(&config, config_path)?;
                if !output_mode.is_quiet() {
                    println!("Set {} = {}", key, value);
                }
                Ok(())
            }
            ConfigCommands::Reset => {
                let config = Config::default();
                config::save_with_override(&config, config_path)?;
                if !output_mode.is_quiet() {
                    println!("Configuration reset to defaults");
                }
                Ok(())
            }
            ConfigCommands::Default => {
                let config = config::default_with_examples();
                let json =
                    serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("{}", json);
                Ok(())
            }
            ConfigCommands::Verify => {
                let path = config::get_config_path_with_override(config_path)?;
                let errors =
                    config::verify(&path).map_err(|e| CliError::config(format!("{:#}", e)))?;

                if errors.is_empty() {
                    println!("✓ Configuration is valid: {}", path.display());
                    Ok(())
                } else {
                    println!(
                        "✗ Configuration has {} error(s): {}",
                        errors.len(),
                        path.display()
                    );
                    println!();
                    for error in &errors {
                        println!("  - {}", error);
                    }
                    Err(CliError::config("configuration validation failed"))
                }
            }
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_changeset(
    command: ChangesetCommands,
    manager: &FileChangesetManager,
    output_mode: OutputMode,
    pretty: bool,
) -> Result<(), CliError> {
    let file = manager.path().display().to_string();

    let (action, relative_path) = match command {
        ChangesetCommands::PutTags {
            relative_path,
            tags,
        } => {
            manager.put_tags(&relative_path, tags)?;
            ("put_tags", relative_path)
        }
        ChangesetCommands::RemoveTags {
            relative_path,
            tags,
        } => {
            manager.remove_tags(&relative_path, tags)?;
            ("remove_tags", relative_path)
        }
        ChangesetCommands::PutFields {
            relative_path,
            fields,
        } => {
            let pairs = fields
                .iter()
                .map(|pair| parse_key_value(pair))
                .collect::<Result<Vec<_>, _>>()?;
            manager.put_fields(&relative_path, pairs)?;
            ("put_fields", relative_path)
        }
        ChangesetCommands::RemoveFields {
            relative_path,
            keys,
        } => {
            manager.remove_fields(&relative_path, keys)?;
            ("remove_fields", relative_path)
        }
        ChangesetCommands::Describe {
            relative_path,
            description,
        } => {
            manager.set_description(&relative_path, description)?;
            ("describe", relative_path)
        }
        ChangesetCommands::Show => {
            let pending = manager.pending_updates()?;
            match output_mode {
                OutputMode::Json => output::print_json(&PendingData { file, pending }),
                OutputMode::Quiet => {}
                _ if pending.is_empty() => println!("No pending changes in {}", file),
                _ => output::print_document(&pending, pretty),
            }
            return Ok(());
        }
        ChangesetCommands::Apply {
            input,
            in_place,
            clear,
        } => {
            let (mut records, shape) = parse_records(&read_input(input.as_deref())?)?;
            let updated = manager.apply_to_records(&mut records)?;
            finish_records(
                records,
                shape,
                updated,
                in_place.then_some(input.as_deref()).flatten(),
                output_mode,
                pretty,
            )?;
            if clear {
                manager.clear()?;
            }
            return Ok(());
        }
        ChangesetCommands::Clear => {
            manager.clear()?;
            match output_mode {
                OutputMode::Json => output::print_json(&json!({ "action": "clear", "file": file })),
                OutputMode::Quiet => {}
                _ => println!("Cleared pending changes in {}", file),
            }
            return Ok(());
        }
        ChangesetCommands::Path => {
            println!("{}", file);
            return Ok(());
        }
    };

    match output_mode {
        OutputMode::Json => output::print_json(&QueuedData {
            action,
            relative_path,
            file,
        }),
        OutputMode::Quiet => {}
        _ => println!("Queued {} for {}", action, relative_path),
    }
    Ok(())
}

/// apply `update` to every record; all records must be objects
fn apply_update(update: &FileUpdate, records: &mut [Value]) -> Result<usize, CliError> {
    let mut updated = 0;
    for record in records.iter_mut() {
        let map = record.as_object_mut().ok_or_else(|| {
            CliError::invalid_args("records must be JSON objects with metadata and tags")
        })?;
        update.apply_to(map);
        updated += 1;
    }
    Ok(updated)
}

/// write updated records back in place, or print them
fn finish_records(
    records: Vec<Value>,
    shape: InputShape,
    updated: usize,
    in_place: Option<&Path>,
    output_mode: OutputMode,
    pretty: bool,
) -> Result<(), CliError> {
    if let Some(path) = in_place {
        if path == Path::new("-") {
            return Err(CliError::invalid_args("--in-place needs an input file"));
        }
        write_atomic(path, &render_records(&records, shape, pretty)?)?;

        match output_mode {
            OutputMode::Json => output::print_json(&AppliedData {
                updated,
                written: Some(path.display().to_string()),
            }),
            OutputMode::Quiet => {}
            _ => println!("Updated {} record(s) in {}", updated, path.display()),
        }
        return Ok(());
    }

    match output_mode {
        OutputMode::Json => output::print_json(&shaped(records, shape)),
        OutputMode::Quiet => {}
        _ => print!("{}", render_records(&records, shape, pretty)?),
    }
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config, CliError> {
    config::load_with_override(config_path).map_err(|e| CliError::config(format!("{:#}", e)))
}

fn check_limit(limit: usize) -> Result<usize, CliError> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(CliError::invalid_args(format!(
            "invalid limit {}: use a value between 1 and {}",
            limit, MAX_PAGE_SIZE
        )));
    }
    Ok(limit)
}

/// build the query from whichever of --where, --query or --saved was given
fn resolve_query(args: &QueryArgs, config: &Config) -> Result<QuerySpecification, CliError> {
    let limit = check_limit(config.settings.limit)
        .map_err(|e| CliError::config(format!("settings.limit: {}", e)))?;
    let base = QuerySpecification {
        limit,
        ..QuerySpecification::default()
    };

    if let Some(raw) = &args.condition {
        let condition = parse_condition(&read_json_arg(raw)?)?;
        return Ok(QuerySpecification {
            condition: Some(condition),
            ..base
        });
    }

    if let Some(raw) = &args.query {
        let spec: QuerySpecification = serde_json::from_value(read_json_arg(raw)?)
            .map_err(|e| CliError::parse(format!("invalid query: {}", e)))?;
        check_limit(spec.limit)?;
        return Ok(spec);
    }

    if let Some(name) = &args.saved {
        if !config.queries.contains_key(name) {
            return Err(
                CliError::invalid_args(format!("no saved query named '{}'", name))
                    .with_suggestions(suggest_names(name, config.queries.keys())),
            );
        }
        let condition = config::saved_query(config, name)
            .map_err(|e| CliError::config(format!("{:#}", e)))?;
        debug!(name = %name, condition = %condition, "resolved saved query");
        return Ok(QuerySpecification {
            condition: Some(condition),
            ..base
        });
    }

    Ok(base)
}

fn suggest_names<'a>(name: &str, known: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut close: Vec<(usize, &String)> = known
        .map(|k| (strsim::levenshtein(name, k), k))
        .filter(|(distance, _)| *distance <= 3)
        .collect();
    close.sort();
    close.into_iter().map(|(_, k)| k.clone()).collect()
}

/// parse an inline JSON argument, or the file named after a leading `@`
fn read_json_arg(raw: &str) -> Result<Value, CliError> {
    let content = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&content).map_err(|e| CliError::parse(format!("invalid JSON: {}", e)))
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) if path != Path::new("-") => Ok(fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// accept a JSON array of records, a single JSON document, or JSON lines
fn parse_records(content: &str) -> Result<(Vec<Value>, InputShape), CliError> {
    if content.trim_start().starts_with('[') {
        let records = serde_json::from_str(content)
            .map_err(|e| CliError::parse(format!("invalid JSON input: {}", e)))?;
        return Ok((records, InputShape::Array));
    }

    if let Ok(record) = serde_json::from_str::<Value>(content) {
        return Ok((vec![record], InputShape::Single));
    }

    let records = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| CliError::parse(format!("invalid JSON on line {}: {}", i + 1, e)))
        })
        .collect::<Result<Vec<Value>, _>>()?;
    Ok((records, InputShape::Lines))
}

fn shaped(mut records: Vec<Value>, shape: InputShape) -> Value {
    match shape {
        InputShape::Single if records.len() == 1 => records.remove(0),
        _ => Value::Array(records),
    }
}

/// serialize records back into the layout they were read in
fn render_records(records: &[Value], shape: InputShape, pretty: bool) -> Result<String, CliError> {
    let encode = |value: &Value| {
        if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    };

    let mut rendered = match (shape, records) {
        (InputShape::Single, [record]) => encode(record),
        (InputShape::Lines, _) => records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map(|lines| lines.join("\n")),
        _ => encode(&Value::Array(records.to_vec())),
    }
    .context("Failed to serialize records")?;

    if !rendered.is_empty() {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// write to a temp file next to `path`, then rename over it
fn write_atomic(path: &Path, content: &str) -> Result<(), CliError> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, content)
        .with_context(|| format!("Failed to write {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
