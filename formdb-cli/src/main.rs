use clap::{Parser, Subcommand, ValueEnum};
use formdb::schema::parse_schema;
use formdb::store::SortOrder;
use formdb::{validate_submission, FormSchema, SubmissionQuery, SubmissionStore};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::PathBuf;
use std::process;

/// FormDB CLI: inspect and manage form submissions from the command line
#[derive(Parser)]
#[command(name = "formdb", version, about)]
struct Cli {
    /// Path to the submissions JSON file
    #[arg(long, default_value = "data/submissions.json")]
    data_file: PathBuf,

    /// Form schema YAML (default: the built-in onboarding form)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print the active form schema
    Schema,

    /// Validate a JSON payload file against the schema
    Validate {
        /// File containing one JSON object
        file: PathBuf,
    },

    /// List submissions, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// "asc" for oldest first; anything else sorts newest first
        #[arg(long, default_value = "desc")]
        sort_order: String,
        /// Case-insensitive text to look for in ids and field values
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Get a single submission by ID
    Get {
        /// Submission ID
        id: String,
    },

    /// Validate and store a new submission
    Insert {
        /// Field values (e.g. --field fullName="Ada Lovelace" --field age=36)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Replace a submission's data with the given fields
    Update {
        /// Submission ID
        id: String,
        /// Field values forming the complete new data
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a submission
    Delete {
        /// Submission ID
        id: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate and store every object in a JSON array file
    Import {
        file: PathBuf,
    },

    /// Dump all submissions in insertion order
    Export,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// `fieldId=value`, split on the first `=`
fn parse_field(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((id, _)) if id.is_empty() => Err(format!("missing field id in '{arg}'")),
        Some((id, value)) => Ok((id.to_string(), value.to_string())),
        None => Err(format!("expected fieldId=value, got '{arg}'")),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli, &mut std::io::stdout()) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli, out: &mut impl Write) -> CliResult<()> {
    let schema = match &cli.schema {
        Some(path) => parse_schema(path)?,
        None => FormSchema::builtin()?,
    };

    match cli.command {
        Command::Schema => {
            print_output(out, &serde_json::to_value(&schema)?, &cli.format)?;
        }

        Command::Validate { file } => {
            let data = read_object(&std::fs::read_to_string(&file)?)?;
            check_payload(out, &schema, &data, &cli.format)?;
            print_output(out, &serde_json::json!({ "valid": true }), &cli.format)?;
        }

        Command::List {
            page,
            limit,
            sort_order,
            search,
        } => {
            let store = SubmissionStore::open(&cli.data_file);
            let result = store.query(&SubmissionQuery {
                page,
                limit,
                sort_order: SortOrder::parse(&sort_order),
                search,
                ..Default::default()
            });
            print_output(out, &serde_json::to_value(&result)?, &cli.format)?;
        }

        Command::Get { id } => {
            let store = SubmissionStore::open(&cli.data_file);
            let submission = store.get(&id).ok_or_else(|| not_found(&id))?;
            print_output(out, &serde_json::to_value(submission)?, &cli.format)?;
        }

        Command::Insert { fields } => {
            let data = fields_to_map(&fields);
            check_payload(out, &schema, &data, &cli.format)?;

            let mut store = SubmissionStore::open(&cli.data_file);
            let submission = store.add(data);
            print_output(
                out,
                &serde_json::json!({ "id": submission.id, "createdAt": submission.created_at }),
                &cli.format,
            )?;
        }

        Command::Update { id, fields } => {
            let data = fields_to_map(&fields);
            check_payload(out, &schema, &data, &cli.format)?;

            let mut store = SubmissionStore::open(&cli.data_file);
            let updated = store.update(&id, data).ok_or_else(|| not_found(&id))?;
            print_output(out, &serde_json::to_value(updated)?, &cli.format)?;
        }

        Command::Delete { id, dry_run } => {
            let mut store = SubmissionStore::open(&cli.data_file);
            if dry_run {
                let submission = store.get(&id).ok_or_else(|| not_found(&id))?;
                print_output(
                    out,
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": submission,
                    }),
                    &cli.format,
                )?;
            } else {
                if !store.delete(&id) {
                    return Err(not_found(&id));
                }
                print_output(out, &serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Import { file } => {
            let items: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let mut store = SubmissionStore::open(&cli.data_file);
            let mut imported = Vec::new();
            let mut rejected = Vec::new();

            for (index, item) in items.into_iter().enumerate() {
                let Value::Object(data) = item else {
                    rejected.push(serde_json::json!({ "index": index, "error": "not a JSON object" }));
                    continue;
                };
                let errors = validate_submission(&schema.fields, &data);
                if errors.is_ok() {
                    imported.push(store.add(data).id);
                } else {
                    rejected.push(serde_json::json!({ "index": index, "errors": errors }));
                }
            }

            log::info!("Imported {} submissions, rejected {}", imported.len(), rejected.len());
            print_output(
                out,
                &serde_json::json!({ "imported": imported, "rejected": rejected }),
                &cli.format,
            )?;
        }

        Command::Export => {
            let store = SubmissionStore::open(&cli.data_file);
            print_output(out, &serde_json::to_value(store.all())?, &cli.format)?;
        }
    }

    Ok(())
}

/// Print validation errors and fail if the payload does not satisfy the schema
fn check_payload(
    out: &mut impl Write,
    schema: &FormSchema,
    data: &Map<String, Value>,
    format: &OutputFormat,
) -> CliResult<()> {
    let errors = validate_submission(&schema.fields, data);
    if errors.is_ok() {
        return Ok(());
    }
    print_output(out, &serde_json::json!({ "valid": false, "errors": errors }), format)?;
    Err(format!("{} field(s) failed validation", errors.len()).into())
}

fn not_found(id: &str) -> Box<dyn std::error::Error> {
    formdb::FormDbError::NotFound { id: id.to_string() }.into()
}

fn read_object(text: &str) -> CliResult<Map<String, Value>> {
    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        _ => Err("payload must be a JSON object".into()),
    }
}

fn print_output(out: &mut impl Write, value: &Value, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
        OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(value)?)?,
    }
    Ok(())
}

/// Build a submission payload from `--field` pairs, in the order given.
/// Values that read as JSON (`36`, `true`, `["SQL"]`) keep their type.
fn fields_to_map(fields: &[(String, String)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(id, raw)| {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            (id.clone(), value)
        })
        .collect()
}
