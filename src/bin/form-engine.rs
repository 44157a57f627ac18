//! Form Engine CLI
//!
//! Command-line interface for projecting, validating, and replaying forms.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use form_engine::{
    load_fields, load_json, load_schema, render, review, Action, DataSource, Form, LoadError,
    ValidationSchema,
};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser)]
#[command(name = "form-engine")]
#[command(about = "Project, validate, and replay schema-driven forms")]
#[command(version)]
struct Cli {
    /// Log every dispatched action to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FormArgs {
    /// Field definitions: file path or URL (http:// or https://)
    fields: Option<String>,

    /// Built-in data source: primary, secondary, or tertiary
    #[arg(long)]
    source: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the data object the schema validates
    Project {
        #[command(flatten)]
        form: FormArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate the whole form as on submit
    Validate {
        #[command(flatten)]
        form: FormArgs,

        /// JSON Schema file or URL (default: the source's schema)
        #[arg(long)]
        schema: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Dispatch a list of actions and print the final form state
    Replay {
        #[command(flatten)]
        form: FormArgs,

        /// JSON file holding an array of actions
        #[arg(long)]
        actions: PathBuf,

        /// JSON Schema file or URL (default: the source's schema)
        #[arg(long)]
        schema: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print a human-readable summary of the form
    Review {
        #[command(flatten)]
        form: FormArgs,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    // A logger may already be installed when embedded; keep going without ours.
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let result = match cli.command {
        Commands::Project { form, pretty } => run_project(&form, pretty),
        Commands::Validate { form, schema, json } => run_validate(&form, schema.as_deref(), json),
        Commands::Replay {
            form,
            actions,
            schema,
            pretty,
        } => run_replay(&form, &actions, schema.as_deref(), pretty),
        Commands::Review { form, json } => run_review(&form, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Build a form from the definition and schema arguments.
fn build_form(args: &FormArgs, schema_source: Option<&str>) -> Result<Form, LoadError> {
    let source = args
        .source
        .as_deref()
        .map(str::parse::<DataSource>)
        .transpose()?;

    let fields = match (&args.fields, source) {
        (Some(fields), _) => load_fields(fields)?,
        (None, Some(source)) => source.fields()?,
        (None, None) => {
            return Err(LoadError::InvalidDefinition {
                message: "either <FIELDS> or --source is required".to_string(),
            })
        }
    };

    let mut form = Form::new(fields);
    let schema = match (schema_source, source) {
        (Some(path), _) => Some(ValidationSchema::new(load_schema(path)?)),
        (None, Some(source)) => Some(source.schema()?),
        (None, None) => None,
    };
    if let Some(schema) = schema {
        form = form.with_schema(schema);
    }
    if let Some(reducer) = source.and_then(|source| source.reducer()) {
        form = form.with_source_reducer(reducer);
    }
    Ok(form)
}

fn run_project(args: &FormArgs, pretty: bool) -> Result<(), u8> {
    let form = build_form(args, None).map_err(|e| fail(false, &e))?;
    print_json(&form.project(), pretty)
}

fn run_validate(args: &FormArgs, schema: Option<&str>, json_output: bool) -> Result<(), u8> {
    let mut form = build_form(args, schema).map_err(|e| fail(json_output, &e))?;
    if form.schema().is_none() {
        report_error(json_output, "no schema: pass --schema or --source");
        return Err(2);
    }

    let result = form.submit();
    if json_output {
        println!(
            "{}",
            serde_json::json!({ "valid": result.is_valid, "errors": result.errors })
        );
    } else if result.is_valid {
        println!("Valid");
    } else {
        eprintln!("Validation failed:");
        for (path, message) in &result.errors {
            eprintln!("  {}: {}", path, message);
        }
    }

    if result.is_valid {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_replay(
    args: &FormArgs,
    actions_path: &std::path::Path,
    schema: Option<&str>,
    pretty: bool,
) -> Result<(), u8> {
    let mut form = build_form(args, schema).map_err(|e| fail(false, &e))?;

    let actions = load_json(actions_path).map_err(|e| fail(false, &e))?;
    let serde_json::Value::Array(actions) = actions else {
        report_error(false, "actions file must hold a JSON array");
        return Err(2);
    };

    for (index, value) in actions.into_iter().enumerate() {
        let action = Action::from_json(value, form.schema()).map_err(|e| {
            report_error(false, &format!("action {}: {}", index, e));
            e.exit_code() as u8
        })?;
        form.dispatch(action);
    }

    print_json(form.state(), pretty)
}

fn run_review(args: &FormArgs, json_output: bool) -> Result<(), u8> {
    let form = build_form(args, None).map_err(|e| fail(json_output, &e))?;
    let entries = review(&form.state().fields);
    if json_output {
        print_json(&entries, true)
    } else {
        print!("{}", render(&entries));
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

/// Report a load failure and return its exit code.
fn fail(json_output: bool, error: &LoadError) -> u8 {
    report_error(json_output, &error.to_string());
    error.exit_code() as u8
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
