//! validate-yaml - check the YAML of a file against a Quarto schema bundle

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use quarto_source_map::{Position, as_mapped_string};
use quarto_yaml::{YamlParser, build_annotated};
use quarto_yaml_intelligence::{
    EditorContext, FileSchemaSource, FileType, LintItem, ToolingContext,
};
use quarto_yaml_validation::{YamlSchema, report_errors_in_source};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "validate-yaml")]
#[command(about = "Validate the YAML in a file against a Quarto schema bundle")]
struct Args {
    /// Schema bundle (JSON)
    #[arg(short, long)]
    schema: PathBuf,

    /// Schema for YAML input.
    /// Defaults to `front-matter` for .qmd paths and `config` otherwise.
    #[arg(long)]
    schema_name: Option<String>,

    /// How to read the input (guessed from its extension by default)
    #[arg(long, value_enum)]
    filetype: Option<InputKind>,

    /// Print diagnostics as JSON
    #[arg(long)]
    json: bool,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    /// File to check
    input: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputKind {
    Yaml,
    Markdown,
    Script,
}

impl From<InputKind> for FileType {
    fn from(kind: InputKind) -> Self {
        match kind {
            InputKind::Yaml => FileType::Yaml,
            InputKind::Markdown => FileType::Markdown,
            InputKind::Script => FileType::Script,
        }
    }
}

fn guess_filetype(path: &Path) -> FileType {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yml" | "yaml") => FileType::Yaml,
        Some("qmd" | "md") => FileType::Markdown,
        _ => FileType::Script,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let code = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let path = args.input.display().to_string();
    let filetype = args
        .filetype
        .map_or_else(|| guess_filetype(&args.input), FileType::from);
    debug!(%path, ?filetype, "validating");

    let tooling = ToolingContext::new(FileSchemaSource::new(&args.schema))
        .context("failed to set up the YAML parser")?;
    let mut context = EditorContext::new(filetype, code.as_str(), Position::default(), "")
        .with_path(path.as_str());
    context.schema_name = args.schema_name.clone();

    let lints = tooling
        .get_lint(&context)
        .await
        .with_context(|| format!("failed to validate {path}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&lints)?);
    } else {
        print_lints(&path, &lints);
        if filetype == FileType::Yaml && !lints.is_empty() {
            let schema_name = context
                .schema_name
                .clone()
                .unwrap_or_else(|| default_schema_name(&args.input).to_string());
            if let Some(report) = yaml_report(&tooling, &code, &path, &schema_name).await? {
                println!("\n{report}");
            }
        }
    }

    Ok(if lints.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_lints(path: &str, lints: &[LintItem]) {
    for lint in lints {
        println!(
            "{path}:{}:{}: {}",
            lint.start_row + 1,
            lint.start_column + 1,
            lint.text
        );
    }
}

fn default_schema_name(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("qmd") => "front-matter",
        _ => "config",
    }
}

/// The errors of a YAML file with the offending lines underlined.
async fn yaml_report(
    tooling: &ToolingContext,
    code: &str,
    path: &str,
    schema_name: &str,
) -> anyhow::Result<Option<String>> {
    let bundle = tooling.bundle().await?;
    let schema = bundle
        .bundle
        .schema(schema_name)
        .with_context(|| format!("no schema named {schema_name}"))?;
    let validator = YamlSchema::new(schema, bundle.registry.clone())?;

    let source = as_mapped_string(code).with_file_name(path);
    let mut parser = YamlParser::new()?;
    let tree = parser.parse(source.value())?;
    let Some(annotation) = build_annotated(&tree, &source)? else {
        return Ok(None);
    };
    let validated = validator.validate_parse(&source, &annotation)?;
    Ok(Some(report_errors_in_source(&validated.errors, &source)))
}
