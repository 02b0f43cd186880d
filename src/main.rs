use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use clash_reconcile::codec;
use clash_reconcile::config::{AppConfig, OutputFormat};
use clash_reconcile::reconcile::{
    selected_probe_target, ConfigReconciler, DocumentSummary, ProbeScheme, PROBE_TARGETS,
};

/// Normalize Clash profiles: synthetic load-balance/failover groups and
/// refreshed selector membership.
#[derive(Parser, Debug)]
#[command(name = "clash-reconcile", version, about)]
struct Cli {
    /// Config file (default: platform config dir `clash-reconcile/config.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `clash_reconcile=trace`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile a profile and write the result
    Apply {
        /// Profile file (`-` for stdin)
        input: PathBuf,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Profile label used in diagnostics
        #[arg(long)]
        profile: Option<String>,
        /// Output format (default: same as input)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Overwrite the input file
        #[arg(long, conflicts_with = "output")]
        in_place: bool,
    },
    /// Show nodes and proxy groups of a profile without changing it
    Inspect {
        /// Profile file (`-` for stdin)
        input: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the declared health-check probe targets
    Targets,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Yaml,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(cli.log.as_deref().unwrap_or(&config.log_filter));
    match &config.source {
        Some(path) => tracing::debug!("config loaded from {}", path.display()),
        None => tracing::debug!("no config file, using defaults"),
    }

    match cli.command {
        Commands::Apply {
            input,
            output,
            profile,
            format,
            in_place,
        } => {
            let target = resolve_target(&input, output, in_place || config.in_place)?;
            let profile = profile.unwrap_or_else(|| config.profile.clone());
            let format = format.map(OutputFormat::from).unwrap_or(config.output_format);
            handle_apply(&input, target.as_deref(), &profile, format).await
        }
        Commands::Inspect { input, json } => handle_inspect(&input, json).await,
        Commands::Targets => {
            handle_targets();
            Ok(())
        }
    }
}

/// Where `apply` writes: `None` is stdout. `-o -` also means stdout.
fn resolve_target(
    input: &Path,
    output: Option<PathBuf>,
    in_place: bool,
) -> Result<Option<PathBuf>> {
    match output {
        Some(path) if is_stdio(&path) => Ok(None),
        Some(path) => Ok(Some(path)),
        None if !in_place => Ok(None),
        None if is_stdio(input) => bail!("cannot write in place to stdin"),
        None => Ok(Some(input.to_path_buf())),
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Logs go to stderr so stdout carries only the profile.
fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `clash-reconcile apply`: load, reconcile, write.
async fn handle_apply(
    input: &Path,
    target: Option<&Path>,
    profile: &str,
    format: OutputFormat,
) -> Result<()> {
    let (document, input_format) = codec::load_document(input).await?;
    let (reconciled, report) = ConfigReconciler::new().reconcile_with_report(document, profile);

    if report.fell_back {
        bail!(
            "{} is not a Clash profile mapping; nothing written",
            input.display()
        );
    }
    tracing::info!(
        nodes = report.nodes,
        created = report.created.len(),
        updated = report.updated.len(),
        selectors = report.selectors_refreshed.len(),
        dependents = report.dependents_rewritten.len(),
        failures = report.failures.len(),
        "profile reconciled"
    );

    let format = format.resolve(input_format);
    match target {
        Some(path) => {
            codec::save_document(path, &reconciled, format).await?;
            tracing::info!("wrote {} ({format})", path.display());
        }
        None => {
            let text = codec::encode(&reconciled, format)?;
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(text.as_bytes())
                .await
                .context("failed to write profile to stdout")?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// `clash-reconcile inspect`: one line per proxy group.
async fn handle_inspect(input: &Path, json: bool) -> Result<()> {
    let (document, _) = codec::load_document(input).await?;
    let summary = DocumentSummary::of(&document);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Nodes: {}", style(summary.nodes).bold());
    if summary.groups.is_empty() {
        println!("Proxy groups: (none)");
        return Ok(());
    }
    println!("Proxy groups ({}):", summary.groups.len());
    for group in &summary.groups {
        let kind = group
            .kind
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let marker = match group.role {
            Some(role) if role.is_synthetic() => style("synthetic").green().to_string(),
            Some(_) => style("selector").cyan().to_string(),
            None => String::new(),
        };
        println!(
            "  {:<24} {:<14} {:>4}  {}",
            group.name, kind, group.members, marker
        );
    }
    Ok(())
}

/// `clash-reconcile targets`: declared probe targets, selected one marked.
fn handle_targets() {
    let selected = selected_probe_target();
    for target in PROBE_TARGETS {
        let scheme = ProbeScheme::of(target);
        if target == selected {
            println!("* {:<5} {}", scheme, style(target).bold());
        } else {
            println!("  {:<5} {}", scheme, style(target).dim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clash_reconcile::codec::DocumentFormat;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_parses_flags() {
        let cli = Cli::try_parse_from([
            "clash-reconcile",
            "apply",
            "profile.yaml",
            "--format",
            "json",
            "--profile",
            "work",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply {
                input,
                format,
                profile,
                in_place,
                output,
            } => {
                assert_eq!(input, PathBuf::from("profile.yaml"));
                assert!(matches!(format, Some(FormatArg::Json)));
                assert_eq!(profile.as_deref(), Some("work"));
                assert!(!in_place);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn in_place_conflicts_with_output() {
        let result = Cli::try_parse_from([
            "clash-reconcile",
            "apply",
            "a.yaml",
            "--in-place",
            "-o",
            "b.yaml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn dash_output_means_stdout() {
        let target =
            resolve_target(Path::new("in.yaml"), Some(PathBuf::from("-")), false).unwrap();
        assert_eq!(target, None);
        let target = resolve_target(Path::new("-"), Some(PathBuf::from("-")), true).unwrap();
        assert_eq!(target, None);
    }

    #[test]
    fn in_place_targets_input_file() {
        let target = resolve_target(Path::new("in.yaml"), None, true).unwrap();
        assert_eq!(target, Some(PathBuf::from("in.yaml")));
        let target =
            resolve_target(Path::new("in.yaml"), Some(PathBuf::from("out.yaml")), true).unwrap();
        assert_eq!(target, Some(PathBuf::from("out.yaml")));
        assert_eq!(
            resolve_target(Path::new("in.yaml"), None, false).unwrap(),
            None
        );
    }

    #[test]
    fn in_place_from_stdin_is_refused() {
        let err = resolve_target(Path::new("-"), None, true).unwrap_err();
        assert!(err.to_string().contains("cannot write in place to stdin"));
        assert_eq!(resolve_target(Path::new("-"), None, false).unwrap(), None);
    }

    #[test]
    fn dash_output_parses() {
        let cli = Cli::try_parse_from(["clash-reconcile", "apply", "in.yaml", "-o", "-"]).unwrap();
        match cli.command {
            Commands::Apply { output, .. } => assert_eq!(output, Some(PathBuf::from("-"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn apply_writes_reconciled_profile() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.yaml");
        let output = dir.path().join("out.json");
        tokio::fs::write(&input, "proxies:\n  - name: A\nproxy-groups: []\n")
            .await
            .unwrap();

        handle_apply(&input, Some(output.as_path()), "test", OutputFormat::Json)
            .await
            .unwrap();

        let (doc, format) = codec::load_document(&output).await.unwrap();
        assert_eq!(format, DocumentFormat::Json);
        assert_eq!(doc["log-level"], "debug");
        assert_eq!(doc["proxy-groups"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn apply_refuses_non_mapping_profile() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.yaml");
        let output = dir.path().join("out.yaml");
        tokio::fs::write(&input, "- just\n- a list\n").await.unwrap();

        let err = handle_apply(&input, Some(output.as_path()), "test", OutputFormat::Auto)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing written"));
        assert!(!output.exists());
    }
}
