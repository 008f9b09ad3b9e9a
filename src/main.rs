use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use wpaudit::{
    artifact,
    audit::Auditor,
    checker::{default_registry, default_vulnerability_source, http_client, VulnerabilitySource},
    config::{Config, TOKEN_ENV_VAR},
    logging::{init_logging, LogConfig},
    model::{AuditReport, DetectionReport},
    output::{generate_html_string, print_result, OutputFormat},
    scanner::{load_domains, scan_sites, HttpFetcher},
};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABLE: u8 = 2;
    pub const STALE: u8 = 3;
}

#[derive(Parser)]
#[command(name = "wpaudit")]
#[command(
    author,
    version,
    about = "Detect WordPress plugins on remote sites and audit them for staleness and known vulnerabilities"
)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch each site and record the plugins its markup references
    Detect {
        /// Domain list, one site per line
        #[arg(short, long)]
        domains: Option<PathBuf>,

        /// Where to write the detection report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check detected plugins against the registry and vulnerability database
    Verify {
        /// Detection report produced by `detect`
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the audit report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (table, json, html)
        #[arg(short, long)]
        format: Option<String>,

        /// Skip vulnerability lookups
        #[arg(long)]
        no_vuln_check: bool,

        /// Exit non-zero when stale or vulnerable plugins are found
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,
    },

    /// Render the HTML report
    Report {
        /// Detection report produced by `detect`
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Audit report produced by `verify` (optional)
        #[arg(long)]
        audit: Option<PathBuf>,

        /// Where to write the HTML file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run detect, verify and report in sequence using configured paths
    Audit {
        /// Skip vulnerability lookups
        #[arg(long)]
        no_vuln_check: bool,

        /// Exit non-zero when stale or vulnerable plugins are found
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailOn {
    /// Any plugin with a known vulnerability
    Vulnerable,
    /// Any plugin behind the registry version (or vulnerable)
    Stale,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    init_logging(
        LogConfig::new()
            .level(config.log_level.clone())
            .verbosity(cli.verbose, cli.quiet),
    );

    match cli.command {
        Commands::Detect { domains, output } => {
            let domains = domains.unwrap_or_else(|| config.domains_file.clone());
            let output = output.unwrap_or_else(|| config.detections_file.clone());
            run_detect(&config, &domains, &output).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Verify {
            input,
            output,
            format,
            no_vuln_check,
            fail_on,
        } => {
            let format_str = format.unwrap_or_else(|| config.default_format.clone());
            let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
            let input = input.unwrap_or_else(|| config.detections_file.clone());
            let output = output.unwrap_or_else(|| config.report_file.clone());

            let detections = artifact::load_detections(&input)?;
            let report = run_verify(&config, &detections, no_vuln_check).await?;
            artifact::save_audit(&output, &report)?;
            info!(path = %output.display(), "audit report written");

            print_result(&report, &detections, format)?;
            Ok(determine_exit_code(&report, fail_on))
        }
        Commands::Report {
            input,
            audit,
            output,
        } => {
            let input = input.unwrap_or_else(|| config.detections_file.clone());
            let audit_path = audit.unwrap_or_else(|| config.report_file.clone());
            let output = output.unwrap_or_else(|| config.html_file.clone());

            let detections = artifact::load_detections(&input)?;
            let audit = artifact::load_audit_optional(&audit_path)?;
            if audit.is_none() {
                info!(
                    path = %audit_path.display(),
                    "no audit report found, rendering detections only"
                );
            }
            write_html(&output, &detections, audit.as_ref())?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Audit {
            no_vuln_check,
            fail_on,
        } => run_audit(&config, no_vuln_check, fail_on).await,
        Commands::Config { init, path } => {
            handle_config(&config_path, init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

/// Loads `--config` when given, otherwise the file at the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run_detect(config: &Config, domains_path: &Path, output: &Path) -> Result<DetectionReport> {
    let urls = load_domains(domains_path)?;
    if urls.is_empty() {
        anyhow::bail!("no domains loaded from {}", domains_path.display());
    }
    info!(count = urls.len(), path = %domains_path.display(), "loaded domains");

    let client = http_client(config.request_timeout(), &config.user_agent)?;
    let fetcher = HttpFetcher::new(client);

    let progress = if std::io::stderr().is_terminal() {
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let sites = scan_sites(&fetcher, &urls, |site| {
        if let Some(ref pb) = progress {
            pb.set_message(site.site.clone());
            pb.inc(1);
        }
    })
    .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = DetectionReport::new(sites);
    artifact::save_detections(output, &report)?;

    let failed = report.sites.iter().filter(|s| s.error.is_some()).count();
    info!(
        sites = report.sites.len(),
        plugins = report.plugin_count(),
        failed,
        path = %output.display(),
        "detection complete"
    );

    Ok(report)
}

async fn run_verify(
    config: &Config,
    detections: &DetectionReport,
    no_vuln_check: bool,
) -> Result<AuditReport> {
    let client = http_client(config.request_timeout(), &config.user_agent)?;

    let token = if no_vuln_check {
        None
    } else {
        config.wpscan_token()
    };
    let vulnerabilities = default_vulnerability_source(client.clone(), token);
    if !no_vuln_check && !vulnerabilities.is_enabled() {
        warn!(
            "no WPScan API token configured; set {} or wpscan_api_token to enable vulnerability lookups",
            TOKEN_ENV_VAR
        );
    }

    let spinner = if std::io::stderr().is_terminal() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!(
            "Verifying {} plugins...",
            detections.plugin_count()
        ));
        Some(pb)
    } else {
        None
    };

    let mut auditor = Auditor::new(default_registry(client), vulnerabilities)
        .with_delay(config.rate_limit_delay())
        .with_ignore(config.ignore.clone());
    let entries = auditor.audit(&detections.sites).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    Ok(AuditReport::new(entries))
}

/// Full pipeline. Detection failures abort; verification failures degrade
/// the HTML report to detections only.
async fn run_audit(config: &Config, no_vuln_check: bool, fail_on: Option<FailOn>) -> Result<u8> {
    let detections = run_detect(config, &config.domains_file, &config.detections_file).await?;

    let audit = match run_verify(config, &detections, no_vuln_check).await {
        Ok(report) => match artifact::save_audit(&config.report_file, &report) {
            Ok(()) => Some(report),
            Err(e) => {
                warn!(error = %e, "failed to save audit report, rendering detections only");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "verification failed, rendering detections only");
            None
        }
    };

    write_html(&config.html_file, &detections, audit.as_ref())?;

    match audit {
        Some(report) => {
            print_result(&report, &detections, OutputFormat::Table)?;
            Ok(determine_exit_code(&report, fail_on))
        }
        None => Ok(exit_codes::SUCCESS),
    }
}

fn write_html(path: &Path, detections: &DetectionReport, audit: Option<&AuditReport>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let html = generate_html_string(detections, audit);
    std::fs::write(path, html)
        .with_context(|| format!("Failed to write HTML report {}", path.display()))?;
    info!(path = %path.display(), "HTML report written");
    Ok(())
}

/// Determine the exit code based on findings and the --fail-on setting
fn determine_exit_code(report: &AuditReport, fail_on: Option<FailOn>) -> u8 {
    let fail_on = match fail_on {
        Some(level) => level,
        None => return exit_codes::SUCCESS,
    };

    let has_vulnerable = report.vulnerable_count() > 0;
    let has_stale = report.stale_count() > 0;

    match fail_on {
        FailOn::Vulnerable => {
            if has_vulnerable {
                exit_codes::VULNERABLE
            } else {
                exit_codes::SUCCESS
            }
        }
        FailOn::Stale => {
            if has_vulnerable {
                exit_codes::VULNERABLE
            } else if has_stale {
                exit_codes::STALE
            } else {
                exit_codes::SUCCESS
            }
        }
    }
}

fn handle_config(config_path: &Path, init: bool, show_path: bool) -> Result<()> {
    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save_to(config_path)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'wpaudit config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
