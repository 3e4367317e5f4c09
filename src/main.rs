mod classify;
mod config;
mod email;
mod error;
mod extract;
mod models;
mod pipeline;
mod reply;
mod resume;
mod roles;
mod sent_log;
mod store;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use classify::{Classification, Classifier};
use config::{Config, Identity, MailSettings};
use email::{ImapConfig, ImapMailbox, SmtpConfig, SmtpSender};
use error::ConfigError;
use extract::{extract_company, extract_role_title, reply_subject};
use pipeline::{Collaborators, Pipeline, RunOptions};
use resume::{EnvSecrets, ResumeResolver, encode_resume};
use roles::RoleRegistry;
use sent_log::CsvSentLog;
use store::{DedupStore, JsonFileStore, ProcessedIds};

#[derive(Parser)]
#[command(name = "jobreply")]
#[command(about = "Answer recruiter emails with the right resume, once")]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory for the dedup store, sent log and agent log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML file with the role table (built-in table if omitted)
    #[arg(long, global = true)]
    roles: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the inbox once and reply to new job emails
    Run {
        /// Classify and log only - send nothing, save nothing
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of unread messages to look at
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// List roles in match priority order
    Roles,

    /// Classify a saved .eml file without sending anything
    Check {
        /// Path to a raw RFC 822 message
        file: PathBuf,
    },

    /// Print a resume file as base64 for storing in a secret
    EncodeResume {
        /// Resume file (.docx)
        file: PathBuf,

        /// Secret name, prints NAME=<base64>
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Show or clear the record of processed messages
    State {
        /// Forget every processed message id
        #[arg(long)]
        reset: bool,

        /// Confirm --reset
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.roles.is_some() {
        config.roles_file = cli.roles;
    }
    setup_logging(&cli.log_level, &config.data_dir);

    match cli.command {
        Commands::Run { dry_run, max } => cmd_run(&config, dry_run, max),
        Commands::Roles => cmd_roles(&config),
        Commands::Check { file } => cmd_check(&config, &file),
        Commands::EncodeResume { file, secret } => cmd_encode(&file, secret.as_deref()),
        Commands::State { reset, yes } => cmd_state(&config, reset, yes),
    }
}

/// Set up tracing with stderr output and, when the data dir is writable, a log file.
fn setup_logging(level: &str, log_dir: &Path) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, "agent.log");
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

fn load_registry(config: &Config) -> Result<RoleRegistry> {
    match &config.roles_file {
        Some(path) => Ok(RoleRegistry::from_toml_file(path)?),
        None => Ok(RoleRegistry::builtin()),
    }
}

fn run_settings(config: &Config) -> Result<(Identity, MailSettings), ConfigError> {
    let identity = config.identity()?;
    let mail = MailSettings::from_env()?;
    Ok((identity, mail))
}

fn cmd_run(config: &Config, dry_run: bool, max: Option<usize>) -> Result<()> {
    // Fail on bad settings before touching the mailbox.
    let (identity, mail) = match run_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };
    let registry = load_registry(config)?;
    let options = RunOptions {
        max_messages: max.unwrap_or(mail.max_messages),
        dry_run,
    };

    tracing::info!(
        account = %identity.email,
        roles = registry.roles().len(),
        dry_run = options.dry_run,
        "Starting run"
    );

    let mut mailbox = ImapMailbox::new(ImapConfig {
        server: mail.imap_host.clone(),
        port: mail.imap_port,
        username: identity.email.clone(),
        password: identity.app_password.trim().to_string(),
    });
    let mut sender = SmtpSender::new(&SmtpConfig {
        server: mail.smtp_host.clone(),
        port: mail.smtp_port,
        username: identity.email.clone(),
        password: identity.app_password.clone(),
        from_name: identity.name.clone(),
    })?;
    let mut sink = CsvSentLog::new(config.sent_log_path());
    let store = JsonFileStore::new(config.state_path());
    let resumes = ResumeResolver::new(
        EnvSecrets,
        &config.resume_dir,
        registry.default_role().resume_ref.clone(),
    );

    let io = Collaborators {
        mailbox: &mut mailbox,
        sender: &mut sender,
        sink: &mut sink,
        store: &store,
    };
    let stats = Pipeline::new(&registry, &resumes, &identity.name, io).run(&options)?;

    println!("\nResults:");
    println!("  Emails scanned:  {}", stats.fetched);
    println!("  Already handled: {}", stats.skipped);
    println!("  Job emails:      {}", stats.matched);
    if options.dry_run {
        println!("  Would reply:     {}", stats.would_reply);
    } else {
        println!("  Replied:         {}", stats.replied);
    }
    if stats.unrecorded > 0 {
        println!("  Not in sent log: {}", stats.unrecorded);
    }
    if stats.failed > 0 {
        println!("  Failed:          {}", stats.failed);
    }
    if stats.unreadable > 0 {
        println!("  Unreadable:      {}", stats.unreadable);
    }
    if options.dry_run {
        println!("\n(Dry run - nothing was sent or saved)");
    } else {
        println!("\nSent log: {}", sink.path().display());
    }

    Ok(())
}

fn cmd_roles(config: &Config) -> Result<()> {
    let registry = load_registry(config)?;

    println!("{:<4} {:<28} {:<22} {:<14} {}", "#", "ROLE", "RESUME", "CC", "KEYWORDS");
    println!("{}", "-".repeat(100));
    for (i, role) in registry.roles().iter().enumerate() {
        println!(
            "{:<4} {:<28} {:<22} {:<14} {}",
            i + 1,
            truncate(&role.name, 26),
            truncate(&role.resume_ref, 20),
            truncate(&role.cc_ref, 12),
            role.keywords.join(", ")
        );
    }
    let default = registry.default_role();
    println!(
        "{:<4} {:<28} {:<22} {:<14} (fallback)",
        "-",
        truncate(&default.name, 26),
        truncate(&default.resume_ref, 20),
        truncate(&default.cc_ref, 12)
    );
    Ok(())
}

fn cmd_check(config: &Config, file: &Path) -> Result<()> {
    let registry = load_registry(config)?;
    let raw = std::fs::read(file)
        .with_context(|| format!("Failed to read message file: {}", file.display()))?;
    let message = email::parse_message(&raw, &file.display().to_string())?;

    println!("Id:      {}", message.external_id);
    println!("From:    {}", message.sender);
    println!("Subject: {}", message.subject);

    match Classifier::new(&registry).classify(&message) {
        Classification::NotJob => {
            println!("\nNot a job email - no reply would be sent.");
        }
        Classification::Job { role, matched } => {
            println!("\nJob email");
            if matched {
                println!("  Role:     {}", role.name);
            } else {
                println!("  Role:     {} (no role keyword matched)", role.name);
            }
            println!("  Title:    {}", extract_role_title(&message));
            println!("  Company:  {}", extract_company(&message));
            println!("  Reply to: {}", extract::extract_address(message.reply_target()));
            println!("  Subject:  {}", reply_subject(&message.subject));
            println!("  Resume:   {}", role.resume_ref);
            println!("  CC:       {}", role.cc_ref);
        }
    }
    Ok(())
}

fn cmd_encode(file: &Path, secret: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read resume file: {}", file.display()))?;
    if bytes.is_empty() {
        bail!("Resume file is empty: {}", file.display());
    }

    let encoded = encode_resume(&bytes);
    match secret {
        Some(name) => println!("{}={}", name, encoded),
        None => println!("{}", encoded),
    }
    Ok(())
}

fn cmd_state(config: &Config, reset: bool, yes: bool) -> Result<()> {
    let store = JsonFileStore::new(config.state_path());

    if reset {
        if !yes {
            bail!("Refusing to reset {} without --yes", store.path().display());
        }
        store.save(&ProcessedIds::default())?;
        println!("Cleared processed ids at {}", store.path().display());
        return Ok(());
    }

    let ids = store.load()?;
    println!("Dedup store: {}", store.path().display());
    if ids.is_empty() {
        println!("Processed messages: none yet");
    } else {
        println!("Processed messages: {}", ids.len());
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
