use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use crossterm::{cursor, terminal, QueueableCommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use scrumbot::client::log_id_from_link;
use scrumbot::config::DEFAULT_CONFIG_FILE;
use scrumbot::shell::{Severity, notice_for, progress_bar};
use scrumbot::utils::format_bytes;
use scrumbot::{AudioFile, Config, ScrumBotClient, UploadEvent, UploadManager};

#[derive(Parser, Debug)]
#[command(name = "scrumbot", version, about = "Submit voice standups to ScrumBot and read the results")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the api root from the config file
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a recording and wait for it to be processed
    Upload {
        file: PathBuf,
        /// Stay until the result notice resets by itself
        #[arg(long)]
        wait_reset: bool,
    },
    /// Check the backend is up
    Ping,
    /// List voice logs
    Logs,
    /// Show one voice log
    Log { id: i64 },
    /// Sprint report for the last N days
    Report {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Latest emotion trends
    Trends,
    /// Trend insights
    Insights,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let client = Arc::new(ScrumBotClient::from_config(&config)?);

    match cli.command {
        Command::Upload { file, wait_reset } => upload(client, &config, file, wait_reset).await?,
        Command::Ping => println!("{}", client.ping().await?.status),
        Command::Logs => {
            let logs = client.logs().await?;
            if logs.is_empty() {
                println!("No logs yet.");
            }
            for log in logs {
                println!("#{:<4} {:<10} {}", log.id, log.emotion, log.summary);
            }
        }
        Command::Log { id } => print_log(&client.log(id).await?),
        Command::Report { days } => println!("{}", client.report(days).await?.markdown_report),
        Command::Trends => println!("{}", serde_json::to_string_pretty(&client.latest_trends().await?)?),
        Command::Insights => println!("{}", serde_json::to_string_pretty(&client.insights().await?)?),
    }

    Ok(())
}

async fn upload(client: Arc<ScrumBotClient>, config: &Config, path: PathBuf, wait_reset: bool) -> anyhow::Result<()> {
    let file = AudioFile::from_path(&path)
        .await
        .with_context(|| format!("Can't read {}", path.display()))?;
    println!("Selected: {} ({})", file.file_name, format_bytes(file.size));

    let handle = UploadManager::new(client.clone(), config.upload_config());
    let mut events = handle.manager.subscribe_events();
    handle.manager.select_file(file).await?;
    handle.manager.submit().await?;

    let mut stdout = std::io::stdout();
    let mut outcome: Option<Result<String, String>> = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(UploadEvent::Progress { percent, .. }) => {
                    stdout.queue(cursor::MoveToColumn(0))?;
                    stdout.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
                    write!(stdout, "{}", progress_bar(percent, 40))?;
                    stdout.flush()?;
                }
                Ok(event) => {
                    if let Some(notice) = notice_for(&event, |link| client.resolve_link(link)) {
                        let text = match notice.severity {
                            Severity::Info => notice.text.dim(),
                            Severity::Success => notice.text.green(),
                            Severity::Error => notice.text.red(),
                        };
                        println!();
                        println!("{}", text);
                    }

                    match event {
                        UploadEvent::Completed { result_link, .. } => outcome = Some(Ok(result_link)),
                        UploadEvent::Failed { error, .. } => outcome = Some(Err(error)),
                        UploadEvent::Reset { .. } => break,
                        _ => {}
                    }

                    if outcome.is_some() && !wait_reset {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Cancelled.".yellow());
                break;
            }
        }
    }

    handle.shutdown().await?;

    match outcome {
        Some(Ok(link)) => {
            if let Some(log_id) = log_id_from_link(&link) {
                match client.log(log_id).await {
                    Ok(log) => print_log(&log),
                    Err(err) => warn!("could not fetch log {}: {}", log_id, err),
                }
            }
            Ok(())
        }
        Some(Err(error)) => bail!(error),
        None => Ok(()),
    }
}

fn print_log(log: &scrumbot::client::VoiceLog) {
    println!("{} {}", "Log".bold(), log.id);
    println!("  file:       {}", log.filename);
    println!("  emotion:    {}", log.emotion);
    println!("  summary:    {}", log.summary);
    if !log.blockers.is_empty() {
        println!("  blockers:   {}", log.blockers.join(", "));
    }
    if !log.next_steps.is_empty() {
        println!("  next steps: {}", log.next_steps.join(", "));
    }
    if let Some(url) = &log.jira_issue_url {
        println!("  jira:       {}", url);
    }
}
