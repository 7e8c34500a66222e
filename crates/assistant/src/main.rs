//! Interactive front end: a terminal menu over the Gmail priority manager,
//! the Slack components, and the WhatsApp assistant.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use assistant::capability::{
    InferenceClient, ReplyGenerator, SentimentAnalyzer, TextSummarizer, Unavailable,
};
use assistant::classify::PriorityClassifier;
use assistant::config::{Config, GmailSecrets, SlackSecrets, TwilioSecrets};
use assistant::mail::gmail::GmailMailbox;
use assistant::manager::PriorityManager;
use assistant::reminder::{
    parse_snooze_datetime, parse_snooze_hours, DueReminder, ReminderAction, ReminderPrompt,
    DEFAULT_SNOOZE_HOURS,
};
use assistant::slack::{
    SlackClient, SlackDailyDigest, SlackMessageToTask, SlackSmartSearch, SlackSummarizer,
};
use assistant::store::{BehaviorRepository, JsonFileStore};
use assistant::suggest::ResponseSuggester;
use assistant::summarize::ThreadSummarizer;
use assistant::whatsapp::{
    ChatOutcome, HeuristicStrategy, IncomingChat, TwilioClient, WhatsAppAssistant,
};
use chrono::{Duration, Utc};
use shared_types::ReminderKind;

#[derive(Parser)]
#[command(name = "assistant")]
#[command(about = "Communication-triage assistant for Gmail, Slack, and WhatsApp")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "assistant.toml")]
    config: PathBuf,

    /// Override the behavior store path from the config file.
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,
}

/// The model capabilities, bundled for hand-off to each surface.
struct Capabilities {
    sentiment: Arc<dyn SentimentAnalyzer>,
    summarizer: Arc<dyn TextSummarizer>,
    generator: Arc<dyn ReplyGenerator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = if cli.config.exists() {
        Config::load(&cli.config).context("failed to load configuration")?
    } else {
        tracing::warn!(
            "config file {} not found, using defaults",
            cli.config.display()
        );
        Config::default()
    };
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    let capabilities = build_capabilities(&config)?;
    let repo: Arc<JsonFileStore> = Arc::new(JsonFileStore::new(&config.store_path));

    let manager = match connect_gmail(&config, &capabilities, repo.clone()).await {
        Ok(manager) => {
            println!("Authentication successful! Communication assistant initialized.");
            Some(manager)
        }
        Err(e) => {
            tracing::error!("failed to initialize the Gmail priority manager: {e}");
            None
        }
    };

    loop {
        println!("\n===== Communication Assistant =====");
        println!("1. Gmail");
        println!("2. Slack");
        println!("3. WhatsApp");
        println!("4. Exit");

        match prompt_line("\nSelect an option (1-4): ").as_str() {
            "1" => match &manager {
                Some(manager) => gmail_menu(manager, &config).await,
                None => println!("Gmail is unavailable (initialization failed at startup)."),
            },
            "2" => slack_menu(&capabilities, &config).await,
            "3" => whatsapp_menu(&capabilities, repo.as_ref()).await,
            "4" => {
                println!("Goodbye!");
                return Ok(());
            }
            _ => println!("Invalid choice. Please select a number between 1 and 4."),
        }
    }
}

fn build_capabilities(config: &Config) -> anyhow::Result<Capabilities> {
    Ok(match &config.inference_url {
        Some(url) => {
            let client = Arc::new(
                InferenceClient::new(url.clone()).context("failed to build inference client")?,
            );
            Capabilities {
                sentiment: client.clone(),
                summarizer: client.clone(),
                generator: client,
            }
        }
        None => {
            tracing::warn!("no inference_url configured; model capabilities run degraded");
            Capabilities {
                sentiment: Arc::new(Unavailable),
                summarizer: Arc::new(Unavailable),
                generator: Arc::new(Unavailable),
            }
        }
    })
}

async fn connect_gmail(
    config: &Config,
    capabilities: &Capabilities,
    repo: Arc<JsonFileStore>,
) -> anyhow::Result<PriorityManager> {
    let secrets = GmailSecrets::from_env()?;
    let mailbox = GmailMailbox::connect(&secrets).await?;

    let suggester = match &config.response_templates {
        Some(path) if path.exists() => ResponseSuggester::from_template_file(path)?,
        Some(path) => {
            tracing::warn!(
                "response template file {} not found, using built-in templates",
                path.display()
            );
            ResponseSuggester::builtin()
        }
        None => ResponseSuggester::builtin(),
    };

    Ok(PriorityManager::new(
        Arc::new(mailbox),
        repo,
        PriorityClassifier::new(config.scoring.clone(), capabilities.sentiment.clone()),
        ThreadSummarizer::new(
            capabilities.summarizer.clone(),
            config.scoring.urgent_keywords.clone(),
        ),
        suggester,
    ))
}

async fn gmail_menu(manager: &PriorityManager, config: &Config) {
    loop {
        println!("\n===== Gmail Menu =====");
        println!("1. Check Priority Inbox");
        println!("2. Check Reminders");
        println!("3. Back to Main Menu");

        match prompt_line("\nSelect an option (1-3): ").as_str() {
            "1" => priority_inbox(manager, config.max_fetch_per_poll).await,
            "2" => {
                println!("\nChecking for email reminders...");
                check_reminders(manager).await;
                println!("Reminder check complete.");
            }
            "3" => break,
            _ => println!("Invalid choice. Please select a number between 1 and 3."),
        }
    }
}

async fn priority_inbox(manager: &PriorityManager, max_fetch: u32) {
    let ids = match manager.list_recent(max_fetch).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("error fetching messages: {e}");
            return;
        }
    };
    if ids.is_empty() {
        println!("No recent messages found.");
        return;
    }

    for (i, id) in ids.iter().enumerate() {
        let result = manager.process_message(id).await;
        println!("\nEmail {}", i + 1);
        println!("Subject: {}", result.thread_summary.subject);
        println!("Priority: {}", result.classification.priority.as_str());
        println!("Summary: {}", excerpt(&result.thread_summary.summary, 100));
        for point in &result.thread_summary.key_points {
            println!("  * {point}");
        }
        println!("--------------------------");

        handle_email_response(manager, &result.message).await;

        if prompt_line("\nEnter 'n' for the next email or 'b' to go back: ").eq_ignore_ascii_case("b")
        {
            break;
        }
    }
}

async fn handle_email_response(manager: &PriorityManager, message: &shared_types::EmailMessage) {
    if message.id.is_empty() {
        return;
    }

    let suggestions = manager.suggest_responses(message);
    println!("\nResponse Suggestions:");
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, suggestion.kind.as_str(), suggestion.text);
    }

    if prompt_line("\nDo you want to send a suggested response? (y/n): ").eq_ignore_ascii_case("y") {
        let choice = loop {
            let input = prompt_line(&format!("\nSelect response option (1-{}): ", suggestions.len()));
            match input.parse::<usize>() {
                Ok(n) if (1..=suggestions.len()).contains(&n) => break n,
                _ => println!(
                    "Invalid selection. Please select a number between 1 and {}.",
                    suggestions.len()
                ),
            }
        };
        match manager
            .send_quick_response(message, &suggestions[choice - 1].text)
            .await
        {
            Ok(_) => println!("Response sent: {}", suggestions[choice - 1].kind.as_str()),
            Err(e) => tracing::error!("failed to send response: {e}"),
        }
    }

    if prompt_line("\nDo you want to flag this email for a reminder? (y/n): ")
        .eq_ignore_ascii_case("y")
    {
        let (reminder_time, kind) = loop {
            println!("\nReminder Options:");
            println!("1. Default Reminder (5 hours later)");
            println!("2. Custom Reminder (set hours)");
            match prompt_line("\nSelect reminder option (1-2): ").as_str() {
                "1" => break (Utc::now() + Duration::hours(5), ReminderKind::Default),
                "2" => {
                    let input = prompt_line("Remind again after how many hours? ");
                    match parse_snooze_hours(&input) {
                        Some(hours) => {
                            break (
                                Utc::now() + Duration::seconds((hours * 3600.0) as i64),
                                ReminderKind::Custom,
                            )
                        }
                        None => println!("Please enter a positive number of hours."),
                    }
                }
                _ => println!("Invalid selection. Please select 1 or 2."),
            }
        };
        match manager.flag_for_reminder(message, reminder_time, kind) {
            Ok(()) => println!("Email flagged for reminder at {reminder_time}."),
            Err(e) => tracing::error!("failed to flag reminder: {e}"),
        }
    }
}

/// Terminal implementation of the due-reminder prompt. Invalid input
/// re-prompts; invalid snooze values fall back to the 5-hour default.
struct TerminalPrompt;

impl ReminderPrompt for TerminalPrompt {
    fn choose_action(&mut self, due: &DueReminder) -> ReminderAction {
        println!("\nReminder due: \"{}\" from {}", due.subject, due.sender);
        println!("  (scheduled for {})", due.reminder_time);
        loop {
            println!("1. Open email");
            println!("2. Mark as read");
            println!("3. Snooze ({DEFAULT_SNOOZE_HOURS} hours)");
            println!("4. Snooze custom hours");
            println!("5. Snooze until date/time");

            match prompt_line("\nSelect an action (1-5): ").as_str() {
                "1" => return ReminderAction::Open,
                "2" => return ReminderAction::MarkRead,
                "3" => return ReminderAction::SnoozeDefault,
                "4" => {
                    let input = prompt_line("Snooze for how many hours? ");
                    return match parse_snooze_hours(&input) {
                        Some(hours) => ReminderAction::SnoozeHours(hours),
                        None => {
                            println!("Invalid hours, snoozing {DEFAULT_SNOOZE_HOURS} hours.");
                            ReminderAction::SnoozeDefault
                        }
                    };
                }
                "5" => {
                    let input = prompt_line("Snooze until (YYYY-MM-DD HH:MM, UTC): ");
                    return match parse_snooze_datetime(&input) {
                        Some(when) => ReminderAction::SnoozeUntil(when),
                        None => {
                            println!("Invalid date/time, snoozing {DEFAULT_SNOOZE_HOURS} hours.");
                            ReminderAction::SnoozeDefault
                        }
                    };
                }
                _ => println!("Invalid choice. Please select a number between 1 and 5."),
            }
        }
    }
}

async fn check_reminders(manager: &PriorityManager) {
    let handled = manager.check_reminders(&mut TerminalPrompt).await;
    if handled.is_empty() {
        println!("No reminders due.");
        return;
    }
    for (due, action) in handled {
        if action == ReminderAction::Open {
            match manager.fetch_message(&due.message_id).await {
                Ok(message) => {
                    println!("\n--- {} ---", message.subject);
                    println!("From: {}", message.from);
                    println!("{}", message.body);
                }
                Err(e) => tracing::error!("failed to open {}: {e}", due.message_id),
            }
        }
    }
}

async fn slack_menu(capabilities: &Capabilities, config: &Config) {
    let client = match SlackSecrets::from_env().and_then(|s| SlackClient::new(&s)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Slack is unavailable: {e}");
            return;
        }
    };

    let summarizer = SlackSummarizer::new(client.clone(), capabilities.summarizer.clone());
    let digest = SlackDailyDigest::new(client.clone(), config.digest_days);
    let tasks = SlackMessageToTask::new(client.clone());
    let search = SlackSmartSearch::new(client);

    loop {
        println!("\n===== Slack Menu =====");
        println!("1. Summarize Slack Conversations");
        println!("2. Generate Daily Digest");
        println!("3. Convert Messages to Tasks");
        println!("4. Smart Search & Retrieval");
        println!("5. Back to Main Menu");

        match prompt_line("\nSelect an option (1-5): ").as_str() {
            "1" => {
                let channel = prompt_line("Enter Slack channel ID: ");
                let summary = summarizer.summarize_channel(&channel).await;
                println!("Slack Conversation Summary: {summary}");
            }
            "2" => {
                let channel = prompt_line("Enter Slack channel ID: ");
                let messages = digest.fetch_daily(&channel).await;
                let text = SlackDailyDigest::format_digest(&messages);
                println!("Daily Digest:\n{text}");
                if !text.is_empty()
                    && prompt_line("\nSend this digest to the channel? (y/n): ")
                        .eq_ignore_ascii_case("y")
                {
                    match digest.send(&channel, &text).await {
                        Ok(()) => println!("Daily digest sent."),
                        Err(e) => tracing::error!("failed to send digest: {e}"),
                    }
                }
            }
            "3" => {
                let channel = prompt_line("Enter Slack channel ID: ");
                let extracted = tasks.extract_tasks(&channel, config.digest_days).await;
                if extracted.is_empty() {
                    println!("No tasks found.");
                } else {
                    for task in extracted {
                        println!("{} - {}: {}", task.timestamp, task.user, task.text);
                    }
                }
            }
            "4" => {
                let query = prompt_line("Enter search query: ");
                let results = search.search(&query).await;
                println!("Search Results:\n{}", SlackSmartSearch::format_results(&results));
            }
            "5" => break,
            _ => println!("Invalid choice. Please select a number between 1 and 5."),
        }
    }
}

async fn whatsapp_menu(capabilities: &Capabilities, repo: &JsonFileStore) {
    let twilio = match TwilioSecrets::from_env().and_then(TwilioClient::new) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("WhatsApp is unavailable: {e}");
            return;
        }
    };

    let assistant = WhatsAppAssistant::new(
        twilio,
        capabilities.generator.clone(),
        capabilities.summarizer.clone(),
        Box::new(HeuristicStrategy::default()),
    );

    println!("\n===== WhatsApp =====");
    let from = prompt_line("Sender number (e.g. +15551234567): ");
    if from.is_empty() {
        println!("No sender given.");
        return;
    }
    let body = prompt_line("Message body: ");
    let code = prompt_line("Action code (1=smart reply, 2=summarize, 3=basic, empty=auto): ");
    let code = (!code.is_empty()).then_some(code);

    let ledger = repo.load();
    let chat = IncomingChat { from, body };
    match assistant
        .handle_incoming(&chat, code.as_deref(), &ledger)
        .await
    {
        Ok(ChatOutcome::Replied(action)) => println!("Replied via {action:?}."),
        Ok(ChatOutcome::InvalidAction) => println!("Unknown action code; sender was notified."),
        Err(e) => tracing::error!("failed to handle message: {e}"),
    }
}

fn prompt_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim().to_string()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
