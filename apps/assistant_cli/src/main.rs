mod commands;
mod transcript;

use std::{
    io::{self as std_io, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use assistant_core::{
    load_settings, AllowListSanitizer, AnonymousIdentity, AssistantClient, ClientSettings,
    FailureKind, HttpTransport, IdentityProvider, KeywordClassifier, PersonaLabels, SelectOutcome,
    StaticIdentity, SubmitOutcome,
};
use chrono::Local;
use clap::Parser;
use shared::domain::Session;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{Command, HELP},
    transcript::Transcript,
};

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; `assistant.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `api_base_url` from settings and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Scope the session list to this user.
    #[arg(long)]
    identity: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std_io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref()).context("loading settings")?;
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    info!(
        api_base_url = %settings.api_base_url,
        sessions_path = %settings.sessions_path,
        "assistant_cli: starting"
    );

    let labels = persona_labels(&settings);
    let client = build_client(&settings, args.identity, labels.clone())?;
    let mut repl = Repl {
        client,
        labels,
        transcript: Transcript::default(),
        banner: None,
    };
    repl.run().await
}

fn persona_labels(settings: &ClientSettings) -> PersonaLabels {
    PersonaLabels {
        domain: settings.domain_persona_label.clone(),
        general: settings.general_persona_label.clone(),
    }
}

fn build_client(
    settings: &ClientSettings,
    identity: Option<String>,
    labels: PersonaLabels,
) -> Result<AssistantClient> {
    let transport = HttpTransport::from_settings(settings).context("building http transport")?;
    let identity: Arc<dyn IdentityProvider> = match identity {
        Some(name) => Arc::new(StaticIdentity(name)),
        None => Arc::new(AnonymousIdentity),
    };
    Ok(AssistantClient::new_with_dependencies(
        Arc::new(transport),
        Arc::new(KeywordClassifier::from_settings(settings)),
        identity,
        Arc::new(AllowListSanitizer),
        labels,
    ))
}

struct Repl {
    client: AssistantClient,
    labels: PersonaLabels,
    transcript: Transcript,
    banner: Option<FailureKind>,
}

impl Repl {
    async fn run(&mut self) -> Result<()> {
        // A failed fetch is reported through the banner below.
        let _ = self.client.open().await;
        println!("{HELP}\n");
        self.show_banner().await;

        let mut lines = BufReader::new(io::stdin()).lines();
        prompt()?;
        while let Some(line) = lines.next_line().await? {
            match commands::parse(&line) {
                None => {}
                Some(Err(err)) => println!("! {err}"),
                Some(Ok(Command::Quit)) => break,
                Some(Ok(command)) => self.execute(command).await,
            }
            self.show_banner().await;
            prompt()?;
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Say(text) => self.say(&text).await,
            Command::New => {
                self.client.sessions().create().await;
                self.transcript.reset();
                println!("(new conversation)");
            }
            Command::List => self.print_list().await,
            Command::Select(id) => match self.client.sessions().select(&id).await {
                Ok(SelectOutcome::AlreadyActive) => println!("(already open)"),
                Ok(SelectOutcome::Loaded { .. }) => {
                    self.transcript.reset();
                    let persona = self.persona_for_active().await;
                    self.show_new(true, &persona).await;
                }
                Ok(SelectOutcome::FellBack) => {
                    self.transcript.reset();
                    println!("(that conversation no longer exists, starting a new one)");
                }
                Ok(SelectOutcome::Discarded) | Err(_) => self.transcript.reset(),
            },
            Command::Delete(id) => {
                let was_active = self.client.snapshot().await.ui.active.is(&id);
                if self.client.sessions().delete(&id).await.is_ok() {
                    println!("(deleted {id})");
                    if was_active {
                        self.transcript.reset();
                    }
                }
            }
            Command::Search(term) => {
                let hits = self.client.sessions().search(&term).await;
                if term.is_empty() {
                    println!("(filter cleared)");
                } else {
                    println!("({} matching)", hits.len());
                }
                self.print_list().await;
            }
            Command::Dismiss => {
                self.client.dismiss_error().await;
                self.banner = None;
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    async fn say(&mut self, text: &str) {
        let persona = self
            .client
            .conversation()
            .persona_for_draft(text)
            .await
            .to_string();
        match self.client.submit(text).await {
            SubmitOutcome::Busy => println!("! still waiting for the previous answer"),
            SubmitOutcome::Ignored | SubmitOutcome::Discarded => {}
            SubmitOutcome::Created(_) | SubmitOutcome::Replied | SubmitOutcome::Failed(_) => {
                self.show_new(false, &persona).await;
            }
        }
    }

    /// User lines are echoed only when loading an existing conversation.
    async fn show_new(&mut self, include_user: bool, persona: &str) {
        let snapshot = self.client.snapshot().await;
        let client = &self.client;
        let lines = self.transcript.pending_lines(
            &snapshot.messages,
            include_user,
            persona,
            |message| client.render(message),
        );
        for line in lines {
            println!("{line}");
        }
    }

    async fn persona_for_active(&self) -> String {
        let snapshot = self.client.snapshot().await;
        let mode = snapshot
            .ui
            .active
            .session_id()
            .and_then(|id| snapshot.sessions.iter().find(|session| &session.id == id))
            .map(|session| session.mode)
            .unwrap_or_default();
        self.labels.label(mode).to_string()
    }

    async fn print_list(&self) {
        let groups = self.client.sessions().grouped(&Local::now()).await;
        if groups.is_empty() {
            println!("(no conversations)");
            return;
        }
        let active = self.client.snapshot().await.ui.active;
        let sections: [(&str, &[Session]); 4] = [
            ("Today", groups.today.as_slice()),
            ("Yesterday", groups.yesterday.as_slice()),
            ("This week", groups.this_week.as_slice()),
            ("Older", groups.older.as_slice()),
        ];
        for (heading, sessions) in sections {
            if sessions.is_empty() {
                continue;
            }
            println!("{heading}");
            for session in sessions {
                let marker = if active.is(&session.id) { '*' } else { ' ' };
                println!(" {marker} {}  {}", session.id, session.display_title());
            }
        }
    }

    async fn show_banner(&mut self) {
        let current = self.client.snapshot().await.ui.last_error;
        if let Some(kind) = current.filter(|kind| Some(*kind) != self.banner) {
            println!("! {} (/dismiss to hide)", kind.user_message());
        }
        self.banner = current;
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std_io::stdout().flush()?;
    Ok(())
}
