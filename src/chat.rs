//! Line-oriented terminal chat client (`kbg chat`).
//!
//! Plain lines are questions for the gateway; lines starting with `/` are
//! commands. Questions are awaited one at a time, so input is never read
//! while an answer is pending.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `/new` | Start a new chat (clears history and session) |
//! | `/model <id>` | Select a model; `/model` alone returns to the default |
//! | `/models` | List the model catalog |
//! | `/history` | Show the most recent exchanges |
//! | `/urls` | Load and show the URL form |
//! | `/url add <u>`, `/url pop` | Edit seed URLs |
//! | `/exclude add <f>`, `/exclude pop` | Edit exclusion filters |
//! | `/include add <f>`, `/include pop` | Edit inclusion filters |
//! | `/urls submit` | Submit the form |
//! | `/quit` | Exit |

use std::io::Write;

use anyhow::Result;
use kb_gateway_core::conversation::{
    Action, Conversation, EntryState, HistoryEntry, Outcome, VISIBLE_HISTORY,
};
use kb_gateway_core::url_form::{FilterKind, UrlSourcesForm};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::GatewayClient;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    NewChat,
    SelectModel(Option<String>),
    ListModels,
    History,
    ShowUrls,
    AddUrl(String),
    PopUrl,
    AddFilter(FilterKind, String),
    PopFilter(FilterKind),
    SubmitUrls,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Ask(line.to_string());
    }

    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let sub = words.next().unwrap_or_default();
    let arg = words.collect::<Vec<_>>().join(" ");

    match (head, sub) {
        ("/new", "") => Command::NewChat,
        ("/model", "") => Command::SelectModel(None),
        ("/model", id) => Command::SelectModel(Some(id.to_string())),
        ("/models", "") => Command::ListModels,
        ("/history", "") => Command::History,
        ("/urls", "") => Command::ShowUrls,
        ("/urls", "submit") => Command::SubmitUrls,
        ("/url", "add") => Command::AddUrl(arg),
        ("/url", "pop") => Command::PopUrl,
        ("/exclude", "add") => Command::AddFilter(FilterKind::Exclusion, arg),
        ("/exclude", "pop") => Command::PopFilter(FilterKind::Exclusion),
        ("/include", "add") => Command::AddFilter(FilterKind::Inclusion, arg),
        ("/include", "pop") => Command::PopFilter(FilterKind::Inclusion),
        ("/quit", "") | ("/exit", "") => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

pub struct ChatSession {
    client: GatewayClient,
    conversation: Conversation,
    form: Option<UrlSourcesForm>,
}

impl ChatSession {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            conversation: Conversation::new(),
            form: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Handle one command. Returns `false` when the session should end.
    pub async fn handle(&mut self, command: Command, out: &mut impl Write) -> Result<bool> {
        match command {
            Command::Empty => {}
            Command::Quit => return Ok(false),
            Command::Ask(question) => self.ask(question, out).await?,
            Command::NewChat => {
                self.conversation.apply(Action::NewChat);
                writeln!(out, "(new chat)")?;
            }
            Command::SelectModel(model) => {
                let label = model.clone().unwrap_or_else(|| "default".to_string());
                self.conversation.apply(Action::SelectModel(model));
                writeln!(out, "(model: {})", label)?;
            }
            Command::ListModels => match self.client.models(true).await {
                Ok(models) => {
                    for m in models {
                        writeln!(
                            out,
                            "  {}  {} ({})",
                            m.model_id,
                            m.model_name.unwrap_or_default(),
                            m.provider_name.unwrap_or_default()
                        )?;
                    }
                }
                Err(e) => writeln!(out, "error: {:#}", e)?,
            },
            Command::History => {
                for entry in self.conversation.recent(VISIBLE_HISTORY) {
                    print_entry(entry, out)?;
                }
            }
            Command::ShowUrls => {
                if let Err(e) = self.load_form().await {
                    writeln!(out, "error: {:#}", e)?;
                } else {
                    self.print_form(out)?;
                }
            }
            Command::AddUrl(url) => {
                if let Some(form) = self.editable_form(out).await? {
                    if !form.add_url(url) {
                        writeln!(out, "seed URL list is full")?;
                    }
                    self.print_form(out)?;
                }
            }
            Command::PopUrl => {
                if let Some(form) = self.editable_form(out).await? {
                    form.remove_last_url();
                    self.print_form(out)?;
                }
            }
            Command::AddFilter(kind, filter) => {
                if let Some(form) = self.editable_form(out).await? {
                    form.add_filter(kind, filter);
                    self.print_form(out)?;
                }
            }
            Command::PopFilter(kind) => {
                if let Some(form) = self.editable_form(out).await? {
                    form.remove_last_filter(kind);
                    self.print_form(out)?;
                }
            }
            Command::SubmitUrls => {
                let Some(update) = self.form.as_ref().map(UrlSourcesForm::submission) else {
                    writeln!(out, "nothing to submit; use /urls first")?;
                    return Ok(true);
                };
                match self.client.update_urls(&update).await {
                    Ok(_) => {
                        writeln!(out, "URLs updated")?;
                        // Show what was actually stored.
                        if let Err(e) = self.load_form().await {
                            writeln!(out, "error: {:#}", e)?;
                        } else {
                            self.print_form(out)?;
                        }
                    }
                    Err(e) => writeln!(out, "error: {:#}", e)?,
                }
            }
            Command::Unknown(line) => writeln!(out, "unknown command: {}", line)?,
        }
        Ok(true)
    }

    async fn ask(&mut self, question: String, out: &mut impl Write) -> Result<()> {
        let Outcome::Send(pending) = self.conversation.apply(Action::Submit(question)) else {
            return Ok(());
        };

        let result = self
            .client
            .ask(
                &pending.question,
                pending.session_id.as_deref(),
                pending.model_id.as_deref(),
            )
            .await;
        let action = match result {
            Ok((status, reply)) if status.is_success() => Action::Answered {
                ticket: pending.ticket,
                reply,
            },
            Ok((_, reply)) => Action::Errored {
                ticket: pending.ticket,
                reply,
            },
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "question failed");
                Action::Failed {
                    ticket: pending.ticket,
                }
            }
        };
        self.conversation.apply(action);

        if let Some(entry) = self.conversation.history().last() {
            print_answer(entry, out)?;
        }
        Ok(())
    }

    /// The form to edit, loaded from the gateway first if needed.
    ///
    /// Submitting replaces the stored configuration wholesale, so edits
    /// always start from what is stored.
    async fn editable_form(&mut self, out: &mut impl Write) -> Result<Option<&mut UrlSourcesForm>> {
        if self.form.is_none() {
            if let Err(e) = self.load_form().await {
                writeln!(out, "error: {:#}", e)?;
                return Ok(None);
            }
        }
        Ok(self.form.as_mut())
    }

    async fn load_form(&mut self) -> Result<()> {
        let settings = self.client.get_urls().await?;
        self.form = Some(UrlSourcesForm::from_settings(&settings));
        Ok(())
    }

    fn print_form(&self, out: &mut impl Write) -> Result<()> {
        let Some(form) = self.form.as_ref() else {
            return Ok(());
        };
        writeln!(out, "seed URLs:")?;
        for (i, url) in form.urls().iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, url)?;
        }
        writeln!(out, "exclusion filters:")?;
        for f in form.filters(FilterKind::Exclusion) {
            writeln!(out, "  - {}", f)?;
        }
        writeln!(out, "inclusion filters:")?;
        for f in form.filters(FilterKind::Inclusion) {
            writeln!(out, "  - {}", f)?;
        }
        Ok(())
    }
}

fn print_answer(entry: &HistoryEntry, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", entry.answer.as_deref().unwrap_or_default())?;
    if let Some(ref citation) = entry.citation {
        writeln!(out, "  source: {}", citation)?;
    }
    Ok(())
}

fn print_entry(entry: &HistoryEntry, out: &mut impl Write) -> Result<()> {
    writeln!(out, "> {}", entry.question)?;
    match entry.state {
        EntryState::Pending => writeln!(out, "...")?,
        EntryState::Answered | EntryState::Errored => print_answer(entry, out)?,
    }
    Ok(())
}

/// Run the interactive loop on stdin/stdout until `/quit` or end of input.
pub async fn run_chat(client: GatewayClient) -> Result<()> {
    let mut session = ChatSession::new(client);
    let interactive = atty::is(atty::Stream::Stdin);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    if interactive {
        writeln!(stdout, "Ask a question, or /quit to exit.")?;
    }
    loop {
        if interactive {
            write!(stdout, "> ")?;
            stdout.flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !session.handle(parse_command(&line), &mut stdout).await? {
            break;
        }
    }
    Ok(())
}
