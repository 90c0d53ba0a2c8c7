//! `docqa ask` and `docqa chat`.
//!
//! Answers are printed as they stream in: each snapshot carries the full text
//! so far, and only the new suffix is written to stdout.

use std::io::{self, Write};

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use docqa_core::assembler::Snapshot;
use docqa_core::gating::NO_SOURCES_WARNING;
use docqa_core::{ExchangeOutcome, Session, SessionError};

use crate::config::Config;
use crate::files::print_inventory;
use crate::http::open_session;

/// Writes the growing answer incrementally.
pub(crate) struct StreamPrinter<W: Write> {
    out: W,
    printed: usize,
    error: Option<io::Error>,
}

impl<W: Write> StreamPrinter<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            error: None,
        }
    }

    pub(crate) fn apply(&mut self, snapshot: &Snapshot) {
        if self.error.is_some() {
            return;
        }
        let result = if snapshot.is_failed() {
            self.write_failure(&snapshot.text)
        } else {
            self.write_delta(&snapshot.text)
        };
        if let Err(e) = result {
            self.error = Some(e);
        }
    }

    fn write_delta(&mut self, text: &str) -> io::Result<()> {
        let delta = text.get(self.printed..).unwrap_or_default();
        if delta.is_empty() {
            return Ok(());
        }
        self.out.write_all(delta.as_bytes())?;
        self.out.flush()?;
        self.printed = text.len();
        Ok(())
    }

    // The partial answer already on screen stays; the fallback follows on its own line.
    fn write_failure(&mut self, fallback: &str) -> io::Result<()> {
        if self.printed > 0 {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{}", fallback)?;
        self.printed = 0;
        self.out.flush()
    }

    pub(crate) fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.printed > 0 {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Load the inventory and web sources so gating sees the service's state.
/// Failures are reported and otherwise ignored.
pub(crate) async fn prepare(session: &Session) {
    if let Err(e) = session.inventory().refresh().await {
        eprintln!("Warning: could not load the document list: {}", e);
    }
    if let Err(e) = session.web_sources().refresh().await {
        eprintln!("Warning: could not load web sources: {}", e);
    }
}

/// Ask one question and stream the answer to stdout.
pub async fn ask_once(session: &Session, question: &str, entertainment: bool) -> Result<()> {
    let mut printer = StreamPrinter::new(io::stdout());
    let outcome = session
        .send_question_with(question, entertainment, |s| printer.apply(s))
        .await;
    printer.finish()?;

    match outcome {
        Ok(ExchangeOutcome::Completed { .. }) | Ok(ExchangeOutcome::Superseded { .. }) => Ok(()),
        Ok(ExchangeOutcome::Failed { error, .. }) => bail!("{}", error),
        Err(SessionError::NoSources) => bail!("{}", NO_SOURCES_WARNING),
        Err(e) => Err(e.into()),
    }
}

pub async fn run_ask(config: &Config, question: &str, entertainment: bool) -> Result<()> {
    let session = open_session(config)?;
    prepare(&session).await;
    ask_once(&session, question, entertainment).await
}

/// Interactive loop. `/new` resets the conversation, `/files` lists the
/// documents, `/quit` (or end of input) exits. Errors are reported and the
/// loop continues.
pub async fn run_chat(config: &Config, entertainment: bool) -> Result<()> {
    let session = open_session(config)?;
    prepare(&session).await;

    println!(
        "Connected to {}. Mode: {}. Type /new, /files or /quit.",
        config.service.base_url,
        if entertainment { "entertainment" } else { "documents" }
    );
    if let Some(warning) = session.submit_warning(entertainment) {
        eprintln!("{}", warning);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => match session.reset_session().await {
                Ok(()) => println!("Started a new session."),
                Err(e) => eprintln!("Error: {}", e),
            },
            "/files" => {
                if let Err(e) = session.inventory().refresh().await {
                    eprintln!("Error: {}", e);
                }
                print_inventory(&session.inventory().inventory());
            }
            question => {
                if let Err(e) = ask_once(&session, question, entertainment).await {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    Ok(())
}
