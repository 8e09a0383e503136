//! Terminal front end for a single booking session.

use anyhow::Context;
use async_trait::async_trait;
use concierge_api::wiring;
use concierge_booking::{CheckoutOutcome, Command, ContactSource, Session};
use concierge_store::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BANNER: &str = "Welcome! I can book arrival and departure services. \
Type \"cart\" to see your cart, \"checkout\" to pay, \"cancel\" to drop the current booking or \"exit\" to leave.";

/// Reads contact answers from the same stdin the conversation uses.
struct StdinContactSource<'a> {
    lines: &'a mut Lines<BufReader<Stdin>>,
}

#[async_trait]
impl ContactSource for StdinContactSource<'_> {
    async fn next_input(&mut self, prompt: &str) -> Option<String> {
        say(prompt).await;
        prompt_marker().await;
        match self.lines.next_line().await {
            Ok(Some(line)) if Command::parse(&line) != Some(Command::Cancel) => Some(line),
            _ => None,
        }
    }
}

async fn say(text: &str) {
    let mut out = tokio::io::stdout();
    let _ = out.write_all(format!("{}\n", text).as_bytes()).await;
    let _ = out.flush().await;
}

async fn prompt_marker() {
    let mut out = tokio::io::stdout();
    let _ = out.write_all(b"> ").await;
    let _ = out.flush().await;
}

fn describe(outcome: &CheckoutOutcome) -> String {
    let mut text = outcome.message();
    if let CheckoutOutcome::Completed(summary) = outcome {
        for item in &summary.items {
            if let Some(err) = item.reservation_error.as_ref().or(item.contact_error.as_ref()) {
                text.push_str(&format!("\n  item {}: {}", item.item_id, err));
            }
        }
    }
    text
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().context("Failed to load config")?;
    let collaborators = wiring::collaborators(&config)?;
    let mut session = Session::new(collaborators, wiring::session_settings(&config));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    say(BANNER).await;

    loop {
        prompt_marker().await;
        let Some(line) = lines.next_line().await? else {
            session.exit();
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match Command::parse(text) {
            Some(Command::ShowCart) => say(&session.show_cart().render()).await,
            Some(Command::Checkout) => {
                let mut source = StdinContactSource { lines: &mut lines };
                let outcome = session.checkout(&mut source).await;
                say(&describe(&outcome)).await;
            }
            Some(Command::Cancel) => match session.active_item() {
                Some(id) => match session.cancel_item(&id) {
                    Ok(()) => say("Okay, I dropped that booking.").await,
                    Err(err) => say(&err.to_string()).await,
                },
                None => say("There is no booking in progress.").await,
            },
            Some(Command::Exit) => {
                let abandoned = session.exit();
                if abandoned > 0 {
                    say(&format!("Goodbye! {} unfinished booking(s) were discarded.", abandoned)).await;
                } else {
                    say("Goodbye!").await;
                }
                break;
            }
            None => {
                let reply = session.submit_input(text).await;
                say(&reply.message).await;
            }
        }
    }
    Ok(())
}
