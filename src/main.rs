use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use advisor_chat::client::HttpChatTransport;
use advisor_chat::config::ClientConfig;
use advisor_chat::error::Result;
use advisor_chat::transcript::Transcript;
use advisor_chat::ui::{
    parse_command, ChatSession, Command, Sender, SubmitOutcome, TerminalRenderer,
};

#[derive(Parser, Debug)]
#[command(name = "advisor-chat")]
#[command(about = "Terminal chat with the product advisor through an advisor-chatd proxy")]
#[command(version, long_version = env!("ADVISOR_LONG_VERSION"))]
struct Cli {
    #[command(flatten)]
    client: ClientConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    advisor_chat::logging::init_tracing("advisor_chat");
    let cli = Cli::parse();
    let config = cli.client;

    tracing::debug!(url = %config.url, timeout = ?config.timeout(), "Starting chat client");
    let transport = HttpChatTransport::new(config.url.clone());
    let renderer = TerminalRenderer::new(std::io::stdout());
    let mut session = ChatSession::new(
        Transcript::new(config.system_prompt.clone()),
        transport,
        renderer,
    )
    .with_timeout(config.timeout())
    .with_verbose(config.verbose);

    session.greet();
    session.ready();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            Some(Command::Quit) => break,
            Some(Command::Verbose(requested)) => {
                let verbose = requested.unwrap_or(!session.verbose());
                session.set_verbose(verbose);
                let notice = if verbose {
                    "Debug mode on: full error details will be shown."
                } else {
                    "Debug mode off."
                };
                session.render(notice, Sender::Ai);
                session.ready();
                continue;
            }
            None => {}
        }

        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher.cancel();
            }
        });

        let outcome = session.submit_with_cancel(&line, cancel).await;
        interrupt.abort();

        if outcome == SubmitOutcome::Ignored {
            session.ready();
        }
        if session.renderer().is_closed() {
            tracing::warn!("Terminal output closed; exiting");
            break;
        }
    }

    if !session.renderer().is_closed() {
        println!();
    }
    Ok(())
}
