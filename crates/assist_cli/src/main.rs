use std::io;

use assist_cli::commands::{append_line, parse_command, Command, HELP};
use assist_cli::render::describe_change;
use assist_session::{init_logging, EnvConfig, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

#[tokio::main]
async fn main() -> io::Result<()> {
    let env = EnvConfig::from_env().map_err(io::Error::other)?;
    if let Err(error) = init_logging(&env.log_config()) {
        eprintln!("logging disabled: {error}");
    }
    let config = env.session_config().map_err(io::Error::other)?;

    let session = Session::new(config).map_err(io::Error::other)?;
    let (notices, mut notice_rx) = mpsc::unbounded_channel();
    let _printer = session.store().subscribe(move |change, state| {
        if let Some(line) = describe_change(change, state) {
            let _ = notices.send(line);
        }
    });

    println!(
        "session {} streaming from {}",
        session.id(),
        session.connection().endpoint()
    );
    println!("type code, or /help for commands");
    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(notice) = notice_rx.recv() => println!("{notice}"),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&session, &line) {
                    break;
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

/// Returns false when the session should end.
fn handle_line(session: &Session, line: &str) -> bool {
    let Some(command) = parse_command(line) else {
        session.edit(append_line(&session.store().code(), line));
        return true;
    };

    match command {
        Command::Run => {
            let _ = session.run();
        }
        Command::Explain(None) => {
            let _ = session.explain();
        }
        Command::Explain(Some(level)) => {
            let _ = session.explain_with(level);
        }
        Command::Apply(number) => match session.store().suggestions().get(number - 1) {
            Some(suggestion) => session.apply_suggestion(suggestion.content.clone()),
            None => println!("no suggestion {number}"),
        },
        Command::Reset => session.edit(String::new()),
        Command::Status => match serde_json::to_string_pretty(&*session.store().snapshot()) {
            Ok(json) => println!("{json}"),
            Err(error) => warn!(%error, "failed to encode session state"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
        Command::Invalid(message) => println!("{message}"),
    }
    true
}
