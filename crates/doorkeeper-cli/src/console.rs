//! Terminal stand-ins for the keypad, the reader and the LCD.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use doorkeeper_hardware::mock::{DisplayHandle, MockKeypadHandle, MockRfidHandle};

const SCREEN_POLL: Duration = Duration::from_millis(50);

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Key symbols, typed in order.
    Keys(String),
    /// A tag presented to the reader, as hex.
    Scan(String),
}

/// Parse one stdin line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    if words.next() == Some("scan") {
        let Some(uid) = words.next() else {
            bail!("usage: scan <HEX>");
        };
        if words.next().is_some() {
            bail!("usage: scan <HEX>");
        }
        return Ok(Some(Command::Scan(uid.to_string())));
    }

    Ok(Some(Command::Keys(line.split_whitespace().collect())))
}

/// Feed `input` line by line to the mock keypad and reader.
///
/// Returns at end of input. Dropping the handles then disconnects both
/// devices, which ends the controller loop.
pub async fn feed<R>(input: R, keypad: MockKeypadHandle, rfid: MockRfidHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let sent = match &command {
            Command::Keys(symbols) => keypad.send_symbols(symbols).await,
            Command::Scan(uid) => rfid.present_hex(uid).await,
        };
        if let Err(e) = sent {
            warn!(?command, error = %e, "Input rejected");
        }
    }

    Ok(())
}

/// Print the screen each time it changes.
pub async fn mirror_screen(screen: DisplayHandle) {
    let mut last = String::new();
    loop {
        let current = screen.render();
        if current != last {
            println!("{current}");
            last = current;
        }
        tokio::time::sleep(SCREEN_POLL).await;
    }
}
