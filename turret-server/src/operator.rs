//! Operator surface (§11): the keyboard contract on "the main display
//! window". No bitmap display or click-to-calibrate overlay exists in this
//! workspace's dependency pack, so the in-repo stand-in is a terminal raw-
//! mode keystroke reader, the same `crossterm` polling loop
//! `godview_core::dashboard` uses for its own `q`/quit key, dispatching into
//! a channel the main control loop selects on.
//!
//! `Q`/`ESC` quit, `P` pause (laser off + pattern stop, mode preserved),
//! `R` resume into SEARCH.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Quit,
    Pause,
    Resume,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Blocking keystroke poll, run on a dedicated blocking thread via
/// `spawn_blocking` since `crossterm::event::poll` is a synchronous call.
fn poll_key() -> std::io::Result<Option<OperatorCommand>> {
    if !event::poll(POLL_INTERVAL)? {
        return Ok(None);
    }
    if let Event::Key(key) = event::read()? {
        return Ok(match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(OperatorCommand::Quit),
            KeyCode::Char('p') | KeyCode::Char('P') => Some(OperatorCommand::Pause),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(OperatorCommand::Resume),
            _ => None,
        });
    }
    Ok(None)
}

async fn run_operator(subsys: SubsystemHandle, commands: mpsc::Sender<OperatorCommand>) -> anyhow::Result<()> {
    enable_raw_mode()?;
    log::info!("operator keyboard surface ready: Q/ESC quit, P pause, R resume");

    let result = loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => break Ok(()),
            polled = tokio::task::spawn_blocking(poll_key) => {
                match polled {
                    Ok(Ok(Some(cmd))) => {
                        if commands.send(cmd).await.is_err() {
                            break Ok(());
                        }
                        if cmd == OperatorCommand::Quit {
                            subsys.request_shutdown();
                        }
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => break Err(e.into()),
                    Err(e) => break Err(e.into()),
                }
            }
        }
    };

    let _ = disable_raw_mode();
    result
}

pub fn spawn_operator(subsys: &SubsystemHandle, commands: mpsc::Sender<OperatorCommand>) {
    subsys.start(SubsystemBuilder::new("Operator", move |s| run_operator(s, commands)));
}

/// One-line status print refreshed every tick (§6 "the operator sees the
/// current mode and a single line of status"). Deliberately `println!`, not
/// `log`, since this is an operator-facing readout rather than a diagnostic.
pub fn print_status(mode: &str, laser_on: bool, detection_summary: &str) {
    println!(
        "\rmode={mode:<10} laser={:<3} {detection_summary}",
        if laser_on { "ON" } else { "off" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_formats_without_panicking() {
        print_status("Track", true, "bird conf=0.91");
    }
}
