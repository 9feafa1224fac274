//! Terminal front end.
//!
//! Renders progress events as they arrive from the worker thread and drives
//! the post-build menu. Everything here only consumes events or calls the
//! [`Session`] API; nothing in the mesh core depends on it.

use std::io::{BufRead, Write};

use color_eyre::Result;
use log::{debug, warn};

use crate::orchestrator::Session;
use crate::progress::ProgressEvent;

pub const MENU_CHOICES: [&str; 5] = [
    "Print the network adjacency matrix",
    "Stop a container",
    "Restart a container",
    "Print the mesh status (JSON)",
    "Exit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    PrintMatrix,
    StopNode,
    RestartNode,
    Status,
    Exit,
}

/// Map a menu answer (`1`-`5`, or `q`) to an action.
pub fn parse_action(answer: &str) -> Option<MenuAction> {
    match answer.trim() {
        "1" => Some(MenuAction::PrintMatrix),
        "2" => Some(MenuAction::StopNode),
        "3" => Some(MenuAction::RestartNode),
        "4" => Some(MenuAction::Status),
        "5" | "q" | "Q" => Some(MenuAction::Exit),
        _ => None,
    }
}

/// A node number in `0..total`, if `answer` is one.
pub fn parse_node_number(answer: &str, total: usize) -> Option<usize> {
    answer.trim().parse::<usize>().ok().filter(|n| *n < total)
}

pub fn format_progress(event: &ProgressEvent, clock: &str) -> String {
    format!("[{}] Docker: {} {:?}", clock, event.message, event.elapsed)
}

/// Print one progress event with the local wall-clock time.
pub fn print_progress(event: ProgressEvent) {
    let clock = chrono::Local::now().format("%H:%M:%S").to_string();
    println!("{}", format_progress(&event, &clock));
}

fn write_menu<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "\t\tMENU\nChoose what you want to do:\n")?;
    for (i, choice) in MENU_CHOICES.iter().enumerate() {
        writeln!(output, "{}) {}", i + 1, choice)?;
    }
    write!(output, "\n> ")?;
    output.flush()
}

/// Read one line. `None` at end of input.
fn read_answer<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Ask for a node number until a valid one is given. `None` at end of input.
pub fn read_node_number<R: BufRead, W: Write>(input: &mut R, output: &mut W, total: usize) -> Result<Option<usize>> {
    writeln!(output, "The containers are numbered from 0 to {}", total.saturating_sub(1))?;
    write!(output, "Enter the container number: ")?;
    output.flush()?;
    loop {
        let Some(answer) = read_answer(input)? else {
            return Ok(None);
        };
        if let Some(number) = parse_node_number(&answer, total) {
            return Ok(Some(number));
        }
        writeln!(output, "Invalid container number")?;
    }
}

/// Run the menu until the user exits or input ends.
///
/// Failed stop/restart requests are reported and the menu continues.
pub fn run_menu<R: BufRead, W: Write>(session: &mut Session<'_>, input: &mut R, output: &mut W) -> Result<()> {
    loop {
        write_menu(output)?;
        let Some(answer) = read_answer(input)? else {
            writeln!(output, "No choice selected, quitting...")?;
            return Ok(());
        };
        let Some(action) = parse_action(&answer) else {
            writeln!(output, "Unknown choice '{}'", answer.trim())?;
            continue;
        };
        debug!("Menu action: {:?}", action);

        match action {
            MenuAction::PrintMatrix => {
                let environment = session.environment();
                if environment.topology.group_count == 1 {
                    writeln!(output, "The adjacency matrix is not available because there is only 1 network")?;
                } else {
                    write!(output, "{}", environment.matrix)?;
                }
            }
            MenuAction::StopNode | MenuAction::RestartNode => {
                let Some(index) = read_node_number(input, output, session.total_nodes())? else {
                    continue;
                };
                let outcome = if action == MenuAction::StopNode {
                    session.stop_node(index)
                } else {
                    session.restart_node(index)
                };
                match outcome {
                    Ok(()) if action == MenuAction::StopNode => writeln!(output, "Container {} stopped", index)?,
                    Ok(()) => writeln!(output, "Container {} restarted", index)?,
                    Err(err) => {
                        warn!("{}", err);
                        writeln!(output, "Error: {}", err)?;
                    }
                }
            }
            MenuAction::Status => {
                writeln!(output, "{}", session.status().to_json()?)?;
            }
            MenuAction::Exit => {
                writeln!(output, "Exiting...")?;
                return Ok(());
            }
        }
    }
}
