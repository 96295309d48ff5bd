use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, trace, warn};

use crate::clock::{Clock, TickEvent, TickListener};
use crate::state::container::{RenderRequest, StateContainer};
use crate::state::model::Command;
use crate::template::MessageRenderer;
use crate::time_zone::ZoneFormatter;
use crate::ui::render::render_screen;

const MAX_SEARCH_RESULTS: usize = 20;

pub const HELP_TEXT: &str = "Commands:
  add <zone>              add a time zone (e.g. add Europe/London, add tokyo)
  rename <index> <label>  rename an entry
  delete <index>          remove an entry
  label <text>            set your own label (empty resets it)
  format <template>       set the message format
  custom <datetime>       show every clock at a fixed instant
  custom off              back to the live time
  zones [query]           list matching time zones
  help                    show this help
  quit                    exit";

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Tick(TickEvent),
    Input(String),
    InputClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Apply(Command),
    Search(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub max_ticks: Option<u64>,
}

pub fn run(
    clock: &Arc<Clock>,
    mut container: StateContainer,
    renderer: &dyn MessageRenderer,
    options: RunOptions,
) -> Result<()> {
    let (events_tx, events_rx) = channel::<AppEvent>();
    let tick_tx = events_tx.clone();
    let listener: TickListener = Arc::new(move |event: &TickEvent| {
        let _ = tick_tx.send(AppEvent::Tick(*event));
    });
    clock.subscribe(Arc::clone(&listener));
    debug!(listeners = clock.listener_count(), "subscribed to clock");
    spawn_input_reader(events_tx);

    let result = event_loop(&mut container, &events_rx, renderer, options);
    clock.unsubscribe(&listener);
    result
}

fn event_loop(
    container: &mut StateContainer,
    events: &Receiver<AppEvent>,
    renderer: &dyn MessageRenderer,
    options: RunOptions,
) -> Result<()> {
    let renders = container.subscribe_renders();
    let formatter = Arc::clone(container.formatter());
    let clear_screen = io::stdout().is_terminal();
    let mut status: Option<String> = None;
    let mut ticks = 0u64;

    draw_latest(&renders, formatter.as_ref(), renderer, status.as_deref(), clear_screen)?;
    loop {
        let Ok(event) = events.recv() else {
            debug!("event channel closed");
            break;
        };
        match event {
            AppEvent::Tick(tick) => {
                container.on_tick(tick);
                ticks += 1;
            }
            AppEvent::Input(line) => match parse_action(&line, formatter.as_ref()) {
                Ok(None) => {}
                Ok(Some(Action::Quit)) => break,
                Ok(Some(Action::Help)) => status = Some(HELP_TEXT.to_string()),
                Ok(Some(Action::Search(query))) => {
                    status = Some(search_text(formatter.as_ref(), &query));
                }
                Ok(Some(Action::Apply(command))) => {
                    status = None;
                    if let Err(err) = container.apply(command) {
                        warn!(error = %format!("{err:#}"), "mutation was not saved");
                        status = Some(format!("Save failed: {err:#}"));
                    }
                }
                Err(err) => status = Some(format!("error: {err:#}")),
            },
            AppEvent::InputClosed => debug!("stdin closed, continuing with ticks only"),
        }

        draw_latest(&renders, formatter.as_ref(), renderer, status.as_deref(), clear_screen)?;
        if options.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
    }
    Ok(())
}

fn draw_latest(
    renders: &Receiver<RenderRequest>,
    formatter: &dyn ZoneFormatter,
    renderer: &dyn MessageRenderer,
    status: Option<&str>,
    clear_screen: bool,
) -> Result<()> {
    let mut latest = None;
    loop {
        match renders.try_recv() {
            Ok(request) => latest = Some(request),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    let Some(request) = latest else {
        return Ok(());
    };
    trace!(reason = ?request.reason, "drawing screen");

    let mut screen = render_screen(&request.snapshot, formatter, renderer);
    if let Some(status) = status {
        screen.push('\n');
        screen.push_str(status);
        screen.push('\n');
    }

    let mut out = io::stdout().lock();
    if clear_screen {
        write!(out, "\x1b[2J\x1b[H")?;
    }
    out.write_all(screen.as_bytes())
        .context("failed to write screen")?;
    if !clear_screen {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn spawn_input_reader(events: Sender<AppEvent>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if events.send(AppEvent::Input(line)).is_err() {
                return;
            }
        }
        let _ = events.send(AppEvent::InputClosed);
    });
}

fn search_text(formatter: &dyn ZoneFormatter, query: &str) -> String {
    let hits = formatter.search(query);
    if hits.is_empty() {
        return format!("No time zones match '{query}'.");
    }
    let mut text = hits
        .iter()
        .take(MAX_SEARCH_RESULTS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if hits.len() > MAX_SEARCH_RESULTS {
        text.push_str(&format!("\n... and {} more", hits.len() - MAX_SEARCH_RESULTS));
    }
    text
}

pub fn parse_action(line: &str, formatter: &dyn ZoneFormatter) -> Result<Option<Action>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let action = match verb.to_ascii_lowercase().as_str() {
        "add" => {
            if rest.is_empty() {
                bail!("usage: add <zone>");
            }
            let name = formatter.resolve(rest)?;
            Action::Apply(Command::AddTimeZone(name))
        }
        "rename" => {
            let (index, label) = match rest.split_once(char::is_whitespace) {
                Some((index, label)) => (index, label.trim()),
                None => (rest, ""),
            };
            Action::Apply(Command::RenameEntry {
                index: parse_index(index)?,
                label: label.to_string(),
            })
        }
        "delete" | "rm" => Action::Apply(Command::DeleteEntry(parse_index(rest)?)),
        "label" => Action::Apply(Command::SetUserLabel(rest.to_string())),
        "format" => {
            if rest.is_empty() {
                bail!("usage: format <template>");
            }
            Action::Apply(Command::SetMessageFormat(rest.to_string()))
        }
        "custom" => {
            if rest.is_empty() || rest.eq_ignore_ascii_case("off") {
                Action::Apply(Command::SetCustomDateTime {
                    enabled: false,
                    value: None,
                })
            } else {
                Action::Apply(Command::SetCustomDateTime {
                    enabled: true,
                    value: Some(rest.to_string()),
                })
            }
        }
        "zones" | "search" => Action::Search(rest.to_string()),
        "help" | "?" => Action::Help,
        "quit" | "exit" | "q" => Action::Quit,
        other => return Err(anyhow!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(action))
}

fn parse_index(token: &str) -> Result<usize> {
    token
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid index '{}'", token.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_zone::{ChronoTzFormatter, Locale};

    fn formatter() -> ChronoTzFormatter {
        ChronoTzFormatter::new(Locale::parse("en-US"))
    }

    #[test]
    fn add_resolves_zone_names() {
        let formatter = formatter();
        assert_eq!(
            parse_action("add Europe/London", &formatter).expect("exact"),
            Some(Action::Apply(Command::AddTimeZone("Europe/London".to_string())))
        );
        assert_eq!(
            parse_action("add new york", &formatter).expect("spaced"),
            Some(Action::Apply(Command::AddTimeZone(
                "America/New_York".to_string()
            )))
        );
        let err = parse_action("add Not/AZone", &formatter).expect_err("unknown");
        assert!(err.to_string().contains("unknown time zone"));
    }

    #[test]
    fn rename_keeps_spaces_in_label() {
        assert_eq!(
            parse_action("rename 2 Head Office", &formatter()).expect("rename"),
            Some(Action::Apply(Command::RenameEntry {
                index: 2,
                label: "Head Office".to_string()
            }))
        );
        assert!(parse_action("rename x y", &formatter()).is_err());
    }

    #[test]
    fn custom_toggles_the_override() {
        assert_eq!(
            parse_action("custom 2024-01-01T10:00", &formatter()).expect("on"),
            Some(Action::Apply(Command::SetCustomDateTime {
                enabled: true,
                value: Some("2024-01-01T10:00".to_string())
            }))
        );
        assert_eq!(
            parse_action("custom off", &formatter()).expect("off"),
            Some(Action::Apply(Command::SetCustomDateTime {
                enabled: false,
                value: None
            }))
        );
    }

    #[test]
    fn misc_commands_parse() {
        let formatter = formatter();
        assert_eq!(parse_action("   ", &formatter).expect("blank"), None);
        assert_eq!(
            parse_action("delete 0", &formatter).expect("delete"),
            Some(Action::Apply(Command::DeleteEntry(0)))
        );
        assert_eq!(
            parse_action("label", &formatter).expect("label reset"),
            Some(Action::Apply(Command::SetUserLabel(String::new())))
        );
        assert_eq!(
            parse_action("zones tokyo", &formatter).expect("zones"),
            Some(Action::Search("tokyo".to_string()))
        );
        assert_eq!(parse_action("QUIT", &formatter).expect("quit"), Some(Action::Quit));
        assert!(parse_action("dance", &formatter).is_err());
    }

    #[test]
    fn search_text_lists_matches() {
        let formatter = formatter();
        assert!(search_text(&formatter, "tokyo").contains("Asia/Tokyo"));
        assert_eq!(
            search_text(&formatter, "zzz-nothing"),
            "No time zones match 'zzz-nothing'."
        );
    }
}
