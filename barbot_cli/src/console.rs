//! Line-oriented operator console for `barbot run`.
//!
//! Notifications from the orchestrator are printed as they happen; one
//! command per input line drives the machine. With `--json` every event is
//! one JSON object per line.

use std::fmt::Display;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use barbot_config::Config;
use barbot_core::{
    BarBotBuilder, BarBotHandle, Ingredient, MixingOptions, Recipe, RecipeItem, Responses, Set,
    UserInput,
};
use crossbeam_channel as xch;
use eyre::{Result, bail, eyre};

/// How long synchronous queries (`weight`, `boards`) wait for the board.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const INPUT_POLL: Duration = Duration::from_millis(100);
/// A prompt open this long after input ended will not be answered.
const PROMPT_GRACE: Duration = Duration::from_secs(2);

pub const HELP: &str = "commands: yes | no | abort | mix <id>=<cl>[,<id>=<cl>..] [--[no-]ice] [--[no-]straw] | \
single <id> <cl> | crush | straw | clean [<port>..] | weight | boards | status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Yes,
    No,
    Abort,
    /// Ice and straw left open are asked for when the module is configured.
    Mix {
        items: Vec<(String, f32)>,
        ice: Option<bool>,
        straw: Option<bool>,
    },
    Single {
        ingredient: String,
        amount: f32,
    },
    Crush,
    Straw,
    /// Empty: every port with an ingredient.
    Clean(Vec<u8>),
    Weight,
    Boards,
    Status,
    Help,
    Quit,
}

fn parse_amount(raw: &str) -> Result<f32> {
    let v: f32 = raw
        .parse()
        .map_err(|_| eyre!("'{raw}' is not an amount in cl"))?;
    if !(v.is_finite() && v > 0.0) {
        bail!("amount must be > 0, got {raw}");
    }
    Ok(v)
}

/// Parse one console line; blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let no_args = |cmd: ConsoleCommand| {
        if rest.is_empty() {
            Ok(Some(cmd))
        } else {
            Err(eyre!("'{head}' takes no arguments"))
        }
    };

    match head.to_ascii_lowercase().as_str() {
        "yes" | "y" => no_args(ConsoleCommand::Yes),
        "no" | "n" => no_args(ConsoleCommand::No),
        "abort" => no_args(ConsoleCommand::Abort),
        "crush" => no_args(ConsoleCommand::Crush),
        "straw" => no_args(ConsoleCommand::Straw),
        "weight" => no_args(ConsoleCommand::Weight),
        "boards" => no_args(ConsoleCommand::Boards),
        "status" => no_args(ConsoleCommand::Status),
        "help" | "?" => no_args(ConsoleCommand::Help),
        "quit" | "exit" => no_args(ConsoleCommand::Quit),
        "mix" => {
            let mut items = Vec::new();
            let (mut ice, mut straw) = (None, None);
            for word in &rest {
                match *word {
                    "--ice" => ice = Some(true),
                    "--no-ice" => ice = Some(false),
                    "--straw" => straw = Some(true),
                    "--no-straw" => straw = Some(false),
                    flag if flag.starts_with("--") => bail!("unknown mix option '{flag}'"),
                    list => {
                        for pair in list.split(',').filter(|p| !p.is_empty()) {
                            let (id, amount) = pair
                                .split_once('=')
                                .ok_or_else(|| eyre!("expected <id>=<cl>, got '{pair}'"))?;
                            items.push((id.to_string(), parse_amount(amount)?));
                        }
                    }
                }
            }
            if items.is_empty() {
                bail!("mix needs at least one <id>=<cl>");
            }
            Ok(Some(ConsoleCommand::Mix { items, ice, straw }))
        }
        "single" => match rest.as_slice() {
            [id, amount] => Ok(Some(ConsoleCommand::Single {
                ingredient: (*id).to_string(),
                amount: parse_amount(amount)?,
            })),
            _ => bail!("usage: single <id> <cl>"),
        },
        "clean" => {
            let ports = rest
                .iter()
                .map(|p| {
                    p.parse::<u8>()
                        .ok()
                        .filter(|p| *p < barbot_config::PORT_COUNT)
                        .ok_or_else(|| eyre!("'{p}' is not a port number"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(ConsoleCommand::Clean(ports)))
        }
        other => bail!("unknown console command '{other}' (try 'help')"),
    }
}

/// Writes events to stdout in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub json: bool,
}

impl Printer {
    pub fn event(self, event: &str, value: impl Display) {
        if self.json {
            println!(
                "{}",
                serde_json::json!({ "event": event, "value": value.to_string() })
            );
        } else {
            println!("{event}: {value}");
        }
    }

    pub fn error(self, err: &eyre::Report) {
        if self.json {
            println!(
                "{}",
                serde_json::json!({ "event": "error", "value": err.to_string() })
            );
        } else {
            eprintln!("error: {err}");
        }
    }
}

/// Attach printing callbacks to a builder.
pub fn with_printing(builder: BarBotBuilder<Set>, out: Printer) -> BarBotBuilder<Set> {
    builder
        .on_state_changed(move |s| out.event("state", s))
        .on_message_changed(move |m| {
            let hint = match m.responses() {
                Responses::None => "",
                Responses::Acknowledge => " [ok: yes]",
                Responses::YesNo => " [yes/no]",
            };
            out.event("message", format_args!("{}{hint}", m.text()));
        })
        .on_mixing_progress_changed(move |p| out.event("progress", p))
        .on_mixing_finished(move |r: &Recipe| out.event("finished", &r.name))
        .on_device_found(move |a: &str| out.event("device", a))
}

fn ingredient(cfg: &Config, id: &str) -> Result<Ingredient> {
    cfg.ingredient(id)
        .map(Ingredient::from)
        .ok_or_else(|| eyre!("unknown ingredient '{id}'"))
}

/// Act on one command. Returns false for `quit`.
pub fn dispatch(cmd: ConsoleCommand, h: &BarBotHandle, cfg: &Config, out: Printer) -> Result<bool> {
    match cmd {
        ConsoleCommand::Yes => h.set_user_input(UserInput::Yes),
        ConsoleCommand::No => h.set_user_input(UserInput::No),
        ConsoleCommand::Abort => h.abort_mixing(),
        ConsoleCommand::Mix { items, ice, straw } => {
            let items = items
                .iter()
                .map(|(id, cl)| Ok(RecipeItem::new(ingredient(cfg, id)?, *cl)))
                .collect::<Result<Vec<_>>>()?;
            h.start_mixing(MixingOptions {
                recipe: Recipe {
                    name: "console".to_string(),
                    items,
                },
                add_ice: ice,
                add_straw: straw,
            })?;
        }
        ConsoleCommand::Single { ingredient: id, amount } => {
            h.start_single_ingredient(RecipeItem::new(ingredient(cfg, &id)?, amount))?;
        }
        ConsoleCommand::Crush => h.start_crushing()?,
        ConsoleCommand::Straw => h.start_straw()?,
        ConsoleCommand::Clean(ports) if ports.len() == 1 => h.start_cleaning(ports[0])?,
        ConsoleCommand::Clean(ports) => {
            let ports = if ports.is_empty() {
                let mut occupied: Vec<u8> = cfg.ports.iter().map(|p| p.port).collect();
                occupied.sort_unstable();
                occupied
            } else {
                ports
            };
            h.start_cleaning_cycle(ports)?;
        }
        ConsoleCommand::Weight => {
            let (tx, rx) = xch::bounded(1);
            h.get_weight(move |w| {
                let _ = tx.send(w);
            })?;
            match rx.recv_timeout(QUERY_TIMEOUT) {
                Ok(Some(w)) => out.event("weight", format_args!("{w:.1}")),
                Ok(None) => bail!("the balance did not report a weight"),
                Err(_) => bail!("no answer while the machine is busy"),
            }
        }
        ConsoleCommand::Boards => {
            let (tx, rx) = xch::bounded(1);
            h.get_boards_connected(move |b| {
                let _ = tx.send(b);
            })?;
            let boards = rx
                .recv_timeout(QUERY_TIMEOUT)
                .map_err(|_| eyre!("no answer while the machine is busy"))?;
            let names: Vec<String> = boards.iter().map(|b| format!("{b:?}")).collect();
            out.event("boards", names.join(","));
        }
        ConsoleCommand::Status => {
            let s = h.snapshot();
            out.event(
                "status",
                format_args!(
                    "{} connected={} firmware={} progress={}",
                    s.state, s.connected, s.firmware, s.progress
                ),
            );
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Read commands until `quit`, end of input, or `interrupted`.
///
/// Leaving waits for requested actions to finish unless the machine keeps
/// waiting for an answer nobody can give any more.
pub fn run(h: &BarBotHandle, cfg: &Config, out: Printer, interrupted: &Arc<AtomicBool>) -> Result<()> {
    let (tx, lines) = xch::unbounded::<String>();
    std::thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| eyre!("spawning the console reader failed: {e}"))?;

    while !interrupted.load(Ordering::Acquire) {
        let line = match lines.recv_timeout(INPUT_POLL) {
            Ok(line) => line,
            Err(xch::RecvTimeoutError::Timeout) => continue,
            Err(xch::RecvTimeoutError::Disconnected) => break,
        };
        let keep_going = parse_line(&line)
            .and_then(|cmd| match cmd {
                Some(cmd) => dispatch(cmd, h, cfg, out),
                None => Ok(true),
            })
            .unwrap_or_else(|e| {
                out.error(&e);
                true
            });
        if !keep_going {
            break;
        }
    }

    let mut prompt_since: Option<Instant> = None;
    while !interrupted.load(Ordering::Acquire) && h.pending_actions() > 0 {
        if h.message().responses() == Responses::None {
            prompt_since = None;
        } else if prompt_since.get_or_insert_with(Instant::now).elapsed() > PROMPT_GRACE {
            tracing::warn!(message = ?h.message(), "leaving while a prompt is open");
            break;
        }
        std::thread::sleep(INPUT_POLL);
    }
    Ok(())
}
