mod cli;
mod console;
mod error_fmt;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use barbot_config::Config;
use barbot_core::{
    BarBot, BarBotError, Ingredient, IngredientType, MachineCfg, Mainboard, MixingOptions,
    PortConfiguration, Recipe, RecipeItem, TimingCfg, Worker,
};
use barbot_hardware::SimulatedMainboard;
use barbot_hardware::sim::SIMULATOR_ID;
use barbot_traits::{CommandKind, Transport, catalog};
use clap::Parser;
use eyre::{Result, WrapErr, bail};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::console::Printer;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

/// Upper bound for the simulated self-check drink.
const SELF_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    color_eyre::install()?;
    let cfg = load_config(&cli.config)?;
    // Dropped on return, flushing the log file before the process exits.
    let _log_guard = logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let out = Printer { json: cli.json };
    match cli.cmd {
        Commands::Run { demo } => run(&cfg, demo, out),
        Commands::Send {
            kind,
            command,
            params,
            demo,
        } => send(&cfg, kind.into(), &command, &params, demo, out),
        Commands::Find => find(&cfg, out),
        Commands::SelfCheck => self_check(&cfg, out),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = barbot_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Serial link when built with `hardware` and not in demo mode, the simulator otherwise.
fn transport(cfg: &Config, demo: bool) -> Box<dyn Transport> {
    #[cfg(feature = "hardware")]
    if !demo {
        return Box::new(barbot_hardware::SerialTransport::new(
            cfg.connection.baud_rate,
            Duration::from_millis(cfg.connection.read_timeout_ms),
        ));
    }
    #[cfg(not(feature = "hardware"))]
    if !demo {
        tracing::warn!("built without the `hardware` feature; using the simulator");
    }
    let _ = cfg;
    Box::new(SimulatedMainboard::new())
}

fn run(cfg: &Config, demo: bool, out: Printer) -> Result<()> {
    let address = if demo {
        Some(SIMULATOR_ID.to_string())
    } else {
        cfg.connection.address.clone()
    };
    let builder = BarBot::builder()
        .with_transport(transport(cfg, demo))
        .with_machine(MachineCfg::from(&cfg.machine))
        .with_ports(PortConfiguration::from(cfg))
        .with_timing(TimingCfg::from(cfg))
        .with_address(address)
        .demo_mode(demo);
    let bot = console::with_printing(builder, out).build()?;
    let worker = Worker::spawn(bot)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        let h = worker.handle().clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Release);
            h.shutdown();
        })
        .wrap_err("installing the Ctrl-C handler")?;
    }

    if !out.json {
        println!("{}", console::HELP);
    }
    let res = console::run(worker.handle(), cfg, out, &interrupted);
    worker.stop()?;
    res
}

fn send(
    cfg: &Config,
    kind: CommandKind,
    command: &str,
    params: &[String],
    demo: bool,
    out: Printer,
) -> Result<()> {
    let spec = catalog::lookup(command)
        .filter(|s| s.kind == kind)
        .ok_or_else(|| BarBotError::UnknownCommand(format!("{kind} {command}")))?;
    if spec.params != params.len() {
        return Err(BarBotError::ParameterCount {
            command: command.to_string(),
            expected: spec.params,
            got: params.len(),
        }
        .into());
    }

    let mut board = Mainboard::new(transport(cfg, demo));
    let address = match cfg.connection.address.clone().filter(|_| !demo) {
        Some(a) => a,
        None => board.find_device().ok_or(BarBotError::DeviceNotFound)?,
    };
    board.connect(&address)?;
    let res = board.execute(kind, command, params);
    board.disconnect();

    if out.json {
        println!(
            "{}",
            serde_json::json!({
                "command": command,
                "kind": kind.to_string(),
                "success": res.success,
                "return_parameters": &res.return_parameters,
            })
        );
    } else if res.success {
        match &res.return_parameters {
            Some(values) => println!("{}", values.join(" ")),
            None => println!("ok"),
        }
    }

    if res.success {
        return Ok(());
    }
    match res.first() {
        Some(code) => Err(BarBotError::Mainboard {
            command: command.to_string(),
            code: code.to_string(),
        }
        .into()),
        None => Err(BarBotError::CommandFailed {
            command: command.to_string(),
        }
        .into()),
    }
}

fn find(cfg: &Config, out: Printer) -> Result<()> {
    let mut t = transport(cfg, false);
    let id = t.find_device().ok_or(BarBotError::DeviceNotFound)?;
    out.event("device", id);
    Ok(())
}

/// Drinks from the configured ports, or a single stand-in ingredient on port 0.
fn self_check_setup(cfg: &Config) -> (PortConfiguration, Vec<RecipeItem>) {
    let items: Vec<RecipeItem> = cfg
        .ports
        .iter()
        .filter_map(|p| cfg.ingredient(&p.ingredient))
        .map(|i| RecipeItem::new(Ingredient::from(i), 1.0))
        .collect();
    if !items.is_empty() {
        return (PortConfiguration::from(cfg), items);
    }
    let water = Ingredient::new("water", "Water", IngredientType::Other);
    let mut ports = PortConfiguration::new();
    ports.set(0, water.identifier.clone());
    (ports, vec![RecipeItem::new(water, 1.0)])
}

fn self_check(cfg: &Config, out: Printer) -> Result<()> {
    let sim = SimulatedMainboard::new().instant();
    let (ports, items) = self_check_setup(cfg);
    let n_items = items.len();

    let (tx, rx) = crossbeam_channel::bounded(1);
    let bot = BarBot::builder()
        .with_transport(sim.clone())
        .with_machine(MachineCfg::from(&cfg.machine))
        .with_ports(ports)
        .with_timing(TimingCfg::fast())
        .with_address(Some(SIMULATOR_ID.to_string()))
        .demo_mode(true)
        .on_mixing_finished(move |r: &Recipe| {
            let _ = tx.try_send(r.items.len());
        })
        .build()?;
    let worker = Worker::spawn(bot)?;
    worker.handle().start_mixing(MixingOptions {
        recipe: Recipe {
            name: "self-check".to_string(),
            items,
        },
        add_ice: Some(false),
        add_straw: Some(false),
    })?;

    let finished = rx.recv_timeout(SELF_CHECK_TIMEOUT);
    let aborted = worker.handle().was_aborted();
    worker.stop()?;

    let drafts = sim.commands().iter().filter(|c| *c == "Draft").count();
    match finished {
        Ok(n) if !aborted && drafts == n_items => {
            out.event(
                "self-check",
                format_args!("ok ({n} item(s), {} line(s) sent)", sim.history().len()),
            );
            Ok(())
        }
        Ok(_) => bail!("self-check mixed {drafts} of {n_items} item(s)"),
        Err(_) => bail!("self-check did not finish within {SELF_CHECK_TIMEOUT:?}"),
    }
}
