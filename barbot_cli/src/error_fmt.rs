//! Human-readable error descriptions and structured JSON error formatting.

use barbot_core::error::{BarBotError, BuildError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the orchestrator.\nLikely causes: The serial port or simulator failed to initialize.\nHow to fix: Ensure a transport is created and passed via with_transport(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/barbot.toml for a sample."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BarBotError>() {
        return match be {
            BarBotError::DeviceNotFound => {
                "What happened: No BarBot mainboard was found.\nLikely causes: The machine is off, not paired, or its serial device is missing.\nHow to fix: Power the machine, pair it, or set connection.address in the config. Use --demo to try the simulator.".to_string()
            }
            BarBotError::Connect { address, reason } => format!(
                "What happened: Could not open '{address}' ({reason}).\nLikely causes: Wrong device path, missing permissions, or the port is in use.\nHow to fix: Check connection.address and that your user may open the device."
            ),
            BarBotError::NotConnected => {
                "What happened: The mainboard link is down.\nLikely causes: The machine was switched off or went out of range.\nHow to fix: Reconnect the machine and rerun.".to_string()
            }
            BarBotError::UnknownCommand(name) => format!(
                "What happened: unknown command: {name}.\nLikely causes: Typo, wrong case, or the wrong do/set/get kind.\nHow to fix: Use a wire name such as Draft, SetLED or GetWeight with its kind."
            ),
            BarBotError::ParameterCount { command, expected, got } => format!(
                "What happened: {command} expects {expected} parameter(s), got {got}.\nLikely causes: Missing or extra arguments.\nHow to fix: Pass exactly {expected} parameter(s) after the command name."
            ),
            BarBotError::CommandFailed { command } => format!(
                "What happened: {command} got no valid reply after all retries.\nLikely causes: The board is busy, the link is noisy, or the firmware does not know the command.\nHow to fix: Rerun with --log-level=debug to see the exchanged lines."
            ),
            BarBotError::Mainboard { command, code } => format!(
                "What happened: The mainboard reported error {code} during {command}.\nLikely causes: An empty ingredient, a missing glass, or a board fault.\nHow to fix: Check the machine, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML.\nLikely causes: A typo or a value of the wrong type.\nHow to fix: Fix the reported location and rerun. Details: {}",
            te.message()
        );
    }

    if let Some(io) = err.downcast_ref::<std::io::Error>()
        && io.kind() == std::io::ErrorKind::NotFound
    {
        return format!(
            "What happened: {err}: file not found.\nLikely causes: Wrong --config path or the command was started from another directory.\nHow to fix: Pass --config with the path to your barbot.toml."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid: {}.\nLikely causes: An out-of-range value or a port naming an unknown ingredient.\nHow to fix: Edit the TOML config and try again.",
            err.root_cause()
        );
    }

    if lower.contains("invalid log level") {
        return format!(
            "What happened: {msg}.\nLikely causes: A misspelled --log-level or [logging].level.\nHow to fix: Use one of error|warn|info|debug|trace."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure class; everything else exits with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<BarBotError>() {
        Some(BarBotError::UnknownCommand(_) | BarBotError::ParameterCount { .. }) => 2,
        Some(BarBotError::DeviceNotFound) => 3,
        Some(BarBotError::NotConnected | BarBotError::Connect { .. }) => 4,
        Some(BarBotError::CommandFailed { .. }) => 5,
        Some(BarBotError::Mainboard { .. }) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BarBotError>() {
        return match be {
            BarBotError::NotConnected => "NotConnected",
            BarBotError::Connect { .. } => "Connect",
            BarBotError::DeviceNotFound => "DeviceNotFound",
            BarBotError::UnknownCommand(_) => "UnknownCommand",
            BarBotError::ParameterCount { .. } => "ParameterCount",
            BarBotError::CommandFailed { .. } => "CommandFailed",
            BarBotError::Mainboard { .. } => "Mainboard",
            BarBotError::WorkerPanicked => "WorkerPanicked",
            BarBotError::Stopped => "Stopped",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(BarBotError::Mainboard { command, code }) = err.downcast_ref::<BarBotError>() {
        obj["details"] = json!({ "command": command, "code": code });
    }
    obj.to_string()
}
