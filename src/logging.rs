use std::io::IsTerminal;
use std::path::PathBuf;

use color_eyre::Result;
use color_eyre::eyre::Context;
use fern::colors::{Color, ColoredLevelConfig};

const RESET: &str = "\x1b[0m";

/// ANSI escape for a Minecraft-style `&<code>` formatting code.
fn ansi_for(code: char) -> Option<&'static str> {
    let ansi = match code {
        '0' => "\x1b[30m",
        '1' => "\x1b[34m",
        '2' => "\x1b[32m",
        '3' => "\x1b[36m",
        '4' => "\x1b[31m",
        '5' => "\x1b[35m",
        '6' => "\x1b[33m",
        '7' => "\x1b[37m",
        '8' => "\x1b[90m",
        '9' => "\x1b[94m",
        'a' => "\x1b[92m",
        'b' => "\x1b[96m",
        'c' => "\x1b[91m",
        'd' => "\x1b[95m",
        'e' => "\x1b[93m",
        'f' => "\x1b[97m",
        'k' => "\x1b[5m",
        'l' => "\x1b[1m",
        'm' => "\x1b[9m",
        'n' => "\x1b[4m",
        'o' => "\x1b[3m",
        'r' => RESET,
        _ => return None,
    };
    Some(ansi)
}

/// Walks `text`, handing every known `&<code>` pair to `on_code` and
/// everything else through unchanged.
fn rewrite_codes(text: &str, mut on_code: impl FnMut(&mut String, &'static str)) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&'
            && let Some(ansi) = chars.peek().copied().and_then(ansi_for)
        {
            chars.next();
            on_code(&mut out, ansi);
            continue;
        }
        out.push(c);
    }
    out
}

/// Replace `&a`, `&e`, ... with ANSI escapes. Always ends with a reset so a
/// color never bleeds into the next line.
pub fn apply_color_codes(text: &str) -> String {
    let mut out = rewrite_codes(text, |out, ansi| out.push_str(ansi));
    out.push_str(RESET);
    out
}

/// Drop the formatting codes, for log files and non-terminal output.
pub fn strip_color_codes(text: &str) -> String {
    rewrite_codes(text, |_, _| {})
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Console gets `HH:MM:SS - LEVEL - message` with color codes rendered,
/// the optional log file gets the same line without them.
pub fn setup_logging(
    console_level: log::LevelFilter,
    log_file: Option<PathBuf>,
    file_level: log::LevelFilter,
) -> Result<()> {
    let colorize = std::io::stderr().is_terminal();
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::BrightBlack);

    let console = fern::Dispatch::new()
        .level(console_level)
        .format(move |out, message, record| {
            if colorize {
                let line = format!(
                    "{} - {} - {}",
                    timestamp(),
                    colors.color(record.level()),
                    message
                );
                out.finish(format_args!("{}", apply_color_codes(&line)))
            } else {
                let line = format!("{} - {} - {}", timestamp(), record.level(), message);
                out.finish(format_args!("{}", strip_color_codes(&line)))
            }
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new()
        // Keep the HTTP stack quiet unless something is wrong
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .chain(console);

    if let Some(log_file) = log_file {
        let file = fern::log_file(&log_file)
            .wrap_err(format!("Failed to open log file: {}", log_file.display()))?;
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(file_level)
                .format(|out, message, record| {
                    let line = format!(
                        "{} - {} - {} - {}",
                        timestamp(),
                        record.level(),
                        record.target(),
                        message
                    );
                    out.finish(format_args!("{}", strip_color_codes(&line)))
                })
                .chain(file),
        );
    }

    dispatch.apply().wrap_err("Failed to install logger")?;
    Ok(())
}
