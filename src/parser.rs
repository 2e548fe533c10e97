//! StatsD wire parser: decodes datagrams into typed updates.
//!
//! This module performs no I/O and never touches the registry; it is a
//! pure function of the bytes received. Applying a [`ParsedUpdate`] to a
//! registry is [`crate::node`]'s job.

use crate::duration::CdTime;

/// Truncated length used when echoing a malformed line back to the caller
/// for logging, bounding log size against adversarial input.
pub const MALFORMED_LINE_ECHO_LEN: usize = 64;

/// One successfully parsed StatsD sample, ready to apply to a registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedUpdate {
    /// `name:value|c[|@rate]` — effective delta already scaled by `1/rate`.
    Counter { name: String, delta: f64 },
    /// `name:value|ms[|@rate]` — effective duration already scaled by `1/rate`.
    Timer { name: String, duration: CdTime },
    /// `name:value|g` — absolute or relative depending on a leading sign.
    Gauge { name: String, op: GaugeOp },
    /// `name:value|s` — value is the raw member string, not parsed as a number.
    Set { name: String, member: String },
}

/// How a parsed gauge line should be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GaugeOp {
    /// Replace the gauge's current value.
    Absolute(f64),
    /// Add to the gauge's current value.
    Relative(f64),
}

/// A line failed to parse, with the original text preserved (already
/// truncated to [`MALFORMED_LINE_ECHO_LEN`]) for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The offending line, truncated for safe logging.
    pub echo: String,
}

fn truncate_echo(line: &str) -> String {
    if line.len() <= MALFORMED_LINE_ECHO_LEN {
        return line.to_string();
    }
    let mut end = MALFORMED_LINE_ECHO_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].to_string()
}

/// Parses a decimal float the way `strtod` does: leading whitespace is
/// permitted, but every remaining byte must belong to the numeric token.
fn parse_numeric(s: &str) -> Option<f64> {
    s.trim_start().parse::<f64>().ok()
}

/// Splits a received datagram into its constituent lines and parses each
/// independently. Empty lines are skipped. Malformed lines are reported as
/// `Err` entries in line order but never abort parsing of the remaining
/// lines.
pub fn parse_datagram(buffer: &str) -> Vec<Result<ParsedUpdate, ParseError>> {
    buffer
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| parse_line(line).map_err(|()| ParseError { echo: truncate_echo(line) }))
        .collect()
}

/// Parses a single StatsD line.
///
/// Grammar: `name ':' value '|' type ( '|' extra )?` where `type` is one of
/// `c`, `ms`, `g`, `s`. `name` is everything up to the **rightmost** `:`
/// before the first `|` — this permits `:` inside metric names. `extra` is
/// only valid for `c` and `ms`.
///
/// # Errors
///
/// Returns `Err(())` if the line does not match the grammar, if the numeric
/// fields fail to parse, or if a sample rate is present, non-finite, or
/// outside `(0, 1]`.
pub fn parse_line(line: &str) -> Result<ParsedUpdate, ()> {
    let pipe = line.find('|').ok_or(())?;
    let (name_value, rest) = line.split_at(pipe);
    let rest = &rest[1..];

    let colon = name_value.rfind(':').ok_or(())?;
    let name = &name_value[..colon];
    if name.is_empty() {
        return Err(());
    }
    let value_str = &name_value[colon + 1..];

    let (type_str, extra) = match rest.find('|') {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };

    match type_str {
        "c" => {
            let scale = parse_sample_rate(extra)?;
            let value = parse_numeric(value_str).ok_or(())?;
            Ok(ParsedUpdate::Counter {
                name: name.to_string(),
                delta: value / scale,
            })
        }
        "ms" => {
            let scale = parse_sample_rate(extra)?;
            let value_ms = parse_numeric(value_str).ok_or(())?;
            Ok(ParsedUpdate::Timer {
                name: name.to_string(),
                duration: CdTime::from_millis_f64(value_ms / scale),
            })
        }
        "g" => {
            if extra.is_some() {
                return Err(());
            }
            let value = parse_numeric(value_str).ok_or(())?;
            let op = match value_str.as_bytes().first() {
                Some(b'+') | Some(b'-') => GaugeOp::Relative(value),
                _ => GaugeOp::Absolute(value),
            };
            Ok(ParsedUpdate::Gauge {
                name: name.to_string(),
                op,
            })
        }
        "s" => {
            if extra.is_some() {
                return Err(());
            }
            Ok(ParsedUpdate::Set {
                name: name.to_string(),
                member: value_str.to_string(),
            })
        }
        _ => Err(()),
    }
}

/// Parses the `@rate` suffix, defaulting to `1.0` when absent.
fn parse_sample_rate(extra: Option<&str>) -> Result<f64, ()> {
    let Some(extra) = extra else {
        return Ok(1.0);
    };
    let rate_str = extra.strip_prefix('@').ok_or(())?;
    let rate = parse_numeric(rate_str).ok_or(())?;
    if !rate.is_finite() || rate <= 0.0 || rate > 1.0 {
        return Err(());
    }
    Ok(rate)
}
