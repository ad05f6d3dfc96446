use std::io::{self, Read};

use dcf_valuation_core::valuation::input::ValuationInput;

use super::file::{parse_input, InputFormat};

/// Read a valuation document piped on stdin.
///
/// Returns `None` when stdin is a terminal or the pipe is empty, so the
/// caller can fall back to the reference configuration.
pub fn read_piped_input() -> Result<Option<ValuationInput>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

/// A document opening with `{` is JSON; anything else is read as YAML.
fn parse_piped(text: &str) -> Result<Option<ValuationInput>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let format = if trimmed.starts_with('{') {
        InputFormat::Json
    } else {
        InputFormat::Yaml
    };
    log::debug!("read {} bytes of {format:?} input from stdin", trimmed.len());

    let valuation_input = match format {
        InputFormat::Json => ValuationInput::from_value(serde_json::from_str(trimmed)?)?,
        InputFormat::Yaml => parse_input(trimmed, InputFormat::Yaml)?,
    };
    Ok(Some(valuation_input))
}
