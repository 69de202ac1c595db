use std::io::{self, Write};

use serde_json::Value;

use crate::error::CliError;

/// Write `value` to stdout as one JSON document.
pub fn render(value: &Value, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}
