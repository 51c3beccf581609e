//! Version command - print the version of this tool

use std::io::Write;

use crate::error::Result;

/// Run the version command
pub fn run() -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
