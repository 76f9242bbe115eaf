//! Run command - executes a source file once.

use super::session::open_bridge;
use anyhow::{Context, Result};
use pankti_bridge::{BridgeConfig, ConsoleOutput, SharedOutput, StreamRouting};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::process::ExitCode;

/// Captured output of a `--json` run
#[derive(Debug, Serialize)]
struct RunReport {
    ok: bool,
    stdout: String,
    stderr: String,
}

/// Run `file` through the guest and show its output.
///
/// Exits non-zero only when the bridge itself fails; errors the guest reports
/// about the program are ordinary output.
pub async fn run_file(config: &BridgeConfig, file: &Path, json: bool) -> Result<ExitCode> {
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(e).with_context(|| format!("{:?} is not valid UTF-8", file));
        }
        Err(e) => {
            tracing::debug!("Failed to read {:?}: {}", file, e);
            println!("Failed to open file : '{}'", file.display());
            return Ok(ExitCode::FAILURE);
        }
    };

    if json {
        let output = SharedOutput::new(StreamRouting::Split);
        let mut bridge = open_bridge(config, output.clone()).await?;
        let ok = bridge.run(&source).is_ok();

        let captured = output.snapshot();
        let report = RunReport {
            ok,
            stdout: captured.contents().to_string(),
            stderr: captured.stderr().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(exit_code(ok));
    }

    let mut bridge = open_bridge(config, ConsoleOutput::new(config.streams)).await?;
    Ok(exit_code(bridge.run(&source).is_ok()))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
