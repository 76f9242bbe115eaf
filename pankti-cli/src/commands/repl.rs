//! REPL command - an editor buffer with a run trigger.

use super::session::open_bridge;
use crate::editor::{ReplInput, SourceBuffer, REPL_HELP, SAMPLE_PROGRAM};
use anyhow::Result;
use pankti_bridge::{BridgeConfig, CallBridge, ConsoleOutput};
use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Start an interactive session on stdin
pub async fn repl(config: &BridgeConfig) -> Result<ExitCode> {
    let mut bridge = open_bridge(config, ConsoleOutput::new(config.streams)).await?;

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        eprint!("{}", REPL_HELP);
    }

    let stdin = BufReader::new(tokio::io::stdin());
    drive(&mut bridge, stdin, interactive).await?;
    Ok(ExitCode::SUCCESS)
}

/// Feed input lines to the editor buffer, running it on `:run`.
///
/// Each run completes before the next line is read, so runs never overlap.
pub async fn drive<R>(bridge: &mut CallBridge, input: R, prompt: bool) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = SourceBuffer::new();
    let mut segments = input.split(b'\n');

    loop {
        if prompt {
            eprint!("> ");
            std::io::stderr().flush()?;
        }
        let Some(segment) = segments.next_segment().await? else {
            break;
        };
        let line = match String::from_utf8(segment) {
            Ok(line) => line,
            Err(e) => {
                eprintln!("skipping line that is not valid UTF-8: {}", e.utf8_error());
                continue;
            }
        };
        let line = line.strip_suffix('\r').unwrap_or(&line);

        match ReplInput::parse(line) {
            ReplInput::Source(text) => buffer.push_line(text),
            ReplInput::Run => {
                if buffer.is_empty() {
                    eprintln!("nothing to run");
                    continue;
                }
                // Bridge failures were already shown on the output surface
                if let Err(e) = bridge.run(&buffer.source()) {
                    tracing::debug!("run failed: {}", e);
                }
                println!();
            }
            ReplInput::Clear => buffer.clear(),
            ReplInput::Show => print!("{}", buffer.numbered()),
            ReplInput::Sample => {
                buffer.load(SAMPLE_PROGRAM);
                print!("{}", buffer.numbered());
            }
            ReplInput::Help => eprint!("{}", REPL_HELP),
            ReplInput::Quit => break,
            ReplInput::Unknown(command) => eprintln!("unknown command :{}", command),
        }
    }

    Ok(())
}
