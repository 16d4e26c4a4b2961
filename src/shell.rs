//! Line-oriented command shell used by `vinputctl`
//!
//! Reads one command per line and writes results to the output. Command
//! failures are reported on the output and do not end the session.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::control::{parse_id, ControlCommand};
use crate::dispatch::VINPUT_MAX_LEN;
use crate::error::VInputError;
use crate::host::memory::MemoryInput;
use crate::lifecycle::VInput;

const HELP: &str = "\
commands:
  export <type>              create an instance (alias: create)
  unexport <id>              destroy an instance (alias: destroy)
  write <id> <text>          send text to an instance
  read <id> [offset] [len]   read an instance's representation
  list                       list instances
  types                      list registered types
  events <id>                show events delivered to the host
  help                       show this text
  quit                       leave (alias: exit)";

enum Flow {
    Continue,
    Quit,
}

pub struct Shell<'a> {
    vinput: &'a VInput,
    input: &'a MemoryInput,
}

impl<'a> Shell<'a> {
    pub fn new(vinput: &'a VInput, input: &'a MemoryInput) -> Self {
        Self { vinput, input }
    }

    /// Run commands until `quit` or end of input.
    pub fn run(&self, reader: impl BufRead, mut out: impl Write) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.execute(line, &mut out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => writeln!(out, "error: {}", e)?,
            }
        }
        out.flush()?;
        Ok(())
    }

    fn execute(&self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (line, ""),
        };

        match verb {
            "export" | "create" | "unexport" | "destroy" => {
                match ControlCommand::parse(line)? {
                    ControlCommand::Export(name) => {
                        let id = self.vinput.create(&name)?;
                        writeln!(out, "{}{}", self.vinput.options().node_prefix, id)?;
                    }
                    ControlCommand::Unexport(arg) => {
                        self.vinput.unexport(&arg)?;
                        writeln!(out, "ok")?;
                    }
                }
            }
            "write" => {
                let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let sent = self.vinput.write(parse_id(id)?, text.as_bytes())?;
                writeln!(out, "{} bytes", sent)?;
            }
            "read" => {
                let mut args = rest.split_whitespace();
                let id = parse_id(args.next().unwrap_or(""))?;
                let offset = parse_count(args.next(), 0)?;
                let len = parse_count(args.next(), VINPUT_MAX_LEN)?;
                let data = self.vinput.read(id, offset, len)?;
                writeln!(out, "{}", String::from_utf8_lossy(&data).trim_end_matches('\n'))?;
            }
            "list" => {
                for dev in self.vinput.snapshot().devices {
                    let status = if dev.live { "live" } else { "starting" };
                    writeln!(out, "{} {} {}", dev.node, dev.type_name, status)?;
                }
            }
            "types" => {
                for name in self.vinput.snapshot().types {
                    writeln!(out, "{}", name)?;
                }
            }
            "events" => {
                let id = parse_id(rest)?;
                let phys = self.vinput.open(id)?.metadata().phys;
                for event in self.input.events(&phys) {
                    writeln!(out, "{:?} {} {}", event.kind, event.code, event.value)?;
                }
            }
            "help" => writeln!(out, "{}", HELP)?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => {
                return Err(VInputError::InvalidArgument(format!(
                    "unknown command '{}' (try help)",
                    other
                ))
                .into())
            }
        }
        Ok(Flow::Continue)
    }
}

fn parse_count(arg: Option<&str>, default: usize) -> Result<usize> {
    match arg {
        Some(text) => text
            .parse()
            .map_err(|_| VInputError::InvalidArgument(format!("'{}' is not a count", text)).into()),
        None => Ok(default),
    }
}
