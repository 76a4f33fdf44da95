//! CLI utilities for the Cryo client.
//!
//! The utilities present in this module can be used to build an interactive shell on top of
//! a [`Client`](crate::Client).
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::protocol::{Command, CommandError};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to talk to terminal: {0}")]
    Io(#[from] io::Error),
}

/// Possible inputs from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Exit command `.exit`, or end of input.
    Exit,
    /// Command to fire at the server.
    Command(Command),
}

/// Prompt user for a command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Input, PromptError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Input::Exit);
    }

    match s.trim() {
        ".exit" => Ok(Input::Exit),
        s => Ok(Input::Command(s.try_into()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_commands() {
        let input = b"SET name cryo\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Input::Command(Command::new("SET", ["name", "cryo"])), res);
    }

    #[test]
    fn prompt_exits_at_end_of_input() {
        let mut output = Vec::new();

        let res = prompt(&b""[..], &mut output).unwrap();
        assert_eq!(Input::Exit, res);
    }

    #[test]
    fn prompt_rejects_blank_lines() {
        let input = b"   \n";
        let mut output = Vec::new();

        let err = prompt(&input[..], &mut output).unwrap_err();
        assert_eq!(err.to_string(), "no command provided");
    }
}
