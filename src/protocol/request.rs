use std::fmt;

use bincode::{Decode, Encode};
use thiserror::Error;

/// Command name of the identification message sent after every (re)connect.
pub const HANDSHAKE: &str = "HANDSHAKE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command provided")]
    Empty,
}

/// Role a connection plays, announced to the server during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Request/response traffic.
    Command,
    /// Server-pushed updates.
    Watch,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Command => "command",
            Purpose::Watch => "watch",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request sent to the server: a command name and its arguments.
#[derive(Debug, Clone, Encode, Decode, PartialEq, Eq)]
pub struct Command {
    pub cmd: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(cmd: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn handshake(id: &str, purpose: Purpose) -> Self {
        Self::new(HANDSHAKE, [id, purpose.as_str()])
    }

    pub fn is_handshake(&self) -> bool {
        self.cmd == HANDSHAKE
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut tokens = value.split_whitespace();
        let cmd = tokens.next().ok_or(CommandError::Empty)?;
        Ok(Command::new(cmd, tokens))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cmd)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_from_string() {
        let inputs = vec![
            ("PING", Command::new("PING", Vec::<String>::new())),
            ("  SET k  v ", Command::new("SET", ["k", "v"])),
            ("GET key\n", Command::new("GET", ["key"])),
        ];

        for (line, expected) in inputs {
            let command: Command = line.try_into().unwrap();
            assert_eq!(command, expected);
        }
    }

    #[test]
    fn blank_line_is_not_a_command() {
        let res: Result<Command, _> = " \n".try_into();
        assert_eq!(res, Err(CommandError::Empty));
    }

    #[test]
    fn handshake_command() {
        let command = Command::handshake("client-1", Purpose::Watch);

        assert!(command.is_handshake());
        assert_eq!(command.args, vec!["client-1", "watch"]);
        assert_eq!(command.to_string(), "HANDSHAKE client-1 watch");
    }
}
