use std::fmt;

use bincode::{Decode, Encode};

use super::{ErrorKind, WireError};

#[derive(Debug, Clone, Encode, Decode, PartialEq, Eq)]
pub enum Response {
    Ok {
        message: String,
    },
    Values(Vec<String>),
    Err {
        code: ResponseError,
        description: String,
    },
}

#[derive(Debug, Clone, Copy, Encode, Decode, PartialEq, Eq)]
pub enum ResponseError {
    /// Reported by the server.
    Server,
    /// The client could not build a command from its input.
    Command,
    /// The connection was lost and could not be restored.
    Terminated,
    /// The server's reply could not be framed or decoded.
    CorruptMessage,
    /// Any other transport failure.
    Unrecognized,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Response::Ok {
            message: message.into(),
        }
    }

    pub fn err(code: ResponseError, description: impl Into<String>) -> Self {
        Response::Err {
            code,
            description: description.into(),
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Response::Err { .. })
    }

    /// Description of an error response.
    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Err { description, .. } => Some(description),
            _ => None,
        }
    }
}

impl From<&WireError> for Response {
    fn from(err: &WireError) -> Self {
        let (code, reason) = match err.kind() {
            ErrorKind::Terminated => (ResponseError::Terminated, "connection terminated"),
            ErrorKind::CorruptMessage => (ResponseError::CorruptMessage, "corrupt message"),
            _ => (ResponseError::Unrecognized, "unrecognized error"),
        };

        Response::err(
            code,
            format!("failed to fire command, {reason}: {}", err.cause()),
        )
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok { message } => f.write_str(message),
            Response::Values(values) if values.is_empty() => f.write_str("(empty)"),
            Response::Values(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {value}", i + 1)?;
                }
                Ok(())
            }
            Response::Err { description, .. } => write!(f, "ERR {description}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_map_to_error_codes() {
        let cases = vec![
            (WireError::terminated("reset"), ResponseError::Terminated, "connection terminated"),
            (WireError::corrupt("bad size"), ResponseError::CorruptMessage, "corrupt message"),
            (WireError::empty("eof"), ResponseError::Unrecognized, "unrecognized error"),
        ];

        for (err, expected, reason) in cases {
            match Response::from(&err) {
                Response::Err { code, description } => {
                    assert_eq!(code, expected);
                    assert!(description.contains(reason), "{description}");
                    assert!(description.ends_with(&err.cause().to_string()));
                }
                other => panic!("expected error response, got {other:?}"),
            }
        }
    }

    #[test]
    fn display_values() {
        let resp = Response::Values(vec!["a".into(), "b".into()]);
        assert_eq!(resp.to_string(), "1) a\n2) b");
        assert_eq!(Response::Values(vec![]).to_string(), "(empty)");
        assert_eq!(
            Response::err(ResponseError::Server, "nope").to_string(),
            "ERR nope"
        );
    }
}
