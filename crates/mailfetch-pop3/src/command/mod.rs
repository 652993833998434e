//! POP3 command builder.

use std::fmt;

/// Line terminator used on the wire.
pub const CRLF: &str = "\r\n";

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Name the maildrop
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Maildrop password
    Pass {
        /// Password
        password: String,
    },
    /// LIST - Scan listing of all messages
    List,
    /// RETR - Retrieve one message
    Retr {
        /// Message number
        index: u32,
    },
    /// DELE - Mark one message as deleted
    Dele {
        /// Message number
        index: u32,
    },
    /// QUIT - Commit deletions and close
    Quit,
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::List => "LIST",
            Self::Retr { .. } => "RETR",
            Self::Dele { .. } => "DELE",
            Self::Quit => "QUIT",
        }
    }

    /// Returns the command arguments in wire order.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::User { name } => vec![name.clone()],
            Self::Pass { password } => vec![password.clone()],
            Self::Retr { index } | Self::Dele { index } => vec![index.to_string()],
            Self::List | Self::Quit => Vec::new(),
        }
    }

    /// Serializes the command to a CRLF-terminated line.
    #[must_use]
    pub fn serialize(&self) -> String {
        let args = self.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        encode(self.name(), &args)
    }
}

/// Formats a request line: the name, each argument after a single space, then CRLF.
///
/// Arguments are not validated or escaped.
#[must_use]
pub fn encode(name: &str, args: &[&str]) -> String {
    let mut line = String::with_capacity(
        name.len() + args.iter().map(|a| a.len() + 1).sum::<usize>() + CRLF.len(),
    );
    line.push_str(name);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line.push_str(CRLF);
    line
}

// Password never reaches logs through Debug or Display.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass { .. } => f.debug_struct("Pass").field("password", &"***").finish(),
            Self::User { name } => f.debug_struct("User").field("name", name).finish(),
            Self::Retr { index } => f.debug_struct("Retr").field("index", index).finish(),
            Self::Dele { index } => f.debug_struct("Dele").field("index", index).finish(),
            Self::List => f.write_str("List"),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass { .. } => write!(f, "PASS ***"),
            _ => f.write_str(self.serialize().trim_end_matches(CRLF)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_command() {
        let cmd = Command::User {
            name: "alice".to_string(),
        };
        assert_eq!(cmd.serialize(), "USER alice\r\n");
    }

    #[test]
    fn test_pass_command() {
        let cmd = Command::Pass {
            password: "s3cret".to_string(),
        };
        assert_eq!(cmd.serialize(), "PASS s3cret\r\n");
    }

    #[test]
    fn test_list_command() {
        assert_eq!(Command::List.serialize(), "LIST\r\n");
    }

    #[test]
    fn test_retr_command() {
        assert_eq!(Command::Retr { index: 7 }.serialize(), "RETR 7\r\n");
    }

    #[test]
    fn test_dele_command() {
        assert_eq!(Command::Dele { index: 12 }.serialize(), "DELE 12\r\n");
    }

    #[test]
    fn test_quit_command() {
        assert_eq!(Command::Quit.serialize(), "QUIT\r\n");
    }

    #[test]
    fn test_password_masked() {
        let cmd = Command::Pass {
            password: "s3cret".to_string(),
        };
        assert_eq!(cmd.to_string(), "PASS ***");
        assert!(!format!("{cmd:?}").contains("s3cret"));
        assert_eq!(Command::Retr { index: 3 }.to_string(), "RETR 3");
    }

    #[test]
    fn test_encode_no_escaping() {
        assert_eq!(encode("USER", &["a b"]), "USER a b\r\n");
    }

    proptest! {
        #[test]
        fn encode_joins_with_single_spaces(
            name in "[A-Z]{3,4}",
            args in proptest::collection::vec("[a-zA-Z0-9@._-]{1,16}", 0..4),
        ) {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let line = encode(&name, &refs);

            let expected = if args.is_empty() {
                format!("{name}\r\n")
            } else {
                format!("{name} {}\r\n", args.join(" "))
            };
            prop_assert_eq!(&line, &expected);
            prop_assert_eq!(line.matches("\r\n").count(), 1);
        }
    }
}
