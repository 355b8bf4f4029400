//! Privileged inbound commands, decoded once into a variant.

/// A parsed admin command. Anything that does not parse is `Unknown` and
/// falls through to the ordinary message flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Stats,
    Approve(String),
    Reject(String),
    Suspend(String),
    Unknown,
}

impl AdminCommand {
    /// Parse a command message. The keyword is case-insensitive; the sender
    /// id argument is taken verbatim.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let keyword = match parts.next() {
            Some(word) => word.to_ascii_uppercase(),
            None => return Self::Unknown,
        };

        match keyword.as_str() {
            "STATS" => Self::Stats,
            "APPROVE" => match parts.next() {
                Some(id) => Self::Approve(id.to_string()),
                None => Self::Unknown,
            },
            "REJECT" => match parts.next() {
                Some(id) => Self::Reject(id.to_string()),
                None => Self::Unknown,
            },
            "SUSPEND" => match parts.next() {
                Some(id) => Self::Suspend(id.to_string()),
                None => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(AdminCommand::parse("STATS"), AdminCommand::Stats);
        assert_eq!(
            AdminCommand::parse("APPROVE whatsapp:+4917012345"),
            AdminCommand::Approve("whatsapp:+4917012345".into())
        );
        assert_eq!(
            AdminCommand::parse("reject whatsapp:+4917012345"),
            AdminCommand::Reject("whatsapp:+4917012345".into())
        );
        assert_eq!(
            AdminCommand::parse("Suspend whatsapp:+4917012345"),
            AdminCommand::Suspend("whatsapp:+4917012345".into())
        );
    }

    #[test]
    fn missing_argument_is_unknown() {
        assert_eq!(AdminCommand::parse("APPROVE"), AdminCommand::Unknown);
        assert_eq!(AdminCommand::parse("REJECT   "), AdminCommand::Unknown);
    }

    #[test]
    fn ordinary_text_is_unknown() {
        assert_eq!(AdminCommand::parse("Hallo, wie geht's?"), AdminCommand::Unknown);
        assert_eq!(AdminCommand::parse(""), AdminCommand::Unknown);
        // A sentence merely containing the keyword is not a command.
        assert_eq!(
            AdminCommand::parse("Can you approve whatsapp:+49 please"),
            AdminCommand::Unknown
        );
    }
}
