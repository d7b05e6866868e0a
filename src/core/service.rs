//! Service commands
//!
//! Tokens typed in a send mode that run a diagnostic instead of being
//! transmitted. Each has a `/`-prefixed alias, and an unambiguous prefix
//! resolves to the full command: at least two characters plain, one after
//! `/`.

use std::fmt;

/// In-band diagnostic command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    /// Command list
    Help,
    /// Flush input, resume receiving, show link parameters
    Init,
    /// Health checks
    Doctor,
    /// Show this mode's history
    History,
}

impl ServiceCommand {
    /// All commands, in help order
    pub const ALL: [ServiceCommand; 4] = [Self::Help, Self::Init, Self::Doctor, Self::History];

    /// Command token
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Init => "init",
            Self::Doctor => "doctor",
            Self::History => "history",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Help => "list service commands",
            Self::Init => "flush the input buffer, resume receiving, show link parameters",
            Self::Doctor => "check port, receiver and history health",
            Self::History => "show the history of the current mode",
        }
    }

    /// Resolve an entered line to a command
    pub fn resolve(line: &str) -> Option<Self> {
        let token = line.trim().to_ascii_lowercase();
        let (word, min_len) = match token.strip_prefix('/') {
            Some(word) => (word, 1),
            None => (token.as_str(), 2),
        };
        if word.is_empty() {
            return None;
        }

        if let Some(cmd) = Self::ALL.iter().find(|c| c.name() == word) {
            return Some(*cmd);
        }
        if word.len() < min_len {
            return None;
        }

        let mut matches = Self::ALL.iter().filter(|c| c.name().starts_with(word));
        match (matches.next(), matches.next()) {
            (Some(cmd), None) => Some(*cmd),
            _ => None,
        }
    }

    /// Completion candidates, in the slash form when `slashed`
    pub fn completion_names(slashed: bool) -> Vec<String> {
        Self::ALL
            .iter()
            .map(|c| {
                if slashed {
                    format!("/{}", c.name())
                } else {
                    c.name().to_string()
                }
            })
            .collect()
    }

    /// Whether `candidate` names a command, with or without `/`
    pub fn is_command_name(candidate: &str) -> bool {
        let word = candidate.strip_prefix('/').unwrap_or(candidate);
        Self::ALL.iter().any(|c| c.name().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How to send the HEX byte `DE`, which otherwise resolves to `doctor`
pub fn hex_escape_hint() -> &'static str {
    "DE alone runs doctor; type D E to send the byte 0xDE"
}

/// Hint shown under completion candidates that include service commands
pub fn help_hint() -> String {
    let names: Vec<&str> = ServiceCommand::ALL.iter().map(|c| c.name()).collect();
    format!(
        "Service commands: {} (also with '/', e.g. /{})",
        names.join(", "),
        ServiceCommand::Help.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_slash_forms() {
        assert_eq!(ServiceCommand::resolve("help"), Some(ServiceCommand::Help));
        assert_eq!(ServiceCommand::resolve(" /DOCTOR "), Some(ServiceCommand::Doctor));
        assert_eq!(ServiceCommand::resolve("/history"), Some(ServiceCommand::History));
    }

    #[test]
    fn test_unique_prefix() {
        assert_eq!(ServiceCommand::resolve("he"), Some(ServiceCommand::Help));
        assert_eq!(ServiceCommand::resolve("hi"), Some(ServiceCommand::History));
        assert_eq!(ServiceCommand::resolve("/d"), Some(ServiceCommand::Doctor));
        assert_eq!(ServiceCommand::resolve("/i"), Some(ServiceCommand::Init));
    }

    #[test]
    fn test_ambiguous_or_short_prefix_is_data() {
        assert_eq!(ServiceCommand::resolve("/h"), None);
        assert_eq!(ServiceCommand::resolve("d"), None);
        assert_eq!(ServiceCommand::resolve("helpme"), None);
        assert_eq!(ServiceCommand::resolve("/"), None);
        assert_eq!(ServiceCommand::resolve("AA BB"), None);
    }

    #[test]
    fn test_hex_digits_can_shadow_commands() {
        assert_eq!(ServiceCommand::resolve("DE"), Some(ServiceCommand::Doctor));
        assert_eq!(ServiceCommand::resolve("de"), Some(ServiceCommand::Doctor));
        assert_eq!(ServiceCommand::resolve("D E"), None);
        assert_eq!(ServiceCommand::resolve("DE AD"), None);
        assert!(hex_escape_hint().contains("D E"));
    }

    #[test]
    fn test_completion_names() {
        assert_eq!(ServiceCommand::completion_names(true)[0], "/help");
        assert!(ServiceCommand::is_command_name("/Init"));
        assert!(!ServiceCommand::is_command_name("inits"));
        assert!(help_hint().contains("doctor"));
    }
}
