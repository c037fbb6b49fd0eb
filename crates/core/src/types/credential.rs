//! Sellable credential payloads.
//!
//! An inventory unit carries one login/password pair. Pairs are loaded in
//! bulk from `login:senha` lines and delivered verbatim to the buyer; the
//! password is redacted everywhere else (logs, debug output).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CredentialPair`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The line has no `:` separator.
    #[error("credential line must be login:password")]
    MissingSeparator,
    /// The login side of the pair is empty.
    #[error("credential login cannot be empty")]
    EmptyLogin,
    /// The password side of the pair is empty.
    #[error("credential password cannot be empty")]
    EmptyPassword,
}

/// One sellable login/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Account login.
    pub login: String,
    /// Account password. Opaque payload; only ever shown to the buyer.
    pub password: String,
}

impl CredentialPair {
    /// Parse a single `login:password` line.
    ///
    /// Whitespace around either side is trimmed. Only the first `:` splits,
    /// so passwords may themselves contain colons.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the separator or either side is missing.
    pub fn parse_line(line: &str) -> Result<Self, CredentialError> {
        let (login, password) = line
            .split_once(':')
            .ok_or(CredentialError::MissingSeparator)?;
        let login = login.trim();
        let password = password.trim();
        if login.is_empty() {
            return Err(CredentialError::EmptyLogin);
        }
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }
        Ok(Self {
            login: login.to_owned(),
            password: password.to_owned(),
        })
    }

    /// Parse a multi-line batch, skipping lines that do not parse.
    ///
    /// Returns the parsed pairs and the number of skipped lines. Blank
    /// lines are not counted as skipped.
    #[must_use]
    pub fn parse_batch(input: &str) -> (Vec<Self>, usize) {
        let mut pairs = Vec::new();
        let mut skipped = 0;
        for line in input.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(line) {
                Ok(pair) => pairs.push(pair),
                Err(_) => skipped += 1,
            }
        }
        (pairs, skipped)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[REDACTED]", self.login)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let pair = CredentialPair::parse_line(" user@mail.com : hunter2 ").unwrap();
        assert_eq!(pair.login, "user@mail.com");
        assert_eq!(pair.password, "hunter2");
    }

    #[test]
    fn test_parse_line_keeps_colons_in_password() {
        let pair = CredentialPair::parse_line("user:pa:ss").unwrap();
        assert_eq!(pair.password, "pa:ss");
    }

    #[test]
    fn test_parse_line_errors() {
        assert_eq!(
            CredentialPair::parse_line("no separator"),
            Err(CredentialError::MissingSeparator)
        );
        assert_eq!(
            CredentialPair::parse_line(":pw"),
            Err(CredentialError::EmptyLogin)
        );
        assert_eq!(
            CredentialPair::parse_line("user:  "),
            Err(CredentialError::EmptyPassword)
        );
    }

    #[test]
    fn test_parse_batch_skips_malformed() {
        let input = "a:1\n\nbroken line\nb:2\n";
        let (pairs, skipped) = CredentialPair::parse_batch(input);
        assert_eq!(pairs.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_debug_redacts_password() {
        let pair = CredentialPair::parse_line("user:hunter2").unwrap();
        let debug = format!("{pair:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
