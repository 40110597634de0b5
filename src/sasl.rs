//! SASL authentication support.
//!
//! Payload encoding for the mechanisms the client speaks (`PLAIN`,
//! `EXTERNAL`) and splitting of encoded responses into `AUTHENTICATE`
//! lines.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.1>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Maximum base64 bytes carried by one `AUTHENTICATE` line.
pub const SASL_CHUNK_SIZE: usize = 400;

/// SASL mechanism names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SaslMechanism {
    /// Account name and password.
    Plain,
    /// Identity taken from the TLS client certificate.
    External,
    /// Anything else the server advertises.
    Unknown(String),
}

impl SaslMechanism {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a comma-separated mechanism list (`sasl=` value or 908 reply).
pub fn parse_mechanisms(list: &str) -> Vec<SaslMechanism> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SaslMechanism::parse)
        .collect()
}

/// Credentials used when the server offers `sasl`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaslCredentials {
    pub mechanism: SaslMechanism,
    pub account: String,
    pub password: String,
}

impl SaslCredentials {
    /// `PLAIN` credentials.
    pub fn plain(account: impl Into<String>, password: impl Into<String>) -> Self {
        SaslCredentials {
            mechanism: SaslMechanism::Plain,
            account: account.into(),
            password: password.into(),
        }
    }

    /// `EXTERNAL`, optionally asserting an authorization identity.
    pub fn external(authzid: Option<&str>) -> Self {
        SaslCredentials {
            mechanism: SaslMechanism::External,
            account: authzid.unwrap_or_default().to_string(),
            password: String::new(),
        }
    }

    /// Base64 response to the server's empty challenge.
    pub fn initial_response(&self) -> String {
        match self.mechanism {
            SaslMechanism::External => encode_external(Some(&self.account)),
            _ => encode_plain(&self.account, &self.password),
        }
    }

    /// Whether the mechanism is usable given the server's advertised list.
    /// An empty list means the server did not say.
    pub fn is_offered(&self, advertised: &[SaslMechanism]) -> bool {
        advertised.is_empty() || advertised.contains(&self.mechanism)
    }
}

/// Encode credentials for SASL PLAIN (`\0account\0password`).
pub fn encode_plain(username: &str, password: &str) -> String {
    let payload = format!("\0{}\0{}", username, password);
    BASE64.encode(payload.as_bytes())
}

/// Encode an EXTERNAL response; `+` when no authorization identity is given.
pub fn encode_external(authzid: Option<&str>) -> String {
    match authzid {
        Some(id) if !id.is_empty() => BASE64.encode(id.as_bytes()),
        _ => "+".to_owned(),
    }
}

/// Split an encoded response into [`SASL_CHUNK_SIZE`] pieces.
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    // Base64 output is ASCII, so byte chunks are char boundaries.
    encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
}

/// `AUTHENTICATE` lines for an encoded response.
///
/// A response whose length is an exact multiple of the chunk size is
/// terminated with `AUTHENTICATE +`.
pub fn authenticate_lines(encoded: &str) -> Vec<String> {
    let mut lines: Vec<String> = chunk_response(encoded)
        .map(|chunk| format!("AUTHENTICATE {}", chunk))
        .collect();
    if encoded.is_empty() || encoded.len() % SASL_CHUNK_SIZE == 0 {
        lines.push("AUTHENTICATE +".to_owned());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain() {
        assert_eq!(encode_plain("jilles", "sesame"), "AGppbGxlcwBzZXNhbWU=");
    }

    #[test]
    fn test_encode_external() {
        assert_eq!(encode_external(None), "+");
        assert_eq!(encode_external(Some("")), "+");
        assert_eq!(encode_external(Some("admin")), "YWRtaW4=");
    }

    #[test]
    fn test_parse_mechanisms() {
        assert_eq!(
            parse_mechanisms("PLAIN, external,SCRAM-SHA-256"),
            vec![
                SaslMechanism::Plain,
                SaslMechanism::External,
                SaslMechanism::Unknown("SCRAM-SHA-256".into())
            ]
        );
    }

    #[test]
    fn test_short_response_is_one_line() {
        let lines = authenticate_lines("AGppbGxlcwBzZXNhbWU=");
        assert_eq!(lines, vec!["AUTHENTICATE AGppbGxlcwBzZXNhbWU="]);
    }

    #[test]
    fn test_exact_multiple_gets_terminator() {
        let encoded = "A".repeat(800);
        let lines = authenticate_lines(&encoded);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), "AUTHENTICATE ".len() + 400);
        assert_eq!(lines[2], "AUTHENTICATE +");
    }

    #[test]
    fn test_long_response_chunks() {
        let encoded = "B".repeat(450);
        let lines = authenticate_lines(&encoded);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("AUTHENTICATE {}", "B".repeat(50)));
    }

    #[test]
    fn test_credentials_offered() {
        let creds = SaslCredentials::plain("acct", "pw");
        assert!(creds.is_offered(&[]));
        assert!(creds.is_offered(&[SaslMechanism::External, SaslMechanism::Plain]));
        assert!(!creds.is_offered(&[SaslMechanism::External]));
    }
}
