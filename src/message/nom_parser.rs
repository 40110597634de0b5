//! Nom-based IRC line splitter.
//!
//! Splits a raw line into borrowed tag, source, command and parameter
//! slices. Tag decoding and source splitting happen in the owning
//! [`Message`](super::Message) constructor.

use nom::{
    bytes::complete::take_till1,
    character::complete::{char, space1},
    error::{context, VerboseError, VerboseErrorKind},
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse the IRCv3 tag section (after `@`, up to and including the separating spaces).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        terminated(preceded(char('@'), take_till1(|c| c == ' ')), space1),
    )(input)
}

/// Parse a source token (the part after `:`).
fn parse_source(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message source",
        preceded(char(':'), take_till1(|c| c == ' ')),
    )(input)
}

/// A line split into borrowed components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLine<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw source (without the leading `:`), if present.
    pub source: Option<&'a str>,
    /// The command token as received.
    pub command: &'a str,
    /// Middle parameters followed by the trailing parameter.
    pub params: Vec<&'a str>,
}

/// Split a raw line.
///
/// ```text
/// [@tags] [:source] <command> [middle...] [:trailing]
/// ```
///
/// The trailing parameter is everything after the first space-colon
/// sequence and may contain spaces or be empty.
pub(crate) fn split_line(line: &str) -> Result<RawLine<'_>, MessageParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim_matches(' ').is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }

    let (rest, tags) = if line.starts_with('@') {
        let (rest, tags) = parse_tags(line).map_err(|e| context_error(line, e))?;
        (rest, Some(tags))
    } else {
        (line, None)
    };

    let (main, trailing) = match rest.find(" :") {
        Some(i) => (&rest[..i], Some(&rest[i + 2..])),
        None => (rest, None),
    };

    let mut tokens = main.split(' ').filter(|t| !t.is_empty());
    let mut command = tokens.next().ok_or(MessageParseError::MissingCommand)?;

    let source = if command.starts_with(':') {
        let (_, source) = parse_source(command).map_err(|_| MessageParseError::EmptySource)?;
        command = tokens.next().ok_or(MessageParseError::MissingCommand)?;
        Some(source)
    } else {
        None
    };

    Ok(RawLine {
        tags,
        source,
        command,
        params: tokens.chain(trailing).collect(),
    })
}

fn context_error(input: &str, err: nom::Err<VerboseError<&str>>) -> MessageParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let mut position = input.len();
            let mut what = "parsing line";
            for (remaining, kind) in &e.errors {
                if let VerboseErrorKind::Context(ctx) = kind {
                    position = input.len() - remaining.len();
                    what = ctx;
                }
            }
            MessageParseError::ParseContext {
                position,
                context: what.to_string(),
            }
        }
        nom::Err::Incomplete(_) => MessageParseError::ParseContext {
            position: input.len(),
            context: "incomplete input".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_line() {
        let raw = split_line("@time=x;msgid=1 :a!b@c PRIVMSG #x :hello world\r\n").unwrap();
        assert_eq!(raw.tags, Some("time=x;msgid=1"));
        assert_eq!(raw.source, Some("a!b@c"));
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#x", "hello world"]);
    }

    #[test]
    fn test_split_trailing_keeps_spaces() {
        let raw = split_line(":a!b@c PRIVMSG #x :hello world ").unwrap();
        assert_eq!(raw.params, vec!["#x", "hello world "]);
    }

    #[test]
    fn test_split_empty_trailing() {
        let raw = split_line("TOPIC #x :").unwrap();
        assert_eq!(raw.params, vec!["#x", ""]);
    }

    #[test]
    fn test_split_space_runs() {
        let raw = split_line("MODE   #x  +o   nick").unwrap();
        assert_eq!(raw.command, "MODE");
        assert_eq!(raw.params, vec!["#x", "+o", "nick"]);
    }

    #[test]
    fn test_split_trailing_with_colons() {
        let raw = split_line("PRIVMSG #x ::) a :b").unwrap();
        assert_eq!(raw.params, vec!["#x", ":) a :b"]);
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(split_line(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(split_line("   \r\n"), Err(MessageParseError::EmptyMessage));
        assert_eq!(split_line(":server"), Err(MessageParseError::MissingCommand));
        assert_eq!(split_line(": PING"), Err(MessageParseError::EmptySource));
        assert!(matches!(
            split_line("@a=b"),
            Err(MessageParseError::ParseContext { .. })
        ));
    }
}
