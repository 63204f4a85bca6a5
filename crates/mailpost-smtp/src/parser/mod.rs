//! Envelope path parsing.
//!
//! Accepts `FROM:<address>` and `TO:<address>` with the keyword in any
//! case and optional spaces after the colon. Anything following the
//! closing `>` (ESMTP parameters) is ignored.

use crate::error::ParseError;
use crate::types::Address;

/// Parses the argument of `MAIL`.
///
/// # Errors
///
/// Returns an error if the argument is not `FROM:<address>` with a valid
/// address. The null reverse-path `<>` is rejected.
pub fn parse_reverse_path(args: &str) -> Result<Address, ParseError> {
    parse_path(args, "FROM")
}

/// Parses the argument of `RCPT`.
///
/// # Errors
///
/// Returns an error if the argument is not `TO:<address>` with a valid
/// address.
pub fn parse_forward_path(args: &str) -> Result<Address, ParseError> {
    parse_path(args, "TO")
}

fn parse_path(args: &str, keyword: &'static str) -> Result<Address, ParseError> {
    let args = args.trim_start();
    let rest = args
        .get(..keyword.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(keyword))
        .and_then(|_| args[keyword.len()..].strip_prefix(':'))
        .ok_or(ParseError::MissingKeyword(keyword))?;

    let rest = rest
        .trim_start()
        .strip_prefix('<')
        .ok_or(ParseError::MissingBrackets)?;
    let end = rest.find('>').ok_or(ParseError::MissingBrackets)?;

    Address::new(&rest[..end])
}

/// Extracts an address from a VRFY argument.
///
/// The first whitespace-separated token containing `@` is used, with
/// surrounding angle brackets removed.
#[must_use]
pub fn parse_vrfy_address(arg: &str) -> Option<Address> {
    arg.split_whitespace()
        .find(|token| token.contains('@'))
        .map(|token| token.trim_start_matches('<').trim_end_matches('>'))
        .and_then(|token| Address::new(token).ok())
}
