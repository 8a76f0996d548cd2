// ABOUTME: Decoder for scripts wrapped by the sojson.v4 obfuscator.
// ABOUTME: The payload is a run of decimal char codes separated by alphabetic noise.

use crate::error::{ParserError, Result};

const ENVELOPE_MARKER: &str = "['sojson.v4']";
const PREFIX_LEN: usize = 240;
const SUFFIX_LEN: usize = 59;

/// Recovers the original script text from a sojson.v4 envelope.
///
/// `url` is only used for error context.
pub fn decode(obfuscated: &str, url: &str) -> Result<String> {
    if !obfuscated.starts_with(ENVELOPE_MARKER) {
        return Err(ParserError::format(
            url,
            "sojson envelope",
            Some(anyhow::anyhow!("script is not sojson.v4")),
        ));
    }
    let body = obfuscated
        .len()
        .checked_sub(SUFFIX_LEN)
        .filter(|end| *end >= PREFIX_LEN)
        .and_then(|end| obfuscated.get(PREFIX_LEN..end))
        .ok_or_else(|| {
            ParserError::format(
                url,
                "sojson envelope",
                Some(anyhow::anyhow!("script too short")),
            )
        })?;

    let mut out = String::with_capacity(body.len() / 3);
    for token in body
        .split(|c: char| c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
    {
        let ch = token
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                ParserError::decode(
                    url,
                    "sojson payload",
                    Some(anyhow::anyhow!("invalid char code {:?}", token)),
                )
            })?;
        out.push(ch);
    }
    Ok(out)
}

/// Wraps `script` in a sojson.v4-shaped envelope. Used to build fixtures.
#[cfg(test)]
pub(crate) fn encode(script: &str) -> String {
    let mut out = String::from(ENVELOPE_MARKER);
    while out.len() < PREFIX_LEN {
        out.push('x');
    }
    let codes: Vec<String> = script.chars().map(|c| (c as u32).to_string()).collect();
    out.push_str(&codes.join("a"));
    out.push_str(&"y".repeat(SUFFIX_LEN));
    out
}
