//! Form-encoded HTTP endpoints of the echo server.

use crate::protocol::message::FILLER_TEXT;

/// Submit endpoint: answers with the server receipt timestamp.
pub const SUBMIT_PATH: &str = "/send";

/// Fetch endpoint: answers with the token and a block of filler text.
pub const FETCH_PATH: &str = "/get";

pub const TS_FIELD: &str = "ts";
pub const TEXT_FIELD: &str = "text";

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// First value of `name` in a form-encoded body.
pub fn form_field(body: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Decimal nanosecond timestamp, zero when it does not parse.
pub fn parse_timestamp_lossy(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

/// Body of a fetch response for `token`.
pub fn fetch_body(token: &str) -> String {
    format!("{}\n{}", token, FILLER_TEXT)
}
