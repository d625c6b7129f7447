//! Protocol module for pingpair
//!
//! Wire formats for the UDP probe exchange and the HTTP form endpoints.

pub mod error;
pub mod form;
pub mod message;

pub use error::{ProtocolError, Result as ProtocolResult};
pub use form::{
    encode_form, fetch_body, form_field, parse_timestamp_lossy, FETCH_PATH, SUBMIT_PATH,
    TEXT_FIELD, TS_FIELD,
};
pub use message::{
    request_id_lossy, EchoReply, ProbeRequest, RequestId, FILLER_TEXT, MAX_DATAGRAM_SIZE,
    PROBE_TEXT,
};
