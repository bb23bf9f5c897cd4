//! The seam between `HttpClient` and whatever performs the transfer.
//!
//! # Design
//! The engine surface is deliberately narrow: create a handle, apply an
//! option set, perform, then read the error or metadata back. Errors are
//! read from the handle after a failed `perform` instead of being returned
//! by it, so the client decides what to record and how to report it.
//!
//! Error codes follow libcurl's public numbering; `code` holds the ones the
//! bundled engine produces.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::options::OptionSet;

/// Engine error codes (libcurl numbering).
pub mod code {
    pub const OK: u32 = 0;
    pub const URL_MALFORMAT: u32 = 3;
    pub const COULDNT_RESOLVE_HOST: u32 = 6;
    pub const COULDNT_CONNECT: u32 = 7;
    pub const WRITE_ERROR: u32 = 23;
    pub const OPERATION_TIMEDOUT: u32 = 28;
    pub const BAD_FUNCTION_ARGUMENT: u32 = 43;
    pub const TOO_MANY_REDIRECTS: u32 = 47;
    pub const RECV_ERROR: u32 = 56;
    pub const FILESIZE_EXCEEDED: u32 = 63;
}

/// Factory for handles; the availability probe lives here.
pub trait TransferEngine {
    type Handle: TransferHandle;

    /// Create a handle, or explain why the engine cannot run on this host.
    fn init(&self) -> Result<Self::Handle, String>;
}

/// One engine-level transfer session.
pub trait TransferHandle {
    /// Replace the options used by the next `perform`.
    fn set_options(&mut self, options: &OptionSet);

    /// Run the transfer. `None` means it failed; see `errno` and `error`.
    ///
    /// Implementations returning `None` must leave a non-zero `errno`.
    fn perform(&mut self) -> Option<Payload>;

    /// Error code of the last `perform`, 0 when it succeeded.
    fn errno(&self) -> u32;

    /// Human-readable message for `errno`.
    fn error(&self) -> String;

    /// Metadata of the last `perform`.
    fn info(&self) -> TransferInfo;

    fn close(&mut self);
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Response body, returned because `CURLOPT_RETURNTRANSFER` was on.
    Body(Vec<u8>),
    /// The body was written to standard output.
    Emitted,
}

impl Payload {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Body(bytes) => Some(bytes),
            Payload::Emitted => None,
        }
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.bytes().map(String::from_utf8_lossy)
    }
}

/// Metadata about the most recent transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferInfo {
    /// Effective URL after any redirects.
    pub url: String,
    pub http_code: u16,
    pub content_type: Option<String>,
    pub request_method: String,
    pub download_content_length: Option<u64>,
    pub size_download: u64,
    pub size_upload: u64,
    /// Seconds.
    pub total_time: f64,
}

impl TransferInfo {
    /// Key/value view, one entry per field.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_text_is_lossy() {
        let payload = Payload::Body(vec![b'o', b'k', 0xff]);
        assert_eq!(payload.text().unwrap(), "ok\u{fffd}");
        assert!(Payload::Emitted.text().is_none());
    }

    #[test]
    fn info_map_uses_field_names() {
        let info = TransferInfo {
            url: "http://localhost/".to_string(),
            http_code: 200,
            content_type: Some("text/plain".to_string()),
            request_method: "GET".to_string(),
            download_content_length: None,
            size_download: 2,
            size_upload: 0,
            total_time: 0.5,
        };
        let map = info.to_map();
        assert_eq!(map["url"], "http://localhost/");
        assert_eq!(map["http_code"], 200);
        assert_eq!(map["content_type"], "text/plain");
        assert_eq!(map["download_content_length"], Value::Null);
        assert_eq!(map["total_time"], 0.5);
        assert_eq!(map.len(), 8);
    }
}
