//! Transfer engine backed by `ureq`.
//!
//! # Design
//! A `UreqHandle` keeps the last applied `OptionSet` and builds a fresh
//! `ureq::Agent` from it on every `perform`, so each transfer sees exactly
//! the options computed for it and nothing leaks between executions.
//! Non-2xx statuses are returned as data; only transport-level problems
//! set an error code.

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::debug;
use ureq::http::Response;
use ureq::tls::TlsConfig;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder, ResponseExt};

use crate::engine::{code, Payload, TransferEngine, TransferHandle, TransferInfo};
use crate::error::TransferError;
use crate::options::{Opt, OptionSet};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Redirect limit used when `CURLOPT_FOLLOWLOCATION` is on without `CURLOPT_MAXREDIRS`.
const DEFAULT_MAX_REDIRS: u32 = 30;

/// The bundled engine. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqEngine;

impl TransferEngine for UreqEngine {
    type Handle = UreqHandle;

    fn init(&self) -> Result<UreqHandle, String> {
        Ok(UreqHandle::default())
    }
}

#[derive(Debug, Default)]
pub struct UreqHandle {
    options: OptionSet,
    errno: u32,
    error: String,
    info: TransferInfo,
    closed: bool,
}

impl TransferHandle for UreqHandle {
    fn set_options(&mut self, options: &OptionSet) {
        self.options = options.clone();
    }

    fn perform(&mut self) -> Option<Payload> {
        self.errno = code::OK;
        self.error.clear();
        self.info = TransferInfo::default();

        let outcome = if self.closed {
            Err(TransferError {
                code: code::BAD_FUNCTION_ARGUMENT,
                message: "handle is closed".to_string(),
            })
        } else {
            self.transfer()
        };

        match outcome {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(code = e.code, error = %e.message, "transfer failed");
                self.errno = e.code;
                self.error = e.message;
                None
            }
        }
    }

    fn errno(&self) -> u32 {
        self.errno
    }

    fn error(&self) -> String {
        self.error.clone()
    }

    fn info(&self) -> TransferInfo {
        self.info.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        self.options = OptionSet::new();
    }
}

impl UreqHandle {
    fn transfer(&mut self) -> Result<Payload, TransferError> {
        let request = PreparedRequest::from_options(&self.options)?;
        let agent = agent_for(&self.options);

        debug!(url = %request.url, method = %request.method, "starting transfer");
        let started = Instant::now();
        let mut response = request.send(&agent).map_err(transfer_error)?;
        let body = if request.method == "HEAD" {
            Vec::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(u64::MAX)
                .read_to_vec()
                .map_err(transfer_error)?
        };
        let elapsed = started.elapsed();

        self.info = TransferInfo {
            url: response.get_uri().to_string(),
            http_code: response.status().as_u16(),
            content_type: header_value(&response, "content-type"),
            request_method: request.method.clone(),
            download_content_length: header_value(&response, "content-length")
                .and_then(|v| v.parse().ok()),
            size_download: body.len() as u64,
            size_upload: request.body.as_ref().map_or(0, |b| b.len() as u64),
            total_time: elapsed.as_secs_f64(),
        };
        debug!(
            status = self.info.http_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "transfer complete"
        );

        if self.options.flag(Opt::ReturnTransfer).unwrap_or(false) {
            return Ok(Payload::Body(body));
        }
        std::io::stdout()
            .write_all(&body)
            .map_err(|e| TransferError {
                code: code::WRITE_ERROR,
                message: e.to_string(),
            })?;
        Ok(Payload::Emitted)
    }
}

/// Request line, headers and body resolved from an option set.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PreparedRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl PreparedRequest {
    fn from_options(options: &OptionSet) -> Result<Self, TransferError> {
        let url = options
            .text(Opt::Url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| TransferError {
                code: code::URL_MALFORMAT,
                message: "No URL set".to_string(),
            })?;

        let crlf = options.flag(Opt::Crlf).unwrap_or(false);
        let body = options.text(Opt::PostFields).map(|fields| {
            if crlf {
                translate_crlf(fields)
            } else {
                fields.as_bytes().to_vec()
            }
        });

        let method = match options.text(Opt::CustomRequest) {
            Some(method) if !method.is_empty() => method.to_string(),
            _ if options.flag(Opt::NoBody).unwrap_or(false) => "HEAD".to_string(),
            _ if body.is_some() => "POST".to_string(),
            _ => "GET".to_string(),
        };

        let mut headers: Vec<(String, String)> = options
            .list(Opt::HttpHeader)
            .unwrap_or_default()
            .iter()
            .filter_map(|line| parse_header(line))
            .collect();
        add_header_if_absent(&mut headers, "user-agent", options.text(Opt::UserAgent));
        add_header_if_absent(&mut headers, "referer", options.text(Opt::Referer));
        if body.is_some() {
            add_header_if_absent(&mut headers, "content-type", Some(FORM_CONTENT_TYPE));
        }

        Ok(Self {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    fn send(&self, agent: &Agent) -> Result<Response<Body>, ureq::Error> {
        let url = self.url.as_str();
        match self.method.as_str() {
            "GET" => self.without_body(agent.get(url)),
            "HEAD" => self.without_body(agent.head(url)),
            "DELETE" => self.without_body(agent.delete(url)),
            "OPTIONS" => self.without_body(agent.options(url)),
            "TRACE" => self.without_body(agent.trace(url)),
            "POST" => self.with_body(agent.post(url)),
            "PUT" => self.with_body(agent.put(url)),
            "PATCH" => self.with_body(agent.patch(url)),
            _ => self.custom(agent),
        }
    }

    fn without_body(&self, builder: RequestBuilder<WithoutBody>) -> Result<Response<Body>, ureq::Error> {
        let builder = self
            .headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()));
        match &self.body {
            Some(body) if !body.is_empty() => builder.force_send_body().send(&body[..]),
            _ => builder.call(),
        }
    }

    fn with_body(&self, builder: RequestBuilder<WithBody>) -> Result<Response<Body>, ureq::Error> {
        let builder = self
            .headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()));
        match &self.body {
            Some(body) => builder.send(&body[..]),
            None => builder.send_empty(),
        }
    }

    fn custom(&self, agent: &Agent) -> Result<Response<Body>, ureq::Error> {
        let builder = ureq::http::Request::builder()
            .method(self.method.as_str())
            .uri(self.url.as_str());
        let builder = self
            .headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()));
        let request = builder
            .body(self.body.clone().unwrap_or_default())
            .map_err(ureq::Error::Http)?;
        agent.run(request)
    }
}

fn agent_for(options: &OptionSet) -> Agent {
    let max_redirects = if options.flag(Opt::FollowLocation).unwrap_or(false) {
        options
            .integer(Opt::MaxRedirs)
            .map_or(DEFAULT_MAX_REDIRS, |n| u32::try_from(n).unwrap_or(u32::MAX))
    } else {
        0
    };
    let verify_peer = options.flag(Opt::SslVerifyPeer).unwrap_or(true);
    if let Some(version) = options.integer(Opt::SslVersion).filter(|v| *v != 0) {
        debug!(version, "CURLOPT_SSLVERSION is not selectable, using TLS defaults");
    }

    Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .max_redirects(max_redirects)
        .timeout_global(timeout(options, Opt::TimeoutMs, Opt::Timeout))
        .timeout_connect(timeout(options, Opt::ConnectTimeoutMs, Opt::ConnectTimeout))
        .tls_config(TlsConfig::builder().disable_verification(!verify_peer).build())
        .build()
        .new_agent()
}

/// Millisecond option wins over the seconds one; zero or negative means no limit.
fn timeout(options: &OptionSet, millis: Opt, secs: Opt) -> Option<Duration> {
    let duration = match (options.integer(millis), options.integer(secs)) {
        (Some(ms), _) => Duration::from_millis(u64::try_from(ms).unwrap_or(0)),
        (None, Some(s)) => Duration::from_secs(u64::try_from(s).unwrap_or(0)),
        (None, None) => return None,
    };
    (!duration.is_zero()).then_some(duration)
}

fn transfer_error(err: ureq::Error) -> TransferError {
    let code = match &err {
        ureq::Error::BadUri(_) => code::URL_MALFORMAT,
        ureq::Error::HostNotFound => code::COULDNT_RESOLVE_HOST,
        ureq::Error::ConnectionFailed => code::COULDNT_CONNECT,
        ureq::Error::Timeout(_) => code::OPERATION_TIMEDOUT,
        ureq::Error::TooManyRedirects => code::TOO_MANY_REDIRECTS,
        ureq::Error::BodyExceedsLimit(_) => code::FILESIZE_EXCEEDED,
        ureq::Error::Http(_) => code::BAD_FUNCTION_ARGUMENT,
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            code::COULDNT_CONNECT
        }
        _ => code::RECV_ERROR,
    };
    TransferError {
        code,
        message: err.to_string(),
    }
}

fn header_value(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Split a `Name: value` line. Lines without a name are dropped.
fn parse_header(line: &str) -> Option<(String, String)> {
    match line.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Some((name.trim().to_string(), value.trim().to_string()))
        }
        _ => {
            debug!(header = line, "skipping malformed header");
            None
        }
    }
}

fn add_header_if_absent(headers: &mut Vec<(String, String)>, name: &str, value: Option<&str>) {
    let Some(value) = value else { return };
    if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
        headers.push((name.to_string(), value.to_string()));
    }
}

/// Expand bare `\n` to `\r\n`.
fn translate_crlf(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut prev = 0u8;
    for &b in text.as_bytes() {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}
