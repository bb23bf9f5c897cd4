//! Single-handle HTTP client.
//!
//! # Design
//! `HttpClient` owns exactly one engine handle for its whole life. Setters
//! only record state; every `execute` rebuilds the option set from the
//! client's `ClientConfig`, the URL, the method/body recorded by
//! `set_method`, and the caller's overrides, in that order, so the last
//! layer always wins. Override keys are kept as strings until that merge,
//! which is where an unknown key turns into `ConfigError::UnknownOption`.
//!
//! Every call that touches the handle takes `&mut self`, so one client can
//! only ever run one transfer at a time.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::engine::{code, Payload, TransferEngine, TransferHandle, TransferInfo};
use crate::error::{ClientError, ConfigError, TransferError};
use crate::options::{Opt, OptionSet, OptionValue};
use crate::transport::{UreqEngine, UreqHandle};

/// Synchronous client wrapping one transfer handle.
#[derive(Debug)]
pub struct HttpClient<H: TransferHandle = UreqHandle> {
    handle: Option<H>,
    config: ClientConfig,
    url: Option<String>,
    overrides: BTreeMap<String, OptionValue>,
    method: Option<String>,
    body: Option<String>,
    last_error: Option<TransferError>,
}

impl HttpClient {
    /// Client on the bundled ureq engine, configured from `TRANSFER_*`
    /// environment variables over the built-in defaults.
    ///
    /// `TRANSFER_RESTRICTED=true` marks the host as restricted, which turns
    /// redirect following off unless an override turns it back on.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_engine(&UreqEngine, ClientConfig::from_env()?)
    }
}

impl<H: TransferHandle> HttpClient<H> {
    /// Acquire a handle from `engine`.
    ///
    /// Fails with `EngineUnavailable` if the engine cannot run on this host.
    pub fn with_engine<E>(engine: &E, config: ClientConfig) -> Result<Self, ClientError>
    where
        E: TransferEngine<Handle = H>,
    {
        let handle = engine
            .init()
            .map_err(|reason| ClientError::EngineUnavailable { reason })?;
        Ok(Self {
            handle: Some(handle),
            config,
            url: None,
            overrides: BTreeMap::new(),
            method: None,
            body: None,
            last_error: None,
        })
    }

    /// Store the target URL as given.
    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = Some(url.into());
        self
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Insert or replace one override. The key is resolved on `execute`.
    pub fn set_option(&mut self, key: impl AsRef<str>, value: impl Into<OptionValue>) -> &mut Self {
        self.overrides
            .insert(key.as_ref().to_ascii_uppercase(), value.into());
        self
    }

    /// Replace all overrides with `options`.
    pub fn set_options<I, K, V>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        self.overrides = options
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_ascii_uppercase(), value.into()))
            .collect();
        self
    }

    /// Set the request method and a form-encoded body built from `params`.
    ///
    /// `params` is anything `serde_urlencoded` accepts: a slice of pairs, a
    /// map, or a flat struct. Pairs keep their order. Encoding errors are
    /// returned untouched as `ClientError::Encoding`.
    pub fn set_method<P>(&mut self, method: &str, params: &P) -> Result<&mut Self, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_urlencoded::to_string(params)?;
        self.method = Some(method.to_ascii_uppercase());
        self.body = Some(body);
        Ok(self)
    }

    /// `POST` with an empty body.
    pub fn set_default_method(&mut self) -> &mut Self {
        self.method = Some("POST".to_string());
        self.body = Some(String::new());
        self
    }

    /// Run the transfer and return the response payload.
    ///
    /// Blocks until the engine finishes or times out. A transport failure is
    /// recorded in `last_error` and returned as `TransferFailed`.
    pub fn execute(&mut self) -> Result<Payload, ClientError> {
        if self.handle.is_none() {
            return Err(ClientError::Closed);
        }
        self.last_error = None;

        let options = self.compute_options()?;
        trace!(?options, "merged transfer options");

        let Some(handle) = self.handle.as_mut() else {
            return Err(ClientError::Closed);
        };
        handle.set_options(&options);
        if let Some(payload) = handle.perform() {
            return Ok(payload);
        }

        let error = self.error().unwrap_or_else(|| TransferError {
            code: code::OK,
            message: String::new(),
        });
        self.last_error = Some(error.clone());
        Err(error.into())
    }

    /// Run a fresh transfer and return its metadata.
    ///
    /// Never reuses the metadata of an earlier `execute`: each call performs
    /// one network transfer.
    pub fn fetch_info(&mut self) -> Result<TransferInfo, ClientError> {
        self.execute()?;
        self.handle
            .as_ref()
            .map(TransferHandle::info)
            .ok_or(ClientError::Closed)
    }

    /// Error recorded by the most recent `execute`, if it failed.
    pub fn last_error(&self) -> Option<&TransferError> {
        self.last_error.as_ref()
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Clear the URL and close the handle. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            self.url = None;
            handle.close();
            debug!("transfer handle closed");
        }
    }

    fn compute_options(&self) -> Result<OptionSet, ConfigError> {
        let mut options = self.config.defaults.option_set();

        if self.config.restricted {
            options.insert(Opt::FollowLocation, false);
        }
        if let Some(url) = self.url() {
            if is_https(url) {
                options.insert(Opt::SslVerifyPeer, true);
            }
            options.insert(Opt::Url, url);
        }
        if let Some(method) = &self.method {
            options.insert(Opt::CustomRequest, method.as_str());
        }
        if let Some(body) = &self.body {
            options.insert(Opt::PostFields, body.as_str());
        }

        for (key, value) in &self.overrides {
            let opt: Opt = key.parse()?;
            options.set(opt, value.clone())?;
        }

        if !options.contains(Opt::Url) {
            return Err(ConfigError::MissingUrl);
        }
        Ok(options)
    }

    fn error(&self) -> Option<TransferError> {
        let handle = self.handle.as_ref()?;
        let code = handle.errno();
        (code > 0).then(|| TransferError {
            code,
            message: handle.error(),
        })
    }
}

impl<H: TransferHandle> Drop for HttpClient<H> {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_https(url: &str) -> bool {
    url.starts_with("https://")
}
