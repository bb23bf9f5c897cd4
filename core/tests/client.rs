//! Client behavior against a recording engine.
//!
//! The engine shares a log with the test so every option set handed to the
//! handle, every `perform` and every `close` can be inspected after the
//! client is gone.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use transfer_core::{
    ClientConfig, ClientError, ConfigError, HttpClient, Opt, OptionSet, Payload, TransferEngine,
    TransferError, TransferHandle, TransferInfo,
};

#[derive(Debug, Default)]
struct Log {
    applied: Vec<OptionSet>,
    performs: usize,
    closes: usize,
}

/// Scripted result for the next `perform`.
#[derive(Debug, Clone)]
enum Outcome {
    Body(&'static str),
    Fail(u32, &'static str),
}

struct RecordingEngine {
    log: Rc<RefCell<Log>>,
    outcomes: Vec<Outcome>,
    available: bool,
}

#[derive(Debug)]
struct RecordingHandle {
    log: Rc<RefCell<Log>>,
    outcomes: Vec<Outcome>,
    errno: u32,
    error: String,
    info: TransferInfo,
}

impl RecordingEngine {
    fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            log: Rc::new(RefCell::new(Log::default())),
            outcomes,
            available: true,
        }
    }

    fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }
}

impl TransferEngine for RecordingEngine {
    type Handle = RecordingHandle;

    fn init(&self) -> Result<RecordingHandle, String> {
        if !self.available {
            return Err("engine library not loaded".to_string());
        }
        Ok(RecordingHandle {
            log: Rc::clone(&self.log),
            outcomes: self.outcomes.clone(),
            errno: 0,
            error: String::new(),
            info: TransferInfo::default(),
        })
    }
}

impl TransferHandle for RecordingHandle {
    fn set_options(&mut self, options: &OptionSet) {
        self.log.borrow_mut().applied.push(options.clone());
    }

    fn perform(&mut self) -> Option<Payload> {
        let n = {
            let mut log = self.log.borrow_mut();
            log.performs += 1;
            log.performs
        };
        self.info = TransferInfo {
            http_code: 200,
            size_download: n as u64,
            ..TransferInfo::default()
        };
        let outcome = self
            .outcomes
            .get(n - 1)
            .cloned()
            .unwrap_or(Outcome::Body("ok"));
        match outcome {
            Outcome::Body(body) => {
                self.errno = 0;
                self.error.clear();
                Some(Payload::Body(body.as_bytes().to_vec()))
            }
            Outcome::Fail(code, message) => {
                self.errno = code;
                self.error = message.to_string();
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
        self.log.borrow_mut().closes += 1;
    }
}

fn client(engine: &RecordingEngine) -> HttpClient<RecordingHandle> {
    HttpClient::with_engine(engine, ClientConfig::default()).unwrap()
}

fn last_applied(engine: &RecordingEngine) -> OptionSet {
    engine.log.borrow().applied.last().cloned().unwrap()
}

#[test]
fn construction_fails_when_engine_is_unavailable() {
    let engine = RecordingEngine::unavailable();
    let err = HttpClient::with_engine(&engine, ClientConfig::default()).unwrap_err();
    assert!(matches!(err, ClientError::EngineUnavailable { ref reason } if reason == "engine library not loaded"));
}

#[test]
fn execute_targets_the_stored_url_verbatim() {
    let engine = RecordingEngine::new(vec![Outcome::Body("hello")]);
    let mut c = client(&engine);
    c.set_url("http://Example.COM:8080/a/../b?x=1 2");

    let payload = c.execute().unwrap();
    assert_eq!(payload.text().unwrap(), "hello");
    assert_eq!(
        last_applied(&engine).text(Opt::Url),
        Some("http://Example.COM:8080/a/../b?x=1 2")
    );
    assert!(c.last_error().is_none());
}

#[test]
fn execute_without_url_is_a_configuration_error() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    let err = c.execute().unwrap_err();
    assert!(matches!(err, ClientError::Configuration(ConfigError::MissingUrl)));
    assert_eq!(engine.log.borrow().performs, 0);
}

#[test]
fn unknown_option_is_reported_on_execute_not_on_set() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.set_option("CURLOPT_TELEPORT", true);

    let err = c.execute().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Configuration(ConfigError::UnknownOption { ref key }) if key == "CURLOPT_TELEPORT"
    ));
    assert_eq!(engine.log.borrow().performs, 0);
}

#[test]
fn mistyped_option_value_is_a_configuration_error() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.set_option("CURLOPT_HTTPHEADER", "Accept: */*");

    let err = c.execute().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Configuration(ConfigError::InvalidValue {
            option: "CURLOPT_HTTPHEADER",
            ..
        })
    ));
}

#[test]
fn overrides_win_over_https_and_restricted_adjustments() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = HttpClient::with_engine(&engine, ClientConfig::default().restricted(true)).unwrap();
    c.set_url("https://secure.example/");
    c.set_options(BTreeMap::from([
        ("CURLOPT_SSL_VERIFYPEER", false),
        ("CURLOPT_FOLLOWLOCATION", true),
    ]));

    c.execute().unwrap();
    let options = last_applied(&engine);
    assert_eq!(options.flag(Opt::SslVerifyPeer), Some(false));
    assert_eq!(options.flag(Opt::FollowLocation), Some(true));
}

#[test]
fn adjustments_apply_without_overrides() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = HttpClient::with_engine(&engine, ClientConfig::default().restricted(true)).unwrap();
    c.set_url("https://secure.example/");

    c.execute().unwrap();
    let options = last_applied(&engine);
    assert_eq!(options.flag(Opt::SslVerifyPeer), Some(true));
    assert_eq!(options.flag(Opt::FollowLocation), Some(false));
}

#[test]
fn set_method_lowercase_becomes_uppercase() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.set_method("get", &[] as &[(&str, &str)])
        .unwrap()
        .execute()
        .unwrap();

    let options = last_applied(&engine);
    assert_eq!(options.text(Opt::CustomRequest), Some("GET"));
    assert_eq!(options.text(Opt::PostFields), Some(""));
}

#[test]
fn set_method_encodes_params_in_insertion_order() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.set_method("POST", &[("a", "1"), ("b", "2")]).unwrap();
    c.execute().unwrap();
    assert_eq!(last_applied(&engine).text(Opt::PostFields), Some("a=1&b=2"));

    c.set_method("POST", &[("q", "a b&c"), ("e", "é")]).unwrap();
    c.execute().unwrap();
    assert_eq!(
        last_applied(&engine).text(Opt::PostFields),
        Some("q=a+b%26c&e=%C3%A9")
    );
}

#[test]
fn set_method_encoding_failure_propagates() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");

    let err = c.set_method("POST", "not a map").unwrap_err();
    assert!(matches!(err, ClientError::Encoding(_)));

    // The failed call leaves no method behind.
    c.execute().unwrap();
    assert!(!last_applied(&engine).contains(Opt::CustomRequest));
}

#[test]
fn failed_transfer_reports_and_records_the_engine_error() {
    let engine = RecordingEngine::new(vec![Outcome::Fail(6, "Could not resolve host: nowhere")]);
    let mut c = client(&engine);
    c.set_url("http://nowhere/");

    let err = c.execute().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error: Could not resolve host: nowhere and the Error no is: 6 "
    );
    assert!(matches!(err, ClientError::TransferFailed { code: 6, .. }));
    assert_eq!(
        c.last_error(),
        Some(&TransferError {
            code: 6,
            message: "Could not resolve host: nowhere".to_string()
        })
    );
}

#[test]
fn re_execution_after_failure_overwrites_last_error() {
    let engine = RecordingEngine::new(vec![
        Outcome::Fail(28, "Operation timed out"),
        Outcome::Fail(7, "Failed to connect"),
        Outcome::Body("fine"),
    ]);
    let mut c = client(&engine);
    c.set_url("http://flaky/");

    assert!(c.execute().is_err());
    assert_eq!(c.last_error().map(|e| e.code), Some(28));

    assert!(c.execute().is_err());
    assert_eq!(c.last_error().map(|e| e.code), Some(7));

    assert_eq!(c.execute().unwrap(), Payload::Body(b"fine".to_vec()));
    assert!(c.last_error().is_none());
}

#[test]
fn fetch_info_performs_one_transfer_per_call() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");

    c.execute().unwrap();
    assert_eq!(engine.log.borrow().performs, 1);

    let info = c.fetch_info().unwrap();
    assert_eq!(engine.log.borrow().performs, 2);
    assert_eq!(info.size_download, 2);

    let info = c.fetch_info().unwrap();
    assert_eq!(engine.log.borrow().performs, 3);
    assert_eq!(info.size_download, 3);
    assert_eq!(info.to_map()["http_code"], 200);
}

#[test]
fn fetch_info_propagates_transfer_failure() {
    let engine = RecordingEngine::new(vec![Outcome::Fail(7, "Failed to connect")]);
    let mut c = client(&engine);
    c.set_url("http://localhost:1/");
    assert!(matches!(
        c.fetch_info(),
        Err(ClientError::TransferFailed { code: 7, .. })
    ));
}

#[test]
fn every_execution_rebuilds_options() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.set_option("CURLOPT_TIMEOUT", 3);
    c.execute().unwrap();

    c.set_options(Vec::<(String, i64)>::new());
    c.execute().unwrap();

    let log = engine.log.borrow();
    assert_eq!(log.applied.len(), 2);
    assert_eq!(log.applied[0].integer(Opt::Timeout), Some(3));
    assert_eq!(log.applied[1].integer(Opt::Timeout), Some(30));
}

#[test]
fn teardown_closes_the_handle_exactly_once() {
    let engine = RecordingEngine::new(Vec::new());
    let mut c = client(&engine);
    c.set_url("http://localhost/");
    c.close();
    c.close();
    assert!(c.is_closed());
    assert!(matches!(c.execute(), Err(ClientError::Closed)));
    assert!(matches!(c.fetch_info(), Err(ClientError::Closed)));
    drop(c);
    assert_eq!(engine.log.borrow().closes, 1);
}

#[test]
fn dropping_a_live_client_closes_its_handle() {
    let engine = RecordingEngine::new(Vec::new());
    {
        let mut c = client(&engine);
        c.set_url("http://localhost/");
        c.execute().unwrap();
    }
    assert_eq!(engine.log.borrow().closes, 1);
}

#[test]
fn each_client_owns_its_own_handle() {
    let engine = RecordingEngine::new(Vec::new());
    let mut a = client(&engine);
    let mut b = client(&engine);
    a.set_url("http://a/");
    b.set_url("http://b/");
    a.execute().unwrap();
    b.execute().unwrap();
    drop(a);
    assert_eq!(engine.log.borrow().closes, 1);
    b.execute().unwrap();
    drop(b);

    let log = engine.log.borrow();
    let urls: Vec<_> = log.applied.iter().map(|o| o.text(Opt::Url).unwrap().to_string()).collect();
    assert_eq!(urls, vec!["http://a/", "http://b/", "http://b/"]);
    assert_eq!(log.closes, 2);
}
