#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use siilink_common::testing::RecordingSleeper;
use siilink_domain::{Environment, Result, Rut, SiiConfig};
use siilink_infra::http::{
    HttpReply, HttpTransport, MultipartRequest, SoapRequest, TransportFault, TransportOptions,
};
use siilink_infra::integrations::sii::{Credential, RequestContext, SiiClient, Signer};

pub const UPLOAD_ACTION: &str = "upload";

/// One scripted answer of the fake transport.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(u16, String),
    Fault(String),
}

impl Scripted {
    fn into_result(self) -> std::result::Result<HttpReply, TransportFault> {
        match self {
            Self::Reply(status, body) => Ok(HttpReply { status, body: body.into_bytes() }),
            Self::Fault(message) => Err(TransportFault::new(message)),
        }
    }
}

/// A request as seen by the fake transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action: String,
    pub url: String,
    /// SOAP envelope, or the uploaded file bytes for multipart calls.
    pub body: Vec<u8>,
    pub fields: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub file_content_type: Option<String>,
    /// Staged upload file, for multipart calls.
    pub file_path: Option<PathBuf>,
}

/// In-process transport answering from per-action scripts.
///
/// One-shot replies queued with [`ScriptedTransport::then`] are consumed
/// first; afterwards the sticky reply set with [`ScriptedTransport::always`]
/// answers.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sticky: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport whose seed and token services succeed with `token`.
    pub fn authenticated(token: &str) -> Arc<Self> {
        let transport = Self::new();
        transport.always("getSeed", seed_reply("012345678901"));
        transport.always("getToken", token_reply(token));
        transport
    }

    pub fn always(&self, action: &str, reply: Scripted) {
        self.sticky.lock().insert(action.to_string(), reply);
    }

    pub fn then(&self, action: &str, reply: Scripted) {
        self.queued.lock().entry(action.to_string()).or_default().push_back(reply);
    }

    /// Hold every call to `action` for `delay` before answering.
    pub fn slow(&self, action: &str, delay: Duration) {
        self.delays.lock().insert(action.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.action == action).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    fn answer(&self, call: RecordedCall) -> std::result::Result<HttpReply, TransportFault> {
        let action = call.action.clone();
        self.calls.lock().push(call);

        let delay = self.delays.lock().get(&action).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let queued = self.queued.lock().get_mut(&action).and_then(VecDeque::pop_front);
        let scripted = queued
            .or_else(|| self.sticky.lock().get(&action).cloned())
            .unwrap_or_else(|| Scripted::Fault(format!("no scripted reply for {action}")));
        scripted.into_result()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post_soap(
        &self,
        request: &SoapRequest,
        _options: &TransportOptions,
    ) -> std::result::Result<HttpReply, TransportFault> {
        self.answer(RecordedCall {
            action: request.soap_action.clone(),
            url: request.url.clone(),
            body: request.envelope.clone().into_bytes(),
            fields: Vec::new(),
            cookie: None,
            file_content_type: None,
            file_path: None,
        })
    }

    fn post_multipart(
        &self,
        request: &MultipartRequest,
        _options: &TransportOptions,
    ) -> std::result::Result<HttpReply, TransportFault> {
        let body = std::fs::read(&request.file_path)?;
        self.answer(RecordedCall {
            action: UPLOAD_ACTION.to_string(),
            url: request.url.clone(),
            body,
            fields: request.fields.clone(),
            cookie: request.cookie.clone(),
            file_content_type: Some(request.file_content_type.clone()),
            file_path: Some(request.file_path.clone()),
        })
    }
}

/// Escape `inner` the way SII embeds its payload in the SOAP return value.
pub fn escape(inner: &str) -> String {
    inner.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// SOAP envelope answering `function` with `inner` as its return value.
pub fn soap_ok(function: &str, inner: &str) -> Scripted {
    Scripted::Reply(
        200,
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<soapenv:Body><ns1:{f}Response xmlns:ns1="http://DefaultNamespace">"#,
                r#"<{f}Return>{inner}</{f}Return>"#,
                r#"</ns1:{f}Response></soapenv:Body></soapenv:Envelope>"#
            ),
            f = function,
            inner = escape(inner)
        ),
    )
}

pub fn soap_fault(message: &str) -> Scripted {
    Scripted::Reply(
        500,
        format!(
            concat!(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<soapenv:Body><soapenv:Fault><faultcode>soapenv:Server</faultcode>"#,
                r#"<faultstring>{}</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#
            ),
            message
        ),
    )
}

/// `RESPUESTA` document with the given header and body children.
pub fn respuesta(header: &[(&str, &str)], body: &[(&str, &str)]) -> String {
    let render = |fields: &[(&str, &str)]| {
        fields.iter().map(|(name, value)| format!("<{name}>{value}</{name}>")).collect::<String>()
    };
    format!(
        "<SII:RESPUESTA xmlns:SII=\"http://www.sii.cl/XMLSchema\"><SII:RESP_BODY>{}</SII:RESP_BODY><SII:RESP_HDR>{}</SII:RESP_HDR></SII:RESPUESTA>",
        render(body),
        render(header)
    )
}

pub fn seed_reply(seed: &str) -> Scripted {
    soap_ok("getSeed", &respuesta(&[("ESTADO", "00")], &[("SEMILLA", seed)]))
}

pub fn token_reply(token: &str) -> Scripted {
    soap_ok(
        "getToken",
        &respuesta(&[("ESTADO", "00"), ("GLOSA", "Token Creado")], &[("TOKEN", token)]),
    )
}

pub fn upload_reply(status: i64, extra: &str) -> Scripted {
    Scripted::Reply(
        200,
        format!(
            "<?xml version=\"1.0\"?><RECEPCIONDTE><RUTSENDER>11111111-1</RUTSENDER><RUTCOMPANY>76192083-9</RUTCOMPANY><FILE>envio.xml</FILE><TIMESTAMP>2024-03-07 10:15:02</TIMESTAMP><STATUS>{status}</STATUS>{extra}</RECEPCIONDTE>"
        ),
    )
}

/// Credential with a fixed identity and holder RUT.
pub struct TestCredential {
    identity: String,
    holder: Option<Rut>,
}

impl TestCredential {
    pub fn new(identity: &str) -> Arc<Self> {
        Arc::new(Self { identity: identity.to_string(), holder: Some(rut("11111111-1")) })
    }

    pub fn anonymous(identity: &str) -> Arc<Self> {
        Arc::new(Self { identity: identity.to_string(), holder: None })
    }
}

impl Credential for TestCredential {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn holder_rut(&self) -> Option<Rut> {
        self.holder
    }
}

/// Signer wrapping the document in a marker element and counting calls.
#[derive(Default)]
pub struct StubSigner {
    calls: AtomicUsize,
}

impl StubSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Signer for StubSigner {
    fn sign(&self, xml: &str, credential: &dyn Credential) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<Signed by=\"{}\">{xml}</Signed>", credential.identity()))
    }
}

pub fn rut(raw: &str) -> Rut {
    raw.parse().expect("test RUT should parse")
}

pub fn certification_config() -> SiiConfig {
    SiiConfig { environment: Environment::Certification, ..SiiConfig::default() }
}

/// Client wired to `transport`, with a recording sleeper.
pub struct Harness {
    pub client: SiiClient,
    pub transport: Arc<ScriptedTransport>,
    pub signer: Arc<StubSigner>,
    pub sleeper: RecordingSleeper,
}

impl Harness {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self::with_config(transport, certification_config())
    }

    pub fn with_config(transport: Arc<ScriptedTransport>, config: SiiConfig) -> Self {
        let signer = StubSigner::new();
        let sleeper = RecordingSleeper::new();
        let client = SiiClient::builder(config, signer.clone())
            .transport(transport.clone())
            .sleeper(Arc::new(sleeper.clone()))
            .build();
        Self { client, transport, signer, sleeper }
    }

    pub fn context(&self, identity: &str) -> RequestContext {
        self.client.context(TestCredential::new(identity))
    }
}
