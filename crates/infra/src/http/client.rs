use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::{CONNECTION, CONTENT_TYPE, COOKIE, USER_AGENT};
use siilink_domain::HttpConfig;
use thiserror::Error;
use tracing::debug;

use crate::errors::conversions::describe_http_error;

/// Per-call transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub verify_ssl: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
}

impl TransportOptions {
    /// Build options from the HTTP configuration section.
    pub fn from_config(http: &HttpConfig, verify_ssl: bool) -> Self {
        Self {
            verify_ssl,
            timeout: http.timeout(),
            connect_timeout: http.connect_timeout(),
            user_agent: http.user_agent.clone(),
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default(), true)
    }
}

/// SOAP 1.1 POST.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub url: String,
    pub soap_action: String,
    pub envelope: String,
}

/// Multipart form POST with one file part.
#[derive(Debug, Clone)]
pub struct MultipartRequest {
    pub url: String,
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_content_type: String,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
}

/// Raw HTTP answer. Non-2xx statuses are returned, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFault {
    pub message: String,
}

impl TransportFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        Self::new(describe_http_error(&err))
    }
}

impl From<std::io::Error> for TransportFault {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("i/o error: {err}"))
    }
}

/// Seam between the SII protocol code and the network.
pub trait HttpTransport: Send + Sync {
    fn post_soap(
        &self,
        request: &SoapRequest,
        options: &TransportOptions,
    ) -> Result<HttpReply, TransportFault>;

    fn post_multipart(
        &self,
        request: &MultipartRequest,
        options: &TransportOptions,
    ) -> Result<HttpReply, TransportFault>;
}

/// `reqwest::blocking` transport.
///
/// Builds a fresh client for every request and disables connection reuse, so
/// no socket outlives the call that opened it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingHttpTransport;

impl BlockingHttpTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(options: &TransportOptions) -> Result<Client, TransportFault> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(0);

        if !options.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(agent) = &options.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        builder.build().map_err(TransportFault::from)
    }
}

impl HttpTransport for BlockingHttpTransport {
    fn post_soap(
        &self,
        request: &SoapRequest,
        options: &TransportOptions,
    ) -> Result<HttpReply, TransportFault> {
        let client = Self::client(options)?;
        debug!(url = %request.url, action = %request.soap_action, "sending SOAP request");

        let response = client
            .post(&request.url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}\"", request.soap_action))
            .header(CONNECTION, "close")
            .body(request.envelope.clone())
            .send()?;

        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        debug!(url = %request.url, status, bytes = body.len(), "received SOAP response");

        Ok(HttpReply { status, body })
    }

    fn post_multipart(
        &self,
        request: &MultipartRequest,
        options: &TransportOptions,
    ) -> Result<HttpReply, TransportFault> {
        let client = Self::client(options)?;

        let file = Part::file(&request.file_path)?
            .file_name(request.file_name.clone())
            .mime_str(&request.file_content_type)?;
        let form = request
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()))
            .part(request.file_field.clone(), file);

        let mut builder = client.post(&request.url).header(CONNECTION, "close").multipart(form);
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(agent) = &request.user_agent {
            builder = builder.header(USER_AGENT, agent);
        }

        debug!(url = %request.url, "sending multipart upload");
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        debug!(url = %request.url, status, bytes = body.len(), "received upload response");

        Ok(HttpReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;

    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn options() -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..TransportOptions::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn posts_soap_envelope_with_action_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/DTEWS/CrSeed.jws"))
            .and(header("SOAPAction", "\"getSeed\""))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
            .expect(1)
            .mount(&server)
            .await;

        let request = SoapRequest {
            url: format!("{}/DTEWS/CrSeed.jws", server.uri()),
            soap_action: "getSeed".into(),
            envelope: "<Envelope/>".into(),
        };
        let reply = tokio::task::spawn_blocking(move || {
            BlockingHttpTransport::new().post_soap(&request, &options())
        })
        .await
        .unwrap()
        .unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.body, b"<ok/>");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_errors_are_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("fault"))
            .mount(&server)
            .await;

        let request = SoapRequest {
            url: server.uri(),
            soap_action: "getToken".into(),
            envelope: String::new(),
        };
        let reply = tokio::task::spawn_blocking(move || {
            BlockingHttpTransport::new().post_soap(&request, &options())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(reply.status, 500);
        assert!(!reply.is_success());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn multipart_upload_sends_cookie_and_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cgi_dte/UPL/DTEUpload"))
            .and(header("cookie", "TOKEN=ABC"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<RECEPCIONDTE/>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<EnvioDTE/>").unwrap();

        let request = MultipartRequest {
            url: format!("{}/cgi_dte/UPL/DTEUpload", server.uri()),
            fields: vec![("rutSender".into(), "11111111".into())],
            file_field: "archivo".into(),
            file_path: file.path().to_path_buf(),
            file_name: "envio.xml".into(),
            file_content_type: "text/xml".into(),
            cookie: Some("TOKEN=ABC".into()),
            user_agent: None,
        };
        let reply = tokio::task::spawn_blocking(move || {
            let reply = BlockingHttpTransport::new().post_multipart(&request, &options());
            drop(file);
            reply
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(reply.body, b"<RECEPCIONDTE/>");
        let received = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("name=\"rutSender\""));
        assert!(body.contains("name=\"archivo\"; filename=\"envio.xml\""));
        assert!(body.contains("<EnvioDTE/>"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refused_connection_is_a_fault() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let request = SoapRequest {
            url: format!("http://{addr}/DTEWS/CrSeed.jws"),
            soap_action: "getSeed".into(),
            envelope: String::new(),
        };
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpTransport::new().post_soap(&request, &options())
        })
        .await
        .unwrap();

        let fault = result.unwrap_err();
        assert!(fault.message.contains("error"));
    }
}
