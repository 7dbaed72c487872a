// API client module: a blocking HTTP client bound to one session token and
// one transport (direct or proxied). Every JSON call goes through the retry
// loop in `retry`; uploads are sent once because a multipart body cannot be
// replayed.

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ApiSettings;
use crate::proxy::ProxyChoice;
use crate::retry::{retry_with_backoff, Method, RequestError, RetryPolicy, ThreadSleeper};

/// Account fields returned by the status endpoint. `points` stays a
/// `serde_json::Value` since the backend is not consistent about number
/// formatting.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AccountStatus {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub uuid: String,
    /// Wallet address.
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub points: Value,
}

#[derive(Deserialize, Debug)]
struct StatusEnvelope {
    data: StatusData,
}

#[derive(Deserialize, Debug)]
struct StatusData {
    account: AccountStatus,
}

/// Body of the check-in endpoint: `code == 200` means the reward was granted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckInResponse {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
}

/// Body of the file upload endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl UploadResponse {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

/// One image to upload on behalf of an account.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub user_uuid: String,
    pub user_wallet: String,
}

/// Remote operations the account task sequence needs.
pub trait AccountApi {
    fn status(&self) -> Result<AccountStatus, RequestError>;
    fn check_in(&self) -> Result<CheckInResponse, RequestError>;
    fn fetch_image(&self, seed: u32) -> Result<Vec<u8>, RequestError>;
    fn upload(&self, upload: ImageUpload) -> Result<UploadResponse, RequestError>;
    /// Public IP as seen through this client's transport, if it can be found.
    fn public_ip(&self) -> Option<String>;
}

/// Blocking client for one account.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    settings: ApiSettings,
    policy: RetryPolicy,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `token` using the transport described by `proxy`.
    pub fn connect(settings: &ApiSettings, policy: RetryPolicy, token: Option<&str>, proxy: &ProxyChoice) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout())
            // Only the configured proxy list applies, never the environment.
            .no_proxy();
        if let Some(p) = proxy.proxy() {
            log::debug!("Configuring client with proxy {}", proxy.label());
            builder = builder.proxy(p.clone());
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            settings: settings.clone(),
            policy,
            token: token.map(str::to_string),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Common headers; `Content-Type` is left to reqwest for multipart bodies.
    fn headers(&self, multipart: bool) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        if !multipart {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(origin) = &self.settings.origin {
            headers.insert(ORIGIN, header_value(origin)?);
        }
        if let Some(referer) = &self.settings.referer {
            headers.insert(REFERER, header_value(referer)?);
        }
        if let Some(t) = &self.token {
            headers.insert("token", header_value(t)?);
        }
        Ok(headers)
    }

    /// Send a GET or POST with retries. Any other method is rejected before
    /// a single attempt is made.
    pub fn request(&self, method: &str, url: &str, payload: Option<&Value>) -> Result<Response, RequestError> {
        let method: Method = method.parse()?;
        let headers = self.headers(false)?;
        retry_with_backoff(&self.policy, &ThreadSleeper, |attempt| -> Result<Response, RequestError> {
            log::trace!("{:?} {} (attempt {})", method, url, attempt);
            let req: RequestBuilder = match method {
                Method::Get => self.client.get(url),
                Method::Post => self.client.post(url).json(payload.unwrap_or(&Value::Null)),
            };
            let res = req.headers(headers.clone()).send()?;
            Ok(res.error_for_status()?)
        })
    }

    fn request_json<T: for<'de> Deserialize<'de>>(&self, method: &str, url: &str, payload: Option<&Value>) -> Result<T, RequestError> {
        let res = self.request(method, url, payload)?;
        Ok(res.json()?)
    }
}

fn header_value(s: &str) -> Result<HeaderValue, RequestError> {
    HeaderValue::from_str(s).map_err(|e| RequestError::Unexpected(format!("invalid header value: {}", e)))
}

impl AccountApi for ApiClient {
    fn status(&self) -> Result<AccountStatus, RequestError> {
        let envelope: StatusEnvelope = self.request_json("get", &self.settings.status_url, None)?;
        Ok(envelope.data.account)
    }

    fn check_in(&self) -> Result<CheckInResponse, RequestError> {
        let empty = Value::Object(Default::default());
        self.request_json("post", &self.settings.checkin_url, Some(&empty))
    }

    fn fetch_image(&self, seed: u32) -> Result<Vec<u8>, RequestError> {
        let res = self.client.get(self.settings.image_url(seed)).send()?.error_for_status()?;
        Ok(res.bytes()?.to_vec())
    }

    fn upload(&self, upload: ImageUpload) -> Result<UploadResponse, RequestError> {
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.filename.clone())
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("user_uuid", upload.user_uuid)
            .text("output", "json2")
            .text("filename", upload.filename)
            .text("user_wallet", upload.user_wallet);
        let res = self
            .client
            .post(&self.settings.upload_url)
            .headers(self.headers(true)?)
            .multipart(form)
            .send()?;
        let status = res.status();
        let body = res.text()?;
        serde_json::from_str(&body).map_err(|_| RequestError::Unexpected(format!("{} - {}", status, body)))
    }

    fn public_ip(&self) -> Option<String> {
        #[derive(Deserialize)]
        struct Ip {
            ip: String,
        }
        match self.request_json::<Ip>("get", &self.settings.ip_url, None) {
            Ok(ip) => Some(ip.ip),
            Err(e) => {
                log::debug!("public ip lookup failed: {}", e);
                None
            }
        }
    }
}
