//! Module for JSON RPC types and transports.

use futures_util::future::BoxFuture;
use reqwest::Url;
use serde::{
    de::{self, DeserializeOwned},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::{Number, Value};
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

/// A channel able to carry JSON RPC requests to something that answers them,
/// be it a remote node or a wallet provider.
pub trait Transport: Send + Sync {
    /// Sends a single request and waits for its response.
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>>;
}

/// JSON RPC client over HTTP.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    /// Creates a new client for the given URL.
    pub fn new(url: Url) -> Result<Self, InvalidScheme> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidScheme(Some(other.to_owned()))),
        }

        Ok(Self {
            inner: reqwest::Client::new(),
            url,
        })
    }

    /// Returns the URL of the remote endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Executes a JSON RPC request.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        self.post(request).await
    }

    /// Perform HTTP POST for the specified JSON data and parse JSON output.
    async fn post<T, U>(&self, data: T) -> Result<U, ClientError>
    where
        T: Serialize,
        U: DeserializeOwned,
    {
        let bytes = self
            .inner
            .post(self.url.clone())
            .json(&data)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let result = serde_json::from_slice(&bytes)?;

        Ok(result)
    }
}

impl Transport for Client {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(self.execute(request))
    }
}

/// Invalid URL scheme.
#[derive(Debug)]
pub struct InvalidScheme(pub Option<String>);

impl Display for InvalidScheme {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.0 {
            Some(s) => write!(f, "invalid scheme {s}"),
            None => f.write_str("missing scheme"),
        }
    }
}

impl std::error::Error for InvalidScheme {}

/// JSON RPC client error.
#[derive(Debug)]
pub enum ClientError {
    /// An error occured while performing an HTTP request.
    Http(reqwest::Error),

    /// An error occured serializing or deserializing JSON RPC data.
    Json(serde_json::Error),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "HTTP error: {err}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// JSON RPC version.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum JsonRpc {
    #[serde(rename = "2.0")]
    V2,
}

/// JSON RPC message identifier.
///
/// From the JSON-RPC 2.0 specification:
/// > An identifier established by the Client that MUST contain a String,
/// > Number, or NULL value if included. If it is not included it is assumed to
/// > be a notification. The value SHOULD normally not be Null and Numbers
/// > SHOULD NOT contain fractional parts
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(Number),
    Null,
}

/// JSON RPC params. Ethereum methods only take by-position parameters.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Params {
    Array(Vec<Value>),
}

/// JSON RPC request.
#[derive(Debug, Deserialize, Serialize)]
pub struct Request {
    pub jsonrpc: JsonRpc,
    pub method: String,
    pub params: Option<Params>,
    pub id: Id,
}

/// JSON RPC response.
#[derive(Debug)]
pub struct Response {
    pub jsonrpc: JsonRpc,
    pub result: Result<Value, Error>,
    pub id: Id,
}

impl Response {
    /// Creates a response answering the specified request.
    pub fn to(request: &Request, result: Result<Value, Error>) -> Self {
        Self {
            jsonrpc: JsonRpc::V2,
            result,
            id: request.id.clone(),
        }
    }
}

/// Helper type for generating serialization implemtation for `Response`.
#[derive(Serialize)]
struct Res<'a> {
    jsonrpc: JsonRpc,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Cow<'a, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Cow<'a, Error>>,
    id: Cow<'a, Id>,
}

/// Helper type for deserializing `Response`.
///
/// A `null` result is a valid success value (for example a pending
/// transaction receipt), so presence is tracked separately from the value.
#[derive(Deserialize)]
struct ResOwned {
    jsonrpc: JsonRpc,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Error>,
    id: Id,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (result, error) = match &self.result {
            Ok(result) => (Some(Cow::Borrowed(result)), None),
            Err(error) => (None, Some(Cow::Borrowed(error))),
        };
        let res = Res {
            jsonrpc: self.jsonrpc,
            result,
            error,
            id: Cow::Borrowed(&self.id),
        };
        res.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let res = ResOwned::deserialize(deserializer)?;
        let result = match (res.result, res.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error),
            (Some(_), Some(_)) => return Err(de::Error::custom("both result and error specified")),
            (None, None) => return Err(de::Error::custom("missing result or error")),
        };
        Ok(Response {
            jsonrpc: res.jsonrpc,
            result,
            id: res.id,
        })
    }
}

/// JSON RPC error.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Error {
    /// EIP-1193 code for a request the user declined.
    pub const USER_REJECTED: i64 = 4001;

    /// Creates an error indicating the method does not exist.
    pub fn method_not_found() -> Error {
        Self {
            code: -32601,
            message: "Method not found".to_owned(),
            data: None,
        }
    }

    /// Creates an error indicating parameters were invalid.
    pub fn invalid_params() -> Error {
        Self {
            code: -32602,
            message: "Invalid params".to_owned(),
            data: None,
        }
    }

    /// Creates an error indicating the user rejected the request.
    pub fn user_rejected() -> Error {
        Self {
            code: Self::USER_REJECTED,
            message: "User rejected the request".to_owned(),
            data: None,
        }
    }

    /// Returns true if the error signals that the user declined the request.
    pub fn is_user_rejected(&self) -> bool {
        self.code == Self::USER_REJECTED
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}
