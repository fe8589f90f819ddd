use crate::error::{MusicCastError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// Root of the Yamaha Extended Control API
pub const ROOT_PATH: &str = "/YamahaExtendedControl/v2";

/// Application name announced when subscribing to push events
pub const APP_NAME: &str = "MusicCast/2";

/// Header naming the subscriber of push events
pub const HEADER_APP_NAME: &str = "X-AppName";
/// Header carrying the UDP port push events are sent to
pub const HEADER_APP_PORT: &str = "X-AppPort";

const PROPERTY_DATA: &str = "data";
const PROPERTY_RESPONSE_CODE: &str = "response_code";

/// HTTP method used for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A single request against the receiver's control API
///
/// The method is derived from the body: requests without body parameters
/// are sent as GET, requests with body parameters as POST with a JSON body.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Map<String, Value>,
}

impl Request {
    /// Create a request for an absolute path such as `/YamahaExtendedControl/v2/main/getStatus`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a request for a path relative to [`ROOT_PATH`]
    pub fn api(suffix: &str) -> Self {
        Self::new(format!("{}{}", ROOT_PATH, suffix))
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a request header
    pub fn with_header(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((key.into(), value.to_string()));
        self
    }

    /// Add a JSON body parameter; turns the request into a POST
    pub fn with_body(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// The HTTP method this request will be sent with
    pub fn method(&self) -> Method {
        if self.body.is_empty() {
            Method::Get
        } else {
            Method::Post
        }
    }
}

/// Vendor response codes other than success
///
/// ```text
/// 0   Successful request
/// 1   Initializing
/// 2   Internal Error
/// 3   Invalid Request (a method did not exist, a method wasn't appropriate etc.)
/// 4   Invalid Parameter (out of range, invalid characters etc.)
/// 5   Guarded (unable to setup in current status etc.)
/// 6   Time Out
/// 99  Firmware Updating
/// 100 Access Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Initializing,
    InternalError,
    InvalidRequest,
    InvalidParameter,
    Guarded,
    Timeout,
    FirmwareUpdating,
    AccessError,
    Unknown(i64),
}

impl ResponseCode {
    /// Map a raw code; `None` means success
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::Initializing),
            2 => Some(Self::InternalError),
            3 => Some(Self::InvalidRequest),
            4 => Some(Self::InvalidParameter),
            5 => Some(Self::Guarded),
            6 => Some(Self::Timeout),
            99 => Some(Self::FirmwareUpdating),
            100 => Some(Self::AccessError),
            other => Some(Self::Unknown(other)),
        }
    }

    /// The raw numeric code
    pub fn code(&self) -> i64 {
        match self {
            Self::Initializing => 1,
            Self::InternalError => 2,
            Self::InvalidRequest => 3,
            Self::InvalidParameter => 4,
            Self::Guarded => 5,
            Self::Timeout => 6,
            Self::FirmwareUpdating => 99,
            Self::AccessError => 100,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether trying again on the next poll is expected to succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::Guarded | Self::Timeout | Self::FirmwareUpdating
        )
    }

    /// Human readable name of the code
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::InternalError => "Internal Error",
            Self::InvalidRequest => {
                "Invalid Request (a method did not exist, a method wasn't appropriate etc.)"
            }
            Self::InvalidParameter => "Invalid Parameter (out of range, invalid characters etc.)",
            Self::Guarded => "Guarded (unable to setup in current status etc.)",
            Self::Timeout => "Timeout",
            Self::FirmwareUpdating => "Firmware Updating",
            Self::AccessError => "Access Error",
            Self::Unknown(_) => "Unknown MusicCast response code",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Decode a response body into `T`
///
/// Bodies with a `data` property are unwrapped and decoded without looking at
/// a response code (list endpoints don't carry one). Any other body must be a
/// flat object with a `response_code`, which is checked before decoding.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(mut object) = value else {
        return Err(MusicCastError::InvalidResponse(
            "Response body is not a JSON object".to_string(),
        ));
    };

    if let Some(data) = object.remove(PROPERTY_DATA) {
        tracing::trace!("Unwrapping data envelope");
        return Ok(serde_json::from_value(data)?);
    }

    let code = object
        .get(PROPERTY_RESPONSE_CODE)
        .and_then(Value::as_i64)
        .ok_or_else(|| MusicCastError::InvalidResponse("Missing response_code".to_string()))?;

    if let Some(code) = ResponseCode::from_code(code) {
        return Err(MusicCastError::DeviceRejected { code });
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}
