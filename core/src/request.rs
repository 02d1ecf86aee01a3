//! Request descriptor and its encoding.
//!
//! # Design
//! A `Request` is what a caller hands to a client: method, a path relative
//! to the client's base URL (or an absolute URL), query parameters and an
//! optional body. The common helper turns it into an `HttpRequest` with
//! `complete_url` and `Body::encode`.
//!
//! Query values are `serde_json::Value`s so a single parameter can carry a
//! string, a number, a repeated list or a structured filter:
//! - strings go out verbatim, numbers and booleans as their JSON text,
//!   `null` as an empty value;
//! - arrays expand to one `key=value` pair per element;
//! - objects are sent as compact JSON text (Directus filters, for one).

use serde_json::Value;
use url::form_urlencoded;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Ordered query (or form) parameters. Inserting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Flatten into string pairs, expanding arrays into repeated keys.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (key.clone(), scalar(item))));
                }
                other => pairs.push((key.clone(), scalar(other))),
            }
        }
        pairs
    }

    /// `application/x-www-form-urlencoded` text, spaces as `+`.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A file attached to a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content_type: "application/octet-stream".to_string(),
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    None,
    Json(Value),
    Form(Params),
    Multipart {
        fields: Params,
        files: Vec<FilePart>,
    },
}

/// An encoded body with the content type it must be sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Body {
    pub fn encode(&self) -> Result<Option<EncodedBody>, ApiError> {
        let encoded = match self {
            Body::None => return Ok(None),
            Body::Json(value) => EncodedBody {
                content_type: "application/json".to_string(),
                bytes: serde_json::to_vec(value).map_err(ApiError::Encode)?,
            },
            Body::Form(params) => EncodedBody {
                content_type: "application/x-www-form-urlencoded".to_string(),
                bytes: params.encode().into_bytes(),
            },
            Body::Multipart { fields, files } => {
                let boundary = multipart_boundary();
                EncodedBody {
                    content_type: format!("multipart/form-data; boundary={boundary}"),
                    bytes: encode_multipart(&boundary, fields, files),
                }
            }
        };
        Ok(Some(encoded))
    }
}

fn multipart_boundary() -> String {
    format!("rest-tools-{}", Uuid::new_v4().simple())
}

/// A name or filename as a quoted-string value of `Content-Disposition`:
/// `"`, CR and LF are percent-encoded the way browsers submit forms.
fn disposition_value(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn encode_multipart(boundary: &str, fields: &Params, files: &[FilePart]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields.pairs() {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                disposition_value(&name)
            )
            .as_bytes(),
        );
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    for file in files {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                disposition_value(&file.name),
                disposition_value(&file.filename)
            )
            .as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        out.extend_from_slice(&file.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

/// What a caller asks a client to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    /// Appended verbatim to the client's base URL.
    pub path: String,
    /// Absolute URL; replaces base URL and path when set.
    pub url: Option<String>,
    pub params: Params,
    pub body: Body,
    /// Sent after the client's own headers.
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            url: None,
            params: Params::new(),
            body: Body::None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn form(mut self, fields: Params) -> Self {
        self.body = Body::Form(fields);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == HttpMethod::Get
    }

    /// Complete URL of this request against `base_url`.
    pub fn complete_url(&self, base_url: &str) -> String {
        complete_url(base_url, &self.path, &self.params, self.url.as_deref())
    }
}

/// `url` if given, otherwise `base_url + path`, followed by the encoded
/// query when `params` is non-empty.
pub fn complete_url(base_url: &str, path: &str, params: &Params, url: Option<&str>) -> String {
    let mut complete = match url {
        Some(url) => url.to_string(),
        None => format!("{base_url}{path}"),
    };
    if !params.is_empty() {
        complete.push('?');
        complete.push_str(&params.encode());
    }
    complete
}
