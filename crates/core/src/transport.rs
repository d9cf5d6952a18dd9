use crate::{ClientError, PdfUpload};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin JSON-over-HTTP adapter for one backend root. Returns raw bodies;
/// interpretation happens in the backend clients.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ClientError::validation(format!(
                "backend url '{base_url}' cannot carry a path"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so opaque identifiers cannot escape their path position.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::validation(format!("backend url '{}' cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json(&self, segments: &[&str]) -> Result<Value, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        read_json(&url, response).await
    }

    /// Like [`Self::get_json`], but a `404` or an empty body means "nothing
    /// here" instead of an error.
    pub async fn get_optional_json(&self, segments: &[&str]) -> Result<Option<Value>, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        match read_json(&url, response).await? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    pub async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "POST json");
        let response = self.client.post(url.clone()).json(body).send().await?;
        read_json(&url, response).await
    }

    pub async fn post_form(&self, segments: &[&str], form: Form) -> Result<Value, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "POST multipart");
        let response = self.client.post(url.clone()).multipart(form).send().await?;
        read_json(&url, response).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<(), ClientError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "DELETE");
        let response = self.client.delete(url.clone()).send().await?;
        ensure_success(&url, &response)
    }
}

pub fn pdf_part(upload: &PdfUpload) -> Result<Part, ClientError> {
    let part = Part::bytes(upload.bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str("application/pdf")?;
    Ok(part)
}

fn ensure_success(url: &Url, response: &Response) -> Result<(), ClientError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ClientError::Transport {
            endpoint: url.path().to_string(),
            status: response.status().as_u16(),
        })
    }
}

/// An empty body decodes to `Value::Null`.
async fn read_json(url: &Url, response: Response) -> Result<Value, ClientError> {
    ensure_success(url, &response)?;
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|error| ClientError::protocol(url.path(), format!("body is not json: {error}")))
}

/// First string value found under any of `keys`.
pub fn field_str<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
}

pub fn required_str<'a>(
    body: &'a Value,
    keys: &[&str],
    endpoint: &str,
) -> Result<&'a str, ClientError> {
    field_str(body, keys)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ClientError::protocol(endpoint, format!("missing field {}", keys.join("/"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, Duration::from_secs(1)).expect("valid base url")
    }

    #[test]
    fn endpoint_keeps_base_path() -> Result<(), ClientError> {
        let url = transport("http://localhost:5000/api").endpoint(&["rag", "status", "Q1"])?;
        assert_eq!(url.as_str(), "http://localhost:5000/api/rag/status/Q1");

        let url = transport("http://localhost:5000/api/").endpoint(&["pdf", "analyze"])?;
        assert_eq!(url.as_str(), "http://localhost:5000/api/pdf/analyze");
        Ok(())
    }

    #[test]
    fn endpoint_encodes_identifier_segment() -> Result<(), ClientError> {
        let url = transport("http://localhost:5001").endpoint(&["documents", "a/b c"])?;
        assert_eq!(url.path(), "/documents/a%2Fb%20c");
        Ok(())
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpTransport::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn field_lookup_accepts_either_casing() {
        let upper = json!({"Result": "<p>ok</p>"});
        let lower = json!({"result": "<p>ok</p>"});
        assert_eq!(field_str(&upper, &["Result", "result"]), Some("<p>ok</p>"));
        assert_eq!(field_str(&lower, &["Result", "result"]), Some("<p>ok</p>"));
    }

    #[test]
    fn required_field_reports_protocol_error() {
        let body = json!({"QueryId": ""});
        let error = required_str(&body, &["QueryId"], "/rag/analyze").unwrap_err();
        assert!(matches!(error, ClientError::Protocol { .. }));
    }
}
