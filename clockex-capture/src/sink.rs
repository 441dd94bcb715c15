use async_trait::async_trait;
use clockex_core::RunLabel;
use serde::Deserialize;
use serde_json::Value;

use crate::capability::AudioBlob;
use crate::error::UploadError;

/// What the endpoint reported back on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub saved_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    receipt: UploadReceipt,
}

/// Applies the endpoint response contract: a non-2xx status, a body that is
/// not JSON, or `ok != true` are all failures.
pub fn interpret_response(status: u16, body: &str) -> Result<UploadReceipt, UploadError> {
    let parsed = serde_json::from_str::<UploadResponse>(body).ok();
    if !(200..300).contains(&status) {
        let body = parsed
            .and_then(|r| r.error)
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(UploadError::Status { status, body });
    }
    match parsed {
        None => Err(UploadError::InvalidResponse(body.chars().take(200).collect())),
        Some(response) if !response.ok => Err(UploadError::Rejected(
            response.error.unwrap_or_else(|| "ok is not true".to_string()),
        )),
        Some(response) => Ok(response.receipt),
    }
}

/// Multipart audio upload; the server derives its own filename from these
/// fields using the same convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub blob: AudioBlob,
    pub filename: String,
    pub participant: Option<String>,
    pub set: Option<u32>,
    pub session_id: Option<String>,
    pub run_label: Option<RunLabel>,
}

impl AudioUpload {
    /// Form fields sent next to the `audio` part, in wire order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(p) = &self.participant {
            fields.push(("participant", p.clone()));
        }
        if let Some(set) = self.set {
            fields.push(("set", set.to_string()));
        }
        if let Some(id) = &self.session_id {
            fields.push(("sessionId", id.clone()));
        }
        if let Some(label) = self.run_label {
            fields.push(("runLabel", label.as_str().to_string()));
        }
        fields
    }
}

/// Destination for finished sessions.
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Sends `{filename, payload}` as a JSON body.
    async fn upload_json(&self, filename: &str, payload: &Value) -> Result<UploadReceipt, UploadError>;

    async fn upload_audio(&self, upload: &AudioUpload) -> Result<UploadReceipt, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_response_yields_receipt() {
        let receipt = interpret_response(
            200,
            r#"{"ok":true,"filename":"alice_A_set1_20250101_000000.json","bytes":512,"saved_to":"data/text"}"#,
        )
        .unwrap();
        assert_eq!(receipt.filename.as_deref(), Some("alice_A_set1_20250101_000000.json"));
        assert_eq!(receipt.bytes, Some(512));
    }

    #[test]
    fn ok_false_is_a_failure_even_with_200() {
        let err = interpret_response(200, r#"{"ok":false,"error":"missing set"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(msg) if msg == "missing set"));

        let err = interpret_response(200, r#"{"filename":"x.json"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));
    }

    #[test]
    fn error_status_prefers_server_message() {
        let err = interpret_response(400, r#"{"ok":false,"error":"POST only"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Status { status: 400, body } if body == "POST only"));

        let err = interpret_response(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, UploadError::Status { status: 502, .. }));
    }

    #[test]
    fn non_json_success_is_invalid() {
        let err = interpret_response(200, "saved").unwrap_err();
        assert!(matches!(err, UploadError::InvalidResponse(_)));
    }

    #[test]
    fn audio_fields_skip_missing_values() {
        let upload = AudioUpload {
            blob: AudioBlob {
                bytes: vec![1, 2, 3],
                mime: "audio/webm".into(),
            },
            filename: "alice_A_set1_x.webm".into(),
            participant: Some("alice".into()),
            set: Some(1),
            session_id: None,
            run_label: Some(RunLabel::A),
        };
        assert_eq!(
            upload.fields(),
            vec![
                ("participant", "alice".to_string()),
                ("set", "1".to_string()),
                ("runLabel", "A".to_string()),
            ]
        );
    }
}
