//! Multipart upload of selected files.
//!
//! Every file goes into a repeated `files` field. The backend answers with
//! `{"fileRefs": [{"id": ..., "name": ...}, ...]}`.

use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};

use crate::api::error::UploadError;
use crate::api::types::{AttachmentReference, UploadResponse};
use crate::core::attachments::Attachment;

/// Multipart field shared by every file in a batch.
pub const UPLOAD_FIELD: &str = "files";

pub struct UploadClient {
    client: reqwest::Client,
    url: String,
}

impl UploadClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Uploads one batch in a single POST and returns the issued references in
    /// the order the backend listed them.
    pub async fn upload(
        &self,
        files: &[Attachment],
    ) -> Result<Vec<AttachmentReference>, UploadError> {
        info!("Uploading {} file(s) to {}", files.len(), self.url);

        let form = build_form(files)?;
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        debug!("Upload response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Upload error: {} - {}", status, body);
            return Err(UploadError::Status { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        parse_references(&body)
    }
}

fn build_form(files: &[Attachment]) -> Result<Form, UploadError> {
    files.iter().try_fold(Form::new(), |form, file| {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| UploadError::InvalidFile(format!("{}: {e}", file.name)))?;
        Ok(form.part(UPLOAD_FIELD, part))
    })
}

/// Validates an upload response body.
pub(crate) fn parse_references(body: &str) -> Result<Vec<AttachmentReference>, UploadError> {
    let response: UploadResponse = serde_json::from_str(body).map_err(|e| {
        warn!("Upload response is not valid: {} ({})", e, body);
        UploadError::InvalidResponse(e.to_string())
    })?;

    match response.file_refs {
        Some(refs) => {
            debug!("Backend issued {} reference(s)", refs.len());
            Ok(refs)
        }
        None => {
            warn!("Upload response without fileRefs: {}", body);
            Err(UploadError::InvalidResponse("missing fileRefs".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references_in_order() {
        let body = r#"{"message":"Files uploaded successfully.","fileRefs":[{"id":"b","name":"b.pdf"},{"id":"a","name":"a.pdf"}]}"#;
        let refs = parse_references(body).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "b");
        assert_eq!(refs[1].name, "a.pdf");
    }

    #[test]
    fn test_parse_references_rejects_missing_field() {
        let result = parse_references(r#"{"message":"ok"}"#);
        assert!(matches!(result, Err(UploadError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_references_rejects_non_array() {
        let result = parse_references(r#"{"fileRefs":"nope"}"#);
        assert!(matches!(result, Err(UploadError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_references_rejects_non_json() {
        let result = parse_references("<html>oops</html>");
        assert!(matches!(result, Err(UploadError::InvalidResponse(_))));
    }
}
