//! services/api/src/web/form.rs
//!
//! Reads the multipart activity form: the provider choice, the caller's key,
//! the session parameters and any reference PDFs.

use activity_planner_core::{GenerationRequest, PdfTextExtractor, SessionType};
use axum::extract::Multipart;
use bytes::Bytes;
use futures::future::join_all;
use secrecy::SecretString;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

use super::response::HttpError;
use crate::config::Config;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// One uploaded reference document, already checked for type and size.
pub struct UploadedPdf {
    pub file_name: String,
    pub data: Bytes,
}

/// A fully read activity form.
pub struct GenerateForm {
    pub provider: String,
    pub api_key: SecretString,
    pub request: GenerationRequest,
    pub pdfs: Vec<UploadedPdf>,
}

impl GenerateForm {
    /// Consumes the multipart stream, enforcing the upload limits from `config`.
    pub async fn from_multipart(
        multipart: &mut Multipart,
        config: &Config,
    ) -> Result<Self, HttpError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut pdfs = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| HttpError::bad_request(format!("Failed to read multipart data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if pdfs.len() >= config.max_pdf_files {
                    return Err(HttpError::bad_request(format!(
                        "At most {} PDF files can be uploaded",
                        config.max_pdf_files
                    )));
                }
                if field.content_type() != Some(PDF_CONTENT_TYPE) {
                    return Err(HttpError::bad_request(format!(
                        "File '{}' is not a PDF",
                        file_name
                    )));
                }
                let data = field.bytes().await.map_err(|e| {
                    HttpError::bad_request(format!("Failed to read file '{}': {}", file_name, e))
                })?;
                if data.len() > config.max_pdf_bytes {
                    return Err(HttpError::bad_request(format!(
                        "File '{}' exceeds the {} MB limit",
                        file_name,
                        config.max_pdf_bytes / (1024 * 1024)
                    )));
                }
                pdfs.push(UploadedPdf { file_name, data });
                continue;
            }

            let value = field.text().await.map_err(|e| {
                HttpError::bad_request(format!("Failed to read field '{}': {}", name, e))
            })?;
            fields.insert(name, value);
        }

        Self::from_fields(fields, pdfs)
    }

    fn from_fields(
        mut fields: HashMap<String, String>,
        pdfs: Vec<UploadedPdf>,
    ) -> Result<Self, HttpError> {
        let provider = take_non_empty(&mut fields, "aiProvider")
            .or_else(|| take_non_empty(&mut fields, "provider"));
        let api_key = take_non_empty(&mut fields, "apiKey");
        let (provider, api_key) = match (provider, api_key) {
            (Some(provider), Some(api_key)) => (provider, api_key),
            _ => {
                return Err(HttpError::bad_request(
                    "An AI provider and an API key are required",
                ))
            }
        };

        let session_type = take_non_empty(&mut fields, "sessionType")
            .ok_or_else(|| HttpError::bad_request("sessionType is required"))?;
        let request = GenerationRequest {
            patient_age: parse_number(&mut fields, "patientAge")?,
            patient_description: fields.remove("patientDescription").unwrap_or_default(),
            specific_objective: fields.remove("specificObjective").unwrap_or_default(),
            duration: parse_number(&mut fields, "duration")?,
            session_type: SessionType::from_str(&session_type)?,
            is_pediatric: parse_flag(fields.remove("isPediatric").as_deref())?,
            custom_context: take_non_empty(&mut fields, "customContext"),
            pdf_contents: None,
        };

        Ok(Self {
            provider,
            api_key: SecretString::from(api_key),
            request,
            pdfs,
        })
    }
}

fn take_non_empty(fields: &mut HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .remove(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(fields: &mut HashMap<String, String>, name: &str) -> Result<u32, HttpError> {
    let raw = take_non_empty(fields, name)
        .ok_or_else(|| HttpError::bad_request(format!("{} is required", name)))?;
    raw.parse::<u32>()
        .map_err(|_| HttpError::bad_request(format!("{} must be a positive integer", name)))
}

/// HTML checkboxes send `on`; API clients tend to send `true`.
fn parse_flag(raw: Option<&str>) -> Result<bool, HttpError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("off") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("on") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(HttpError::bad_request(format!(
            "isPediatric must be a boolean (got '{}')",
            other
        ))),
    }
}

/// Extracts every upload concurrently. A document that fails is logged and
/// left out; the texts of the others are returned in upload order.
pub async fn extract_pdf_texts(
    extractor: &dyn PdfTextExtractor,
    pdfs: &[UploadedPdf],
) -> Vec<String> {
    let results = join_all(pdfs.iter().map(|pdf| async move {
        (pdf, extractor.extract_text(&pdf.data).await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(pdf, result)| match result {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(file = %pdf.file_name, error = %e, "Skipping PDF that could not be processed");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_planner_core::{PortError, PortResult};
    use async_trait::async_trait;
    use axum::http::StatusCode;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> HashMap<String, String> {
        fields(&[
            ("aiProvider", "gemini"),
            ("apiKey", "AIzaTestKey"),
            ("patientAge", "6"),
            ("patientDescription", "Preschooler with late talking"),
            ("specificObjective", "Two-word combinations"),
            ("duration", "40"),
            ("sessionType", "familiar"),
            ("isPediatric", "on"),
            ("customContext", "  "),
        ])
    }

    #[test]
    fn complete_form_is_read() {
        let form = GenerateForm::from_fields(complete(), Vec::new()).unwrap();
        assert_eq!(form.provider, "gemini");
        assert_eq!(form.request.patient_age, 6);
        assert_eq!(form.request.duration, 40);
        assert_eq!(form.request.session_type, SessionType::Family);
        assert!(form.request.is_pediatric);
        assert_eq!(form.request.custom_context, None);
    }

    #[test]
    fn provider_field_name_is_accepted_too() {
        let mut map = complete();
        map.remove("aiProvider");
        map.insert("provider".to_string(), "groq".to_string());
        assert_eq!(GenerateForm::from_fields(map, Vec::new()).unwrap().provider, "groq");
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut map = complete();
        map.insert("apiKey".to_string(), "   ".to_string());
        let err = GenerateForm::from_fields(map, Vec::new()).err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_numbers_and_flags_are_rejected() {
        let mut map = complete();
        map.insert("duration".to_string(), "-5".to_string());
        assert!(GenerateForm::from_fields(map, Vec::new()).is_err());

        let mut map = complete();
        map.insert("isPediatric".to_string(), "sometimes".to_string());
        assert!(GenerateForm::from_fields(map, Vec::new()).is_err());

        let mut map = complete();
        map.insert("sessionType".to_string(), "couple".to_string());
        assert!(GenerateForm::from_fields(map, Vec::new()).is_err());
    }

    struct PickyExtractor;

    #[async_trait]
    impl PdfTextExtractor for PickyExtractor {
        async fn extract_text(&self, data: &[u8]) -> PortResult<String> {
            if data.starts_with(b"bad") {
                return Err(PortError::InvalidInput("corrupt".to_string()));
            }
            Ok(String::from_utf8_lossy(data).into_owned())
        }
    }

    #[tokio::test]
    async fn failed_documents_are_skipped() {
        let pdfs = ["first", "bad one", "third"]
            .iter()
            .map(|body| UploadedPdf {
                file_name: format!("{body}.pdf"),
                data: Bytes::from(body.to_string()),
            })
            .collect::<Vec<_>>();

        let texts = extract_pdf_texts(&PickyExtractor, &pdfs).await;
        assert_eq!(texts, vec!["first".to_string(), "third".to_string()]);
    }
}
