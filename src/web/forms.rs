use axum::extract::Multipart;
use registry_core::KeyOptions;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Result, ToolError};

#[derive(Debug, Deserialize, Default)]
pub struct TabQuery {
    pub tab: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TextForm {
    #[serde(default)]
    pub inp: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DownloadForm {
    pub payload_token: Option<String>,
}

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// All parts of a multipart form, split into files and plain fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: HashMap<String, UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ToolError::Upload(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(|e| ToolError::Upload(e.to_string()))?;
                    // browsers send an empty part when no file was chosen
                    if !filename.is_empty() || !bytes.is_empty() {
                        form.files.insert(name, UploadedFile { filename, bytes: bytes.to_vec() });
                    }
                }
                None => {
                    let text = field.text().await.map_err(|e| ToolError::Upload(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Non-blank text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn checked(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Merge toggles from checkboxes; an unchecked box is simply absent.
    pub fn key_options(&self) -> KeyOptions {
        KeyOptions {
            trim: self.checked("trim"),
            lowercase: self.checked("lowercase"),
            remove_punctuation: self.checked("remove_punctuation"),
            collapse_whitespace: self.checked("collapse_whitespace"),
            fix_trailing_float: self.checked("fix_trailing_float"),
            use_base_key_fallback: self.checked("use_base_key_fallback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_options_from_checkboxes() {
        let mut form = UploadForm::default();
        form.fields.insert("trim".to_string(), "on".to_string());
        form.fields.insert("use_base_key_fallback".to_string(), "on".to_string());

        let opts = form.key_options();
        assert!(opts.trim);
        assert!(opts.use_base_key_fallback);
        assert!(!opts.lowercase);
        assert!(!opts.remove_punctuation);
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let mut form = UploadForm::default();
        form.fields.insert("column".to_string(), "  ".to_string());
        form.fields.insert("source_key".to_string(), " Nr ".to_string());
        assert_eq!(form.field("column"), None);
        assert_eq!(form.field("source_key"), Some("Nr"));
    }
}
