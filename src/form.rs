use std::{collections::HashMap, str::FromStr};

use axum::{body::Bytes, extract::Multipart};

use crate::appresult::{AppResult, FieldErrors};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A multipart body gathered into text fields and files by field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    pub async fn collect(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field.bytes().await?;
                    // browsers send an empty part for an untouched file input
                    if bytes.is_empty() && file_name.is_empty() {
                        continue;
                    }
                    form.push_file(&name, UploadedFile { file_name, content_type, bytes });
                }
                None => {
                    let text = field.text().await?;
                    form.push_text(&name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn push_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    pub fn push_file(&mut self, name: &str, file: UploadedFile) {
        self.files.entry(name.to_owned()).or_default().push(file);
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn required_text(&self, name: &str, errors: &mut FieldErrors) -> Option<String> {
        let value = self.text(name).map(str::to_owned);
        if value.is_none() {
            errors.add(name, "Required");
        }
        value
    }

    pub fn required<T: FromStr>(&self, name: &str, errors: &mut FieldErrors) -> Option<T> {
        match self.text(name) {
            None => {
                errors.add(name, "Required");
                None
            }
            Some(raw) => self.parse_raw(name, raw, errors),
        }
    }

    pub fn optional<T: FromStr>(&self, name: &str, errors: &mut FieldErrors) -> Option<T> {
        self.text(name).and_then(|raw| self.parse_raw(name, raw, errors))
    }

    /// Missing means false, as with an unchecked checkbox.
    pub fn flag(&self, name: &str, errors: &mut FieldErrors) -> bool {
        match self.text(name).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false" | "0" | "off" | "no") => false,
            Some("true" | "1" | "on" | "yes") => true,
            Some(_) => {
                errors.add(name, "Must be true or false");
                false
            }
        }
    }

    fn parse_raw<T: FromStr>(&self, name: &str, raw: &str, errors: &mut FieldErrors) -> Option<T> {
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.add(name, format!("Invalid value `{raw}`"));
                None
            }
        }
    }
}
