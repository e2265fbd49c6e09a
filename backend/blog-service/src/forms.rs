//! Submitted forms and their validation.
//!
//! Validation failures are data, not errors: handlers re-render the bound
//! form with its `FormErrors` and answer 200.

use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentDisposition};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, Result};
use crate::models::Group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Text fields of a multipart body are capped independently of uploads.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Field name -> messages, serialized as a plain JSON object
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                form_errors.add(&field.to_string(), message);
            }
        }
        form_errors
    }
}

#[derive(Debug, Validate)]
struct TextField {
    #[validate(length(min = 1, message = "This field is required."))]
    text: String,
}

/// Trim and require non-empty text.
fn clean_text(raw: &str, errors: &mut FormErrors) -> String {
    let field = TextField {
        text: raw.trim().to_string(),
    };
    if let Err(validation) = field.validate() {
        for (name, messages) in FormErrors::from(validation).0 {
            for message in messages {
                errors.add(&name, message);
            }
        }
    }
    field.text
}

/// A file received in a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Set when the upload was cut off at the size limit
    pub oversized: bool,
}

impl UploadedFile {
    /// Format of the upload, if it fully decodes as a supported image
    pub fn image_format(&self) -> Option<image::ImageFormat> {
        if self.oversized || self.bytes.is_empty() {
            return None;
        }
        let format = image::guess_format(&self.bytes).ok()?;
        match image::load_from_memory_with_format(&self.bytes, format) {
            Ok(_) => Some(format),
            Err(e) => {
                tracing::debug!(filename = %self.filename, error = %e, "Upload does not decode");
                None
            }
        }
    }
}

/// What a valid post submission does to the image
#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(UploadedFile),
}

/// Validated post form
#[derive(Debug, Clone)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostFormInput {
    #[serde(default)]
    pub text: String,
    /// Group id, empty for none
    #[serde(default)]
    pub group: String,
    /// Checkbox; any value clears the current image
    #[serde(default, rename = "image-clear")]
    pub image_clear: Option<String>,
    #[serde(skip)]
    pub image: Option<UploadedFile>,
}

impl PostFormInput {
    /// Read a `multipart/form-data` body. Uploads larger than `max_upload_bytes`
    /// are drained and flagged instead of buffered.
    pub async fn from_multipart(mut payload: Multipart, max_upload_bytes: usize) -> Result<Self> {
        let mut input = PostFormInput::default();

        while let Some(item) = payload.next().await {
            let mut field =
                item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

            let disposition = field
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|value| ContentDisposition::from_raw(value).ok());
            let (name, filename) = match disposition {
                Some(cd) => (
                    cd.get_name().map(str::to_string),
                    cd.get_filename().map(str::to_string),
                ),
                None => (None, None),
            };
            let content_type = field.content_type().map(|mime| mime.to_string());

            let limit = if filename.is_some() {
                max_upload_bytes
            } else {
                MAX_TEXT_FIELD_BYTES
            };
            let mut buffer = BytesMut::new();
            let mut oversized = false;
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
                if buffer.len() + chunk.len() > limit {
                    oversized = true;
                    continue;
                }
                buffer.extend_from_slice(&chunk);
            }

            match name.as_deref() {
                Some("image") => {
                    let filename = filename.unwrap_or_default();
                    // An empty file input submits an empty, unnamed part.
                    if filename.is_empty() && buffer.is_empty() {
                        continue;
                    }
                    input.image = Some(UploadedFile {
                        filename,
                        content_type,
                        bytes: buffer.freeze(),
                        oversized,
                    });
                }
                Some("text") => input.text = String::from_utf8_lossy(&buffer).into_owned(),
                Some("group") => input.group = String::from_utf8_lossy(&buffer).into_owned(),
                Some("image-clear") => {
                    input.image_clear = Some(String::from_utf8_lossy(&buffer).into_owned())
                }
                _ => {}
            }
        }

        Ok(input)
    }

    /// Validate against the groups that currently exist.
    pub fn clean(&self, groups: &[Group]) -> std::result::Result<CleanedPost, FormErrors> {
        let mut errors = FormErrors::default();

        let text = clean_text(&self.text, &mut errors);

        let group_raw = self.group.trim();
        let group_id = if group_raw.is_empty() {
            None
        } else {
            match group_raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            }
        };

        let image = match &self.image {
            Some(upload) => {
                if upload.image_format().is_some() {
                    ImageChange::Replace(upload.clone())
                } else {
                    errors.add("image", INVALID_IMAGE);
                    ImageChange::Keep
                }
            }
            None if self.image_clear.is_some() => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        if errors.is_empty() {
            Ok(CleanedPost {
                text,
                group_id,
                image,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommentFormInput {
    #[serde(default)]
    pub text: String,
}

impl CommentFormInput {
    pub fn clean(&self) -> std::result::Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let text = clean_text(&self.text, &mut errors);
        if errors.is_empty() {
            Ok(text)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupChoice {
    pub id: i64,
    pub title: String,
}

impl From<&Group> for GroupChoice {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            title: group.title.clone(),
        }
    }
}

/// Post form as handed to rendering
#[derive(Debug, Clone, Serialize)]
pub struct PostFormContext {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<String>,
    pub group_choices: Vec<GroupChoice>,
    pub errors: FormErrors,
}

impl PostFormContext {
    pub fn empty(groups: &[Group]) -> Self {
        Self {
            text: String::new(),
            group: None,
            image: None,
            group_choices: groups.iter().map(GroupChoice::from).collect(),
            errors: FormErrors::default(),
        }
    }

    /// Prefilled from stored values
    pub fn initial(
        groups: &[Group],
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Self {
        Self {
            text: text.to_string(),
            group: group_id.map(|id| id.to_string()),
            image: image.map(str::to_string),
            ..Self::empty(groups)
        }
    }

    /// Echo a rejected submission back with its errors
    pub fn bound(
        groups: &[Group],
        input: &PostFormInput,
        image: Option<&str>,
        errors: FormErrors,
    ) -> Self {
        let group = Some(input.group.clone()).filter(|g| !g.is_empty());
        Self {
            text: input.text.clone(),
            group,
            image: image.map(str::to_string),
            errors,
            ..Self::empty(groups)
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CommentFormContext {
    pub text: String,
    pub errors: FormErrors,
}

impl CommentFormContext {
    pub fn bound(input: &CommentFormInput, errors: FormErrors) -> Self {
        Self {
            text: input.text.clone(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn group(id: i64) -> Group {
        Group {
            id,
            title: format!("Group {}", id),
            slug: format!("group-{}", id),
            description: String::new(),
        }
    }

    fn upload(bytes: &'static [u8]) -> UploadedFile {
        UploadedFile {
            filename: "small.gif".into(),
            content_type: Some("image/gif".into()),
            bytes: Bytes::from_static(bytes),
            oversized: false,
        }
    }

    #[test]
    fn blank_text_is_required() {
        let input = PostFormInput {
            text: "   \n".into(),
            ..Default::default()
        };
        let errors = input.clean(&[]).unwrap_err();
        assert_eq!(errors.get("text"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn text_is_trimmed() {
        let input = PostFormInput {
            text: "  hello  ".into(),
            ..Default::default()
        };
        let cleaned = input.clean(&[]).unwrap();
        assert_eq!(cleaned.text, "hello");
        assert_eq!(cleaned.group_id, None);
        assert!(matches!(cleaned.image, ImageChange::Keep));
    }

    #[test]
    fn group_must_exist() {
        let groups = vec![group(1)];
        let ok = PostFormInput {
            text: "t".into(),
            group: "1".into(),
            ..Default::default()
        };
        assert_eq!(ok.clean(&groups).unwrap().group_id, Some(1));

        for bad in ["2", "abc"] {
            let input = PostFormInput {
                text: "t".into(),
                group: bad.into(),
                ..Default::default()
            };
            let errors = input.clean(&groups).unwrap_err();
            assert_eq!(errors.get("group"), Some(&[INVALID_CHOICE.to_string()][..]));
        }
    }

    #[test]
    fn image_must_be_an_image() {
        let valid = PostFormInput {
            text: "t".into(),
            image: Some(upload(SMALL_GIF)),
            ..Default::default()
        };
        assert!(matches!(
            valid.clean(&[]).unwrap().image,
            ImageChange::Replace(_)
        ));

        let invalid = PostFormInput {
            text: "t".into(),
            image: Some(upload(b"definitely not an image")),
            ..Default::default()
        };
        let errors = invalid.clean(&[]).unwrap_err();
        assert_eq!(errors.get("image"), Some(&[INVALID_IMAGE.to_string()][..]));
    }

    #[test]
    fn image_signature_alone_is_not_enough() {
        let file = upload(b"GIF89a garbage");
        assert_eq!(file.image_format(), None);

        let truncated = upload(&SMALL_GIF[..20]);
        assert_eq!(truncated.image_format(), None);

        let input = PostFormInput {
            text: "t".into(),
            image: Some(file),
            ..Default::default()
        };
        let errors = input.clean(&[]).unwrap_err();
        assert_eq!(errors.get("image"), Some(&[INVALID_IMAGE.to_string()][..]));
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let mut file = upload(SMALL_GIF);
        file.oversized = true;
        let input = PostFormInput {
            text: "t".into(),
            image: Some(file),
            ..Default::default()
        };
        assert!(input.clean(&[]).unwrap_err().get("image").is_some());
    }

    #[test]
    fn clear_checkbox_clears_image() {
        let input = PostFormInput {
            text: "t".into(),
            image_clear: Some("on".into()),
            ..Default::default()
        };
        assert!(matches!(input.clean(&[]).unwrap().image, ImageChange::Clear));
    }

    #[test]
    fn comment_text_required() {
        let empty = CommentFormInput { text: " ".into() };
        assert!(empty.clean().unwrap_err().get("text").is_some());

        let ok = CommentFormInput {
            text: " nice post ".into(),
        };
        assert_eq!(ok.clean().unwrap(), "nice post");
    }

    #[test]
    fn errors_serialize_as_object() {
        let mut errors = FormErrors::default();
        errors.add("text", REQUIRED);
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value, serde_json::json!({ "text": [REQUIRED] }));
    }
}
