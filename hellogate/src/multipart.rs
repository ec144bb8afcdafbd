//! Symmetric `multipart/form-data` codec for hello requests.
//!
//! A body carries exactly one JSON field named `object` (title, description, int_value) followed by
//! zero or more file fields named `attachment`, each holding the raw bytes of one attachment with
//! its original file name. The client encodes with [`encode`]; the HTTP handler decodes with
//! [`decode`].
//!
//! File names travel as quoted strings with `\\` and `"` backslash-escaped, and are unescaped on
//! decode, so any name without a line break survives a round trip unchanged. A name containing CR
//! or LF cannot be carried in a part header and is rejected at encode time.
//!
//! Decoding is lenient in two documented ways:
//! - a body without an `object` field yields zero-valued object fields rather than an error;
//! - a file field is accepted with whatever bytes precede the next boundary, there is no declared
//!   size to check it against.

use std::convert::Infallible;
use std::io::Write;

use axum::http::header::CONTENT_DISPOSITION;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::types::{Attachment, HelloRequest, ObjectPart};

pub const OBJECT_FIELD: &str = "object";
pub const ATTACHMENT_FIELD: &str = "attachment";

/// A fully buffered, closed multipart body.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub body: Bytes,
    pub boundary: String,
    /// `multipart/form-data; boundary=...`, only valid for this body
    pub content_type: String,
}

/// Everything [`decode`] recovered from a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedForm {
    pub object: ObjectPart,
    pub attachments: Vec<Attachment>,
}

impl DecodedForm {
    pub fn into_request(self) -> HelloRequest {
        HelloRequest {
            title: self.object.title,
            description: self.object.description,
            int_value: self.object.int_value,
            attachments: self.attachments,
        }
    }
}

/// Encode the object part first, then one file part per attachment in input order.
pub fn encode(request: &HelloRequest) -> Result<EncodedBody> {
    let boundary = Uuid::new_v4().simple().to_string();
    let mut writer = PartWriter::new(&boundary);

    let object = serde_json::to_vec(&request.object_part()).map_err(|e| Error::encoding("object part", e))?;
    writer
        .write_part(
            &[
                ("Content-Disposition", format!(r#"form-data; name="{OBJECT_FIELD}""#)),
                ("Content-Type", "application/json".to_string()),
            ],
            &object,
        )
        .map_err(|e| Error::encoding("object part", e))?;

    for attachment in &request.attachments {
        if attachment.file_name.contains(['\r', '\n']) {
            return Err(Error::encoding(
                "attachment part",
                format!("file name {:?} contains a line break", attachment.file_name),
            ));
        }

        writer
            .write_part(
                &[
                    (
                        "Content-Disposition",
                        format!(
                            r#"form-data; name="{ATTACHMENT_FIELD}"; filename="{}""#,
                            escape_quoted(&attachment.file_name)
                        ),
                    ),
                    ("Content-Type", "application/octet-stream".to_string()),
                ],
                &attachment.data,
            )
            .map_err(|e| Error::encoding("attachment part", e))?;
    }

    // The closing delimiter must be written before the content type is handed out
    let body = writer.finish().map_err(|e| Error::encoding("closing multipart body", e))?;
    let content_type = form_data_content_type(&boundary);

    Ok(EncodedBody {
        body: Bytes::from(body),
        boundary,
        content_type,
    })
}

/// Parse a body produced by [`encode`] (or any conforming form-data writer).
pub async fn decode(body: Bytes, boundary: &str) -> Result<DecodedForm> {
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut object: Option<ObjectPart> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::decoding("multipart body", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            OBJECT_FIELD => {
                let raw = field.bytes().await.map_err(|e| Error::decoding("object part", e))?;
                // Only the first object is processed
                if object.is_none() {
                    object = Some(serde_json::from_slice(&raw).map_err(|e| Error::decoding("object part", e))?);
                }
            }
            ATTACHMENT_FIELD => {
                let file_name = field
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(|value| disposition_file_name(value.as_bytes()))
                    .unwrap_or_default();
                let data = field.bytes().await.map_err(|e| Error::decoding("attachment part", e))?;

                tracing::debug!(file_name = %file_name, size = data.len(), "Decoded attachment part");

                attachments.push(Attachment {
                    file_name,
                    data: data.to_vec(),
                });
            }
            _ => {
                tracing::debug!(field = %field_name, "Ignoring unknown multipart field");
            }
        }
    }

    if object.is_none() {
        tracing::debug!("Multipart body has no object part, using zero values");
    }

    Ok(DecodedForm {
        object: object.unwrap_or_default(),
        attachments,
    })
}

/// Extract the boundary token from a `multipart/form-data` content type header value.
pub fn boundary_from_content_type(content_type: &str) -> Result<String> {
    multer::parse_boundary(content_type).map_err(|e| Error::decoding("content type", e))
}

pub fn form_data_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Quoted-string form of a file name inside `filename="..."`.
fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The `filename` parameter of a `Content-Disposition` value, with quoted-string escapes undone.
///
/// Parsed here rather than through multer, which only undoes `\"` and loses names ending in `\`.
fn disposition_file_name(header: &[u8]) -> Option<String> {
    let header = std::str::from_utf8(header).ok()?;
    // Skip the disposition type (`form-data`)
    let mut rest = &header[header.find(';')? + 1..];

    loop {
        rest = rest.trim_start();
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        let value = rest[eq + 1..].trim_start();

        let (param, remaining) = match value.strip_prefix('"') {
            Some(quoted) => {
                let mut param = String::new();
                let mut end = None;
                let mut chars = quoted.char_indices();
                while let Some((i, c)) = chars.next() {
                    match c {
                        '\\' => param.extend(chars.next().map(|(_, escaped)| escaped)),
                        '"' => {
                            end = Some(i + 1);
                            break;
                        }
                        c => param.push(c),
                    }
                }
                (param, &quoted[end?..])
            }
            None => {
                let end = value.find(';').unwrap_or(value.len());
                (value[..end].trim().to_string(), &value[end..])
            }
        };

        if name.eq_ignore_ascii_case("filename") {
            return Some(param);
        }

        rest = remaining.trim_start().strip_prefix(';')?;
    }
}

struct PartWriter<'a> {
    boundary: &'a str,
    buf: Vec<u8>,
    parts: usize,
}

impl<'a> PartWriter<'a> {
    fn new(boundary: &'a str) -> Self {
        Self {
            boundary,
            buf: Vec::new(),
            parts: 0,
        }
    }

    fn write_part(&mut self, headers: &[(&str, String)], body: &[u8]) -> std::io::Result<()> {
        if self.parts > 0 {
            self.buf.write_all(b"\r\n")?;
        }
        write!(self.buf, "--{}\r\n", self.boundary)?;
        for (name, value) in headers {
            write!(self.buf, "{name}: {value}\r\n")?;
        }
        self.buf.write_all(b"\r\n")?;
        self.buf.write_all(body)?;
        self.parts += 1;
        Ok(())
    }

    fn finish(mut self) -> std::io::Result<Vec<u8>> {
        if self.parts > 0 {
            self.buf.write_all(b"\r\n")?;
        }
        write!(self.buf, "--{}--\r\n", self.boundary)?;
        Ok(self.buf)
    }
}
