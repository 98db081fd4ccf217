//! File construction for multipart uploads.
//!
//! Uploads accept text, raw bytes, byte streams or local paths. Everything is
//! buffered into a [`FileData`] before it is attached to a [`FormData`], so a
//! form can be re-sent on retry.

use std::path::Path;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::{ClientError, Result};

/// A boxed stream of byte chunks, as produced by readers and response bodies.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Content accepted by [`FileBuilder::to_file`].
pub enum FileInput {
    Text(String),
    Bytes(Bytes),
    Stream(ByteStream),
}

impl From<String> for FileInput {
    fn from(value: String) -> Self {
        FileInput::Text(value)
    }
}

impl From<&str> for FileInput {
    fn from(value: &str) -> Self {
        FileInput::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(value: Vec<u8>) -> Self {
        FileInput::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for FileInput {
    fn from(value: &[u8]) -> Self {
        FileInput::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for FileInput {
    fn from(value: Bytes) -> Self {
        FileInput::Bytes(value)
    }
}

impl From<ByteStream> for FileInput {
    fn from(value: ByteStream) -> Self {
        FileInput::Stream(value)
    }
}

/// An in-memory file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl FileData {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a local file. The file name becomes the upload name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self::new(name, "application/octet-stream", data))
    }
}

/// Builds [`FileData`] from the inputs a runtime supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBuilder {
    accepts_streams: bool,
}

impl Default for FileBuilder {
    fn default() -> Self {
        Self::full()
    }
}

impl FileBuilder {
    /// Accepts text, bytes and streams.
    pub const fn full() -> Self {
        Self { accepts_streams: true }
    }

    /// Accepts text and bytes only.
    pub const fn buffered() -> Self {
        Self { accepts_streams: false }
    }

    pub fn accepts_streams(&self) -> bool {
        self.accepts_streams
    }

    /// Turn `input` into a named file.
    ///
    /// Text defaults to `file.txt` / `text/plain`; binary input defaults to
    /// `file` / `application/octet-stream`. Streams are drained completely.
    pub async fn to_file(
        &self,
        input: impl Into<FileInput>,
        filename: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<FileData> {
        match input.into() {
            FileInput::Text(text) => Ok(FileData::new(
                filename.unwrap_or("file.txt"),
                mime_type.unwrap_or("text/plain"),
                text,
            )),
            FileInput::Bytes(bytes) => Ok(FileData::new(
                filename.unwrap_or("file"),
                mime_type.unwrap_or("application/octet-stream"),
                bytes,
            )),
            FileInput::Stream(_) if !self.accepts_streams => Err(ClientError::InvalidRequest(
                "Unsupported file input: this runtime only accepts text or byte buffers".to_string(),
            )),
            FileInput::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(FileData::new(
                    filename.unwrap_or("file"),
                    mime_type.unwrap_or("application/octet-stream"),
                    buf.freeze(),
                ))
            }
        }
    }
}

/// Convert input into a file using the full builder.
pub async fn to_file(
    input: impl Into<FileInput>,
    filename: Option<&str>,
    mime_type: Option<&str>,
) -> Result<FileData> {
    FileBuilder::full().to_file(input, filename, mime_type).await
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FileData),
}

/// An ordered, cloneable multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FileData) -> Self {
        self.fields.push((name.into(), FormValue::File(file)));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Check every file part's MIME type without copying any data.
    pub fn validate(&self) -> Result<()> {
        for (_, value) in &self.fields {
            if let FormValue::File(file) = value {
                with_mime(reqwest::multipart::Part::bytes(Vec::new()), file)?;
            }
        }
        Ok(())
    }

    /// Build a reqwest multipart form for a single send.
    pub fn to_multipart(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File(file) => {
                    let part = reqwest::multipart::Part::bytes(file.data.to_vec()).file_name(file.name.clone());
                    form.part(name.clone(), with_mime(part, file)?)
                }
            };
        }
        Ok(form)
    }
}

fn with_mime(part: reqwest::multipart::Part, file: &FileData) -> Result<reqwest::multipart::Part> {
    part.mime_str(&file.mime_type).map_err(|e| {
        ClientError::InvalidRequest(format!("Invalid MIME type {:?} for {}: {e}", file.mime_type, file.name))
    })
}
