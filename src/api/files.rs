//! File uploads.

use std::path::Path;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::file::{FileData, FileInput, FormData};
use crate::model::FileUploadResponse;
use crate::options::RequestOptions;

pub const FILES_PATH: &str = "/api/v1/files/";

/// Purpose sent when the caller gives none.
pub const DEFAULT_PURPOSE: &str = "rag";

pub struct Files<'a> {
    client: &'a Client,
}

impl<'a> Files<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Upload text, bytes or a byte stream.
    ///
    /// ```no_run
    /// # async fn run(client: svector::Client) -> svector::Result<()> {
    /// let uploaded = client
    ///     .files()
    ///     .create("Quarterly numbers...", None, Some("report.txt"), Default::default())
    ///     .await?;
    /// println!("{}", uploaded.file_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(
        &self,
        input: impl Into<FileInput>,
        purpose: Option<&str>,
        filename: Option<&str>,
        options: RequestOptions,
    ) -> Result<FileUploadResponse> {
        let file = self.client.to_file(input, filename, None).await?;
        self.upload(file, purpose, options).await
    }

    /// Upload a local file, named after its file name.
    pub async fn create_from_path(
        &self,
        path: impl AsRef<Path>,
        purpose: Option<&str>,
        options: RequestOptions,
    ) -> Result<FileUploadResponse> {
        if self.client.is_restricted_browser() {
            return Err(ClientError::InvalidRequest(
                "create_from_path() is not available in a browser page".to_string(),
            ));
        }
        let file = FileData::from_path(path).await?;
        self.upload(file, purpose, options).await
    }

    /// Upload an already built file.
    pub async fn upload(
        &self,
        file: FileData,
        purpose: Option<&str>,
        options: RequestOptions,
    ) -> Result<FileUploadResponse> {
        tracing::debug!("uploading {} ({} bytes)", file.name, file.len());
        let form = FormData::new()
            .file("file", file)
            .text("purpose", purpose.unwrap_or(DEFAULT_PURPOSE));
        self.client
            .post(FILES_PATH, Some(form.into()), accept_json(options))
            .await
    }
}

/// Ask for JSON unless the caller chose an `Accept` header.
fn accept_json(mut options: RequestOptions) -> RequestOptions {
    let headers = options.headers.get_or_insert_with(Default::default);
    if !headers.keys().any(|k| k.eq_ignore_ascii_case("accept")) {
        headers.insert("Accept".to_string(), "application/json".to_string());
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_json_respects_caller() {
        let options = accept_json(RequestOptions::new());
        assert_eq!(options.headers.unwrap()["Accept"], "application/json");

        let options = accept_json(RequestOptions::new().with_header("accept", "*/*"));
        let headers = options.headers.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept"], "*/*");
    }
}
