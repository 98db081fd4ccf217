//! Knowledge collections used for retrieval.

use crate::client::{Client, Payload};
use crate::error::Result;
use crate::model::{KnowledgeAddFileRequest, KnowledgeAddFileResponse};
use crate::options::RequestOptions;

pub struct Knowledge<'a> {
    client: &'a Client,
}

impl<'a> Knowledge<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Attach an uploaded file to a knowledge collection.
    pub async fn add_file(
        &self,
        knowledge_id: &str,
        file_id: &str,
        options: RequestOptions,
    ) -> Result<KnowledgeAddFileResponse> {
        let body = KnowledgeAddFileRequest {
            file_id: file_id.to_string(),
        };
        self.client
            .post(&add_file_path(knowledge_id), Some(Payload::json(&body)?), options)
            .await
    }
}

fn add_file_path(knowledge_id: &str) -> String {
    format!("/api/v1/knowledge/{knowledge_id}/file/add")
}
