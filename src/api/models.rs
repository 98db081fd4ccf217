use crate::client::Client;
use crate::error::Result;
use crate::model::ModelListResponse;
use crate::options::RequestOptions;

pub const MODELS_PATH: &str = "/api/models";

pub struct Models<'a> {
    client: &'a Client,
}

impl<'a> Models<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List the model identifiers available to this key.
    pub async fn list(&self, options: RequestOptions) -> Result<ModelListResponse> {
        self.client.get(MODELS_PATH, options).await
    }
}
