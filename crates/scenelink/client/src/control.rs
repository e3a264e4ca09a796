//! HTTP client for the control side of the broker

use crate::error::{ClientError, ClientResult};
use crate::events::EventStream;
use reqwest::Client;
use scenelink_protocol::{Message, Operation, Reply};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Broker health response
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerHealth {
    pub status: String,
    pub version: String,
    pub uptime: String,
    #[serde(default)]
    pub subscribers: usize,
    #[serde(default)]
    pub channels: usize,
}

/// Acknowledgement of a fire-and-forget broadcast
#[derive(Debug, Clone, Deserialize)]
pub struct ActionAck {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub subscribers: usize,
}

/// One raw viewer reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub client_id: String,
    pub output: Value,
}

/// Raw result of `POST /run`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub message: String,
    pub responses: Vec<RunResponse>,
    #[serde(default)]
    pub failed_clients: usize,
    #[serde(default)]
    pub missing_clients: Vec<String>,
}

impl RunReport {
    /// Decode every output as a dispatcher reply
    pub fn decode(self) -> ClientResult<Execution> {
        let replies = self
            .responses
            .into_iter()
            .map(|response| -> ClientResult<ViewerReply> {
                let reply = Reply::from_value(response.output)?;
                Ok(ViewerReply {
                    client_id: response.client_id,
                    result: reply
                        .into_result()
                        .map(Message::into_operation)
                        .map_err(|e| e.error),
                })
            })
            .collect::<ClientResult<Vec<_>>>()?;

        Ok(Execution {
            success: self.success,
            message: self.message,
            replies,
            failed_clients: self.failed_clients,
            missing_clients: self.missing_clients,
        })
    }
}

/// One viewer's typed answer: the executed operation, or its error message
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerReply {
    pub client_id: String,
    pub result: Result<Operation, String>,
}

/// Typed result of running one operation on every viewer
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub success: bool,
    pub message: String,
    pub replies: Vec<ViewerReply>,
    pub failed_clients: usize,
    pub missing_clients: Vec<String>,
}

/// HTTP client for the broker's control routes
pub struct ControlClient {
    client: Client,
    base_url: Url,
}

impl ControlClient {
    /// Create a client for the broker at `endpoint`
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        let mut base_url = Url::parse(endpoint)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check broker health
    pub async fn health(&self) -> ClientResult<BrokerHealth> {
        self.get("health").await
    }

    /// Fire-and-forget broadcast to every publish subscriber
    pub async fn action(&self, message: &Message) -> ClientResult<ActionAck> {
        self.post("action", &message.to_value()?).await
    }

    /// Broadcast-and-collect
    pub async fn run(&self, message: &Message) -> ClientResult<RunReport> {
        self.post("run", &message.to_value()?).await
    }

    /// Run an operation on every viewer and decode the replies
    pub async fn execute(&self, operation: impl Into<Operation>) -> ClientResult<Execution> {
        self.run(&Message::new(operation)).await?.decode()
    }

    /// Run an operation and keep the first viewer's answer
    pub async fn execute_one(&self, operation: impl Into<Operation>) -> ClientResult<Operation> {
        let execution = self.execute(operation).await?;
        match execution.replies.into_iter().next() {
            Some(reply) => reply.result.map_err(ClientError::Remote),
            None => Err(ClientError::NoResponse(execution.message)),
        }
    }

    /// Subscribe to the publish leg
    pub async fn events(&self) -> ClientResult<EventStream> {
        let response = self
            .client
            .get(self.base_url.join("events")?)
            .send()
            .await?
            .error_for_status()?;
        Ok(EventStream::new(response))
    }

    // ========== Internal HTTP helpers ==========

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.client.post(url).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
