//! Thin typed wrappers over the Google Tasks REST API.

use serde::{Deserialize, Serialize};

use crate::{AuthorizedClient, Error};

const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// RFC 3339 due timestamp, as the API reports and accepts it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
}

impl Task {
    /// A fresh, not-yet-completed task.
    pub fn needs_action(title: impl Into<String>, due: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            due,
            status: Some("needsAction".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default)]
    items: Vec<T>,
}

/// Google Tasks client signing requests with the authenticated client's token.
pub struct TasksClient {
    auth: AuthorizedClient,
    http: reqwest::Client,
    base_url: String,
}

impl TasksClient {
    pub fn new(auth: AuthorizedClient) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            base_url: TASKS_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn list_task_lists(&mut self) -> Result<Vec<TaskList>, Error> {
        let url = format!("{}/users/@me/lists", self.base_url);
        let response: ListResponse<TaskList> = self.get(&url).await?;
        Ok(response.items)
    }

    pub async fn list_tasks(&mut self, list_id: &str) -> Result<Vec<Task>, Error> {
        let url = format!("{}/lists/{list_id}/tasks", self.base_url);
        let response: ListResponse<Task> = self.get(&url).await?;
        Ok(response.items)
    }

    pub async fn insert_task(&mut self, list_id: &str, task: &Task) -> Result<Task, Error> {
        let url = format!("{}/lists/{list_id}/tasks", self.base_url);
        let token = self.auth.bearer_token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(task)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&mut self, url: &str) -> Result<T, Error> {
        let token = self.auth.bearer_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| Error::InvalidResponse(err.to_string()))
}
