use crate::connector::{Connector, Ticket};
use crate::constants::JIRA_SEARCH_MAX_RESULTS;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;

const ASSIGNED_JQL: &str = "assignee=currentUser() AND statusCategory != Done ORDER BY updated DESC";

/// Jira Cloud connector over the REST v3 API with basic auth.
pub(crate) struct JiraClient {
    base_url: String,
    email: String,
    api_token: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct JiraFields {
    summary: String,
    // Plain text in API v2, an ADF document in v3; only the plain form is
    // useful as a description.
    description: Option<serde_json::Value>,
    status: JiraStatus,
    assignee: Option<JiraAssignee>,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct JiraStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraAssignee {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct JiraSearchResult {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionList {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Deserialize)]
struct JiraTransition {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    to: JiraStatus,
}

impl JiraClient {
    pub(crate) fn new(base_url: &str, email: &str, api_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
            client: Client::new(),
        }
    }

    fn error(&self, detail: impl Into<String>) -> Error {
        Error::Connector {
            name: "jira".to_string(),
            detail: detail.into(),
        }
    }

    fn request(&self, builder: RequestBuilder) -> Result<Response> {
        builder
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|err| self.error(format!("request failed: {err}")))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(format!("{}{path}", self.base_url))
    }

    fn expect_ok(&self, response: Response) -> Result<Response> {
        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(self.error(format!("returned {status}: {body}")));
        }
        Ok(response)
    }

    fn issue_to_ticket(&self, issue: JiraIssue) -> Ticket {
        let url = format!("{}/browse/{}", self.base_url, issue.key);
        Ticket {
            key: issue.key,
            summary: issue.fields.summary,
            description: issue
                .fields
                .description
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: issue.fields.status.name,
            assignee: issue
                .fields
                .assignee
                .map(|assignee| assignee.display_name)
                .unwrap_or_default(),
            url,
            labels: issue.fields.labels,
        }
    }
}

impl Connector for JiraClient {
    fn name(&self) -> &str {
        "jira"
    }

    fn get_ticket(&self, key: &str) -> Result<Ticket> {
        let response = self.request(self.get(&format!("/rest/api/3/issue/{key}")))?;
        let response = self.expect_ok(response)?;
        let issue: JiraIssue = response
            .json()
            .map_err(|err| self.error(format!("failed to decode issue response: {err}")))?;
        Ok(self.issue_to_ticket(issue))
    }

    fn list_assigned(&self) -> Result<Vec<Ticket>> {
        let response = self.request(self.get("/rest/api/3/search").query(&[
            ("jql", ASSIGNED_JQL),
            ("maxResults", &JIRA_SEARCH_MAX_RESULTS.to_string()),
        ]))?;
        let response = self.expect_ok(response)?;
        let result: JiraSearchResult = response
            .json()
            .map_err(|err| self.error(format!("failed to decode search response: {err}")))?;
        Ok(result
            .issues
            .into_iter()
            .map(|issue| self.issue_to_ticket(issue))
            .collect())
    }

    fn transition_ticket(&self, key: &str, status: &str) -> Result<()> {
        let response =
            self.request(self.get(&format!("/rest/api/3/issue/{key}/transitions")))?;
        let response = self.expect_ok(response)?;
        let list: JiraTransitionList = response
            .json()
            .map_err(|err| self.error(format!("failed to decode transitions: {err}")))?;

        let wanted = status.to_lowercase();
        let Some(transition) = list.transitions.iter().find(|transition| {
            transition.to.name.to_lowercase() == wanted || transition.name.to_lowercase() == wanted
        }) else {
            let available: Vec<&str> = list
                .transitions
                .iter()
                .map(|transition| transition.to.name.as_str())
                .collect();
            return Err(self.error(format!(
                "no transition to `{status}` found (available: {})",
                available.join(", ")
            )));
        };

        let body = serde_json::json!({ "transition": { "id": transition.id } });
        let response = self.request(
            self.client
                .post(format!(
                    "{}/rest/api/3/issue/{key}/transitions",
                    self.base_url
                ))
                .json(&body),
        )?;
        if response.status() != StatusCode::NO_CONTENT && response.status() != StatusCode::OK {
            let status_code = response.status();
            let body = response.text().unwrap_or_default();
            return Err(self.error(format!("transition failed with {status_code}: {body}")));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let response = self.request(self.get("/rest/api/3/myself"))?;
        if response.status() != StatusCode::OK {
            return Err(self.error(format!(
                "authentication failed (status {})",
                response.status()
            )));
        }
        Ok(())
    }
}
