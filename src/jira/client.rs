use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::{AuthMode, JiraConfig};
use crate::jira::models::{
    JiraAttachment, JiraComment, JiraCreateMeta, JiraCreatedIssue, JiraField, JiraIssue,
    JiraIssueType, JiraLinkType, JiraLinkTypesResponse, JiraProject, JiraSearchResponse,
    JiraTransition, JiraTransitionsResponse, JiraUser,
};
use crate::jira::{JiraApi, JiraError, JiraResult};

const API_PREFIX: [&str; 3] = ["rest", "api", "2"];

/// Jira REST v2 client backed by reqwest.
///
/// No timeout or retry policy is layered on top of reqwest's defaults.
pub struct JiraClient {
    http: Client,
    base_url: String,
    api_base: Url,
    auth: AuthMode,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> JiraResult<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_base = Url::parse(&config.base_url)
            .map_err(|e| JiraError::InvalidPath(format!("{}: {}", config.base_url, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(JiraError::InvalidPath(config.base_url.clone()));
        }

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_base,
            auth: config.auth.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> &AuthMode {
        &self.auth
    }

    /// REST v2 URL with every caller-supplied segment percent-encoded, so an
    /// issue key like `X-1/../project/P` stays one segment under `issue/`.
    fn api_url(&self, segments: &[&str]) -> JiraResult<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(JiraError::InvalidPath(format!("'{}' is not a valid path segment", bad)));
        }

        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| JiraError::InvalidPath(self.base_url.clone()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("Jira request: {} {}", method, url);
        let builder = self.http.request(method, url).header("Accept", "application/json");
        match &self.auth {
            AuthMode::Basic { email, api_token } => builder.basic_auth(email, Some(api_token)),
            AuthMode::Bearer { token } => builder.bearer_auth(token),
        }
    }

    /// Send and turn non-2xx responses into [`JiraError`]
    async fn send(&self, builder: RequestBuilder) -> JiraResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let error = JiraError::from_status(status.as_u16(), &body, retry_after);
        warn!("Jira request failed: {}", error);
        Err(error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str], query: &[(&str, String)]) -> JiraResult<T> {
        let builder = self.request(Method::GET, self.api_url(path)?).query(query);
        let response = self.send(builder).await?;
        decode(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &[&str], body: &Value) -> JiraResult<T> {
        let builder = self.request(method, self.api_url(path)?).json(body);
        let response = self.send(builder).await?;
        decode(response).await
    }

    async fn send_json_no_content(&self, method: Method, path: &[&str], body: &Value) -> JiraResult<()> {
        let builder = self.request(method, self.api_url(path)?).json(body);
        self.send(builder).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> JiraResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| JiraError::Decode(e.to_string()))
}

#[async_trait]
impl JiraApi for JiraClient {
    async fn fields(&self) -> JiraResult<Vec<JiraField>> {
        self.get_json(&["field"], &[]).await
    }

    async fn get_issue(
        &self,
        key: &str,
        fields: Option<&str>,
        expand: Option<&str>,
    ) -> JiraResult<JiraIssue> {
        let mut query = Vec::new();
        if let Some(fields) = fields {
            query.push(("fields", fields.to_string()));
        }
        if let Some(expand) = expand {
            query.push(("expand", expand.to_string()));
        }
        self.get_json(&["issue", key], &query).await
    }

    async fn create_issue(&self, fields: Map<String, Value>) -> JiraResult<JiraCreatedIssue> {
        self.send_json(Method::POST, &["issue"], &json!({ "fields": fields })).await
    }

    async fn update_issue(&self, key: &str, fields: Map<String, Value>) -> JiraResult<()> {
        self.send_json_no_content(Method::PUT, &["issue", key], &json!({ "fields": fields }))
            .await
    }

    async fn delete_issue(&self, key: &str) -> JiraResult<()> {
        let builder = self.request(Method::DELETE, self.api_url(&["issue", key])?);
        self.send(builder).await?;
        Ok(())
    }

    async fn search_issues(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[&str],
    ) -> JiraResult<Vec<JiraIssue>> {
        let mut query = vec![("jql", jql.to_string()), ("maxResults", max_results.to_string())];
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }
        let response: JiraSearchResponse = self.get_json(&["search"], &query).await?;
        debug!("JQL returned {} of {} issues", response.issues.len(), response.total);
        Ok(response.issues)
    }

    async fn transitions(&self, key: &str) -> JiraResult<Vec<JiraTransition>> {
        let response: JiraTransitionsResponse = self
            .get_json(
                &["issue", key, "transitions"],
                &[("expand", "transitions.fields".to_string())],
            )
            .await?;
        Ok(response.transitions)
    }

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        fields: Option<Map<String, Value>>,
        comment: Option<&str>,
    ) -> JiraResult<()> {
        let mut body = json!({ "transition": { "id": transition_id } });
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            body["fields"] = Value::Object(fields);
        }
        if let Some(comment) = comment {
            body["update"] = json!({ "comment": [{ "add": { "body": comment } }] });
        }
        self.send_json_no_content(Method::POST, &["issue", key, "transitions"], &body)
            .await
    }

    async fn add_comment(&self, key: &str, body: &str) -> JiraResult<JiraComment> {
        self.send_json(Method::POST, &["issue", key, "comment"], &json!({ "body": body }))
            .await
    }

    async fn add_attachment(
        &self,
        key: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> JiraResult<Vec<JiraAttachment>> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part("file", part);

        let builder = self
            .request(Method::POST, self.api_url(&["issue", key, "attachments"])?)
            .header("X-Atlassian-Token", "no-check")
            .multipart(form);
        let response = self.send(builder).await?;
        decode(response).await
    }

    async fn attachment(&self, id: &str) -> JiraResult<JiraAttachment> {
        self.get_json(&["attachment", id], &[]).await
    }

    async fn download_attachment(&self, attachment: &JiraAttachment) -> JiraResult<Vec<u8>> {
        let url = match &attachment.content {
            Some(url) => Url::parse(url).map_err(|e| JiraError::InvalidPath(format!("{}: {}", url, e)))?,
            None => {
                let mut url = self.api_base.clone();
                url.path_segments_mut()
                    .map_err(|_| JiraError::InvalidPath(self.base_url.clone()))?
                    .pop_if_empty()
                    .extend(["secure", "attachment", attachment.id.as_str(), attachment.filename.as_str()]);
                url
            }
        };
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn issue_types(&self) -> JiraResult<Vec<JiraIssueType>> {
        self.get_json(&["issuetype"], &[]).await
    }

    async fn issue_link_types(&self) -> JiraResult<Vec<JiraLinkType>> {
        let response: JiraLinkTypesResponse = self.get_json(&["issueLinkType"], &[]).await?;
        Ok(response.issue_link_types)
    }

    async fn create_issue_link(
        &self,
        link_type: &str,
        inward_key: &str,
        outward_key: &str,
    ) -> JiraResult<()> {
        let body = json!({
            "type": { "name": link_type },
            "inwardIssue": { "key": inward_key },
            "outwardIssue": { "key": outward_key }
        });
        self.send_json_no_content(Method::POST, &["issueLink"], &body).await
    }

    async fn search_users(&self, query: &str) -> JiraResult<Vec<JiraUser>> {
        self.get_json(&["user", "search"], &[("query", query.to_string())]).await
    }

    async fn projects(&self) -> JiraResult<Vec<JiraProject>> {
        self.get_json(&["project"], &[("expand", "lead".to_string())]).await
    }

    async fn create_meta(&self, project_key: &str) -> JiraResult<JiraCreateMeta> {
        self.get_json(
            &["issue", "createmeta"],
            &[
                ("projectKeys", project_key.to_string()),
                ("expand", "projects.issuetypes.fields".to_string()),
            ],
        )
        .await
    }
}
