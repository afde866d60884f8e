//! Jira REST API v2 client.

use super::{ExternalTracker, Issue, IssueDraft, Result, TrackerError, WorklogDraft};
use crate::users::AccessToken;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

const EPIC_ISSUE_TYPE: &str = "Epic";
const NEW_ISSUE_TYPE: &str = "Task";
const CHILD_SEARCH_LIMIT: u32 = 500;

enum Auth {
    Bearer(String),
    Basic { login: String, password: String },
}

pub struct JiraClient {
    http: Client,
    api_root: String,
    auth: Auth,
    offset: UtcOffset,
}

impl JiraClient {
    pub fn new(base_url: &str, token: &AccessToken, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tlog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let auth = if token.secret.is_empty() {
            Auth::Bearer(token.token.clone())
        } else {
            Auth::Basic {
                login: token.token.clone(),
                password: token.secret.clone(),
            }
        };
        Ok(Self {
            http,
            api_root: format!("{}/rest/api/2/", base_url.trim_end_matches('/')),
            auth,
            offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_root, path.trim_start_matches('/'));
        let request = self.http.request(method, url);
        match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { login, password } => request.basic_auth(login, Some(password)),
        }
    }

    fn worklog_body(&self, worklog: &WorklogDraft) -> Result<WorklogBody> {
        let format = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].000[offset_hour sign:mandatory][offset_minute]"
        );
        let started = worklog
            .started
            .assume_offset(self.offset)
            .format(format)
            .map_err(|e| TrackerError::Generic {
                message: "unable to format work-log start".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(WorklogBody {
            comment: worklog.comment.clone(),
            started,
            time_spent_seconds: i64::from(worklog.duration_minutes) * 60,
        })
    }

    fn issue_children(&self, issue_key: &str) -> Result<IssueFields> {
        let response = self
            .request(Method::GET, &format!("issue/{issue_key}"))
            .query(&[("fields", "subtasks,issuetype")])
            .send()?;
        Ok(parse_json::<IssuePayload>(response)?.fields)
    }
}

impl ExternalTracker for JiraClient {
    fn search_issues(&self, jql: &str, fields: &[&str], limit: u32) -> Result<Vec<Issue>> {
        tracing::debug!(jql, limit, "searching jira issues");
        let response = self
            .request(Method::GET, "search")
            .query(&[
                ("jql", jql.to_string()),
                ("fields", fields.join(",")),
                ("maxResults", limit.to_string()),
            ])
            .send()?;
        let result: SearchResult = parse_json(response)?;
        Ok(result
            .issues
            .into_iter()
            .map(|issue| Issue {
                key: issue.key,
                summary: issue.fields.summary,
            })
            .collect())
    }

    fn create_issue(&self, project_key: &str, issue: &IssueDraft) -> Result<String> {
        let body = CreateIssueBody {
            fields: CreateIssueFields {
                project: KeyRef { key: project_key },
                summary: &issue.summary,
                description: &issue.description,
                issuetype: NameRef {
                    name: NEW_ISSUE_TYPE,
                },
            },
        };
        let response = self.request(Method::POST, "issue").json(&body).send()?;
        let created: CreatedIssue = parse_json(response)?;
        Ok(created.key)
    }

    fn create_worklog(&self, issue_key: &str, worklog: &WorklogDraft) -> Result<String> {
        let body = self.worklog_body(worklog)?;
        let response = self
            .request(Method::POST, &format!("issue/{issue_key}/worklog"))
            .json(&body)
            .send()?;
        let created: CreatedWorklog = parse_json(response)?;
        Ok(created.id)
    }

    fn update_worklog(
        &self,
        issue_key: &str,
        worklog_id: &str,
        worklog: &WorklogDraft,
    ) -> Result<()> {
        let body = self.worklog_body(worklog)?;
        let response = self
            .request(
                Method::PUT,
                &format!("issue/{issue_key}/worklog/{worklog_id}"),
            )
            .json(&body)
            .send()?;
        ensure_success(response)
    }

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<()> {
        let response = self
            .request(
                Method::DELETE,
                &format!("issue/{issue_key}/worklog/{worklog_id}"),
            )
            .send()?;
        ensure_success(response)
    }

    fn get_subtickets(&self, issue_key: &str) -> Result<Vec<String>> {
        let fields = self.issue_children(issue_key)?;
        let is_epic = fields
            .issuetype
            .as_ref()
            .is_some_and(|kind| kind.name == EPIC_ISSUE_TYPE);
        if !is_epic {
            return Ok(fields.subtasks.into_iter().map(|task| task.key).collect());
        }

        let response = self
            .request(Method::GET, "search")
            .query(&[
                ("jql", format!("\"Epic Link\" = {issue_key}")),
                ("fields", "subtasks".to_string()),
                ("maxResults", CHILD_SEARCH_LIMIT.to_string()),
            ])
            .send()?;
        let children: SearchResult = parse_json(response)?;
        let mut keys = Vec::new();
        for child in children.issues {
            keys.push(child.key);
            keys.extend(child.fields.subtasks.into_iter().map(|task| task.key));
        }
        Ok(keys)
    }
}

fn parse_json<T>(response: Response) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = check_status(response)?;
    let body = response.text()?;
    serde_json::from_str(&body).map_err(Into::into)
}

fn ensure_success(response: Response) -> Result<()> {
    check_status(response).map(|_| ())
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TrackerError::Unauthorized(
            format!("access denied ({status}) for {url}"),
        )),
        StatusCode::NOT_FOUND => Err(TrackerError::InvalidResource(url)),
        _ => Err(TrackerError::generic(format!(
            "jira returned {status} for {url}: {}",
            error_messages(&body).unwrap_or(body)
        ))),
    }
}

fn error_messages(body: &str) -> Option<String> {
    let payload: ErrorPayload = serde_json::from_str(body).ok()?;
    if payload.error_messages.is_empty() {
        None
    } else {
        Some(payload.error_messages.join("; "))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogBody {
    comment: String,
    started: String,
    time_spent_seconds: i64,
}

#[derive(Debug, Serialize)]
struct CreateIssueBody<'a> {
    fields: CreateIssueFields<'a>,
}

#[derive(Debug, Serialize)]
struct CreateIssueFields<'a> {
    project: KeyRef<'a>,
    summary: &'a str,
    description: &'a str,
    issuetype: NameRef<'a>,
}

#[derive(Debug, Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct CreatedWorklog {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    issues: Vec<IssuePayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    summary: Option<String>,
    issuetype: Option<IssueType>,
    #[serde(default)]
    subtasks: Vec<SubtaskRef>,
}

#[derive(Debug, Deserialize)]
struct IssueType {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SubtaskRef {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload {
    #[serde(default)]
    error_messages: Vec<String>,
}
