//! DingTalk robot notifications for pull request participants.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::scm::PullRequest;
use crate::template::{self, Vars};

pub const DINGTALK_ENDPOINT: &str = "https://oapi.dingtalk.com/robot/send";

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msgtype: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct RobotReply {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

pub struct DingTalk {
    client: reqwest::Client,
    endpoint: String,
}

impl DingTalk {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint(DINGTALK_ENDPOINT, timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build DingTalk HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Send a text message through the robot identified by `token`.
    pub async fn send_text(&self, token: &str, content: &str) -> Result<()> {
        let message = TextMessage {
            msgtype: "text",
            text: TextBody { content },
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("access_token", token)])
            .json(&message)
            .send()
            .await
            .context("Failed to reach DingTalk")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("DingTalk returned HTTP {}", status);
        }
        let reply: RobotReply = resp.json().await.context("Failed to decode DingTalk reply")?;
        if reply.errcode != 0 {
            bail!("DingTalk error {}: {}", reply.errcode, reply.errmsg);
        }
        Ok(())
    }

    /// Notify every login that has a robot token. Logins without a token are skipped.
    /// Sends run concurrently; each login gets its own result.
    pub async fn notify_all(
        &self,
        logins: &[String],
        tokens: &HashMap<String, String>,
        content: &str,
    ) -> Vec<(String, Result<()>)> {
        let sends = logins.iter().filter_map(|login| {
            let token = tokens.get(login)?;
            Some(async move { (login.clone(), self.send_text(token, content).await) })
        });
        join_all(sends).await
    }
}

/// Unique logins of everyone involved in a pull request, in author, reviewer, assignee order.
pub fn participants(pr: &PullRequest) -> Vec<String> {
    let mut logins: Vec<String> = Vec::new();
    let all = std::iter::once(&pr.author)
        .chain(pr.reviewers.iter())
        .chain(pr.assignees.iter());
    for user in all {
        if !user.login.is_empty() && !logins.contains(&user.login) {
            logins.push(user.login.clone());
        }
    }
    logins
}

pub fn pr_vars(pr: &PullRequest) -> Vars {
    let mut vars = Vars::new();
    vars.insert("pr.number".into(), pr.number.to_string());
    vars.insert("pr.title".into(), pr.title.clone());
    vars.insert("pr.sha".into(), pr.sha.clone());
    vars.insert("pr.author".into(), pr.author.login.clone());
    vars
}

/// Render a notification message for `pr`. A broken template is sent as-is.
pub fn render_message(msg: &str, pr: &PullRequest) -> String {
    match template::render(msg, &pr_vars(pr)) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "cannot render message template, sending it unrendered");
            msg.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::User;
    use axum::extract::Query;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    fn user(login: &str) -> User {
        User {
            login: login.to_string(),
            ..Default::default()
        }
    }

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 45,
            sha: "abc123".into(),
            title: "Fix flaky test".into(),
            author: user("alice"),
            reviewers: vec![user("bob"), user("alice")],
            assignees: vec![user("carol"), user("bob")],
        }
    }

    type Received = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    /// Serve a fake robot endpoint; token "bad" gets a non-zero errcode.
    async fn fake_robot() -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let seen = received.clone();
        let app = Router::new().route(
            "/robot/send",
            post(
                move |Query(q): Query<HashMap<String, String>>,
                      Json(body): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    async move {
                        let token = q.get("access_token").cloned().unwrap_or_default();
                        seen.lock().unwrap().push((token.clone(), body));
                        if token == "bad" {
                            Json(serde_json::json!({
                                "errcode": 300001,
                                "errmsg": "token is not exist"
                            }))
                        } else {
                            Json(serde_json::json!({"errcode": 0, "errmsg": "ok"}))
                        }
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/robot/send", addr), received)
    }

    #[test]
    fn test_participants_unique_in_order() {
        assert_eq!(participants(&sample_pr()), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_render_message_with_pr_vars() {
        let text = render_message(
            "PR #{{pr.number}} {{ pr.title }} by {{pr.author}}",
            &sample_pr(),
        );
        assert_eq!(text, "PR #45 Fix flaky test by alice");
    }

    #[test]
    fn test_render_message_falls_back_to_raw() {
        let text = render_message("see {{pr.unknown}}", &sample_pr());
        assert_eq!(text, "see {{pr.unknown}}");
    }

    #[test]
    fn test_text_message_shape() {
        let msg = TextMessage {
            msgtype: "text",
            text: TextBody { content: "hi \"there\"" },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"msgtype": "text", "text": {"content": "hi \"there\""}})
        );
    }

    #[tokio::test]
    async fn test_send_text_ok() {
        let (endpoint, received) = fake_robot().await;
        let robot = DingTalk::with_endpoint(endpoint, Duration::from_secs(5)).unwrap();
        robot.send_text("t1", "build passed").await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "t1");
        assert_eq!(received[0].1["text"]["content"], "build passed");
    }

    #[tokio::test]
    async fn test_send_text_errcode_is_error() {
        let (endpoint, _) = fake_robot().await;
        let robot = DingTalk::with_endpoint(endpoint, Duration::from_secs(5)).unwrap();
        let err = robot.send_text("bad", "x").await.unwrap_err();
        assert!(err.to_string().contains("300001"), "{}", err);
    }

    #[tokio::test]
    async fn test_notify_all_only_logins_with_tokens() {
        let (endpoint, received) = fake_robot().await;
        let robot = DingTalk::with_endpoint(endpoint, Duration::from_secs(5)).unwrap();
        let tokens: HashMap<String, String> = [("alice", "t1"), ("carol", "bad")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let results = robot
            .notify_all(&participants(&sample_pr()), &tokens, "hello")
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "alice");
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "carol");
        assert!(results[1].1.is_err());
        assert_eq!(received.lock().unwrap().len(), 2);
    }
}
