//! Wiki API client
//!
//! Thin glue over the MediaWiki action API: login, generator queries with
//! continuation, raw page fetches, and edits with optimistic-concurrency
//! timestamps. An edit conflict comes back as its own error variant so the
//! caller can refetch and retry.

pub mod bots;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub type Result<T> = std::result::Result<T, SiteError>;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("edit conflict")]
    EditConflict,

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("malformed API response: missing {0}")]
    Malformed(&'static str),
}

/// One managed page as returned by the generator query.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub title: String,
    pub content: String,
    pub content_model: String,
    /// Timestamp of the revision the content came from.
    pub rev_timestamp: String,
    /// Server time when the content was fetched.
    pub cur_timestamp: String,
}

/// An edit to submit. `base_timestamp`/`start_timestamp` carry the
/// optimistic-concurrency handshake; a new-section title switches the edit
/// into append mode.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub title: String,
    pub text: String,
    pub summary: String,
    pub base_timestamp: Option<String>,
    pub start_timestamp: Option<String>,
    pub new_section_title: Option<String>,
    pub follow_redirects: bool,
}

pub struct Site {
    http: reqwest::Client,
    api_url: String,
}

impl Site {
    pub fn new(api_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("listprune/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
        })
    }

    /// Log in with a bot-password credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let value = self
            .get(&[
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "login"),
            ])
            .await?;
        let token = value["query"]["tokens"]["logintoken"]
            .as_str()
            .ok_or(SiteError::Malformed("logintoken"))?
            .to_string();

        let value = self
            .post(&[
                ("action", "login"),
                ("lgname", username),
                ("lgpassword", password),
                ("lgtoken", &token),
            ])
            .await?;
        match value["login"]["result"].as_str() {
            Some("Success") => Ok(()),
            other => Err(SiteError::LoginFailed(
                other.unwrap_or("no result").to_string(),
            )),
        }
    }

    /// Every non-redirect page embedding `template`, with content and the
    /// timestamps needed for conflict-checked edits. Follows continuation.
    pub async fn pages_embedding(&self, template: &str) -> Result<Vec<ListPage>> {
        let mut pages = Vec::new();
        let mut cont: Option<serde_json::Map<String, Value>> = None;

        loop {
            let mut params: Vec<(String, String)> = [
                ("action", "query"),
                ("prop", "revisions"),
                ("generator", "embeddedin"),
                ("geititle", template),
                ("geifilterredir", "nonredirects"),
                ("rvprop", "timestamp|content|contentmodel"),
                ("rvslots", "main"),
                ("curtimestamp", "1"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
            if let Some(cont) = &cont {
                for (key, value) in cont {
                    if let Some(value) = value.as_str() {
                        params.push((key.clone(), value.to_string()));
                    }
                }
            }

            let value = self.get_owned(&params).await?;
            let cur_timestamp = value["curtimestamp"].as_str().unwrap_or_default().to_string();

            if let Some(found) = value["query"]["pages"].as_array() {
                for page in found {
                    let Some(title) = page["title"].as_str() else {
                        continue;
                    };
                    let rev = &page["revisions"][0];
                    let main = &rev["slots"]["main"];
                    pages.push(ListPage {
                        title: title.to_string(),
                        content: main["content"].as_str().unwrap_or_default().to_string(),
                        content_model: main["contentmodel"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                        rev_timestamp: rev["timestamp"].as_str().unwrap_or_default().to_string(),
                        cur_timestamp: cur_timestamp.clone(),
                    });
                }
            }

            match value.get("continue").and_then(Value::as_object) {
                Some(next) => cont = Some(next.clone()),
                None => break,
            }
        }

        debug!(count = pages.len(), template, "listed managed pages");
        Ok(pages)
    }

    /// Refetch a single page, for the conflict-retry path.
    pub async fn fetch_page(&self, title: &str) -> Result<ListPage> {
        let value = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", title),
                ("rvprop", "timestamp|content|contentmodel"),
                ("rvslots", "main"),
                ("curtimestamp", "1"),
            ])
            .await?;

        let cur_timestamp = value["curtimestamp"].as_str().unwrap_or_default().to_string();
        let page = &value["query"]["pages"][0];
        if page.is_null() {
            return Err(SiteError::Malformed("query.pages"));
        }
        let rev = &page["revisions"][0];
        let main = &rev["slots"]["main"];
        Ok(ListPage {
            title: title.to_string(),
            content: main["content"].as_str().unwrap_or_default().to_string(),
            content_model: main["contentmodel"].as_str().unwrap_or_default().to_string(),
            rev_timestamp: rev["timestamp"].as_str().unwrap_or_default().to_string(),
            cur_timestamp,
        })
    }

    /// Raw content of a page by id; the formats map lives on one.
    pub async fn fetch_content_by_id(&self, page_id: u64) -> Result<String> {
        let id = page_id.to_string();
        let value = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("pageids", &id),
                ("rvprop", "content"),
                ("rvslots", "main"),
            ])
            .await?;
        value["query"]["pages"][0]["revisions"][0]["slots"]["main"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(SiteError::Malformed("page content"))
    }

    /// Submit an edit. Marked bot and not-minor; an `editconflict` API error
    /// surfaces as [`SiteError::EditConflict`].
    pub async fn edit(&self, request: &EditRequest) -> Result<()> {
        let token = self.csrf_token().await?;

        let mut params: Vec<(String, String)> = vec![
            ("action".into(), "edit".into()),
            ("title".into(), request.title.clone()),
            ("text".into(), request.text.clone()),
            ("summary".into(), request.summary.clone()),
            ("notminor".into(), "true".into()),
            ("bot".into(), "true".into()),
            ("token".into(), token),
        ];
        if let Some(header) = &request.new_section_title {
            params.push(("section".into(), "new".into()));
            params.push(("sectiontitle".into(), header.clone()));
        }
        if let Some(base) = &request.base_timestamp {
            params.push(("basetimestamp".into(), base.clone()));
        }
        if let Some(start) = &request.start_timestamp {
            params.push(("starttimestamp".into(), start.clone()));
        }
        if request.follow_redirects {
            params.push(("redirect".into(), "true".into()));
        }

        let value = self.post_owned(&params).await?;
        match value["edit"]["result"].as_str() {
            Some("Success") => Ok(()),
            _ => Err(SiteError::Malformed("edit.result")),
        }
    }

    async fn csrf_token(&self) -> Result<String> {
        let value = self
            .get(&[("action", "query"), ("meta", "tokens")])
            .await?;
        value["query"]["tokens"]["csrftoken"]
            .as_str()
            .map(str::to_string)
            .ok_or(SiteError::Malformed("csrftoken"))
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.get_owned(&owned).await
    }

    async fn get_owned(&self, params: &[(String, String)]) -> Result<Value> {
        let value: Value = self
            .http
            .get(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check(&value)?;
        Ok(value)
    }

    async fn post(&self, params: &[(&str, &str)]) -> Result<Value> {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.post_owned(&owned).await
    }

    async fn post_owned(&self, params: &[(String, String)]) -> Result<Value> {
        let value: Value = self
            .http
            .post(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .form(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check(&value)?;
        Ok(value)
    }

    /// Map the API's error envelope onto [`SiteError`].
    fn check(value: &Value) -> Result<()> {
        if let Some(error) = value.get("error") {
            let code = error["code"].as_str().unwrap_or_default();
            if code == "editconflict" {
                return Err(SiteError::EditConflict);
            }
            return Err(SiteError::Api {
                code: code.to_string(),
                info: error["info"].as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_maps_error_envelope() {
        let value: Value = serde_json::json!({
            "error": {"code": "badtoken", "info": "Invalid CSRF token."}
        });
        assert!(matches!(
            Site::check(&value),
            Err(SiteError::Api { code, .. }) if code == "badtoken"
        ));
    }

    #[test]
    fn test_check_detects_edit_conflict() {
        let value: Value = serde_json::json!({
            "error": {"code": "editconflict", "info": "Edit conflict."}
        });
        assert!(matches!(Site::check(&value), Err(SiteError::EditConflict)));
    }

    #[test]
    fn test_check_passes_clean_responses() {
        let value: Value = serde_json::json!({"edit": {"result": "Success"}});
        assert!(Site::check(&value).is_ok());
    }
}
