//! Client for the remote users collection.
//!
//! This is the only place that talks to the network. Every call is a single
//! blocking attempt: failures are returned to the caller and never retried.

use crate::error::RequestFailure;
use crate::user::{User, UserId};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Operations on the users collection. Implemented over HTTP by
/// [`HttpUserService`] and by a recording double in tests.
pub trait UserService {
    fn list(&self) -> Result<Vec<User>, RequestFailure>;
    fn get(&self, id: UserId) -> Result<User, RequestFailure>;
    fn create(&self, draft: &User) -> Result<User, RequestFailure>;
    fn update(&self, id: UserId, draft: &User) -> Result<User, RequestFailure>;
    fn delete(&self, id: UserId) -> Result<(), RequestFailure>;
}

pub struct HttpUserService {
    collection_url: String,
    agent: ureq::Agent,
}

impl HttpUserService {
    /// Create a client for `<base_url>/<collection>`. Without a timeout the
    /// transport defaults apply.
    pub fn new(base_url: &str, collection: &str, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            collection_url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                collection.trim_matches('/')
            ),
            agent: builder.build(),
        }
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn item_url(&self, id: UserId) -> String {
        format!("{}/{}", self.collection_url, id)
    }

    fn finish(
        method: &str,
        url: &str,
        resp: Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, RequestFailure> {
        match resp {
            Ok(r) => {
                debug!(method, url, status = r.status(), "request completed");
                Ok(r)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                debug!(method, url, status = code, "request rejected");
                Err(RequestFailure::Status { status: code, body })
            }
            Err(e) => {
                debug!(method, url, error = %e, "request failed");
                Err(RequestFailure::Transport(e.to_string()))
            }
        }
    }

    fn decode<T: DeserializeOwned>(resp: ureq::Response) -> Result<T, RequestFailure> {
        resp.into_json::<T>()
            .map_err(|e| RequestFailure::Decode(e.to_string()))
    }
}

impl UserService for HttpUserService {
    fn list(&self) -> Result<Vec<User>, RequestFailure> {
        let url = &self.collection_url;
        let resp = Self::finish("GET", url, self.agent.get(url).call())?;
        Self::decode(resp)
    }

    fn get(&self, id: UserId) -> Result<User, RequestFailure> {
        let url = self.item_url(id);
        let resp = Self::finish("GET", &url, self.agent.get(&url).call())?;
        Self::decode(resp)
    }

    fn create(&self, draft: &User) -> Result<User, RequestFailure> {
        let url = &self.collection_url;
        let resp = Self::finish(
            "POST",
            url,
            self.agent
                .post(url)
                .set("Content-Type", "application/json")
                .send_json(draft),
        )?;
        let created: User = Self::decode(resp)?;
        if created.id.is_none() {
            return Err(RequestFailure::MissingId);
        }
        Ok(created)
    }

    fn update(&self, id: UserId, draft: &User) -> Result<User, RequestFailure> {
        let url = self.item_url(id);
        let mut body = draft.clone();
        body.id = Some(id);
        let resp = Self::finish(
            "PUT",
            &url,
            self.agent
                .put(&url)
                .set("Content-Type", "application/json")
                .send_json(&body),
        )?;
        let mut updated: User = Self::decode(resp)?;
        // The identifier never changes on update, whatever the service echoes
        updated.id = Some(id);
        Ok(updated)
    }

    fn delete(&self, id: UserId) -> Result<(), RequestFailure> {
        let url = self.item_url(id);
        Self::finish("DELETE", &url, self.agent.delete(&url).call())?;
        Ok(())
    }
}
