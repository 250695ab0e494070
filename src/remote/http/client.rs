use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    engine::{EngagementKey, EngagementState},
    remote::{RemoteResult, RemoteSync},
};

use super::{
    config::RemoteConfig,
    error::{HttpRemoteError, HttpResult},
    models::{AddPlaceRequest, ApiEnvelope, LikeStatusResponse, LikeToggleResponse},
};

/// [`RemoteSync`] backed by the forum and saved-list REST endpoints.
#[derive(Clone)]
pub struct HttpRemoteSync {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl HttpRemoteSync {
    /// Build the HTTP client described by `config`.
    pub fn new(config: RemoteConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| HttpRemoteError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            token: config.token.map(Arc::<str>::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some(ref token) = self.token {
            builder.bearer_auth(token.as_ref())
        } else {
            builder
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> HttpResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| HttpRemoteError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(HttpRemoteError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }

    async fn decode<T>(&self, path: &str, response: Response) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        let payload = response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|source| HttpRemoteError::DecodeResponse {
                path: path.to_string(),
                source,
            })?;
        Ok(payload.data)
    }

    /// Ask the server whether the caller currently likes the target. Read only.
    async fn like_status(&self, path: &str) -> HttpResult<bool> {
        let response = self.send(path, self.request(Method::GET, path)).await?;
        let status: LikeStatusResponse = self.decode(path, response).await?;
        Ok(status.is_liked)
    }

    /// Hit a like endpoint once; the server flips its own state.
    async fn flip_like(&self, path: &str) -> HttpResult<EngagementState> {
        let response = self.send(path, self.request(Method::POST, path)).await?;
        let confirmed: LikeToggleResponse = self.decode(path, response).await?;
        Ok(confirmed.into())
    }

    /// Drive a flip-style like endpoint to `desired` with at most one mutating request.
    ///
    /// The read-only check runs first, so a server already on the desired side (coalesced
    /// toggles that cancelled out, or another session) is left alone. When a flip happens its
    /// response is returned as is, even if a concurrent change made it land on the other side:
    /// that is what the server holds.
    async fn push_like(&self, path: String, desired: EngagementState) -> HttpResult<EngagementState> {
        let check_path = format!("{path}/check");
        if self.like_status(&check_path).await? == desired.engaged {
            debug!(path = %path, engaged = desired.engaged, "server already matches; no flip");
            return Ok(desired);
        }

        let confirmed = self.flip_like(&path).await?;
        if confirmed.engaged != desired.engaged {
            warn!(
                path = %path,
                engaged = confirmed.engaged,
                "like flip raced another session; adopting server state"
            );
        }
        Ok(confirmed)
    }

    async fn push_membership(
        &self,
        list_id: &str,
        place_id: &str,
        desired: EngagementState,
    ) -> HttpResult<EngagementState> {
        if desired.engaged {
            let path = format!("lists/{list_id}/places");
            let builder = self
                .request(Method::POST, &path)
                .json(&AddPlaceRequest { place_id });
            self.send(&path, builder).await?;
        } else {
            let path = format!("lists/{list_id}/places/{place_id}");
            self.send(&path, self.request(Method::DELETE, &path)).await?;
        }

        // The list endpoints only acknowledge; the requested membership is the confirmed one.
        Ok(desired)
    }
}

impl RemoteSync for HttpRemoteSync {
    fn push(
        &self,
        key: &EngagementKey,
        desired: EngagementState,
    ) -> BoxFuture<'static, RemoteResult<EngagementState>> {
        let remote = self.clone();
        let key = key.clone();
        Box::pin(async move {
            let result = match &key {
                EngagementKey::Post { post_id } => {
                    remote
                        .push_like(format!("forum/posts/{post_id}/like"), desired)
                        .await
                }
                EngagementKey::Reply { post_id, reply_id } => {
                    remote
                        .push_like(
                            format!("forum/posts/{post_id}/replies/{reply_id}/like"),
                            desired,
                        )
                        .await
                }
                EngagementKey::ListPlace { list_id, place_id } => {
                    remote.push_membership(list_id, place_id, desired).await
                }
            };
            result.map_err(Into::into)
        })
    }
}
