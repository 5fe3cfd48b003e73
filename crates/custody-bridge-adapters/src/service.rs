use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use custody_bridge_core::{AuthorizationStatus, PortError, ServicePort};

#[derive(Debug, Deserialize)]
struct AccountsBody {
    accounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationCreated {
    authorization_id: String,
}

/// REST client for the custody service's `/api/{chain}/...` routes.
#[derive(Debug, Clone)]
pub struct CustodyServiceAdapter {
    base_url: Option<Url>,
    client: reqwest::Client,
}

impl CustodyServiceAdapter {
    pub fn new(base_url: Option<&str>, client: reqwest::Client) -> Result<Self, PortError> {
        let base_url = base_url
            .map(|raw| {
                Url::parse(raw.trim_end_matches('/'))
                    .map_err(|e| PortError::Validation(format!("invalid service url {raw}: {e}")))
            })
            .transpose()?;
        Ok(Self { base_url, client })
    }

    fn route(&self, chain: &str, resource: &str) -> Result<Url, PortError> {
        let mut url = self
            .base_url
            .clone()
            .ok_or_else(|| PortError::NotFound("custody service url not configured".to_owned()))?;
        url.path_segments_mut()
            .map_err(|()| PortError::Validation("service url cannot carry a path".to_owned()))?
            .pop_if_empty()
            .extend(["api", chain, resource]);
        Ok(url)
    }
}

#[async_trait(?Send)]
impl ServicePort for CustodyServiceAdapter {
    async fn fetch_accounts(&self, chain: &str, code: &str) -> Result<Vec<String>, PortError> {
        let mut url = self.route(chain, "accounts")?;
        url.query_pairs_mut().append_pair("code", code);
        tracing::debug!(chain, "fetching custody accounts");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("accounts request failed: {e}")))?;
        let body: AccountsBody = read_json(response, "accounts").await?;
        Ok(body.accounts)
    }

    async fn create_authorization(
        &self,
        chain: &str,
        code: &str,
        params: &Value,
    ) -> Result<String, PortError> {
        let mut url = self.route(chain, "authz")?;
        url.query_pairs_mut().append_pair("code", code);
        let response = self
            .client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("authz submit failed: {e}")))?;
        let body: AuthorizationCreated = read_json(response, "authz submit").await?;
        Ok(body.authorization_id)
    }

    async fn authorization_status(
        &self,
        chain: &str,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, PortError> {
        let mut url = self.route(chain, "authz")?;
        url.query_pairs_mut()
            .append_pair("authorizationId", authorization_id);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("authz status request failed: {e}")))?;
        read_json(response, "authz status").await
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, PortError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PortError::NotFound(format!("{what}: {}", response.url())));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PortError::Transport(format!("{what} status {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| PortError::Transport(format!("{what} json decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_keep_base_path_and_drop_trailing_slash() {
        let adapter =
            CustodyServiceAdapter::new(Some("https://custody.test/wallet/"), reqwest::Client::new())
                .expect("adapter");
        let url = adapter.route("bsc", "accounts").expect("route");
        assert_eq!(url.as_str(), "https://custody.test/wallet/api/bsc/accounts");
    }

    #[test]
    fn missing_base_url_fails_on_use() {
        let adapter = CustodyServiceAdapter::new(None, reqwest::Client::new()).expect("adapter");
        assert!(matches!(
            adapter.route("ethereum", "authz"),
            Err(PortError::NotFound(_))
        ));
        assert!(CustodyServiceAdapter::new(Some("not a url"), reqwest::Client::new()).is_err());
    }
}
