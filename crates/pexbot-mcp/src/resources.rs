//! Read-only MCP resources backed by pex.bot endpoints.

use crate::client::PexbotClient;
use crate::error::PexbotResult;
use serde::Serialize;
use serde_json::{json, Value};

/// Resource metadata as advertised by `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDefinition {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

/// One resource and the endpoint it mirrors.
pub struct ResourceEntry {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub path: &'static str,
    pub public: bool,
}

pub static RESOURCES: &[ResourceEntry] = &[
    ResourceEntry {
        uri: "pexbot://markets",
        name: "markets",
        description: "All tradable markets and their symbol info",
        path: "/markets",
        public: false,
    },
    ResourceEntry {
        uri: "pexbot://regime/current",
        name: "market-regime",
        description: "Current market regime classification",
        path: "/regimes/current",
        public: true,
    },
    ResourceEntry {
        uri: "pexbot://agents",
        name: "agents",
        description: "Public directory of autonomous trading agents",
        path: "/autonomous/agents",
        public: true,
    },
    ResourceEntry {
        uri: "pexbot://decisions/recent",
        name: "recent-decisions",
        description: "The 20 most recent agent trading decisions",
        path: "/decisions?limit=20",
        public: true,
    },
];

impl ResourceEntry {
    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: self.uri,
            name: self.name,
            description: self.description,
            mime_type: "application/json",
        }
    }

    /// Fetch the resource and wrap it as `resources/read` contents.
    pub async fn read(&self, client: &PexbotClient) -> PexbotResult<Value> {
        let data = if self.public {
            client.get_public(self.path).await?
        } else {
            client.get(self.path).await?
        };
        Ok(json!({
            "contents": [{
                "uri": self.uri,
                "mimeType": "application/json",
                "text": serde_json::to_string_pretty(&data)?,
            }]
        }))
    }
}

pub fn resource_definitions() -> Vec<ResourceDefinition> {
    RESOURCES.iter().map(ResourceEntry::definition).collect()
}

pub fn find_resource(uri: &str) -> Option<&'static ResourceEntry> {
    RESOURCES.iter().find(|r| r.uri == uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthResolver;
    use crate::error::PexbotError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_uris_unique_and_prefixed() {
        let mut uris: Vec<&str> = RESOURCES.iter().map(|r| r.uri).collect();
        assert!(uris.iter().all(|u| u.starts_with("pexbot://")));
        uris.sort_unstable();
        uris.dedup();
        assert_eq!(uris.len(), RESOURCES.len());
    }

    #[tokio::test]
    async fn test_read_public_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/decisions"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"symbol": "BTC-KRW"}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = PexbotClient::with_auth(&server.uri(), AuthResolver::anonymous()).unwrap();
        let out = find_resource("pexbot://decisions/recent")
            .unwrap()
            .read(&client)
            .await
            .unwrap();
        assert_eq!(out["contents"][0]["uri"], "pexbot://decisions/recent");
        assert!(out["contents"][0]["text"].as_str().unwrap().contains("BTC-KRW"));
    }

    #[tokio::test]
    async fn test_read_private_resource_requires_auth() {
        let client = PexbotClient::with_auth("http://127.0.0.1:9", AuthResolver::anonymous()).unwrap();
        let err = find_resource("pexbot://markets")
            .unwrap()
            .read(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, PexbotError::AuthenticationRequired));
    }

    #[test]
    fn test_unknown_resource() {
        assert!(find_resource("pexbot://nope").is_none());
    }
}
