//! Public IP detection.

use std::sync::Arc;

use serde::Deserialize;

use crate::location::{Location, LocationError};
use crate::net::HttpClient;

#[derive(Debug, Deserialize)]
struct DetectorReply {
    ip: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    city: String,
}

/// Asks an IP detector service who we are.
#[derive(Debug, Clone)]
pub struct IpResolver {
    http: Arc<HttpClient>,
    url: String,
}

impl IpResolver {
    pub fn new(http: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn public_ip(&self) -> Result<String, LocationError> {
        Ok(self.detect().await?.ip)
    }

    /// Public IP plus whatever country and city the detector reports.
    pub async fn detect(&self) -> Result<Location, LocationError> {
        let reply: DetectorReply = self.http.get_json(&self.url).await?;
        Ok(Location {
            ip: reply.ip,
            country: reply.country,
            city: reply.city,
            node_type: String::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
