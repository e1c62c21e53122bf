use async_trait::async_trait;
use bioscfg_core::config::FleetDbConfig;
use bioscfg_core::inventory::AssetRepository;
use bioscfg_core::model::Asset;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::{build_client, parse_json_response, HttpError};

pub const VENDOR_ATTRIBUTES_NS: &str = "sh.hollow.bioscfg.server_vendor_attributes";
pub const BMC_INFO_NS: &str = "sh.hollow.bmc_info";

#[derive(Debug, Deserialize)]
struct Attribute {
    namespace: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ServerRecord {
    #[serde(default)]
    facility: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

#[derive(Debug, Default, Deserialize)]
struct Credential {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// FleetDB responses wrap the payload in `record`; older deployments don't.
fn unwrap_record(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("record") => {
            map.remove("record").unwrap_or(Value::Null)
        }
        other => other,
    }
}

impl ServerRecord {
    fn attribute(&self, namespace: &str, key: &str) -> String {
        self.attributes
            .iter()
            .find(|a| a.namespace == namespace)
            .and_then(|a| a.data[key].as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Asset lookup against a FleetDB server inventory.
pub struct FleetDbRepository {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl FleetDbRepository {
    pub fn new(cfg: &FleetDbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_client(cfg.timeout_ms, false)?,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
        })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.token)
        }
    }

    async fn get(&self, url: String) -> Result<Value, HttpError> {
        tracing::debug!(target: "bioscfg.fleetdb", stage = "fleetdb.get", url = %url);
        let resp = self
            .auth(self.http.get(&url))
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        parse_json_response(resp).await.map(unwrap_record)
    }
}

#[async_trait]
impl AssetRepository for FleetDbRepository {
    fn name(&self) -> &str {
        "fleetdb"
    }

    async fn asset_by_id(&self, id: Uuid) -> anyhow::Result<Asset> {
        let server_url = format!("{}/api/v1/servers/{}", self.endpoint, id);
        let record: ServerRecord = serde_json::from_value(self.get(server_url).await?)?;

        let creds_url = format!("{}/api/v1/servers/{}/credentials/bmc", self.endpoint, id);
        let creds: Credential = serde_json::from_value(self.get(creds_url).await?)?;

        let asset = Asset {
            bmc_address: record.attribute(BMC_INFO_NS, "address"),
            bmc_username: creds.username,
            bmc_password: creds.password,
            vendor: record.attribute(VENDOR_ATTRIBUTES_NS, "vendor"),
            model: record.attribute(VENDOR_ATTRIBUTES_NS, "model"),
            serial: record.attribute(VENDOR_ATTRIBUTES_NS, "serial"),
            facility_code: record.facility.clone(),
            ..Asset::new(id)
        };

        if asset.bmc_address.is_empty() {
            anyhow::bail!("fleetdb server {id} has no bmc address attribute");
        }

        Ok(asset)
    }
}
