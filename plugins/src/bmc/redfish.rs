//! Redfish-backed [`BmcSession`].
//!
//! A session logs in through `SessionService`, discovers the first system and
//! manager, and authenticates every later call with the returned
//! `X-Auth-Token`.

use async_trait::async_trait;
use bioscfg_core::bmc::{BmcSession, BmcSessionFactory, BootDevice, PowerAction, PowerState};
use bioscfg_core::config::BmcConfig;
use bioscfg_core::model::Asset;
use bioscfg_core::BmcError;
use reqwest::header::LOCATION;
use reqwest::Method;
use serde_json::{json, Value};

use crate::http::{build_client, ensure_success, parse_json_response, HttpError};

const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";
const SYSTEMS_PATH: &str = "/redfish/v1/Systems";
const MANAGERS_PATH: &str = "/redfish/v1/Managers";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

pub struct RedfishFactory {
    http: reqwest::Client,
    scheme: String,
}

impl RedfishFactory {
    pub fn new(cfg: &BmcConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_client(cfg.timeout_ms, cfg.insecure_tls)?,
            scheme: cfg.scheme.clone(),
        })
    }

    /// A bare address gets the configured scheme; full URLs are used as-is.
    fn base_url(&self, address: &str) -> String {
        let address = address.trim().trim_end_matches('/');
        if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{}", self.scheme, address)
        }
    }
}

impl BmcSessionFactory for RedfishFactory {
    fn name(&self) -> &str {
        "redfish"
    }

    fn session_for(&self, asset: &Asset) -> Result<Box<dyn BmcSession>, BmcError> {
        if asset.bmc_address.trim().is_empty() {
            return Err(BmcError::Transport(format!(
                "asset {} has no bmc address",
                asset.id
            )));
        }
        Ok(Box::new(RedfishBmc {
            http: self.http.clone(),
            base_url: self.base_url(&asset.bmc_address),
            username: asset.bmc_username.clone(),
            password: asset.bmc_password.clone(),
            phase: Phase::Created,
        }))
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    token: String,
    session: String,
    system: String,
    manager: String,
}

enum Phase {
    Created,
    Open(Endpoints),
    Closed,
}

pub struct RedfishBmc {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    phase: Phase,
}

impl RedfishBmc {
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn endpoints(&self) -> Result<&Endpoints, BmcError> {
        match &self.phase {
            Phase::Created => Err(BmcError::NotOpen),
            Phase::Open(endpoints) => Ok(endpoints),
            Phase::Closed => Err(BmcError::Closed),
        }
    }

    async fn send(
        &self,
        token: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, BmcError> {
        let url = self.url(path);
        tracing::debug!(
            target: "bioscfg.redfish",
            stage = "redfish.request",
            method = %method,
            url = %url
        );
        let mut req = self
            .http
            .request(method, &url)
            .header(AUTH_TOKEN_HEADER, token);
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url).into_bmc_error())
    }

    async fn get(&self, token: &str, path: &str) -> Result<Value, BmcError> {
        let resp = self.send(token, Method::GET, path, None).await?;
        parse_json_response(resp)
            .await
            .map_err(HttpError::into_bmc_error)
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> Result<(), BmcError> {
        let token = self.endpoints()?.token.clone();
        let resp = self.send(&token, method, path, Some(&body)).await?;
        ensure_success(resp)
            .await
            .map_err(HttpError::into_bmc_error)
    }

    async fn first_member(&self, token: &str, collection: &str) -> Result<String, BmcError> {
        let body = self.get(token, collection).await?;
        body["Members"][0]["@odata.id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BmcError::Protocol(format!("{collection} lists no members")))
    }

    async fn discover(&self, token: &str) -> Result<(String, String), BmcError> {
        let system = self.first_member(token, SYSTEMS_PATH).await?;
        let manager = self.first_member(token, MANAGERS_PATH).await?;
        Ok((system, manager))
    }

    async fn system(&self) -> Result<Value, BmcError> {
        let endpoints = self.endpoints()?;
        self.get(&endpoints.token, &endpoints.system).await
    }

    async fn reset_system(&self, reset_type: &str) -> Result<(), BmcError> {
        let path = format!("{}/Actions/ComputerSystem.Reset", self.endpoints()?.system);
        self.write(Method::POST, &path, json!({ "ResetType": reset_type }))
            .await
    }
}

fn reset_type(action: PowerAction) -> &'static str {
    match action {
        PowerAction::On => "On",
        PowerAction::Off => "ForceOff",
        PowerAction::Soft => "GracefulShutdown",
        PowerAction::Reset => "ForceRestart",
        PowerAction::Cycle => "PowerCycle",
    }
}

fn boot_target_to_device(target: &str) -> String {
    match target {
        "Pxe" => "pxe".to_string(),
        "Hdd" => "disk".to_string(),
        "Cd" => "cdrom".to_string(),
        "BiosSetup" => "bios".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn device_to_boot_target(device: &str) -> Result<&'static str, BmcError> {
    match device.to_ascii_lowercase().as_str() {
        "pxe" => Ok("Pxe"),
        "disk" => Ok("Hdd"),
        "cdrom" => Ok("Cd"),
        "bios" => Ok("BiosSetup"),
        other => Err(BmcError::Unsupported(format!("boot device {other}"))),
    }
}

#[async_trait]
impl BmcSession for RedfishBmc {
    fn name(&self) -> &str {
        "redfish"
    }

    async fn open(&mut self) -> Result<(), BmcError> {
        match self.phase {
            Phase::Open(_) => return Ok(()),
            Phase::Closed => return Err(BmcError::Closed),
            Phase::Created => {}
        }

        let url = self.url(SESSIONS_PATH);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "UserName": self.username, "Password": self.password }))
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()).into_bmc_error())?;

        let (token, location) = {
            let header = |name: &str| {
                resp.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            (header(AUTH_TOKEN_HEADER), header(LOCATION.as_str()))
        };

        let body = parse_json_response(resp)
            .await
            .map_err(HttpError::into_bmc_error)?;

        let token = token.ok_or_else(|| {
            BmcError::Protocol(format!("{url} returned no {AUTH_TOKEN_HEADER} header"))
        })?;
        let session = location
            .or_else(|| body["@odata.id"].as_str().map(str::to_string))
            .ok_or_else(|| BmcError::Protocol(format!("{url} returned no session location")))?;

        let (system, manager) = match self.discover(&token).await {
            Ok(found) => found,
            Err(err) => {
                if let Err(close_err) = self.send(&token, Method::DELETE, &session, None).await {
                    tracing::warn!(
                        target: "bioscfg.redfish",
                        error = %close_err,
                        "failed to release session after discovery error"
                    );
                }
                return Err(err);
            }
        };

        tracing::debug!(
            target: "bioscfg.redfish",
            stage = "redfish.open",
            system = %system,
            manager = %manager
        );
        self.phase = Phase::Open(Endpoints {
            token,
            session,
            system,
            manager,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BmcError> {
        let endpoints = self.endpoints()?.clone();
        self.phase = Phase::Closed;
        let resp = self
            .send(&endpoints.token, Method::DELETE, &endpoints.session, None)
            .await?;
        ensure_success(resp)
            .await
            .map_err(HttpError::into_bmc_error)
    }

    async fn get_power_state(&mut self) -> Result<PowerState, BmcError> {
        let system = self.system().await?;
        system["PowerState"]
            .as_str()
            .map(|raw| PowerState::from(raw.to_string()))
            .ok_or_else(|| BmcError::Protocol("system reports no PowerState".into()))
    }

    async fn set_power_state(&mut self, action: PowerAction) -> Result<(), BmcError> {
        self.reset_system(reset_type(action)).await
    }

    async fn get_boot_device(&mut self) -> Result<BootDevice, BmcError> {
        let system = self.system().await?;
        let boot = &system["Boot"];
        let target = boot["BootSourceOverrideTarget"].as_str().unwrap_or("None");
        Ok(BootDevice::new(
            boot_target_to_device(target),
            boot["BootSourceOverrideEnabled"].as_str() == Some("Continuous"),
            boot["BootSourceOverrideMode"].as_str() == Some("UEFI"),
        ))
    }

    async fn set_boot_device(
        &mut self,
        device: &str,
        persistent: bool,
        efi_boot: bool,
    ) -> Result<(), BmcError> {
        let target = device_to_boot_target(device)?;
        let system = self.endpoints()?.system.clone();
        let body = json!({
            "Boot": {
                "BootSourceOverrideTarget": target,
                "BootSourceOverrideEnabled": if persistent { "Continuous" } else { "Once" },
                "BootSourceOverrideMode": if efi_boot { "UEFI" } else { "Legacy" },
            }
        });
        self.write(Method::PATCH, &system, body).await
    }

    async fn power_cycle_bmc(&mut self) -> Result<(), BmcError> {
        let path = format!("{}/Actions/Manager.Reset", self.endpoints()?.manager);
        self.write(Method::POST, &path, json!({ "ResetType": "GracefulRestart" }))
            .await
    }

    async fn host_booted(&mut self) -> Result<bool, BmcError> {
        let system = self.system().await?;
        if let Some(state) = system["BootProgress"]["LastState"].as_str() {
            return Ok(state == "OSRunning");
        }
        Ok(system["PowerState"].as_str() == Some("On"))
    }

    async fn reset_bios_config(&mut self) -> Result<(), BmcError> {
        let path = format!("{}/Bios/Actions/Bios.ResetBios", self.endpoints()?.system);
        self.write(Method::POST, &path, json!({})).await
    }

    async fn set_bios_config_from_file(&mut self, content: &str) -> Result<(), BmcError> {
        let path = format!("{}/Bios/Settings", self.endpoints()?.system);
        let parsed: Value = serde_json::from_str(content)
            .map_err(|e| BmcError::InvalidConfig(e.to_string()))?;

        // Accept either a full settings document or a bare attribute map.
        let attributes = match parsed.get("Attributes") {
            Some(attrs) => attrs.clone(),
            None => parsed,
        };
        if !attributes.is_object() {
            return Err(BmcError::InvalidConfig(
                "expected a JSON object of BIOS attributes".into(),
            ));
        }

        self.write(Method::PATCH, &path, json!({ "Attributes": attributes }))
            .await
    }
}
