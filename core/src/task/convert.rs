//! Conversion between the queue's [`GenericTask`] and the typed
//! [`BiosControlTask`]. The two directions are exact inverses for any valid
//! task, and both hand back owned copies of the server and fault so the
//! envelope and the typed task never share state.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::WorkerError;
use crate::model::{Asset, BiosControlParameters, Fault, GenericTask, State, StatusLog};

#[derive(Debug, Clone, PartialEq)]
pub struct BiosControlTask {
    pub struct_version: String,
    pub id: Uuid,
    pub kind: String,
    pub state: State,
    pub status: StatusLog,
    pub parameters: BiosControlParameters,
    pub fault: Option<Fault>,
    pub facility_code: String,
    pub server: Option<Asset>,
    pub worker_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BiosControlTask {
    pub fn from_generic(task: &GenericTask) -> Result<Self, WorkerError> {
        let parameters = decode_parameters(&task.parameters)?;

        Ok(Self {
            struct_version: task.struct_version.clone(),
            id: task.id,
            kind: task.kind.clone(),
            state: task.state,
            status: task.status.clone(),
            parameters,
            fault: task.fault.clone(),
            facility_code: task.facility_code.clone(),
            server: task.server.clone(),
            worker_id: task.worker_id.clone(),
            trace_id: task.trace_id.clone(),
            span_id: task.span_id.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        })
    }

    pub fn to_generic(&self) -> Result<GenericTask, WorkerError> {
        let parameters = serde_json::to_value(&self.parameters)
            .map_err(|e| WorkerError::Conversion(format!("{e}: Task.Parameters")))?;

        Ok(GenericTask {
            struct_version: self.struct_version.clone(),
            id: self.id,
            kind: self.kind.clone(),
            state: self.state,
            status: self.status.clone(),
            parameters,
            fault: self.fault.clone(),
            facility_code: self.facility_code.clone(),
            server: self.server.clone(),
            worker_id: self.worker_id.clone(),
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }

    pub fn asset_id(&self) -> Uuid {
        self.parameters.asset_id
    }
}

/// Accepts the parameters either inline or as a string of serialized JSON,
/// which is how raw-message transports hand them over.
fn decode_parameters(raw: &Value) -> Result<BiosControlParameters, WorkerError> {
    let decoded = match raw {
        Value::Null => {
            return Err(WorkerError::InvalidParameters(
                "missing condition parameters".to_string(),
            ))
        }
        Value::String(s) => serde_json::from_str::<BiosControlParameters>(s),
        other => serde_json::from_value::<BiosControlParameters>(other.clone()),
    };

    let params = decoded.map_err(|e| WorkerError::InvalidParameters(e.to_string()))?;
    params.validate().map_err(WorkerError::InvalidParameters)?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use pretty_assertions::assert_eq;

    fn asset() -> Asset {
        Asset {
            bmc_address: "10.1.2.3".into(),
            bmc_username: "admin".into(),
            bmc_password: "pw".into(),
            vendor: "supermicro".into(),
            model: "x11".into(),
            serial: "S123".into(),
            facility_code: "ac1".into(),
            ..Asset::new(Uuid::new_v4())
        }
    }

    fn typed(params: BiosControlParameters) -> BiosControlTask {
        let mut generic = GenericTask::new("biosControl", serde_json::to_value(&params).unwrap());
        generic.server = Some(asset());
        generic.fault = Some(Fault(serde_json::json!({"delayDuration": "5s"})));
        generic.facility_code = "ac1".into();
        generic.trace_id = "abc".into();
        generic.status.append("queued");
        BiosControlTask::from_generic(&generic).unwrap()
    }

    #[test]
    fn round_trip_reset_config() {
        let task = typed(BiosControlParameters::reset_config(Uuid::new_v4()));
        let back = BiosControlTask::from_generic(&task.to_generic().unwrap()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn round_trip_set_config_with_completed_task() {
        let mut task = typed(BiosControlParameters::set_config(
            Uuid::new_v4(),
            "https://configs.example/bios/r6515.json",
        ));
        task.state = State::Succeeded;
        task.status.append("bios set");
        task.completed_at = Some(Utc::now());
        task.fault = None;

        let back = BiosControlTask::from_generic(&task.to_generic().unwrap()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn envelope_mutation_does_not_reach_typed_task() {
        let mut generic = GenericTask::new(
            "biosControl",
            serde_json::to_value(BiosControlParameters::reset_config(Uuid::new_v4())).unwrap(),
        );
        generic.server = Some(asset());
        generic.fault = Some(Fault(serde_json::json!({"panic": false})));

        let typed = BiosControlTask::from_generic(&generic).unwrap();

        if let Some(server) = generic.server.as_mut() {
            server.bmc_address = "192.168.0.1".into();
        }
        generic.fault = Some(Fault(serde_json::json!({"panic": true})));

        assert_eq!(typed.server.as_ref().unwrap().bmc_address, "10.1.2.3");
        assert_eq!(typed.fault, Some(Fault(serde_json::json!({"panic": false}))));
    }

    #[test]
    fn string_encoded_parameters_are_accepted() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"action":"reset-config","assetId":"{id}"}}"#);
        let generic = GenericTask::new("biosControl", Value::String(raw));
        let typed = BiosControlTask::from_generic(&generic).unwrap();
        assert_eq!(typed.parameters.action, Action::ResetConfig);
        assert_eq!(typed.asset_id(), id);
    }

    #[test]
    fn malformed_parameters_are_invalid() {
        let cases = vec![
            Value::Null,
            Value::String("{not json".into()),
            serde_json::json!({"action": "reset-config"}),
            serde_json::json!({"action": "reset-config", "assetId": "not-a-uuid"}),
            serde_json::json!([1, 2, 3]),
            serde_json::json!({
                "action": "set-config",
                "assetId": Uuid::nil(),
                "biosConfigUrl": "ftp://configs.example/x"
            }),
        ];

        for raw in cases {
            let generic = GenericTask::new("biosControl", raw.clone());
            let err = BiosControlTask::from_generic(&generic).unwrap_err();
            assert!(
                matches!(err, WorkerError::InvalidParameters(_)),
                "expected invalid parameters for {raw}, got {err:?}"
            );
            assert!(!err.is_retryable());
        }
    }
}
