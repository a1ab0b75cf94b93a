//! Application listing, foreground app and launching

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Capability;
use crate::error::ApiError;
use crate::operation::{SsapOperation, Subscribable};
use crate::types::{Acknowledgement, App};

/// List installed applications
pub struct ListAppsOperation;

#[derive(Deserialize)]
struct ListAppsResponse {
    #[serde(default)]
    apps: Vec<App>,
}

impl SsapOperation for ListAppsOperation {
    type Request = ();
    type Response = Vec<App>;

    const CAPABILITY: Capability = Capability::ListApps;

    fn parse_response(payload: &Value) -> Result<Self::Response, ApiError> {
        let response: ListAppsResponse =
            serde_json::from_value(payload.clone()).map_err(|e| ApiError::Parse {
                capability: Self::CAPABILITY.name(),
                reason: e.to_string(),
            })?;
        Ok(response.apps)
    }
}

/// Get the application in the foreground
///
/// The TV reports only the app id; [`App::name`] is left empty.
pub struct GetForegroundAppOperation;

#[derive(Deserialize)]
struct ForegroundAppResponse {
    #[serde(rename = "appId")]
    app_id: String,
}

impl SsapOperation for GetForegroundAppOperation {
    type Request = ();
    type Response = App;

    const CAPABILITY: Capability = Capability::GetForegroundApp;

    fn parse_response(payload: &Value) -> Result<Self::Response, ApiError> {
        let response: ForegroundAppResponse =
            serde_json::from_value(payload.clone()).map_err(|e| ApiError::Parse {
                capability: Self::CAPABILITY.name(),
                reason: e.to_string(),
            })?;
        Ok(App::new(response.app_id))
    }
}

impl Subscribable for GetForegroundAppOperation {}

/// Launch an application, bringing it to the foreground
pub struct LaunchAppOperation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchAppRequest {
    pub id: String,
}

impl SsapOperation for LaunchAppOperation {
    type Request = LaunchAppRequest;
    type Response = Acknowledgement;

    const CAPABILITY: Capability = Capability::Launch;

    fn build_payload(request: &Self::Request) -> Result<Option<Value>, ApiError> {
        if request.id.is_empty() {
            return Err(ApiError::InvalidParameter("app id must not be empty".to_string()));
        }
        serde_json::to_value(request)
            .map(Some)
            .map_err(|e| ApiError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_apps_payload_and_parsing() {
        assert_eq!(ListAppsOperation::build_payload(&()).unwrap(), None);

        let payload = json!({
            "returnValue": true,
            "apps": [
                { "id": "netflix", "title": "Netflix" },
                { "id": "com.webos.app.hdmi1", "title": "HDMI 1" },
            ],
        });
        let apps = ListAppsOperation::parse_response(&payload).unwrap();
        assert_eq!(
            apps,
            vec![
                App::new("netflix").with_name("Netflix"),
                App::new("com.webos.app.hdmi1").with_name("HDMI 1"),
            ]
        );
    }

    #[test]
    fn test_list_apps_rejects_malformed_entries() {
        let payload = json!({ "apps": [{ "title": "No id" }] });
        let error = ListAppsOperation::parse_response(&payload).unwrap_err();
        assert!(matches!(error, ApiError::Parse { capability: "listApps", .. }));
    }

    #[test]
    fn test_foreground_app_parsing() {
        let payload = json!({ "appId": "youtube.leanback.v4", "windowId": "" });
        let app = GetForegroundAppOperation::parse_response(&payload).unwrap();
        assert_eq!(app, App::new("youtube.leanback.v4"));

        assert!(GetForegroundAppOperation::parse_response(&Value::Null).is_err());
    }

    #[test]
    fn test_launch_payload() {
        let request = LaunchAppRequest {
            id: "netflix".to_string(),
        };
        assert_eq!(
            LaunchAppOperation::build_payload(&request).unwrap(),
            Some(json!({ "id": "netflix" }))
        );

        let empty = LaunchAppRequest { id: String::new() };
        assert!(matches!(
            LaunchAppOperation::build_payload(&empty),
            Err(ApiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_launch_accepts_generic_acknowledgement() {
        assert!(LaunchAppOperation::parse_response(&json!({ "returnValue": true })).is_ok());
        assert!(LaunchAppOperation::parse_response(&Value::Null).is_ok());
    }
}
