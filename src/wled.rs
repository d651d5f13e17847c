//! WledClient - handles communication with the WLED JSON API.
//!
//! Covers the calls the mapper needs: reading the LED count, lighting a
//! single element with everything else dark, clearing the strip, the
//! continuous calibration blink, and pushing the finished ledmap back to the
//! controller.

use std::time::Duration;

use serde::Deserialize;

/// Default timeout for controller requests (2.5 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default connection timeout (1 second).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Hex color for a lit element.
const COLOR_ON: &str = "FFFFFF";

/// Hex color for a dark element.
const COLOR_OFF: &str = "000000";

/// On/off period of the calibration blink (1 second per phase).
pub const BLINK_PERIOD: Duration = Duration::from_secs(1);

/// Controller device information, from `GET /json/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct WledInfo {
    /// Device name
    #[serde(default)]
    pub name: Option<String>,
    /// Firmware version
    #[serde(default)]
    pub ver: Option<String>,
    /// LED hardware description
    pub leds: LedHardwareInfo,
}

/// LED hardware description nested in the info response.
#[derive(Debug, Clone, Deserialize)]
pub struct LedHardwareInfo {
    /// Number of addressable elements in the chain
    pub count: usize,
}

/// Errors that can occur talking to the controller.
#[derive(Debug, thiserror::Error)]
pub enum WledError {
    #[error("Controller unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Controller API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected controller response: {0}")]
    BadResponse(String),
}

/// Client for a WLED controller's HTTP JSON API.
#[derive(Debug, Clone)]
pub struct WledClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl WledClient {
    /// Create a client for the controller at `address` (host or host:port).
    ///
    /// A scheme may be included; plain addresses get `http://` prepended.
    pub fn new(address: &str) -> Result<Self, WledError> {
        let base_url = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };
        Self::with_base_url(base_url)
    }

    /// Create a client with an explicit base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(base_url: String) -> Result<Self, WledError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch device information from the controller.
    ///
    /// # Errors
    /// `WledError::Unreachable` if the request fails, `WledError::Api` on a
    /// non-success status, `WledError::BadResponse` if the body doesn't parse.
    pub async fn info(&self) -> Result<WledInfo, WledError> {
        let url = format!("{}/json/info", self.base_url);
        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| WledError::BadResponse(e.to_string()))
    }

    /// Number of addressable elements reported by the controller.
    pub async fn led_count(&self) -> Result<usize, WledError> {
        Ok(self.info().await?.leds.count)
    }

    /// Light element `index` at full color and set all others dark.
    ///
    /// `brightness` scales the whole strip (the master brightness channel),
    /// so the lit element renders at exactly the operator-chosen level.
    pub async fn set_one(
        &self,
        index: usize,
        count: usize,
        brightness: u8,
    ) -> Result<(), WledError> {
        // The "i" array is applied in order: darken the whole range first,
        // then overwrite the one lit element.
        let state = serde_json::json!({
            "on": true,
            "bri": brightness,
            "transition": 0,
            "seg": { "i": [0, count, COLOR_OFF, index, COLOR_ON] },
        });
        self.post_state(&state).await
    }

    /// Set every element dark without turning the strip off.
    pub async fn all_off(&self, count: usize) -> Result<(), WledError> {
        let state = serde_json::json!({
            "transition": 0,
            "seg": { "i": [0, count, COLOR_OFF] },
        });
        self.post_state(&state).await
    }

    /// Activate a previously uploaded ledmap by id.
    pub async fn select_ledmap(&self, id: u32) -> Result<(), WledError> {
        let state = serde_json::json!({ "ledmap": id });
        self.post_state(&state).await
    }

    /// Upload a ledmap JSON document to the controller's filesystem.
    ///
    /// WLED picks up `/ledmap.json` after the next reboot or
    /// [`select_ledmap`](Self::select_ledmap) call.
    pub async fn upload_ledmap(&self, ledmap_json: String) -> Result<(), WledError> {
        let url = format!("{}/edit", self.base_url);
        let part = reqwest::multipart::Part::text(ledmap_json)
            .file_name("ledmap.json")
            .mime_str("application/json")
            .map_err(|e| WledError::BadResponse(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("data", part);

        let response = self.http_client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    /// POST a state update to `/json/state`.
    async fn post_state(&self, state: &serde_json::Value) -> Result<(), WledError> {
        let url = format!("{}/json/state", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(state)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = api_error(response).await;
            log::warn!("Controller rejected state update: {}", err);
            return Err(err);
        }
        Ok(())
    }
}

/// Turn a non-success response into a `WledError::Api`.
async fn api_error(response: reqwest::Response) -> WledError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    WledError::Api { status, message }
}

/// Blink element 0 on and off forever, for aiming the camera.
///
/// Runs until the task driving it is cancelled. Controller errors are logged
/// and swallowed; a flaky blink must not kill calibration.
pub async fn blink_loop(client: WledClient, count: usize, brightness: u8) {
    loop {
        if let Err(e) = client.set_one(0, count, brightness).await {
            log::warn!("Calibration blink on-phase failed: {}", e);
        }
        tokio::time::sleep(BLINK_PERIOD).await;
        if let Err(e) = client.all_off(count).await {
            log::warn!("Calibration blink off-phase failed: {}", e);
        }
        tokio::time::sleep(BLINK_PERIOD).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_prepends_scheme() {
        let client = WledClient::new("192.168.1.50").unwrap();
        assert_eq!(client.base_url(), "http://192.168.1.50");
    }

    #[test]
    fn test_new_keeps_explicit_scheme() {
        let client = WledClient::new("http://wled.local/").unwrap();
        assert_eq!(client.base_url(), "http://wled.local");
    }

    #[test]
    fn test_info_response_parses() {
        let body = r#"{"name":"WLED","ver":"0.14.0","leds":{"count":50,"pwr":0}}"#;
        let info: WledInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.leds.count, 50);
        assert_eq!(info.name.as_deref(), Some("WLED"));
        assert_eq!(info.ver.as_deref(), Some("0.14.0"));
    }

    #[test]
    fn test_info_response_tolerates_missing_optionals() {
        let body = r#"{"leds":{"count":12}}"#;
        let info: WledInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.leds.count, 12);
        assert!(info.name.is_none());
    }

    #[test]
    fn test_wled_error_display() {
        let err = WledError::Api {
            status: 503,
            message: "busy".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("busy"));
    }
}
