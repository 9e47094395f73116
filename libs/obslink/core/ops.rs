//! Convenience operations
//!
//! Thin projections of [`ObsClient::send_request`] with fixed request types
//! and result-shape decoding. No protocol logic lives here; every wrapper
//! is a named request plus, at most, a connected-state log line.

use crate::core::client::ObsClient;
use crate::core::correlator::RequestOutcome;
use serde_json::{json, Value};
use tracing::warn;

impl ObsClient {
    /// Remote tool and protocol version information
    pub fn get_version(&self) -> RequestOutcome {
        self.send_request("GetVersion", None)
    }

    /// Start or stop recording
    pub fn toggle_recording(&self, start: bool) -> RequestOutcome {
        if !self.is_connected() {
            warn!("not connected, cannot toggle recording");
            return RequestOutcome::failure("not connected");
        }
        let request_type = if start { "StartRecording" } else { "StopRecording" };
        self.send_request(request_type, None)
    }

    /// Start or stop streaming
    pub fn toggle_streaming(&self, start: bool) -> RequestOutcome {
        if !self.is_connected() {
            warn!("not connected, cannot toggle streaming");
            return RequestOutcome::failure("not connected");
        }
        let request_type = if start { "StartStream" } else { "StopStream" };
        self.send_request(request_type, None)
    }

    /// Start or stop the virtual camera
    pub fn toggle_virtual_camera(&self, start: bool) -> RequestOutcome {
        if !self.is_connected() {
            warn!("not connected, cannot toggle virtual camera");
            return RequestOutcome::failure("not connected");
        }
        let request_type = if start {
            "StartVirtualCamera"
        } else {
            "StopVirtualCamera"
        };
        self.send_request(request_type, None)
    }

    /// Current recording status (`isRecording`, `isRecordingPaused`, ...)
    pub fn get_record_status(&self) -> RequestOutcome {
        self.send_request("GetRecordStatus", None)
    }

    /// Current streaming status (`isStreaming`, `isRecording`, ...)
    pub fn get_stream_status(&self) -> RequestOutcome {
        self.send_request("GetStreamStatus", None)
    }

    /// Recolor a source by updating its input settings
    pub fn set_input_color(&self, input_name: &str, color: u32) -> RequestOutcome {
        self.send_request(
            "SetInputSettings",
            Some(json!({
                "inputName": input_name,
                "inputSettings": { "color": color }
            })),
        )
    }

    /// Invoke a vendor-specific extension command
    pub fn call_vendor_request(
        &self,
        vendor_name: &str,
        request_type: &str,
        request_data: Value,
    ) -> RequestOutcome {
        self.send_request(
            "CallVendorRequest",
            Some(json!({
                "vendorName": vendor_name,
                "requestType": request_type,
                "requestData": request_data,
            })),
        )
    }

    /// Start the replay buffer through the vertical-canvas vendor plugin
    pub fn start_replay_buffer(&self) -> RequestOutcome {
        self.call_vendor_request("aitum-vertical-canvas", "start_backtrack", json!({}))
    }

    /// Fetch version information off the caller's thread
    pub fn get_version_async(&self, callback: impl FnOnce(RequestOutcome) + Send + 'static) {
        self.send_request_async("GetVersion", None, callback);
    }

    /// Start the virtual camera off the caller's thread
    ///
    /// The callback receives whether the camera actually started.
    pub fn start_virtual_camera_async(&self, callback: impl FnOnce(bool) + Send + 'static) {
        self.send_request_async("StartVirtualCamera", None, move |outcome| {
            callback(outcome.is_success());
        });
    }
}
