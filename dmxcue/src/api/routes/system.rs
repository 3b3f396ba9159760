//! System routes: default USB device and attached device discovery.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::OriginIp;
use crate::api::models::{ApiResponse, UpdateDefaultUsbRequest};
use crate::api::server::AppState;
use crate::events::EventKind;
use crate::system::{UsbDeviceInfo, list_serial_usb_devices};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/defaultusb", get(get_default_usb).put(update_default_usb))
        .route("/usbinfo", get(list_usb_devices))
}

async fn get_default_usb(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<String>>> {
    let path = state.timelines.get_default_device_path().await?;
    Ok(Json(ApiResponse::new("Default USB device", path)))
}

async fn update_default_usb(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Json(request): Json<UpdateDefaultUsbRequest>,
) -> ApiResult<Json<ApiResponse<String>>> {
    let path = request.device_path.trim().to_string();
    state.timelines.set_default_device_path(&path).await?;

    state.events.record(
        EventKind::ConfigUpdated,
        &format!("Default USB device set to {path}"),
        &origin_ip,
    );
    Ok(Json(ApiResponse::new("Default USB device updated", path)))
}

async fn list_usb_devices() -> ApiResult<Json<ApiResponse<Vec<UsbDeviceInfo>>>> {
    let devices = list_serial_usb_devices().await.map_err(|e| {
        ApiError::internal(format!(
            "error getting information about USB serial devices: {e}"
        ))
    })?;
    Ok(Json(ApiResponse::new(
        format!("{} devices found", devices.len()),
        devices,
    )))
}
