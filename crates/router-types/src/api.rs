//! API types for the swap router HTTP surface.
//!
//! Defines the response envelope shared by every endpoint and the
//! structured error type with its HTTP status mapping.

use crate::error::ErrorCode;
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard envelope wrapping every endpoint's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	/// Whether the request was served successfully.
	pub success: bool,
	/// The payload on success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	/// Error details on failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ApiErrorBody>,
	/// Unix timestamp the envelope was produced.
	pub timestamp: u64,
	/// Request ID when one is known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
}

impl<T> ApiResponse<T> {
	/// Wraps a successful payload.
	pub fn ok(request_id: impl Into<String>, data: T) -> Self {
		Self {
			success: true,
			data: Some(data),
			error: None,
			timestamp: current_timestamp(),
			request_id: Some(request_id.into()),
		}
	}

	/// Wraps an error.
	pub fn err(error: ApiErrorBody, request_id: Option<String>) -> Self {
		Self {
			success: false,
			data: None,
			error: Some(error),
			timestamp: current_timestamp(),
			request_id,
		}
	}
}

/// Serialized error detail inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
	/// Stable machine code.
	pub code: ErrorCode,
	/// Human-readable description.
	pub message: String,
	/// Additional error context, e.g. the per-provider quotes behind a
	/// NO_VALID_QUOTES failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error with HTTP status mapping.
#[derive(Debug)]
pub struct ApiError {
	/// Stable machine code.
	pub code: ErrorCode,
	/// Human-readable description.
	pub message: String,
	/// Additional error context.
	pub details: Option<serde_json::Value>,
	/// Request ID when one is known.
	pub request_id: Option<String>,
}

impl ApiError {
	/// Creates an error with no associated request ID.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			details: None,
			request_id: None,
		}
	}

	/// Attaches the request ID the error belongs to.
	pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());
		self
	}

	/// Attaches structured error context.
	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);
		self
	}

	/// HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self.code {
			ErrorCode::InvalidRequest | ErrorCode::UnsupportedChain => 400,
			ErrorCode::NoValidQuotes => 503,
			_ => 500,
		}
	}

	/// Converts to the envelope form for JSON serialization.
	pub fn to_envelope(&self) -> ApiResponse<()> {
		ApiResponse::err(
			ApiErrorBody {
				code: self.code,
				message: self.message.clone(),
				details: self.details.clone(),
			},
			self.request_id.clone(),
		)
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.code, self.message)
	}
}

impl std::error::Error for ApiError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_envelope())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_mapping() {
		assert_eq!(ApiError::new(ErrorCode::InvalidRequest, "x").status_code(), 400);
		assert_eq!(ApiError::new(ErrorCode::UnsupportedChain, "x").status_code(), 400);
		assert_eq!(ApiError::new(ErrorCode::NoValidQuotes, "x").status_code(), 503);
		assert_eq!(ApiError::new(ErrorCode::InternalError, "x").status_code(), 500);
	}

	#[test]
	fn test_envelope_shape() {
		let envelope =
			ApiError::new(ErrorCode::NoValidQuotes, "all providers failed")
				.with_request_id("r1")
				.to_envelope();
		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["success"], false);
		assert_eq!(json["error"]["code"], "NO_VALID_QUOTES");
		assert_eq!(json["request_id"], "r1");
		assert!(json.get("data").is_none());
	}
}
