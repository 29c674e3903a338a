use once_core::{BlockFlags, GuardState, Variant};
use serde::Serialize;

// ─── Validation Constants ───────────────────────────────────────────────────

const VALID_VARIANTS: &[&str] = &["blocking", "cooperative"];

/// Blocking callers are OS threads.
pub const MAX_BLOCKING_CALLERS: usize = 1024;

pub const MAX_COOPERATIVE_CALLERS: usize = 100_000;

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn validate_variant(variant: &str) -> Result<Variant, String> {
    variant.parse::<Variant>().map_err(|_| {
        format!(
            "Invalid variant '{}'. Must be one of: {}",
            variant,
            VALID_VARIANTS.join(", ")
        )
    })
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StressRequest {
    pub variant: String,
    pub callers: usize,
    pub reentrant: bool,
    pub fail: bool,
}

impl StressRequest {
    pub fn validate(&self) -> Result<Variant, String> {
        let variant = validate_variant(&self.variant)?;
        if self.callers == 0 {
            return Err("callers must be greater than 0".to_string());
        }
        let limit = match variant {
            Variant::Blocking => MAX_BLOCKING_CALLERS,
            Variant::Cooperative => MAX_COOPERATIVE_CALLERS,
        };
        if self.callers > limit {
            return Err(format!(
                "callers must be at most {} for the {} variant",
                limit, variant
            ));
        }
        Ok(variant)
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub is_asynchronous: bool,
    pub is_failable: bool,
    pub variant: Variant,
}

impl From<BlockFlags> for ClassifyResponse {
    fn from(flags: BlockFlags) -> Self {
        Self {
            is_asynchronous: flags.is_asynchronous,
            is_failable: flags.is_failable,
            variant: Variant::select(flags),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StressReport {
    pub site: String,
    pub variant: Variant,
    pub callers: usize,
    /// Times the guarded block actually ran
    pub executions: usize,
    /// Callers that got `Some`
    pub granted: usize,
    /// Callers that got `None`
    pub skipped: usize,
    /// Callers that got the block's error
    pub failures: usize,
    /// Re-entrant calls made from inside the block that were skipped
    pub nested_skipped: usize,
    pub final_state: GuardState,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(variant: &str, callers: usize) -> StressRequest {
        StressRequest {
            variant: variant.to_string(),
            callers,
            reentrant: false,
            fail: false,
        }
    }

    #[test]
    fn test_validate_variant() {
        assert_eq!(validate_variant("blocking"), Ok(Variant::Blocking));
        assert_eq!(validate_variant("Cooperative"), Ok(Variant::Cooperative));
        let err = validate_variant("fibers").unwrap_err();
        assert!(err.contains("blocking, cooperative"));
    }

    #[test]
    fn test_stress_request_limits() {
        assert!(request("blocking", 0).validate().is_err());
        assert!(request("blocking", MAX_BLOCKING_CALLERS).validate().is_ok());
        assert!(request("blocking", MAX_BLOCKING_CALLERS + 1).validate().is_err());
        assert!(request("cooperative", MAX_BLOCKING_CALLERS + 1).validate().is_ok());
        assert!(request("cooperative", MAX_COOPERATIVE_CALLERS + 1).validate().is_err());
    }

    #[test]
    fn test_classify_response_picks_variant() {
        let response = ClassifyResponse::from(BlockFlags {
            is_asynchronous: true,
            is_failable: false,
        });
        assert_eq!(response.variant, Variant::Cooperative);
    }

    #[test]
    fn test_api_response_shape() {
        let ok = serde_json::to_value(ApiResponse::ok(1)).unwrap();
        assert_eq!(ok, serde_json::json!({ "success": true, "data": 1 }));

        let err = serde_json::to_value(ApiResponse::<()>::err("nope")).unwrap();
        assert_eq!(err, serde_json::json!({ "success": false, "error": "nope" }));
    }
}
