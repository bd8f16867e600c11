//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::InventoryNotFound
            | Self::ReservationNotFound
            | Self::PaymentNotFound
            | Self::ProductNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (caller may retry with backoff)
            Self::AlreadyExists | Self::InventoryConflict => StatusCode::CONFLICT,

            // 412 Precondition Failed (invariant violations, compensate then retry)
            Self::InvalidStatusTransition
            | Self::OrderNotCancellable
            | Self::InsufficientStock
            | Self::PaymentNotPending
            | Self::PaymentNotRefundable => StatusCode::PRECONDITION_FAILED,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::CircuitOpen
            | Self::Unavailable
            | Self::TimeoutError
            | Self::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::CacheError
            | Self::PublishError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::OrderNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::ReservationNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(ErrorCode::AlreadyExists.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InventoryConflict.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_precondition_status() {
        assert_eq!(
            ErrorCode::InvalidStatusTransition.http_status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            ErrorCode::InsufficientStock.http_status(),
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn test_unavailable_status() {
        assert_eq!(
            ErrorCode::CircuitOpen.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::ResourceExhausted.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_error_status() {
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::OrderEmpty.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::CurrencyMismatch.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
