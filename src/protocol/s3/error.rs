//! Mapping of AWS SDK errors onto [`StorageError`]

use crate::protocol::StorageError;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Classify an SDK failure for a request against `bucket`/`key`
pub(crate) fn classify<E, R>(error: SdkError<E, R>, bucket: &str, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &error {
        SdkError::ServiceError(service) => {
            let err = service.err();
            let code = err.code().unwrap_or("Unknown").to_string();
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&error).to_string());
            from_service_code(&code, message, bucket, key)
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            StorageError::Network(DisplayErrorContext(&error).to_string())
        }
        _ => StorageError::Service {
            code: "Sdk".to_string(),
            message: DisplayErrorContext(&error).to_string(),
        },
    }
}

/// HEAD responses carry no body, so a missing object surfaces as a bare `NotFound`
pub(crate) fn from_service_code(
    code: &str,
    message: String,
    bucket: &str,
    key: &str,
) -> StorageError {
    match code {
        "NoSuchKey" | "NotFound" | "404" => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        "NoSuchBucket" => StorageError::NoSuchBucket(bucket.to_string()),
        "AccessDenied" | "Forbidden" | "403" => StorageError::AccessDenied(message),
        "InvalidAccessKeyId" => StorageError::InvalidAccessKey(message),
        _ => StorageError::Service {
            code: code.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_object_codes() {
        for code in ["NoSuchKey", "NotFound", "404"] {
            let err = from_service_code(code, String::new(), "b", "k");
            assert!(err.is_not_found(), "{code} should map to NotFound");
        }
    }

    #[test]
    fn test_credential_codes() {
        assert!(matches!(
            from_service_code("AccessDenied", "denied".to_string(), "b", "k"),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            from_service_code("InvalidAccessKeyId", "bad".to_string(), "b", "k"),
            StorageError::InvalidAccessKey(_)
        ));
    }

    #[test]
    fn test_bucket_and_generic_codes() {
        assert_eq!(
            from_service_code("NoSuchBucket", "gone".to_string(), "outputs", "k"),
            StorageError::NoSuchBucket("outputs".to_string())
        );
        assert_eq!(
            from_service_code("SlowDown", "rate".to_string(), "b", "k"),
            StorageError::Service {
                code: "SlowDown".to_string(),
                message: "rate".to_string()
            }
        );
    }
}
