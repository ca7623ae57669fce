//! Claimed tenant vs. explicit `X-Tenant-ID` header cross-check (§4.1): a
//! caller may scope a request to a tenant by header, but it must agree with
//! the tenant carried in their auth claim.

use ragflow_core::error::RagError;
use uuid::Uuid;

/// Validates that an explicit `X-Tenant-ID` header, if present, matches the
/// tenant id from the caller's claim. Absent header is not a mismatch — it
/// just means the request relies on the claim alone.
pub fn check_tenant_header(claimed_tenant_id: Uuid, header_value: Option<&str>) -> Result<(), RagError> {
    let Some(header_value) = header_value else {
        return Ok(());
    };
    match header_value.parse::<Uuid>() {
        Ok(header_tenant_id) if header_tenant_id == claimed_tenant_id => Ok(()),
        Ok(_) => Err(RagError::PermissionDenied("X-Tenant-ID header does not match authenticated tenant".into())),
        Err(_) => Err(RagError::InvalidArgument("X-Tenant-ID header is not a valid tenant id".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_header_is_not_a_mismatch() {
        assert!(check_tenant_header(Uuid::new_v4(), None).is_ok());
    }

    #[test]
    fn matching_header_passes() {
        let tenant_id = Uuid::new_v4();
        assert!(check_tenant_header(tenant_id, Some(&tenant_id.to_string())).is_ok());
    }

    #[test]
    fn mismatched_header_is_permission_denied() {
        let err = check_tenant_header(Uuid::new_v4(), Some(&Uuid::new_v4().to_string())).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn malformed_header_is_invalid_argument() {
        let err = check_tenant_header(Uuid::new_v4(), Some("not-a-uuid")).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }
}
