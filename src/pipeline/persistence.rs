//! Durable storage of accepted submissions.

use crate::models::{PriorAuthRecord, PriorAuthRequest, RequestId};
use crate::store::{NewRequestRow, Store, StoreError};

/// Insert one pending request and return the stored row.
pub async fn insert(
    store: &dyn Store,
    candidate: &PriorAuthRequest,
    request_id: &RequestId,
) -> Result<PriorAuthRecord, StoreError> {
    store
        .insert_request(NewRequestRow {
            request_id: request_id.clone(),
            member_id: candidate.member_id.clone(),
            provider_npi: candidate.provider_npi.clone(),
            diagnosis_code: candidate.diagnosis_code.clone(),
            requested_service: candidate.requested_service.clone(),
        })
        .await
}
