//! Request identifier assignment.
//!
//! The next identifier is derived from the current row count. Two submissions
//! that count before either inserts receive the same identifier; the store's
//! UNIQUE constraint rejects the second insert.

use crate::models::RequestId;
use crate::store::{Store, StoreError};

pub async fn next_id(store: &dyn Store) -> Result<RequestId, StoreError> {
    let count = store.count_requests().await?;
    Ok(RequestId::from_sequence(count + 1))
}
