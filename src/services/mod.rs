pub mod bins;
pub mod documents;
pub mod error;
pub mod extraction;
pub mod search;

use crate::{auth::Principal, models::bin::Bin};
use error::{ServiceError, ServiceResult};

pub use bins::BinService;
pub use documents::{DocumentService, Upload};
pub use extraction::{ExtractionDispatcher, ExtractionJob};
pub use search::SearchBridge;

/// Every mutating call re-derives ownership from the bin row.
pub(crate) fn ensure_owner(bin: &Bin, principal: &Principal) -> ServiceResult<()> {
    if bin.owner_id != principal.user_id {
        return Err(ServiceError::Forbidden("permission denied".into()));
    }
    Ok(())
}
