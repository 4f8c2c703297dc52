use std::path::Path;

use crate::allocation::{Allocation, AllocationError, Node};

/// Resolve a single allocation path.
///
/// # Returns
/// * `Ok(Some(node))` - The node at `path`
/// * `Ok(None)` - The backend reported that nothing exists at `path`
/// * `Err(AllocationError)` - Any other backend failure
pub async fn resolve_single<A>(alloc: &A, path: &Path) -> Result<Option<Node>, AllocationError>
where
    A: Allocation + ?Sized,
{
    match alloc.resolve(path).await {
        Ok(node) => Ok(Some(node)),
        Err(AllocationError::NotFound(_)) => {
            tracing::debug!("resolve_single: {} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
