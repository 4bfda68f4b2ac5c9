use crate::error::{Result, TransformError};
use crate::identity::IdentityMap;
use crate::references::find_references;
use zunder_models::Bundle;

/// Rewrite every reference in `transaction` that resolves through `identities`.
///
/// References that resolve to nothing are left byte-identical. Returns the number of
/// references that were rewritten.
pub fn rewrite(transaction: &mut Bundle, identities: &IdentityMap) -> Result<usize> {
    let mut rewritten = 0;

    for (index, entry) in transaction.entries_mut().iter_mut().enumerate() {
        let resource = match entry.resource.as_mut() {
            Some(resource) if !resource.is_null() => resource,
            _ => return Err(TransformError::MissingResource { index }),
        };

        for mut slot in find_references(resource) {
            let Some(urn) = identities.resolve(slot.get()) else {
                continue;
            };
            if urn != slot.get() {
                tracing::trace!(
                    path = slot.path(),
                    from = slot.get(),
                    to = urn,
                    "Rewriting reference"
                );
                slot.set(urn);
                rewritten += 1;
            }
        }
    }

    Ok(rewritten)
}
