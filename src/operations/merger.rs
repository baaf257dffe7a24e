use log::debug;

use crate::context::PersistenceContext;
use crate::core::Result;
use crate::entity::Entity;
use crate::proxy::EntityProxy;

/// Writes the dirty properties of a managed record with one update through
/// `context`, then clears its dirty map. A clean record issues nothing.
pub async fn merge<T: Entity>(
    context: &PersistenceContext,
    proxy: &mut EntityProxy<T>,
) -> Result<()> {
    let dirty = proxy.dirty_metas();
    if dirty.is_empty() {
        debug!("Entity '{}' has no dirty property", proxy.meta().type_name);
        return Ok(());
    }
    debug!(
        "Merging {} dirty properties of entity '{}'",
        dirty.len(),
        proxy.meta().type_name
    );
    context.push_update(proxy.target(), &dirty).await?;
    proxy.clear_dirty();
    Ok(())
}
