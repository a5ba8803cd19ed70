//! Lock mutations built from recorded reads.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::recorder::Recorder;
use dsx_protocol::Mutation;

/// Builds one lock per key: an update that rewrites the entity exactly as it
/// was read, conditioned on the version it was read at.
///
/// Fails with [`CoreError::MissingEntity`] on the first key the recorder has
/// not observed.
pub fn build_locks(recorder: &Recorder, keys: &[Key]) -> CoreResult<Vec<Mutation>> {
    keys.iter()
        .map(|key| {
            let observed = recorder
                .get(key)
                .ok_or_else(|| CoreError::MissingEntity { key: key.clone() })?;
            Ok(Mutation::update(observed.entity).with_base_version(observed.version))
        })
        .collect()
}
