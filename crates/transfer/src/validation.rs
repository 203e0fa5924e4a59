use std::path::{Component, Path};

use crate::TransferError;

/// Checks that `name` is a single plain file name.
///
/// Names come from directory listings and local file names; they are joined
/// onto a save directory, so anything that is not exactly one normal path
/// component is refused.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidPath(format!(
            "file name contains a separator: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidPath(format!(
            "not a plain file name: {name}"
        ))),
    }
}
