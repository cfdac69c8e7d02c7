//! Location of the infrastructure definitions under test.

use std::env;
use std::path::{Path, PathBuf};

use terraspan::workdir::{copy_to_temp, StagedWorkdir};

/// Environment override for the definitions root.
pub const INFRA_DIR_ENV: &str = "TERRASPAN_INFRA_DIR";

/// Root directory of the infrastructure definitions.
///
/// Defaults to `<repo>/infra`; CI can point `TERRASPAN_INFRA_DIR` at a
/// different checkout.
pub fn definitions_root() -> PathBuf {
    if let Ok(dir) = env::var(INFRA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join("infra")
}

/// Absolute path of one definition directory, e.g.
/// `module_dir("modules/network/aws")`.
pub fn module_dir(relative: &str) -> PathBuf {
    definitions_root().join(relative)
}

/// Stage a private temp copy of one definition directory, so concurrent
/// tests never share engine state.
pub fn stage(relative: &str) -> StagedWorkdir {
    let source = module_dir(relative);
    copy_to_temp(&source).unwrap_or_else(|error| {
        panic!(
            "failed to stage '{}' - set {} to the definitions checkout: {}",
            source.display(),
            INFRA_DIR_ENV,
            error
        )
    })
}
