use std::path::{Component, Path, PathBuf};

use super::error::PluginError;

/// Logical path a plugin specifier refers to
///
/// `./` and `../` specifiers are joined onto `base`; anything else is taken
/// as given. The result is normalized lexically, the filesystem is never
/// consulted.
pub fn resolve(base: &Path, specifier: &str) -> Result<PathBuf, PluginError> {
    if specifier.trim().is_empty() {
        return Err(PluginError::InvalidSpecifier(specifier.to_string()));
    }

    let relative = specifier.starts_with("./") || specifier.starts_with("../");
    let joined = if relative {
        base.join(specifier)
    } else {
        PathBuf::from(specifier)
    };
    Ok(normalize(&joined))
}

/// Drop `.` segments and fold `..` into the preceding segment
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
