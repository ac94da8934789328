//! `file` module
//!
//! ```lua
//! local file = require("file")
//! file.symlink("current/bin", "bin") -- relative to the plugin directory
//! ```

use std::io;
use std::path::{Path, PathBuf};

use mlua::{Lua, Table};

pub const MODULE: &str = "file";

/// `root` anchors relative paths, usually the plugin directory
pub fn module(lua: &Lua, root: Option<PathBuf>) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "symlink",
        lua.create_function(move |_, (src, dst): (String, String)| {
            let src = resolve(root.as_deref(), &src);
            let dst = resolve(root.as_deref(), &dst);
            tracing::debug!(
                target: "vfox::plugin",
                src = %src.display(),
                dst = %dst.display(),
                "symlink"
            );
            symlink(&src, &dst).map_err(|e| {
                mlua::Error::RuntimeError(format!(
                    "Failed to link {} to {}: {e}",
                    dst.display(),
                    src.display()
                ))
            })?;
            Ok(true)
        })?,
    )?;
    Ok(module)
}

fn resolve(root: Option<&Path>, path: &str) -> PathBuf {
    match root {
        Some(root) => root.join(path),
        None => PathBuf::from(path),
    }
}

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn module_lua(root: Option<PathBuf>) -> Lua {
        let lua = Lua::new();
        lua.globals()
            .set("file", module(&lua, root).unwrap())
            .unwrap();
        lua
    }

    #[test]
    fn test_module_shape() {
        let lua = module_lua(None);
        lua.load(r#"assert(type(file.symlink) == "function")"#)
            .exec()
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_relative_to_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target.txt"), "21").unwrap();

        let lua = module_lua(Some(dir.path().to_path_buf()));
        lua.load(r#"assert(file.symlink("target.txt", "link.txt") == true)"#)
            .exec()
            .unwrap();

        let link = dir.path().join("link.txt");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&link).unwrap(), "21");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_absolute_paths() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("sdk");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("current");

        let lua = module_lua(Some(PathBuf::from("/nonexistent")));
        lua.globals().set("target", target.to_str().unwrap()).unwrap();
        lua.globals().set("link", link.to_str().unwrap()).unwrap();
        lua.load("file.symlink(target, link)").exec().unwrap();
        assert!(link.is_dir());
    }

    #[test]
    fn test_symlink_existing_destination_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join("b"), "").unwrap();

        let lua = module_lua(Some(dir.path().to_path_buf()));
        let err = lua
            .load(r#"file.symlink("a", "b")"#)
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to link"));
    }
}
