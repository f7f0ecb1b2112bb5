//! 将只读的内置资源目录复制到可写目录
//!
//! 目标已存在时直接返回，不会重复复制。复制中的 I/O 错误直接向上抛出。

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

/// 列出资源目录下的所有集合，即一级子目录
pub fn list_collections(asset_root: &Path) -> io::Result<Vec<String>> {
    let mut names = vec![];
    for entry in fs::read_dir(asset_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// 检查资源名称，只允许单个普通路径分量
pub fn check_name(name: &str) -> io::Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(io::Error::new(io::ErrorKind::InvalidInput, format!("无效的资源名称: {:?}", name))),
    }
}

/// 将 `asset_root/name` 目录复制到 `dest_root/name`，返回目标路径
pub fn materialize_folder(asset_root: &Path, name: &str, dest_root: &Path) -> io::Result<PathBuf> {
    check_name(name)?;
    let dest = dest_root.join(name);
    if dest.exists() {
        debug!("目录已存在: {}", dest.display());
        return Ok(dest);
    }

    let source = asset_root.join(name);
    if !source.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("资源目录不存在: {}", source.display()),
        ));
    }

    // 先复制到临时目录再重命名，复制中断不会留下不完整的目标目录
    let tmp = dest_root.join(format!(".{}.tmp", name));
    if tmp.exists() {
        fs::remove_dir_all(&tmp)?;
    }
    fs::create_dir_all(&tmp)?;

    let mut copied = 0;
    for entry in WalkDir::new(&source).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(&source).map_err(io::Error::other)?;
        let target = tmp.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    fs::rename(&tmp, &dest)?;

    info!("已复制资源目录 {} 到 {}，共 {} 个文件", source.display(), dest.display(), copied);
    Ok(dest)
}

/// 将单个资源文件复制到 `dest_root/name`，返回目标路径
pub fn materialize_file(asset_root: &Path, name: &str, dest_root: &Path) -> io::Result<PathBuf> {
    check_name(name)?;
    let dest = dest_root.join(name);
    if dest.exists() {
        debug!("文件已存在: {}", dest.display());
        return Ok(dest);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::copy(asset_root.join(name), &tmp)?;
    fs::rename(&tmp, &dest)?;

    info!("已复制资源文件 {} 到 {}", name, dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn asset_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let pets = dir.path().join("pets");
        fs::create_dir_all(pets.join("cats")).unwrap();
        fs::write(pets.join("dog.jpg"), b"dog").unwrap();
        fs::write(pets.join("cats").join("cat.png"), b"cat").unwrap();
        fs::create_dir(dir.path().join("cars")).unwrap();
        fs::write(dir.path().join("model.gguf"), b"model").unwrap();
        dir
    }

    #[test]
    fn list() {
        let assets = asset_tree();
        assert_eq!(list_collections(assets.path()).unwrap(), vec!["cars", "pets"]);
    }

    #[test]
    fn copy_folder_once() {
        let assets = asset_tree();
        let dest = TempDir::new().unwrap();

        let path = materialize_folder(assets.path(), "pets", dest.path()).unwrap();
        assert_eq!(path, dest.path().join("pets"));
        assert_eq!(fs::read(path.join("dog.jpg")).unwrap(), b"dog");
        assert_eq!(fs::read(path.join("cats").join("cat.png")).unwrap(), b"cat");

        // 已存在时不会覆盖
        fs::write(path.join("dog.jpg"), b"changed").unwrap();
        materialize_folder(assets.path(), "pets", dest.path()).unwrap();
        assert_eq!(fs::read(path.join("dog.jpg")).unwrap(), b"changed");
        assert!(!dest.path().join(".pets.tmp").exists());
    }

    #[test]
    fn copy_missing_folder() {
        let assets = asset_tree();
        let dest = TempDir::new().unwrap();
        let err = materialize_folder(assets.path(), "trees", dest.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!dest.path().join("trees").exists());
    }

    #[test]
    fn copy_file_once() {
        let assets = asset_tree();
        let dest = TempDir::new().unwrap();
        let path = materialize_file(assets.path(), "model.gguf", dest.path()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"model");
        assert!(materialize_file(assets.path(), "missing.gguf", dest.path()).is_err());
    }

    #[test]
    fn reject_path_like_names() {
        let assets = asset_tree();
        let root = TempDir::new().unwrap();
        let dest = root.path().join("collections");
        fs::create_dir(&dest).unwrap();

        for name in ["", ".", "..", "../pets", "pets/cats", "/etc"] {
            let err = materialize_folder(assets.path(), name, &dest).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{:?}", name);
            let err = materialize_file(assets.path(), name, &dest).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{:?}", name);
        }
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
        assert!(!root.path().join("pets").exists());
    }
}
