//! 已编码图片记录
//!
//! 记录每个图片集合中已经写入向量库的图片路径，使重复编码成为增量操作。
//! 持久化格式为一个 JSON 对象：集合名 => 路径数组。

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use log::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registry {
    collections: BTreeMap<String, BTreeSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载记录
    ///
    /// 文件不存在或内容损坏时返回空记录，不会返回错误
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("已编码记录不存在: {}", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("读取已编码记录失败，视为空记录: {}: {}", path.display(), e);
                return Self::new();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(collections) => Self { collections },
            Err(e) => {
                warn!("已编码记录已损坏，视为空记录: {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// 覆盖保存到文件
    ///
    /// 先写入同目录下的临时文件再重命名，写入中断不会破坏旧文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");

        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.collections)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, path)?;
        debug!("已保存已编码记录: {}", path.display());
        Ok(())
    }

    pub fn is_encoded(&self, collection: &str, id: &str) -> bool {
        self.collections.get(collection).is_some_and(|set| set.contains(id))
    }

    /// 标记图片已编码，返回是否为新记录
    pub fn mark_encoded(&mut self, collection: &str, id: impl Into<String>) -> bool {
        self.collections.entry(collection.to_owned()).or_default().insert(id.into())
    }

    /// 返回集合中已编码的图片
    pub fn encoded(&self, collection: &str) -> Option<&BTreeSet<String>> {
        self.collections.get(collection)
    }

    /// 使用另一份记录中的集合替换本记录中的同名集合
    pub fn replace_collection(&mut self, collection: &str, other: &Registry) {
        match other.collections.get(collection) {
            Some(set) => {
                self.collections.insert(collection.to_owned(), set.clone());
            }
            None => {
                self.collections.remove(collection);
            }
        }
    }

    /// 返回所有集合及其已编码数量
    pub fn collections(&self) -> impl Iterator<Item = (&str, usize)> {
        self.collections.iter().map(|(name, set)| (name.as_str(), set.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn load_missing_file() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::load(dir.path().join("encoded.json"));
        assert!(registry.is_empty());
    }

    #[test]
    fn load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encoded.json");
        fs::write(&path, b"{\"pets\": [\"a.jpg\"").unwrap();
        let registry = Registry::load(&path);
        assert!(registry.is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("encoded.json");

        let mut registry = Registry::new();
        assert!(registry.mark_encoded("pets", "/img/cat.jpg"));
        assert!(registry.mark_encoded("pets", "/img/dog.png"));
        assert!(!registry.mark_encoded("pets", "/img/cat.jpg"));
        registry.mark_encoded("cars", "/img/car.webp");
        registry.save(&path).unwrap();

        let loaded = Registry::load(&path);
        assert_eq!(loaded, registry);
        assert!(loaded.is_encoded("pets", "/img/dog.png"));
        assert!(!loaded.is_encoded("cars", "/img/dog.png"));
        assert!(!loaded.is_encoded("trees", "/img/dog.png"));
        assert!(!dir.path().join("nested").join("encoded.json.tmp").exists());
    }

    #[test]
    fn document_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encoded.json");

        let mut registry = Registry::new();
        registry.mark_encoded("pets", "b.jpg");
        registry.mark_encoded("pets", "a.jpg");
        registry.save(&path).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({ "pets": ["a.jpg", "b.jpg"] }));
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encoded.json");

        let mut first = Registry::new();
        first.mark_encoded("pets", "a.jpg");
        first.save(&path).unwrap();

        let mut second = Registry::new();
        second.mark_encoded("cars", "b.jpg");
        second.save(&path).unwrap();

        assert_eq!(Registry::load(&path), second);
    }

    #[test]
    fn replace_single_collection() {
        let mut disk = Registry::new();
        disk.mark_encoded("cars", "car.jpg");
        disk.mark_encoded("pets", "old.jpg");

        let mut run = Registry::new();
        run.mark_encoded("pets", "old.jpg");
        run.mark_encoded("pets", "new.jpg");

        disk.replace_collection("pets", &run);
        assert!(disk.is_encoded("cars", "car.jpg"));
        assert!(disk.is_encoded("pets", "new.jpg"));
        assert_eq!(disk.collections().collect::<Vec<_>>(), vec![("cars", 1), ("pets", 2)]);
    }
}
