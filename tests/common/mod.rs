#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use clipsearch::{CancelToken, ClipResult, EmbeddingProvider};

pub const DIM: usize = 4;

/// 测试用编码器
///
/// 图片向量由文件名决定，文本向量由查询文本决定
#[derive(Default)]
pub struct FakeProvider {
    /// 提交的批次中包含这些文件名时整批失败
    fail_names: Mutex<HashSet<String>>,
    /// 设置后提取器返回 success = false
    reject_all: Mutex<bool>,
    /// 调用时取消该标记，用于模拟编码过程中收到中断
    cancel_on_call: Mutex<Option<CancelToken>>,
    /// 每次提交图片前调用
    before_images: Mutex<Option<Box<dyn FnMut() + Send>>>,
    pub calls: AtomicUsize,
    pub submitted: Mutex<Vec<Vec<String>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, name: &str) {
        self.fail_names.lock().unwrap().insert(name.to_string());
    }

    pub fn heal(&self) {
        self.fail_names.lock().unwrap().clear();
        *self.reject_all.lock().unwrap() = false;
    }

    pub fn reject_all(&self) {
        *self.reject_all.lock().unwrap() = true;
    }

    pub fn cancel_on_call(&self, token: CancelToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }

    pub fn before_images(&self, f: impl FnMut() + Send + 'static) {
        *self.before_images.lock().unwrap() = Some(Box::new(f));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 返回最后一次提交的图片文件名
    pub fn last_batch_names(&self) -> Vec<String> {
        let submitted = self.submitted.lock().unwrap();
        submitted.last().map(|batch| batch.iter().map(|p| file_name(p)).collect()).unwrap_or_default()
    }

    pub fn submitted_images(&self) -> usize {
        self.submitted.lock().unwrap().iter().map(|batch| batch.len()).sum()
    }
}

pub fn file_name(path: &str) -> String {
    Path::new(path).file_name().unwrap().to_string_lossy().to_string()
}

/// 将字符串映射为一个确定的向量
pub fn vector_of(s: &str) -> Vec<f32> {
    let mut v = vec![0.1f32; DIM];
    for (i, b) in s.bytes().enumerate() {
        v[i % DIM] += b as f32 / 255.;
    }
    v
}

impl EmbeddingProvider for FakeProvider {
    fn extract(&self, images: &[String], texts: &[String]) -> Result<ClipResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.cancel_on_call.lock().unwrap().take() {
            token.cancel();
        }
        if !images.is_empty() {
            if let Some(f) = self.before_images.lock().unwrap().as_mut() {
                f();
            }
            self.submitted.lock().unwrap().push(images.to_vec());
        }

        if *self.reject_all.lock().unwrap() {
            return Ok(ClipResult { success: false, error_message: "model not loaded".into(), ..Default::default() });
        }
        let fail_names = self.fail_names.lock().unwrap();
        if images.iter().any(|p| fail_names.contains(&file_name(p))) {
            bail!("failed to load image");
        }

        Ok(ClipResult {
            success: true,
            processed_images: images.len() as u32,
            processed_texts: texts.len() as u32,
            image_embeddings: images.iter().map(|p| vector_of(&file_name(p))).collect(),
            text_embeddings: texts.iter().map(|t| vector_of(t)).collect(),
            image_paths_processed: images.to_vec(),
            texts_processed: texts.to_vec(),
            ..Default::default()
        })
    }
}

/// 在目录中创建 `n` 张图片，文件名为 `img_00.jpg` 起
pub fn create_images(dir: &Path, n: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..n {
        fs::write(dir.join(format!("img_{:02}.jpg", i)), b"").unwrap();
    }
}
