use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::metrics;

/// CLIP 向量提取器
///
/// 对一批图片和文本进行编码，每个输入返回一个定长向量。
/// 调用是阻塞的，耗时与批大小成正比，异步代码中应放到 `spawn_blocking` 中执行。
pub trait EmbeddingProvider: Send + Sync {
    fn extract(&self, images: &[String], texts: &[String]) -> Result<ClipResult>;
}

/// 提取结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipResult {
    pub success: bool,
    pub error_message: String,
    pub processed_images: u32,
    pub processed_texts: u32,

    /// 以下耗时单位均为秒
    pub folder_scan_time: f64,
    pub total_image_load_time: f64,
    pub total_image_encode_time: f64,
    pub total_text_encode_time: f64,
    pub total_processing_time: f64,

    pub image_embeddings: Vec<Vec<f32>>,
    pub text_embeddings: Vec<Vec<f32>>,
    /// 与 `image_embeddings` 一一对应的图片路径
    pub image_paths_processed: Vec<String>,
    pub texts_processed: Vec<String>,
}

impl ClipResult {
    /// 将结果转换为错误
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else if self.error_message.is_empty() {
            Err(anyhow!("编码失败"))
        } else {
            Err(anyhow!("编码失败: {}", self.error_message))
        }
    }

    /// 返回 `(图片路径, 向量)` 列表
    ///
    /// 提取器返回了 `image_paths_processed` 时以其为准，
    /// 否则只能假设向量按提交顺序排列，此时数量必须一致。
    pub fn tagged_images(self, submitted: &[String]) -> Result<Vec<(String, Vec<f32>)>> {
        let embeddings = self.image_embeddings;
        if self.image_paths_processed.len() == embeddings.len() && !embeddings.is_empty() {
            return Ok(self.image_paths_processed.into_iter().zip(embeddings).collect());
        }
        if embeddings.is_empty() {
            return Ok(vec![]);
        }
        if embeddings.len() != submitted.len() {
            bail!(
                "无法确定向量对应的图片: 提交 {} 张，返回 {} 个向量",
                submitted.len(),
                embeddings.len()
            );
        }
        Ok(submitted.iter().cloned().zip(embeddings).collect())
    }
}

/// 外部提取程序的参数
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// 提取程序路径
    pub extractor: PathBuf,
    /// 模型文件路径
    pub model_path: PathBuf,
    pub n_threads: u32,
    pub verbose: u32,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    model_path: &'a str,
    image_paths: &'a [String],
    texts: &'a [String],
    n_threads: u32,
    verbose: u32,
}

/// 通过子进程调用外部 CLIP 提取程序
///
/// 请求以 JSON 写入 stdin，结果以 JSON 从 stdout 读取
pub struct CommandProvider {
    options: ProviderOptions,
}

impl CommandProvider {
    pub fn new(options: ProviderOptions) -> Self {
        Self { options }
    }
}

impl EmbeddingProvider for CommandProvider {
    fn extract(&self, images: &[String], texts: &[String]) -> Result<ClipResult> {
        let model_path = self.options.model_path.to_string_lossy();
        let request = ExtractRequest {
            model_path: &model_path,
            image_paths: images,
            texts,
            n_threads: self.options.n_threads.max(1),
            verbose: self.options.verbose,
        };

        debug!("调用提取程序: {} 张图片, {} 条文本", images.len(), texts.len());
        let start = Instant::now();

        let mut child = Command::new(&self.options.extractor)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("无法启动提取程序 {}", self.options.extractor.display()))?;

        let written = child.stdin.take().context("无法打开提取程序 stdin").and_then(|mut stdin| {
            serde_json::to_writer(&mut stdin, &request)?;
            stdin.flush()?;
            Ok(())
        });
        if let Err(e) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.context("无法向提取程序写入请求"));
        }

        let output = child.wait_with_output()?;
        metrics::observe_provider_duration(start.elapsed().as_secs_f64());

        if !output.status.success() {
            bail!(
                "提取程序退出异常 ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let result: ClipResult =
            serde_json::from_slice(&output.stdout).context("无法解析提取程序输出")?;
        debug!(
            "提取完成: {} 张图片, {} 条文本, 耗时 {:.3}s",
            result.processed_images, result.processed_texts, result.total_processing_time
        );
        Ok(result)
    }
}
