//! # 结果展示
//!
//! ## 设计思路
//!
//! 展示层只消费核心给出的进度、结果地址与错误消息：
//!
//! - `ConsoleObserver`：把回调打印到终端
//! - `resolve_result_url`：服务端返回 `/files/...` 相对路径，按根地址补全
//! - `download_results`：把结果逐个下载到目录（分块读取，限制单文件体积）

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::error::AppError;
use crate::job::{JobError, JobObserver, JobState, JobStatus, redact_url_for_log};

/// 单个结果文件的体积上限。
const MAX_RESULT_BYTES: u64 = 100 * 1024 * 1024;
const CHUNK_READ_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_EXTENSION: &str = "png";

/// 终端观察者。
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl JobObserver for ConsoleObserver {
    fn on_progress(&self, progress: u8, state: JobState) {
        println!("⏳ {:>3}%  {}", progress, state.as_str());
    }

    fn on_finished(&self, results: &[String]) {
        println!("✅ 完成，共 {} 个结果", results.len());
        for (idx, result) in results.iter().enumerate() {
            println!("  [{}] {}", idx + 1, result);
        }
    }

    fn on_failed(&self, error: &JobError) {
        eprintln!("❌ {}", error);
    }
}

/// 单次状态查询的文本形式。
pub fn render_status(job_id: &str, status: &JobStatus) -> String {
    let mut out = format!("job {}: {} {}%", job_id, status.state.as_str(), status.progress);
    if let Some(error) = &status.error {
        out.push_str(&format!("\n  error: {}", error));
    }
    for result in &status.results {
        out.push_str(&format!("\n  result: {}", result));
    }
    out
}

/// 把服务端给出的结果地址补全为绝对地址；已是绝对地址时原样返回。
pub fn resolve_result_url(base: &Url, raw: &str) -> Result<Url, AppError> {
    base.join(raw.trim())
        .map_err(|e| AppError::Download(format!("结果地址无效 '{}': {}", raw, e)))
}

/// 由结果地址推导本地文件名，`index` 从 1 开始。
pub fn result_file_name(url: &Url, index: usize) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != ".." && name.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| format!("result_{}.{}", index, FALLBACK_EXTENSION))
}

/// 下载全部结果到 `dir`，返回写入的文件路径（顺序与结果一致）。
pub async fn download_results(
    client: &reqwest::Client,
    base: &Url,
    results: &[String],
    dir: &Path,
) -> Result<Vec<PathBuf>, AppError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut used = HashSet::new();
    let mut saved = Vec::with_capacity(results.len());

    for (idx, raw) in results.iter().enumerate() {
        let index = idx + 1;
        let url = resolve_result_url(base, raw)?;

        let mut name = result_file_name(&url, index);
        if !used.insert(name.clone()) {
            name = format!("result_{}_{}", index, name);
            used.insert(name.clone());
        }

        let bytes = fetch_bytes(client, &url).await?;
        let path = dir.join(&name);
        tokio::fs::write(&path, &bytes).await?;

        log::info!(
            "💾 已保存结果 [{}] {} → {} ({} bytes)",
            index,
            redact_url_for_log(&url),
            path.display(),
            bytes.len()
        );
        saved.push(path);
    }

    Ok(saved)
}

async fn fetch_bytes(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>, AppError> {
    let mut response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| AppError::Download(format!("请求失败：{}", e.without_url())))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Download(format!(
            "HTTP {}：{}",
            status.as_u16(),
            redact_url_for_log(url)
        )));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_RESULT_BYTES {
            return Err(AppError::Download(format!(
                "文件过大：{:.2} MB",
                len as f64 / 1024.0 / 1024.0
            )));
        }
    }

    let mut buffer = Vec::new();
    loop {
        let chunk = tokio::time::timeout(CHUNK_READ_TIMEOUT, response.chunk())
            .await
            .map_err(|_| AppError::Download("下载数据流读取超时".to_string()))?
            .map_err(|e| AppError::Download(format!("下载失败：{}", e.without_url())))?;

        let Some(chunk) = chunk else {
            break;
        };

        if buffer.len() as u64 + chunk.len() as u64 > MAX_RESULT_BYTES {
            return Err(AppError::Download("下载后文件超过大小限制".to_string()));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn base() -> Url {
        Url::parse("http://127.0.0.1:8000/").expect("base")
    }

    #[test]
    fn relative_results_resolve_against_base() {
        let url = resolve_result_url(&base(), "/files/job-1/out.png").expect("resolve");
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/files/job-1/out.png");
    }

    #[test]
    fn absolute_results_are_kept() {
        let url = resolve_result_url(&base(), "https://cdn.example.com/a.webp").expect("resolve");
        assert_eq!(url.as_str(), "https://cdn.example.com/a.webp");
    }

    #[test]
    fn file_name_falls_back_when_path_has_none() {
        let named = Url::parse("http://h/files/x/grid.jpg").expect("url");
        assert_eq!(result_file_name(&named, 1), "grid.jpg");

        let bare = Url::parse("http://h/files/x/").expect("url");
        assert_eq!(result_file_name(&bare, 3), "result_3.png");

        let no_ext = Url::parse("http://h/files/blob").expect("url");
        assert_eq!(result_file_name(&no_ext, 2), "result_2.png");
    }

    #[test]
    fn status_rendering_lists_results_and_error() {
        let status = JobStatus::finished(vec!["/files/a.png".into()]);
        let text = render_status("j1", &status);
        assert!(text.starts_with("job j1: finished 100%"));
        assert!(text.contains("/files/a.png"));

        let failed = JobStatus::failed(30, "bad input");
        assert!(render_status("j2", &failed).contains("error: bad input"));
    }

    #[tokio::test]
    async fn download_writes_each_result_in_order() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/files/j/out.png")
            .with_status(200)
            .with_body(b"PNGDATA")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files/k/out.png")
            .with_status(200)
            .with_body(b"OTHER")
            .create_async()
            .await;

        let base = Url::parse(&format!("{}/", server.url())).expect("base");
        let dir = tempfile::tempdir().expect("temp dir");
        let results = vec!["/files/j/out.png".to_string(), "/files/k/out.png".to_string()];

        let saved = download_results(&reqwest::Client::new(), &base, &results, dir.path())
            .await
            .expect("download");

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0], dir.path().join("out.png"));
        assert_eq!(saved[1], dir.path().join("result_2_out.png"));
        assert_eq!(std::fs::read(&saved[0]).expect("read"), b"PNGDATA");
        assert_eq!(std::fs::read(&saved[1]).expect("read"), b"OTHER");
    }

    #[tokio::test]
    async fn download_reports_http_failures() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/files/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let base = Url::parse(&format!("{}/", server.url())).expect("base");
        let dir = tempfile::tempdir().expect("temp dir");

        let result = download_results(
            &reqwest::Client::new(),
            &base,
            &["/files/gone.png".to_string()],
            dir.path(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Download(_))));
    }
}
