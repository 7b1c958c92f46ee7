//! # 单次作业编排
//!
//! ## 实现思路
//!
//! ```text
//! parse_params ──✗──→ InvalidParams（不发请求）
//!      ↓
//! preprocess_async（阻塞线程池，永不失败）
//!      ↓
//! JobApi::submit ──✗──→ Submission（不轮询）
//!      ↓
//! start_polling → SubmittedJob { PollHandle, 体积, 耗时 }
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::image_prep::{ImagePreprocessor, SourceImage};
use crate::job::{
    JobApi, JobError, JobHandle, JobObserver, JobRequest, JobStatus, PollConfig, PollHandle,
    parse_params, start_polling,
};

/// 各阶段耗时（毫秒）。
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub preprocess_ms: u128,
    pub submit_ms: u128,
}

/// 提交成功后的作业。
pub struct SubmittedJob {
    pub poll: PollHandle,
    pub original_size: u64,
    pub upload_size: u64,
    pub upload_dimensions: Option<(u32, u32)>,
    /// 预处理回退为原图的原因。
    pub degraded: Option<String>,
    pub timings: StageTimings,
}

impl SubmittedJob {
    pub fn job(&self) -> &JobHandle {
        self.poll.job()
    }

    /// 上传体积严格小于原图时返回 `(原始, 上传)`。
    pub fn size_reduction(&self) -> Option<(u64, u64)> {
        (self.upload_size < self.original_size).then_some((self.original_size, self.upload_size))
    }
}

/// 串联预处理、提交与轮询的客户端。
#[derive(Clone)]
pub struct JobClient {
    api: Arc<dyn JobApi>,
    preprocessor: ImagePreprocessor,
    poll: PollConfig,
}

impl JobClient {
    pub fn new(
        api: Arc<dyn JobApi>,
        preprocessor: ImagePreprocessor,
        poll: PollConfig,
    ) -> Result<Self, JobError> {
        poll.validate()?;
        Ok(Self {
            api,
            preprocessor,
            poll,
        })
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// 执行一次完整的提交流程并开始轮询。
    ///
    /// 结果通过 `observer` 异步送达；返回的 `PollHandle` 可用于取消或等待。
    pub async fn submit(
        &self,
        feature: &str,
        params_text: &str,
        source: SourceImage,
        observer: Arc<dyn JobObserver>,
    ) -> Result<SubmittedJob, JobError> {
        let params = parse_params(params_text)?;
        let original_size = source.size();

        let start = Instant::now();
        let image = self.preprocessor.preprocess_async(source).await;
        let preprocess_ms = start.elapsed().as_millis();

        let upload_size = image.size();
        let upload_dimensions = image.dimensions();
        let degraded = image.degradation_reason().map(str::to_string);
        log::info!(
            "🖼️ 预处理完成 - {} → {} bytes ({}ms){}",
            original_size,
            upload_size,
            preprocess_ms,
            if degraded.is_some() { "，已回退原图" } else { "" }
        );

        let request = JobRequest::new(feature, params, image);
        let start = Instant::now();
        let job = self.api.submit(&request).await?;
        let submit_ms = start.elapsed().as_millis();
        log::info!("📮 已提交 - job_id: {} ({}ms)", job, submit_ms);

        let poll = start_polling(Arc::clone(&self.api), job, self.poll.clone(), observer)?;

        Ok(SubmittedJob {
            poll,
            original_size,
            upload_size,
            upload_dimensions,
            degraded,
            timings: StageTimings {
                preprocess_ms,
                submit_ms,
            },
        })
    }

    /// 单次查询任务状态，不启动轮询。
    pub async fn query_once(&self, job_id: &str) -> Result<JobStatus, JobError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(JobError::Query("job_id 不能为空".to_string()));
        }
        self.api.fetch_status(&JobHandle::new(job_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_prep::PrepConfig;
    use crate::job::{CallbackObserver, JobState, PollOutcome};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeApi {
        submitted: Mutex<Vec<(String, String, String, String)>>,
        queries: AtomicUsize,
        reject_submit: bool,
    }

    #[async_trait]
    impl JobApi for FakeApi {
        async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError> {
            if self.reject_submit {
                return Err(JobError::Submission("HTTP 400: bad type".into()));
            }
            self.submitted.lock().expect("lock").push((
                request.feature_type.clone(),
                request.params_json(),
                request.image.file_name().to_string(),
                request.image.media_type().to_string(),
            ));
            Ok(JobHandle::new("job-42"))
        }

        async fn fetch_status(&self, _job: &JobHandle) -> Result<JobStatus, JobError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(JobStatus::finished(vec!["/files/out.png".into()]))
        }
    }

    fn client(api: Arc<FakeApi>) -> JobClient {
        let preprocessor = ImagePreprocessor::new(PrepConfig::default()).expect("preprocessor");
        let poll = PollConfig {
            interval_ms: 50,
            ..PollConfig::default()
        };
        JobClient::new(api, preprocessor, poll).expect("client")
    }

    fn silent_observer() -> Arc<dyn JobObserver> {
        Arc::new(CallbackObserver::new(
            |_: u8, _: JobState| {},
            |_: &[String]| {},
            |_: &JobError| {},
        ))
    }

    fn png_source(width: u32, height: u32) -> SourceImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode png");
        SourceImage::from_bytes(cursor.into_inner(), "portrait.png")
    }

    #[tokio::test]
    async fn invalid_params_never_reach_the_server() {
        let api = Arc::new(FakeApi::default());
        let result = client(api.clone())
            .submit("enhance", "{oops", png_source(8, 8), silent_observer())
            .await;

        assert!(matches!(result, Err(JobError::InvalidParams(_))));
        assert!(api.submitted.lock().expect("lock").is_empty());
        assert_eq!(api.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submission_failure_does_not_start_polling() {
        let api = Arc::new(FakeApi {
            reject_submit: true,
            ..FakeApi::default()
        });
        let result = client(api.clone())
            .submit("enhance", "", png_source(8, 8), silent_observer())
            .await;

        assert!(matches!(result, Err(JobError::Submission(_))));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(api.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn full_cycle_uploads_jpeg_and_finishes() {
        let api = Arc::new(FakeApi::default());
        let submitted = client(api.clone())
            .submit("era_style", r#"{"era":"1970s"}"#, png_source(1500, 600), silent_observer())
            .await
            .expect("submit");

        assert_eq!(submitted.job().id(), "job-42");
        assert_eq!(submitted.upload_dimensions, Some((1024, 410)));
        assert!(submitted.degraded.is_none());

        let calls = api.submitted.lock().expect("lock").clone();
        assert_eq!(
            calls,
            vec![(
                "era_style".to_string(),
                r#"{"era":"1970s"}"#.to_string(),
                "portrait.jpg".to_string(),
                "image/jpeg".to_string(),
            )]
        );

        let outcome = submitted.poll.join().await;
        assert_eq!(outcome, PollOutcome::Finished(vec!["/files/out.png".into()]));
    }

    #[tokio::test]
    async fn undecodable_source_is_uploaded_as_is() {
        let api = Arc::new(FakeApi::default());
        let source = SourceImage::with_media_type(vec![7u8; 64], "image/png", "odd.png");

        let submitted = client(api.clone())
            .submit("enhance", "", source, silent_observer())
            .await
            .expect("submit");

        assert!(submitted.degraded.is_some());
        assert_eq!(submitted.size_reduction(), None);
        let calls = api.submitted.lock().expect("lock").clone();
        assert_eq!(calls[0].2, "odd.png");
        assert_eq!(calls[0].3, "image/png");
        submitted.poll.cancel();
    }

    #[tokio::test]
    async fn query_once_rejects_blank_ids() {
        let api = Arc::new(FakeApi::default());
        assert!(client(api).query_once("  ").await.is_err());
    }
}
