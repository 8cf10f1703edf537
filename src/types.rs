use crate::error::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Success sentinel of the legacy `{code, msg, data}` envelope.
pub const V2_CODE_OK: i64 = 0;

/// Success sentinel (HTTP status) of the newer endpoints.
pub const V3_CODE_OK: u16 = 200;

/// Well-known upscaler algorithm names accepted by `/v2/upscale`.
pub mod upscalers {
    pub const NONE: &str = "None";
    pub const LANCZOS: &str = "Lanczos";
    pub const NEAREST: &str = "Nearest";
    pub const ESRGAN_4X: &str = "ESRGAN_4x";
    pub const LDSR: &str = "LDSR";
    pub const R_ESRGAN_4X_PLUS: &str = "R-ESRGAN 4x+";
    pub const R_ESRGAN_4X_PLUS_ANIME6B: &str = "R-ESRGAN 4x+ Anime6B";
    pub const SCUNET_GAN: &str = "ScuNET GAN";
    pub const SCUNET_PSNR: &str = "ScuNET PSNR";
    pub const SWINIR_4X: &str = "SwinIR 4x";
}

/// A style-adapter reference, encoded into the prompt before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lora {
    /// The adapter's model name as listed by `/v2/models`.
    pub sd_name: String,
    /// Strength of the adapter, typically between 0 and 1.
    pub weight: f32,
}

impl Lora {
    pub fn new(sd_name: impl Into<String>, weight: f32) -> Self {
        Self {
            sd_name: sd_name.into(),
            weight,
        }
    }
}

/// Parameters of a `/v2/txt2img` task.
///
/// `lora` entries are folded into `prompt` when the request is submitted and
/// are not sent as a separate field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Txt2ImgRequest {
    pub model_name: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_iter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_vae: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_faces: Option<bool>,
    #[serde(skip_serializing)]
    pub lora: Vec<Lora>,
}

impl Txt2ImgRequest {
    pub fn new(model_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Parameters of a `/v2/img2img` task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Img2ImgRequest {
    pub model_name: String,
    pub prompt: String,
    /// Base64-encoded source images.
    pub init_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_iter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_vae: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_faces: Option<bool>,
    #[serde(skip_serializing)]
    pub lora: Vec<Lora>,
}

impl Img2ImgRequest {
    pub fn new(
        model_name: impl Into<String>,
        prompt: impl Into<String>,
        init_image: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            prompt: prompt.into(),
            init_images: vec![init_image.into()],
            ..Default::default()
        }
    }
}

/// Parameters of a `/v2/upscale` task.
///
/// Omitted upscaler selectors are resolved to
/// [`upscalers::R_ESRGAN_4X_PLUS`] before submission.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpscaleRequest {
    /// Base64-encoded source image.
    pub image: String,
    /// `0` scales by `upscaling_resize`, `1` scales to an explicit size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaling_resize: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaling_resize_w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaling_resize_h: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaler_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaler_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras_upscaler_2_visibility: Option<f32>,
}

impl UpscaleRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }
}

/// The handle returned by a task submission endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskHandle {
    /// Absent when the service accepted the request but did not start a task.
    #[serde(default)]
    pub task_id: Option<String>,
}

impl TaskHandle {
    /// The task id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.task_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Lifecycle status of a generation task as reported by `/v2/progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TaskStatus {
    Initializing,
    Generating,
    Succeeded,
    Failed,
    Timeout,
    /// A status value this SDK does not know about; treated as non-terminal.
    Unknown(i64),
}

impl TaskStatus {
    pub fn code(self) -> i64 {
        match self {
            TaskStatus::Initializing => 0,
            TaskStatus::Generating => 1,
            TaskStatus::Succeeded => 2,
            TaskStatus::Failed => 3,
            TaskStatus::Timeout => 4,
            TaskStatus::Unknown(code) => code,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Timeout
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Timeout)
    }
}

impl From<i64> for TaskStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => TaskStatus::Initializing,
            1 => TaskStatus::Generating,
            2 => TaskStatus::Succeeded,
            3 => TaskStatus::Failed,
            4 => TaskStatus::Timeout,
            other => TaskStatus::Unknown(other),
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Initializing => write!(f, "initializing"),
            TaskStatus::Generating => write!(f, "generating"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Timeout => write!(f, "timeout"),
            TaskStatus::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// A snapshot of a task's progress.
#[derive(Debug, Clone, Deserialize)]
pub struct Progress {
    pub status: TaskStatus,
    /// Completion ratio between 0 and 1.
    #[serde(default)]
    pub progress: f64,
    /// Estimated seconds remaining.
    #[serde(default)]
    pub eta_relative: f64,
    /// Result image URLs, in generation order. Populated once succeeded.
    #[serde(default, deserialize_with = "null_as_default")]
    pub imgs: Vec<String>,
    #[serde(default)]
    pub failed_reason: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Category of a model in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Checkpoint,
    Lora,
    Vae,
    Controlnet,
    Upscaler,
    Textualinversion,
    #[serde(other)]
    Unknown,
}

/// An entry of the `/v2/models` catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub name: String,
    /// The name to pass as `model_name` or `Lora::sd_name`.
    pub sd_name: String,
    #[serde(rename = "type")]
    pub type_: ModelType,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// How the completion bridge returns the generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImgType {
    /// Result URLs as returned by the service.
    #[default]
    Url,
    /// Each image fetched and base64-encoded.
    Base64,
}

/// Default delay between two progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Settings of the completion bridge (`*_sync` calls).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay before the first poll and between subsequent polls.
    pub interval: Duration,
    pub img_type: ImgType,
    /// Deadline for the polling phase. Downloading base64 images happens
    /// after it and is not covered. Unbounded when `None`.
    pub timeout: Option<Duration>,
    /// Maximum number of polls. Unbounded when `None`; at least one poll is
    /// always made, so `Some(0)` behaves like `Some(1)`.
    pub max_attempts: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            img_type: ImgType::Url,
            timeout: None,
            max_attempts: None,
        }
    }
}

impl SyncConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_img_type(mut self, img_type: ImgType) -> Self {
        self.img_type = img_type;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bounds the number of polls. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }
}

/// (Internal) The legacy `{code, msg, data}` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct V2Envelope<T> {
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) msg: String,
    pub(crate) data: Option<T>,
}

/// (Internal) `data` of `/v2/models`.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub(crate) models: Vec<Model>,
}

/// (Internal) Failure body of the newer endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct V3ErrorBody {
    #[serde(default)]
    pub(crate) code: Option<i64>,
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) metadata: Option<Metadata>,
}

/// A single image returned inline by a `/v3` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageFile {
    /// Base64-encoded image content.
    pub image_file: String,
    /// Image format, e.g. `png` or `jpeg`.
    #[serde(default)]
    pub image_type: String,
}

/// Parameters of `/v3/cleanup`: erase the masked region of an image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupRequest {
    pub image_file: String,
    pub mask_file: String,
}

/// Parameters of `/v3/outpainting`: extend an image onto a larger canvas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutpaintingRequest {
    pub image_file: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_y: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveBackgroundRequest {
    pub image_file: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaceBackgroundRequest {
    pub image_file: String,
    /// Description of the new background.
    pub prompt: String,
}

/// Parameters of `/v3/mix-pose`: re-pose a subject after a reference image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MixPoseRequest {
    pub image_file: String,
    pub pose_image_file: String,
}

/// Parameters of `/v3/doodle`: turn a sketch into an image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DoodleRequest {
    pub image_file: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Parameters of `/v3/lcm-txt2img`: fast latent-consistency generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LcmTxt2ImgRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_num: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LcmTxt2ImgResponse {
    #[serde(default)]
    pub images: Vec<ImageFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_max_attempts_is_raised_to_one() {
        let config = SyncConfig::default().with_max_attempts(0);
        assert_eq!(config.max_attempts, Some(1));
    }

    #[test]
    fn task_status_round_trips_numeric_codes() {
        let progress: Progress = serde_json::from_value(json!({
            "status": 7,
            "imgs": null
        }))
        .unwrap();
        assert_eq!(progress.status, TaskStatus::Unknown(7));
        assert!(!progress.status.is_terminal());
        assert!(progress.imgs.is_empty());

        assert!(TaskStatus::from(4).is_failure());
        assert_eq!(serde_json::to_value(TaskStatus::Succeeded).unwrap(), json!(2));
    }

    #[test]
    fn lora_is_not_serialized_with_the_request() {
        let mut request = Txt2ImgRequest::new("model.safetensors", "a cat");
        request.lora.push(Lora::new("film", 0.5));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "model_name": "model.safetensors", "prompt": "a cat" })
        );
    }
}
