use crate::config::NovitaConfig;
use crate::error::Result;
use crate::shaping::{shape_img2img, shape_txt2img, shape_upscale};
use crate::transport::{unwrap_v2, unwrap_v3, ApiCall, RequestOpts};
use crate::types::{
    CleanupRequest, DoodleRequest, ImageFile, Img2ImgRequest, LcmTxt2ImgRequest,
    LcmTxt2ImgResponse, MixPoseRequest, Model, ModelList, OutpaintingRequest, Progress,
    RemoveBackgroundRequest, ReplaceBackgroundRequest, TaskHandle, Txt2ImgRequest,
    UpscaleRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The main client for interacting with the Novita API.
///
/// It holds the shared `reqwest::Client` and the [`NovitaConfig`] used for
/// every request. It is cheap to clone and safe to share across tasks; clones
/// share the connection pool but not the configuration.
#[derive(Debug, Clone)]
pub struct NovitaClient {
    http: reqwest::Client,
    config: NovitaConfig,
}

impl NovitaClient {
    /// Creates a new `NovitaClient` against the production API.
    ///
    /// If `api_key` is `None`, the `NOVITA_API_KEY` environment variable is
    /// used. A client without any key sends requests anonymously.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal HTTP client fails to build.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.or_else(|| std::env::var(crate::config::API_KEY_ENV).ok());
        Self::from_config(NovitaConfig::new(api_key))
    }

    /// Creates a new `NovitaClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting through a proxy.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is invalid or the HTTP client fails to
    /// build.
    pub fn new_with_url(api_key: Option<String>, base_url: &str) -> Result<Self> {
        Self::from_config(NovitaConfig::new(api_key).with_base_url(base_url)?)
    }

    /// Creates a new `NovitaClient` from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal HTTP client fails to build.
    pub fn from_config(config: NovitaConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// Uses a caller-provided `reqwest::Client` (timeouts, proxies, TLS).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replaces the API key used by subsequent requests.
    ///
    /// An empty key is treated like [`NovitaClient::clear_api_key`].
    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.config.set_api_key(api_key);
    }

    /// Removes the API key; later requests are sent anonymously.
    pub fn clear_api_key(&mut self) {
        self.config.clear_api_key();
    }

    /// Points subsequent requests at another host.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The new base URL. A trailing `/` is ignored and a path
    ///   prefix (e.g. a proxy mount point) is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse as a URL. The previous
    /// base URL is kept in that case.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.config.set_base_url(base_url)
    }

    /// The configuration requests are currently built from.
    pub fn config(&self) -> &NovitaConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Lists the models available to generation requests.
    pub async fn get_models(&self, opts: &RequestOpts) -> Result<Vec<Model>> {
        let body = self.legacy_call(ApiCall::get("/v2/models"), opts).await?;
        let list: ModelList = unwrap_v2(body)?;
        Ok(list.models)
    }

    /// Submits a text-to-image task.
    ///
    /// The `lora` adapters of `params` are encoded into the prompt first.
    /// Use [`NovitaClient::progress`] or [`NovitaClient::wait_for_images`]
    /// to follow the task, or [`NovitaClient::txt2img_sync`] to do both.
    pub async fn txt2img(&self, params: &Txt2ImgRequest, opts: &RequestOpts) -> Result<TaskHandle> {
        self.submit_v2("/v2/txt2img", &shape_txt2img(params), opts).await
    }

    /// Submits an image-to-image task.
    pub async fn img2img(&self, params: &Img2ImgRequest, opts: &RequestOpts) -> Result<TaskHandle> {
        self.submit_v2("/v2/img2img", &shape_img2img(params), opts).await
    }

    /// Submits an upscale task. Omitted upscaler selectors default to
    /// [`crate::shaping::DEFAULT_UPSCALER`].
    pub async fn upscale(&self, params: &UpscaleRequest, opts: &RequestOpts) -> Result<TaskHandle> {
        self.submit_v2("/v2/upscale", &shape_upscale(params), opts).await
    }

    /// Retrieves the progress of a task.
    pub async fn progress(&self, task_id: &str, opts: &RequestOpts) -> Result<Progress> {
        let call = ApiCall::get("/v2/progress").query("task_id", task_id);
        let body = self.legacy_call(call, opts).await?;
        unwrap_v2(body)
    }

    /// Removes the masked region of an image.
    ///
    /// # Errors
    ///
    /// Any status other than `200` is returned as a [`crate::NovitaError`]
    /// carrying the HTTP status as `code` and the body's `reason` and
    /// `metadata`.
    pub async fn cleanup(&self, params: &CleanupRequest, opts: &RequestOpts) -> Result<ImageFile> {
        self.request_v3("/v3/cleanup", params, opts).await
    }

    /// Extends an image beyond its borders.
    ///
    /// # Arguments
    ///
    /// * `params` - The source image, the target size and where to place the
    ///   original within it.
    pub async fn outpainting(
        &self,
        params: &OutpaintingRequest,
        opts: &RequestOpts,
    ) -> Result<ImageFile> {
        self.request_v3("/v3/outpainting", params, opts).await
    }

    /// Removes the background of an image, leaving the subject on a
    /// transparent canvas.
    pub async fn remove_background(
        &self,
        params: &RemoveBackgroundRequest,
        opts: &RequestOpts,
    ) -> Result<ImageFile> {
        self.request_v3("/v3/remove-background", params, opts).await
    }

    /// Replaces the background of an image with one generated from a prompt.
    pub async fn replace_background(
        &self,
        params: &ReplaceBackgroundRequest,
        opts: &RequestOpts,
    ) -> Result<ImageFile> {
        self.request_v3("/v3/replace-background", params, opts).await
    }

    /// Renders the person of one image in the pose of another.
    pub async fn mix_pose(&self, params: &MixPoseRequest, opts: &RequestOpts) -> Result<ImageFile> {
        self.request_v3("/v3/mix-pose", params, opts).await
    }

    /// Turns a sketch into an image guided by a prompt.
    pub async fn doodle(&self, params: &DoodleRequest, opts: &RequestOpts) -> Result<ImageFile> {
        self.request_v3("/v3/doodle", params, opts).await
    }

    /// Generates images from text with a latent consistency model.
    ///
    /// Unlike [`NovitaClient::txt2img`] this answers synchronously.
    ///
    /// # Returns
    ///
    /// A [`LcmTxt2ImgResponse`] holding one base64 image per requested
    /// `image_num`, in order.
    pub async fn lcm_txt2img(
        &self,
        params: &LcmTxt2ImgRequest,
        opts: &RequestOpts,
    ) -> Result<LcmTxt2ImgResponse> {
        self.request_v3("/v3/lcm-txt2img", params, opts).await
    }

    async fn submit_v2<P: Serialize>(
        &self,
        path: &str,
        params: &P,
        opts: &RequestOpts,
    ) -> Result<TaskHandle> {
        let call = ApiCall::post(path, serde_json::to_value(params)?);
        let body = self.legacy_call(call, opts).await?;
        let handle: TaskHandle = unwrap_v2(body)?;
        tracing::debug!(path, task_id = ?handle.task_id, "task submitted");
        Ok(handle)
    }

    async fn request_v3<P, R>(&self, path: &str, params: &P, opts: &RequestOpts) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let call = ApiCall::post(path, serde_json::to_value(params)?);
        let body = self.v3_call(call, opts).await?;
        unwrap_v3(body)
    }
}
