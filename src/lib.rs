//! An unofficial Rust SDK for the Novita AI image generation API.
//!
//! This SDK provides a convenient, asynchronous interface to Novita's
//! Stable Diffusion endpoints. It shapes requests (style adapters, upscaler
//! defaults), normalizes both of the service's response conventions into a
//! single [`NovitaError`], and turns long-running generation tasks into a
//! single awaited result.
//!
//! ## Features
//! - Text-to-image, image-to-image and upscaling tasks.
//! - `*_sync` helpers that poll a task until it finishes.
//! - Optional base64 output for finished tasks.
//! - The `/v3` image-editing endpoints (cleanup, outpainting, background
//!   removal and replacement, mix-pose, doodle, LCM txt2img).
//! - Per-request cancellation through [`tokio_util::sync::CancellationToken`].
//!
//! ## Example
//!
//! ```no_run
//! use novita::{Lora, NovitaClient, RequestOpts, SyncConfig, Txt2ImgRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let client = NovitaClient::new(None)?;
//!
//! let mut request = Txt2ImgRequest::new("dreamshaper_8_93211.safetensors", "a cat");
//! request.lora.push(Lora::new("add_detail_44319", 0.8));
//!
//! let imgs = client
//!     .txt2img_sync(&request, &SyncConfig::default(), &RequestOpts::default())
//!     .await?;
//! println!("{:?}", imgs);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod embed;
pub mod error;
pub mod shaping;
mod sync;
mod transport;
pub mod types;

pub use client::NovitaClient;
pub use config::NovitaConfig;
pub use error::{Metadata, NovitaError, Result};
pub use transport::RequestOpts;
pub use types::{
    CleanupRequest, DoodleRequest, ImageFile, ImgType, Img2ImgRequest, LcmTxt2ImgRequest,
    LcmTxt2ImgResponse, Lora, MixPoseRequest, Model, ModelType, OutpaintingRequest, Progress,
    RemoveBackgroundRequest, ReplaceBackgroundRequest, SyncConfig, TaskHandle, TaskStatus,
    Txt2ImgRequest, UpscaleRequest,
};
