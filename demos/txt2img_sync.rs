//! Generates an image from a prompt and waits for the result.
//!
//! To run this example, you must have the `NOVITA_API_KEY` environment variable set.
//!
//! Usage:
//! `cargo run --example txt2img_sync -- "a cat wearing a hat" [--base64]`

use novita::{ImgType, Lora, NovitaClient, RequestOpts, SyncConfig, Txt2ImgRequest};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = NovitaClient::new(None)?;

    let mut args = env::args().skip(1);
    let prompt = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Please provide a prompt as a command-line argument."))?;
    let img_type = if args.any(|arg| arg == "--base64") {
        ImgType::Base64
    } else {
        ImgType::Url
    };

    let mut request = Txt2ImgRequest::new("dreamshaper_8_93211.safetensors", prompt);
    request.negative_prompt = Some("nsfw, bad quality".to_string());
    request.width = Some(512);
    request.height = Some(512);
    request.steps = Some(20);
    request.lora.push(Lora::new("add_detail_44319", 0.6));

    let config = SyncConfig::default()
        .with_img_type(img_type)
        .with_timeout(Duration::from_secs(300));

    println!("Generating...");
    let imgs = client
        .txt2img_sync(&request, &config, &RequestOpts::default())
        .await?;

    for img in imgs {
        match img_type {
            ImgType::Url => println!("- {}", img),
            ImgType::Base64 => println!("- <{} base64 characters>", img.len()),
        }
    }

    Ok(())
}
