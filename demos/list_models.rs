//! Lists the checkpoints and loras available to generation requests.
//!
//! `NOVITA_BASE_URL` may point the example at a proxy or mock server.
//!
//! Usage:
//! `cargo run --example list_models`

use novita::{ModelType, NovitaClient, NovitaConfig, RequestOpts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let client = NovitaClient::from_config(NovitaConfig::from_env()?)?;
    let models = client.get_models(&RequestOpts::default()).await?;

    for model in models
        .iter()
        .filter(|m| matches!(m.type_, ModelType::Checkpoint | ModelType::Lora))
    {
        println!("{:?}\t{}\t{}", model.type_, model.sd_name, model.name);
    }

    Ok(())
}
