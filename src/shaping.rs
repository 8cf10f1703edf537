//! Request shaping applied before a request leaves the client.
//!
//! Style adapters are encoded into the prompt as `<lora:{sd_name}:{weight}>`
//! directives, and upscale requests get their algorithm selectors resolved
//! locally so the submitted payload always carries concrete values.

use crate::types::{upscalers, Img2ImgRequest, Lora, Txt2ImgRequest, UpscaleRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Algorithm used for an upscaler selector the caller left empty.
pub const DEFAULT_UPSCALER: &str = upscalers::R_ESRGAN_4X_PLUS;

static LORA_DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<lora:([^:>]+):[^>]*>").unwrap());

/// Renders one `<lora:name:weight>` directive per adapter, in order.
pub fn lora_directives(loras: &[Lora]) -> Vec<String> {
    loras
        .iter()
        .map(|lora| format!("<lora:{}:{}>", lora.sd_name, lora.weight))
        .collect()
}

/// Adapter names already referenced by directives inside `prompt`.
pub fn referenced_loras(prompt: &str) -> HashSet<&str> {
    LORA_DIRECTIVE_RE
        .captures_iter(prompt)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Prepends the directives for `loras` to `prompt`.
///
/// An adapter whose name already appears in a directive of the prompt is
/// skipped, so applying this to its own output returns it unchanged.
pub fn add_lora_prompt(loras: &[Lora], prompt: &str) -> String {
    let mut present = referenced_loras(prompt);
    let missing: Vec<Lora> = loras
        .iter()
        .filter(|lora| present.insert(lora.sd_name.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        return prompt.to_string();
    }

    let mut parts = lora_directives(&missing);
    if !prompt.is_empty() {
        parts.push(prompt.to_string());
    }
    parts.join(", ")
}

pub fn shape_txt2img(params: &Txt2ImgRequest) -> Txt2ImgRequest {
    let mut shaped = params.clone();
    shaped.prompt = add_lora_prompt(&params.lora, &params.prompt);
    shaped
}

pub fn shape_img2img(params: &Img2ImgRequest) -> Img2ImgRequest {
    let mut shaped = params.clone();
    shaped.prompt = add_lora_prompt(&params.lora, &params.prompt);
    shaped
}

/// Fills each omitted upscaler selector with [`DEFAULT_UPSCALER`].
pub fn shape_upscale(params: &UpscaleRequest) -> UpscaleRequest {
    let mut shaped = params.clone();
    shaped
        .upscaler_1
        .get_or_insert_with(|| DEFAULT_UPSCALER.to_string());
    shaped
        .upscaler_2
        .get_or_insert_with(|| DEFAULT_UPSCALER.to_string());
    shaped
}
