use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::{Result, ServiceError};

const DEFAULT_PORT: u16 = 5006;
const DEFAULT_BODY_LIMIT_MB: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    /// Hosted image-classification inference endpoint.
    Hosted,
    /// Frozen TensorFlow graph on local disk.
    TensorFlow,
}

impl FromStr for ClassifierBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "tensorflow" | "tf" => Ok(Self::TensorFlow),
            other => Err(format!("unknown classifier backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub upstream_timeout: Duration,
    pub backend: ClassifierBackend,
    pub inference_api_url: String,
    pub hf_api_token: Option<String>,
    pub disease_model: String,
    pub agriqbot_model: String,
    pub palm_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub model_path: PathBuf,
    pub class_list_path: PathBuf,
    pub model_url: Option<String>,
    pub class_list_url: Option<String>,
    pub github_token: Option<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let body_limit_mb: usize = parse_or(&get, "BODY_LIMIT_MB", DEFAULT_BODY_LIMIT_MB)?;
        let body_limit_bytes = body_limit_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            ServiceError::Config(format!("BODY_LIMIT_MB='{body_limit_mb}' is too large"))
        })?;

        Ok(Config {
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            body_limit_bytes,
            upstream_timeout: Duration::from_secs(parse_or(
                &get,
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            backend: parse_or(&get, "CLASSIFIER_BACKEND", ClassifierBackend::Hosted)?,
            inference_api_url: string_or(
                "INFERENCE_API_URL",
                "https://api-inference.huggingface.co/models",
            ),
            hf_api_token: get("HF_API_TOKEN"),
            disease_model: string_or("DISEASE_MODEL", "wambugu71/crop_leaf_diseases_vit"),
            agriqbot_model: string_or("AGRIQBOT_MODEL", "mrSoul7766/AgriQBot"),
            palm_api_key: get("PALM_API_KEY"),
            gemini_model: string_or("GEMINI_MODEL", "gemini-1.5-flash-latest"),
            gemini_api_url: string_or(
                "GEMINI_API_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model_path: string_or("MODEL_PATH", "./model/frozen_graph.pb").into(),
            class_list_path: string_or("CLASS_LIST_PATH", "./model/class_list.txt").into(),
            model_url: get("MODEL_URL"),
            class_list_url: get("CLASS_LIST_URL"),
            github_token: get("GITHUB_TOKEN"),
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ServiceError::Config(format!("{key}='{raw}': {e}"))),
        None => Ok(default),
    }
}
