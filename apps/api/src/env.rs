use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;

fn default_port() -> u16 {
    3001
}

#[derive(Deserialize)]
pub struct Env {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "vox_api_env::filter_empty")]
    pub sentry_dsn: Option<String>,

    #[serde(flatten)]
    pub supabase: vox_api_env::SupabaseEnv,
    #[serde(flatten)]
    pub elevenlabs: vox_api_env::ElevenLabsEnv,
    #[serde(flatten)]
    pub worker: vox_api_env::WorkerEnv,
}

static ENV: OnceLock<Env> = OnceLock::new();

pub fn env() -> &'static Env {
    ENV.get_or_init(|| {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let repo_root = manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(manifest_dir);

        let _ = dotenvy::from_path(repo_root.join(".env.supabase"));
        let _ = dotenvy::from_path(manifest_dir.join(".env"));
        envy::from_env().expect("Failed to load environment")
    })
}
