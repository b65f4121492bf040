use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vox Jobs API",
        version = "1.0.0",
        description = "Background transcription job queue: worker triggers, stuck job recovery and job status"
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.merge(vox_api_jobs::openapi());
    doc
}

pub fn write_openapi_json() -> std::io::Result<std::path::PathBuf> {
    let doc = openapi();
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| std::io::Error::other(format!("serialize openapi: {e}")))?;

    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("openapi.gen.json");
    std::fs::write(&path, json)?;
    Ok(path)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                Http::builder()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Supabase JWT token"))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "worker_key",
            SecurityScheme::Http(
                Http::builder()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Shared worker API key"))
                    .build(),
            ),
        );
    }
}
