use super::{json_pretty, EXIT_SUCCESS};
use corral_core::{
    ClientFactory, ContainerClient, ContainerTechnology, LxcContainerClient, LxcOptions,
    ReferencePoint,
};
use corral_runtime::RecordingConnection;
use corral_schema::Settings;
use std::fs;
use std::sync::Arc;

pub fn run(settings: &Settings, name: Option<&str>, json: bool) -> Result<u8, String> {
    let factory = ClientFactory::from_settings(settings, ReferencePoint::LocalHost)
        .map_err(|e| e.to_string())?;
    let name = factory.container_name(name).map_err(|e| e.to_string())?;

    let mut client = match factory.technology() {
        ContainerTechnology::Lxc => LxcContainerClient::new(
            name.clone(),
            Arc::new(RecordingConnection::new()),
            // Nothing is created here, so the scratch files go even with
            // `no_cleanup`.
            LxcOptions {
                clean: true,
                ..factory.options().clone()
            },
        )
        .map_err(|e| e.to_string())?,
    };
    let generated = client.generate_artifacts();
    let rendered = match &generated {
        Ok((_, artifacts)) if json => {
            let mut files = Vec::new();
            for path in artifacts {
                let content = fs::read_to_string(path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                files.push(serde_json::json!({
                    "file": path.file_name().map(|f| f.to_string_lossy().into_owned()),
                    "content": content,
                }));
            }
            json_pretty(&serde_json::json!({ "name": name.as_str(), "files": files }))
        }
        Ok(_) => client.render_artifacts().map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let cleaned = client.clean();

    let rendered = rendered?;
    cleaned.map_err(|e| e.to_string())?;
    print!("{rendered}");
    if json {
        println!();
    }
    Ok(EXIT_SUCCESS)
}
