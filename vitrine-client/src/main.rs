//! vitrine binary: one signage node (editor, companion or display)

use anyhow::Context;
use clap::Parser;
use shared::RoomCode;
use shared::models::{DeviceId, Role};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use vitrine_client::genai::{DEFAULT_GENAI_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use vitrine_client::{
    ClientConfig, Companion, ContentGenerator, DEFAULT_RELAY_URL, DisplayOptions, DisplaySurface,
    Editor, GenAiConfig, Storage, SyncClient, SyncEvent, SyncHandle, WsConnector, logger,
};

#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about = "Meat-shop digital signage node")]
struct Cli {
    /// Surface to start as: display, companion or editor
    #[arg(long, env = "VITRINE_MODE", default_value = "editor")]
    mode: Role,

    /// Room code to join; stored and reused on later starts
    #[arg(long = "sync", env = "VITRINE_SYNC", value_name = "CODE")]
    room: Option<RoomCode>,

    #[arg(long, env = "VITRINE_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    #[arg(long, env = "VITRINE_DATA_DIR", default_value = "vitrine-data")]
    data_dir: PathBuf,

    /// Override the stored device id
    #[arg(long, env = "VITRINE_DEVICE_ID")]
    device_id: Option<String>,

    /// Address announced to the editor's device list
    #[arg(long, env = "VITRINE_ADVERTISED_IP")]
    advertised_ip: Option<String>,

    #[arg(long, env = "VITRINE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "VITRINE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "VITRINE_LOG_JSON")]
    log_json: bool,

    #[arg(long, env = "VITRINE_GENAI_API_KEY", hide_env_values = true)]
    genai_api_key: Option<String>,

    #[arg(long, env = "VITRINE_GENAI_URL", default_value = DEFAULT_GENAI_URL)]
    genai_url: String,

    #[arg(long, env = "VITRINE_GENAI_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    genai_text_model: String,

    #[arg(long, env = "VITRINE_GENAI_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    genai_image_model: String,
}

impl Cli {
    fn genai(&self) -> Option<GenAiConfig> {
        let key = self.genai_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(
            GenAiConfig::new(key)
                .with_base_url(&self.genai_url)
                .with_models(&self.genai_text_model, &self.genai_image_model),
        )
    }
}

/// `--sync` wins and is persisted; otherwise the stored room, otherwise a
/// fresh code.
fn resolve_room(cli: &Cli, storage: &Storage) -> anyhow::Result<RoomCode> {
    let room = match (&cli.room, storage.load_room()) {
        (Some(room), _) => room.clone(),
        (None, Some(stored)) => return Ok(stored),
        (None, None) => {
            let room = RoomCode::generate();
            tracing::info!(%room, "No room configured, generated a new one");
            room
        }
    };
    storage
        .save_room(&room)
        .with_context(|| format!("saving room code to {}", storage.room_path().display()))?;
    Ok(room)
}

/// The surface currently running on this node
enum Surface {
    Editor(Editor),
    Companion(Companion),
    Display {
        surface: DisplaySurface,
        log: JoinHandle<()>,
    },
}

impl Surface {
    fn start(role: Role, sync: &SyncHandle, generator: Option<&Arc<dyn ContentGenerator>>) -> Self {
        tracing::info!(%role, "Starting surface");
        match role {
            Role::Editor => {
                let mut editor = Editor::new(sync.clone());
                if let Some(g) = generator {
                    editor = editor.with_generator(g.clone());
                }
                Self::Editor(editor)
            }
            Role::Companion => {
                let mut companion = Companion::new(sync.clone());
                if let Some(g) = generator {
                    companion = companion.with_generator(g.clone());
                }
                Self::Companion(companion)
            }
            Role::Display => {
                let surface = DisplaySurface::spawn(sync, DisplayOptions::default());
                let mut screens = surface.subscribe();
                let log = tokio::spawn(async move {
                    loop {
                        let summary = screens.borrow_and_update().summary();
                        tracing::info!(screen = %summary, "Showing");
                        if screens.changed().await.is_err() {
                            break;
                        }
                    }
                });
                Self::Display { surface, log }
            }
        }
    }

    async fn stop(self) {
        if let Self::Display { surface, log } = self {
            surface.shutdown().await;
            log.abort();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logger::init_logger(&cli.log_level, cli.log_json, cli.log_dir.as_deref());

    let storage = Storage::new(&cli.data_dir);
    let room = resolve_room(&cli, &storage)?;
    let device_id = match cli.device_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => DeviceId::new(id),
        None => storage.device_id().context("loading device id")?,
    };

    let mut config = ClientConfig::new(room)
        .with_relay_url(&cli.relay_url)
        .with_device_id(device_id)
        .with_role(cli.mode)
        .with_data_dir(&cli.data_dir);
    if let Some(ip) = &cli.advertised_ip {
        config = config.with_advertised_ip(ip);
    }
    match cli.genai() {
        Some(genai) => config = config.with_genai(genai),
        None => tracing::info!("VITRINE_GENAI_API_KEY not set, content generation disabled"),
    }
    let generator = config.generator().context("building generation client")?;

    tracing::info!(
        room = %config.room,
        device_id = %config.device_id,
        relay = %config.relay_url,
        secure = config.is_secure(),
        "Starting vitrine"
    );

    let connector = Arc::new(WsConnector::new(config.relay_url.clone()));
    let storage = config.storage();
    let sync = SyncClient::spawn(config, connector, storage);
    let mut events = sync.events();
    let mut surface = Surface::start(sync.role(), &sync, generator.as_ref());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(SyncEvent::RoleChanged { role }) => {
                    surface.stop().await;
                    surface = Surface::start(role, &sync, generator.as_ref());
                }
                Ok(SyncEvent::RosterChanged) if matches!(surface, Surface::Editor(_)) => {
                    let roster = sync.roster();
                    tracing::info!(devices = roster.len(), "Device list updated");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Skipped {n} sync events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    surface.stop().await;
    sync.shutdown().await;
    Ok(())
}
