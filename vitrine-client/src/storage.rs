// vitrine-client/src/storage.rs
// 本地存储 - 状态文档与房间号的 JSON 文件存储

use shared::models::DeviceId;
use shared::{AppState, RoomCode};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, ClientResult};

const STATE_FILE: &str = "state.json";
const ROOM_FILE: &str = "room";
const DEVICE_FILE: &str = "device";

/// 本地存储
///
/// `<data_dir>/state.json` holds the whole document; `<data_dir>/room` the
/// room code as plain text.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 确保目录存在
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// 保存状态文档
    pub fn save_state(&self, state: &AppState) -> ClientResult<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(state)?;
        // Write then rename so a crash never leaves a half-written document
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.state_path())?;
        Ok(())
    }

    /// 保存状态文档 on the blocking pool; documents can carry inline photos
    pub async fn save_state_async(&self, state: AppState) -> ClientResult<()> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || storage.save_state(&state))
            .await
            .map_err(|e| ClientError::Storage(std::io::Error::other(format!("Task join failed: {e}"))))?
    }

    /// 加载状态文档; missing or unreadable storage yields the sample catalog
    pub fn load_state(&self) -> AppState {
        let path = self.state_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No stored state, using sample catalog");
            return AppState::sample();
        }
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
        {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Stored state unreadable, using sample catalog: {e}");
                AppState::sample()
            }
        }
    }

    /// 保存房间号
    pub fn save_room(&self, room: &RoomCode) -> ClientResult<()> {
        self.ensure_dir()?;
        fs::write(self.room_path(), room.as_str())?;
        Ok(())
    }

    /// 加载房间号
    pub fn load_room(&self) -> Option<RoomCode> {
        let text = fs::read_to_string(self.room_path()).ok()?;
        match RoomCode::new(&text) {
            Ok(room) => Some(room),
            Err(e) => {
                tracing::warn!("Ignoring stored room code: {e}");
                None
            }
        }
    }

    /// 加载或生成设备 ID
    ///
    /// The id is generated once per data directory so a restarted node keeps
    /// its roster entry.
    pub fn device_id(&self) -> ClientResult<DeviceId> {
        let path = self.dir.join(DEVICE_FILE);
        if let Ok(text) = fs::read_to_string(&path) {
            let id = text.trim();
            if !id.is_empty() {
                return Ok(DeviceId::new(id));
            }
        }
        let id = DeviceId::generate();
        self.ensure_dir()?;
        fs::write(&path, id.as_str())?;
        tracing::info!(device_id = %id, "Generated device id");
        Ok(id)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn room_path(&self) -> PathBuf {
        self.dir.join(ROOM_FILE)
    }

    /// 获取目录
    pub fn path(&self) -> &Path {
        &self.dir
    }
}
