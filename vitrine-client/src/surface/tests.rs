use super::*;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::genai::{AspectRatio, ContentGenerator, FALLBACK_PHRASE};
use crate::message::{MemoryConnector, MemoryPeer};
use crate::storage::Storage;
use crate::sync::{SyncClient, SyncHandle};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shared::error::ErrorCode;
use shared::models::{DeviceId, Role, SaleUnit};
use shared::{Decimal, Frame, Orientation, RemoteCommand, RoomCode};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::Duration;

fn room() -> RoomCode {
    RoomCode::new("ABC123").unwrap()
}

/// Generator that records the aspect ratios it was asked for
#[derive(Default)]
struct FakeGenerator {
    fail: bool,
    aspects: Mutex<Vec<AspectRatio>>,
}

impl FakeGenerator {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn marketing_phrase(&self, product_name: &str) -> ClientResult<String> {
        if self.fail {
            return Err(ClientError::Generation("offline".into()));
        }
        Ok(format!("{product_name} no ponto!"))
    }

    async fn product_photo(&self, _: &str, aspect: AspectRatio) -> ClientResult<String> {
        self.aspects.lock().push(aspect);
        if self.fail {
            return Err(ClientError::Generation("offline".into()));
        }
        Ok("data:image/png;base64,iVBORw0KGgo=".into())
    }
}

async fn spawn(role: Role) -> (SyncHandle, MemoryPeer, TempDir) {
    let dir = TempDir::new().unwrap();
    let (connector, mut peers) = MemoryConnector::new();
    let sync = SyncClient::spawn(
        ClientConfig::new(room())
            .with_role(role)
            .with_device_id(DeviceId::new("SELF")),
        Arc::new(connector),
        Storage::new(dir.path()),
    );
    let peer = peers.next().await.unwrap();
    (sync, peer, dir)
}

/// Next frame that is not presence chatter
async fn next_data_frame(peer: &mut MemoryPeer) -> Frame {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let frame = peer.recv_frame().await.expect("client hung up");
            if !matches!(
                &frame,
                Frame::RemoteCommand {
                    command: RemoteCommand::Presence { .. } | RemoteCommand::RequestPresence,
                    ..
                }
            ) && !matches!(frame, Frame::Join { .. })
            {
                return frame;
            }
        }
    })
    .await
    .expect("no data frame")
}

#[tokio::test(start_paused = true)]
async fn editor_manages_catalog() {
    let (sync, mut peer, _dir) = spawn(Role::Editor).await;
    let editor = Editor::new(sync.clone());

    let id = editor
        .add_product("  Cupim ", Decimal::new(4290, 2), SaleUnit::Kg, Some("Bovinos"))
        .await
        .unwrap();
    assert_eq!(id, "9");
    let product = sync.state().product("9").cloned().unwrap();
    assert_eq!(product.name, "Cupim");
    assert_eq!(product.category.as_deref(), Some("Bovinos"));

    match next_data_frame(&mut peer).await {
        Frame::UpdateState { payload, base_revision, sender_id, .. } => {
            assert!(payload.product("9").is_some());
            assert_eq!(base_revision, None);
            assert_eq!(sender_id.unwrap().as_str(), "SELF");
        }
        other => panic!("unexpected {}", other.kind()),
    }

    editor.set_price("9", Decimal::new(3999, 2)).await.unwrap();
    assert_eq!(sync.state().product("9").unwrap().price, Decimal::new(3999, 2));

    let err = editor.remove_product("404").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(e) if e.code == ErrorCode::ProductNotFound));
}

#[tokio::test(start_paused = true)]
async fn removing_a_product_prunes_the_super_offer() {
    let (sync, _peer, _dir) = spawn(Role::Editor).await;
    let editor = Editor::new(sync.clone());

    assert!(editor.toggle_super_offer("3", Some(Decimal::new(3990, 2))).await.unwrap());
    assert!(editor.toggle_super_offer("4", None).await.unwrap());
    editor.remove_product("3").await.unwrap();

    let offer = sync.state().super_offer;
    assert_eq!(offer.product_ids, vec!["4".to_string()]);
    assert!(offer.price_of("3").is_none());
    assert!(offer.is_active);

    editor.clear_super_offer().await.unwrap();
    assert!(!sync.state().super_offer.is_active);
}

#[tokio::test(start_paused = true)]
async fn invalid_settings_are_refused() {
    let (sync, _peer, _dir) = spawn(Role::Editor).await;
    let editor = Editor::new(sync.clone());
    let before = sync.state();

    assert!(editor.rename_store("   ").await.is_err());
    assert!(editor.set_intervals(0, 12).await.is_err());
    assert!(editor.set_price("1", Decimal::new(-100, 2)).await.is_err());
    let err = editor
        .add_promotion("404", Decimal::ONE, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
    assert_eq!(sync.state(), before);
    assert!(!sync.is_dirty());

    editor.rename_store("NOVO AÇOUGUE").await.unwrap();
    editor.set_orientation(Orientation::Portrait).await.unwrap();
    editor.set_intervals(5, 10).await.unwrap();
    let state = sync.state();
    assert_eq!(state.store_name, "NOVO AÇOUGUE");
    assert_eq!(state.orientation, Orientation::Portrait);
    assert_eq!((state.promo_interval_secs, state.page_interval_secs), (5, 10));
}

#[tokio::test(start_paused = true)]
async fn editor_generates_copy_and_photos() {
    let (sync, _peer, _dir) = spawn(Role::Editor).await;
    let generator = Arc::new(FakeGenerator::default());
    let editor = Editor::new(sync.clone()).with_generator(generator.clone());

    let id = editor
        .add_promotion("1", Decimal::new(5990, 2), "")
        .await
        .unwrap();
    assert_eq!(id, "p3");

    let phrase = editor.generate_description(&id).await.unwrap();
    let name = sync.state().product("1").unwrap().name.clone();
    assert_eq!(phrase, format!("{name} no ponto!"));
    assert_eq!(sync.state().promotion(&id).unwrap().description, phrase);

    assert!(editor.generate_photo(&id, AspectRatio::Square).await.unwrap());
    assert!(sync.state().promotion(&id).unwrap().has_inline_image());
    assert_eq!(*generator.aspects.lock(), vec![AspectRatio::Square]);
}

#[tokio::test(start_paused = true)]
async fn generation_failures_fall_back() {
    let (sync, _peer, _dir) = spawn(Role::Editor).await;
    let editor = Editor::new(sync.clone()).with_generator(Arc::new(FakeGenerator::failing()));
    let image_before = sync.state().promotion("p1").unwrap().image.clone();

    assert_eq!(editor.generate_description("p1").await.unwrap(), FALLBACK_PHRASE);
    assert!(!editor.generate_photo("p1", AspectRatio::Landscape).await.unwrap());
    assert_eq!(sync.state().promotion("p1").unwrap().image, image_before);

    let bare = Editor::new(sync);
    assert!(matches!(
        bare.generate_description("p1").await,
        Err(ClientError::Generation(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn editor_remote_control() {
    let (sync, mut peer, _dir) = spawn(Role::Editor).await;
    let editor = Editor::new(sync.clone());

    assert!(editor.highlight(Some("nope")).await.is_err());

    editor.highlight(Some("p2")).await.unwrap();
    match next_data_frame(&mut peer).await {
        Frame::RemoteCommand { command: RemoteCommand::Highlight { promotion_id }, .. } => {
            assert_eq!(promotion_id.as_deref(), Some("p2"));
        }
        other => panic!("unexpected {}", other.kind()),
    }

    editor
        .switch_mode(Some(DeviceId::new("TV-1")), Role::Display)
        .await
        .unwrap();
    match next_data_frame(&mut peer).await {
        Frame::RemoteCommand {
            command: RemoteCommand::SwitchMode { mode, target_device_id },
            ..
        } => {
            assert_eq!(mode, Role::Display);
            assert_eq!(target_device_id.unwrap().as_str(), "TV-1");
        }
        other => panic!("unexpected {}", other.kind()),
    }

    editor.refresh_roster().await.unwrap();
    loop {
        let frame = peer.recv_frame().await.unwrap();
        if matches!(
            frame,
            Frame::RemoteCommand { command: RemoteCommand::RequestPresence, .. }
        ) {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn companion_nudges_prices_and_never_goes_negative() {
    let (sync, _peer, _dir) = spawn(Role::Companion).await;
    let companion = Companion::new(sync.clone());
    let start = sync.state().promotion("p1").unwrap().offer_price;

    assert_eq!(companion.raise_price("p1").await.unwrap(), start + PRICE_STEP);
    assert_eq!(companion.lower_price("p1").await.unwrap(), start);
    assert_eq!(
        companion.nudge_price("p1", -(start + Decimal::TEN)).await.unwrap(),
        Decimal::ZERO
    );
    assert!(companion.nudge_price("p404", PRICE_STEP).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn companion_photo_follows_orientation() {
    let (sync, _peer, _dir) = spawn(Role::Companion).await;
    Editor::new(sync.clone())
        .set_orientation(Orientation::Portrait)
        .await
        .unwrap();
    let generator = Arc::new(FakeGenerator::default());
    let companion = Companion::new(sync.clone()).with_generator(generator.clone());

    assert!(companion.regenerate_photo("p2").await.unwrap());
    assert_eq!(*generator.aspects.lock(), vec![AspectRatio::Portrait]);
    assert!(Companion::new(sync).regenerate_photo("p2").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn companion_force_push_sends_whole_document() {
    let (sync, mut peer, _dir) = spawn(Role::Companion).await;
    let companion = Companion::new(sync.clone());

    companion.force_push().await.unwrap();
    match next_data_frame(&mut peer).await {
        Frame::RemoteCommand {
            sender_id,
            command: RemoteCommand::ForcePush(state),
            ..
        } => {
            assert_eq!(sender_id.as_str(), "SELF");
            assert_eq!(*state, sync.state());
        }
        other => panic!("unexpected {}", other.kind()),
    }
}
