use super::*;

fn inline_source() -> AssetSource {
    AssetSource::Inline {
        mime: "image/png".to_string(),
        data_b64: "aGVsbG8=".to_string(),
    }
}

#[tokio::test]
async fn creates_and_lists_maps() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let map_id = storage
        .create_map(&NewMap {
            name: "Sunken Crypt".to_string(),
            group_name: Some("Act 2".to_string()),
            source: Some(inline_source()),
            song_id: None,
        })
        .await
        .expect("map");

    let maps = storage.list_maps().await.expect("maps");
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].map_id, map_id);
    assert_eq!(maps[0].name, "Sunken Crypt");
    assert_eq!(maps[0].source, Some(inline_source()));
}

#[tokio::test]
async fn new_maps_seed_identity_geometry() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let map_id = storage
        .create_map(&NewMap {
            name: "Village".to_string(),
            group_name: None,
            source: None,
            song_id: None,
        })
        .await
        .expect("map");

    let map = storage.get_map(map_id).await.expect("get").expect("some");
    assert_eq!(map.zoom, 1.0);
    assert_eq!(map.rotation, 0);
    assert_eq!(map.pan_x, 0.0);
    assert_eq!(map.pan_y, 0.0);
}

#[tokio::test]
async fn updates_map_transform_in_place() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let map_id = storage
        .create_map(&NewMap {
            name: "Keep".to_string(),
            group_name: None,
            source: None,
            song_id: None,
        })
        .await
        .expect("map");

    let updated = storage
        .update_map_transform(map_id, 1.4, 270, -35.0, 12.5)
        .await
        .expect("transform");
    assert!(updated);

    let map = storage.get_map(map_id).await.expect("get").expect("some");
    assert_eq!(map.zoom, 1.4);
    assert_eq!(map.rotation, 270);
    assert_eq!(map.pan_x, -35.0);
    assert_eq!(map.pan_y, 12.5);

    let missing = storage
        .update_map_transform(MapId(9999), 1.0, 0, 0.0, 0.0)
        .await
        .expect("transform");
    assert!(!missing);
}

#[tokio::test]
async fn patches_only_provided_map_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let song_id = storage
        .create_song(&NewSong {
            name: "Battle Theme".to_string(),
            group_name: None,
            file_path: "/music/battle.mp3".to_string(),
        })
        .await
        .expect("song");
    let map_id = storage
        .create_map(&NewMap {
            name: "Keep".to_string(),
            group_name: Some("Act 1".to_string()),
            source: None,
            song_id: Some(song_id),
        })
        .await
        .expect("map");

    storage
        .update_map(
            map_id,
            &MapPatch {
                name: Some("Ruined Keep".to_string()),
                ..MapPatch::default()
            },
        )
        .await
        .expect("patch");

    let map = storage.get_map(map_id).await.expect("get").expect("some");
    assert_eq!(map.name, "Ruined Keep");
    assert_eq!(map.group_name.as_deref(), Some("Act 1"));
    assert_eq!(map.song_id, Some(song_id));
}

#[tokio::test]
async fn deleting_song_clears_map_references() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let song_id = storage
        .create_song(&NewSong {
            name: "Tavern".to_string(),
            group_name: Some("Ambience".to_string()),
            file_path: "/music/tavern.mp3".to_string(),
        })
        .await
        .expect("song");
    let map_id = storage
        .create_map(&NewMap {
            name: "Tavern Floor".to_string(),
            group_name: None,
            source: None,
            song_id: Some(song_id),
        })
        .await
        .expect("map");

    let deleted = storage.delete_song(song_id).await.expect("delete");
    assert!(deleted);

    let map = storage.get_map(map_id).await.expect("get").expect("some");
    assert_eq!(map.song_id, None);
    assert!(storage.list_songs().await.expect("songs").is_empty());
}

#[tokio::test]
async fn presentation_state_is_last_write_wins() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.load_presentation_state().await.expect("load"), None);

    storage
        .save_presentation_state(r#"{"zoom":1.0}"#)
        .await
        .expect("save");
    storage
        .save_presentation_state(r#"{"zoom":2.5}"#)
        .await
        .expect("save");

    let loaded = storage
        .load_presentation_state()
        .await
        .expect("load")
        .expect("some");
    assert_eq!(loaded, r#"{"zoom":2.5}"#);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("scenecast_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("scenecast.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
