use super::*;

#[test]
fn in_memory_store_inserts_and_removes() {
    let store = InMemoryOriginals::new();
    let id = ImageId::new("a");
    assert!(store.load(&id).unwrap().is_none());
    store
        .insert(id.clone(), ImageSource::from_bytes(vec![1u8, 2, 3]))
        .unwrap();
    assert_eq!(
        store.load(&id).unwrap(),
        Some(ImageSource::from_bytes(vec![1u8, 2, 3]))
    );
    assert!(store.remove(&id).unwrap());
    assert!(!store.remove(&id).unwrap());
}

#[test]
fn directory_store_resolves_plain_names_only() {
    let dir = std::env::temp_dir().join(format!("storyframe_originals_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("photo.png"), b"x").unwrap();

    let store = DirectoryOriginals::new(&dir);
    assert_eq!(
        store.load(&ImageId::new("photo.png")).unwrap(),
        Some(ImageSource::File(dir.join("photo.png")))
    );
    assert!(store.load(&ImageId::new("missing.png")).unwrap().is_none());
    assert!(store.load(&ImageId::new("../photo.png")).unwrap().is_none());
    assert!(store.load(&ImageId::new("..")).unwrap().is_none());

    let _ = std::fs::remove_dir_all(&dir);
}
