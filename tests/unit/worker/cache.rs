use super::*;
use crate::foundation::core::Dimensions;

fn tiny() -> SourceImage {
    SourceImage::from_premul_rgba8(Dimensions::new(1, 1), &[1, 2, 3, 255]).unwrap()
}

#[test]
fn hits_and_misses_are_counted() {
    let stats = Arc::new(ContextStats::default());
    let mut cache = DecodeCache::new(Arc::clone(&stats));
    let id = ImageId::new("a");
    assert!(cache.get(&id).is_none());
    cache.insert(id.clone(), tiny());
    assert!(cache.get(&id).is_some());
    assert_eq!((stats.cache_hits(), stats.cache_misses()), (1, 1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn replacing_and_evicting_release_bitmaps() {
    let stats = Arc::new(ContextStats::default());
    let mut cache = DecodeCache::new(Arc::clone(&stats));
    let id = ImageId::new("a");
    cache.insert(id.clone(), tiny());
    cache.insert(id.clone(), tiny());
    assert_eq!(stats.released(), 1);
    assert!(cache.evict(&id));
    assert!(!cache.evict(&id));
    assert_eq!(stats.released(), 2);
}

#[test]
fn clear_releases_everything() {
    let stats = Arc::new(ContextStats::default());
    let mut cache = DecodeCache::new(Arc::clone(&stats));
    for name in ["a", "b", "c"] {
        cache.insert(ImageId::new(name), tiny());
    }
    cache.clear();
    assert_eq!(cache.len(), 0);
    assert_eq!(stats.released(), 3);
}
