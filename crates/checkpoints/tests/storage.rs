use checkpoints::{
    load_block, save_block, CheckpointBlock, FileBackedStorage, InMemoryStorage, Storage, U256,
    BLOCKS_BUCKET, CHECKPOINTS_BUCKET,
};

#[test]
fn test_in_memory_put_get_delete() {
    let storage = InMemoryStorage::new();

    assert_eq!(storage.get(b"k").unwrap(), None);
    storage.put(b"k", b"v").unwrap();
    assert_eq!(storage.get(b"k").unwrap(), Some(b"v".to_vec()));
    storage.delete(b"k").unwrap();
    assert_eq!(storage.get(b"k").unwrap(), None);
}

#[test]
fn test_file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plasma.json");

    {
        let storage = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
        storage.put(b"key", &[0, 1, 2, 255]).unwrap();
    }

    let reopened = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
    assert_eq!(reopened.get(b"key").unwrap(), Some(vec![0, 1, 2, 255]));
}

#[test]
fn test_file_storage_buckets_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plasma.json");

    let checkpoints = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
    checkpoints.put(b"1", b"checkpoint").unwrap();

    let blocks = FileBackedStorage::open(&path, BLOCKS_BUCKET).unwrap();
    assert_eq!(blocks.bucket(), BLOCKS_BUCKET);
    assert_eq!(blocks.get(b"1").unwrap(), None);
    blocks.put(b"1", b"block").unwrap();

    let reopened = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
    assert_eq!(reopened.get(b"1").unwrap(), Some(b"checkpoint".to_vec()));
}

#[test]
fn test_file_storage_interleaved_bucket_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plasma.json");

    {
        let checkpoints = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
        let blocks = FileBackedStorage::open(&path, BLOCKS_BUCKET).unwrap();

        blocks.put(b"1", b"block").unwrap();
        checkpoints.put(b"1", b"checkpoint").unwrap();
        blocks.put(b"2", b"block").unwrap();
        checkpoints.delete(b"missing").unwrap();

        let reopened = FileBackedStorage::open(&path, BLOCKS_BUCKET).unwrap();
        assert_eq!(reopened.get(b"1").unwrap(), Some(b"block".to_vec()));
    }

    // every handle dropped, so this reads the file back from disk
    let blocks = FileBackedStorage::open(&path, BLOCKS_BUCKET).unwrap();
    let checkpoints = FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).unwrap();
    assert_eq!(blocks.get(b"1").unwrap(), Some(b"block".to_vec()));
    assert_eq!(blocks.get(b"2").unwrap(), Some(b"block".to_vec()));
    assert_eq!(checkpoints.get(b"1").unwrap(), Some(b"checkpoint".to_vec()));
}

#[test]
fn test_file_storage_concurrent_bucket_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plasma.json");

    std::thread::scope(|s| {
        for bucket in [BLOCKS_BUCKET, CHECKPOINTS_BUCKET] {
            let path = &path;
            s.spawn(move || {
                let storage = FileBackedStorage::open(path, bucket).unwrap();
                for n in 0..20u32 {
                    storage.put(&n.to_be_bytes(), bucket.as_bytes()).unwrap();
                }
            });
        }
    });

    for bucket in [BLOCKS_BUCKET, CHECKPOINTS_BUCKET] {
        let storage = FileBackedStorage::open(&path, bucket).unwrap();
        for n in 0..20u32 {
            assert_eq!(storage.get(&n.to_be_bytes()).unwrap(), Some(bucket.as_bytes().to_vec()));
        }
    }
}

#[test]
fn test_file_storage_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plasma.json");
    std::fs::write(&path, b"{ nope").unwrap();

    assert!(FileBackedStorage::open(&path, CHECKPOINTS_BUCKET).is_err());
}

#[test]
fn test_save_and_load_block() {
    let storage = InMemoryStorage::new();
    let block = CheckpointBlock::new();
    for n in 1..=5u64 {
        block.add_checkpoint(U256::from(n), U256::from(n * 10)).unwrap();
    }
    let root = block.build().unwrap();

    save_block(&storage, 3, &block).unwrap();
    assert!(load_block(&storage, 4).unwrap().is_none());

    let restored = load_block(&storage, 3).unwrap().unwrap();
    assert!(!restored.is_built());
    assert_eq!(restored.build().unwrap(), root);

    let proof = restored.create_proof(U256::from(2u64)).unwrap();
    assert!(checkpoints::verify_checkpoint_proof(&proof, U256::from(2u64), Some(U256::from(20u64)), root).unwrap());
}
