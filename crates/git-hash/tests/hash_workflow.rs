use git_hash::collections::{OidArray, OidMap, OidSet};
use git_hash::fanout::FanoutTable;
use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};

#[test]
fn full_workflow_sha1() {
    let algo = HashAlgorithm::Sha1;

    // 1. Hash computation
    let oid = Hasher::digest(algo, b"test content").unwrap();
    assert_eq!(oid.algorithm(), algo);
    assert_eq!(oid.as_bytes().len(), algo.digest_len());
    assert_eq!(oid.to_hex().len(), algo.hex_len());

    // 2. Streaming hash matches one-shot
    let mut hasher = Hasher::new(algo);
    hasher.update(b"test ");
    hasher.update(b"content");
    assert_eq!(hasher.finalize().unwrap(), oid);

    // 3. git object hashing
    let blob_oid = Hasher::hash_object(algo, "blob", b"test").unwrap();
    assert_eq!(blob_oid.algorithm(), algo);

    // 4. Hex round-trip
    let hex = oid.to_hex();
    let parsed: ObjectId = hex.parse().unwrap();
    assert_eq!(parsed, oid);

    // 5. Null OID
    let null = algo.null_oid();
    assert!(null.is_null());
    assert_eq!(null.algorithm(), algo);

    // 6. From bytes round-trip
    let reconstructed = ObjectId::from_bytes(oid.as_bytes(), algo).unwrap();
    assert_eq!(reconstructed, oid);

    // 7. Collections
    let oids: Vec<ObjectId> = (0..100u32)
        .map(|n| Hasher::digest(algo, &n.to_be_bytes()).unwrap())
        .collect();

    let mut arr = OidArray::new();
    for &oid in &oids {
        arr.push(oid);
    }
    assert!(arr.contains(&oids[50]));
    assert!(!arr.contains(&null));

    let mut set = OidSet::new();
    for &oid in &oids {
        set.insert(oid);
    }
    assert!(set.contains(&oids[50]));
    assert_eq!(set.len(), 100);

    let mut map = OidMap::new();
    for (i, &oid) in oids.iter().enumerate() {
        map.insert(oid, i);
    }
    assert_eq!(map.get(&oids[50]), Some(&50));

    // 8. FanoutTable
    let mut sorted_oids = oids.clone();
    sorted_oids.sort();
    let ft = FanoutTable::build(&sorted_oids);
    assert_eq!(ft.total() as usize, sorted_oids.len());

    let bytes = ft.to_bytes();
    let ft2 = FanoutTable::from_bytes(&bytes).unwrap();
    for b in 0..=255u8 {
        assert_eq!(ft.range(b), ft2.range(b));
    }
}

#[test]
fn hasher_accepts_algorithm_parameter() {
    let h = Hasher::new(HashAlgorithm::Sha1);
    let oid = h.finalize().unwrap();
    assert_eq!(oid.algorithm(), HashAlgorithm::Sha1);
}
