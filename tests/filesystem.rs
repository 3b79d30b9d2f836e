mod common;

use common::{
    v1_image,
    v2_image,
    V1_FS_START,
    V1_PERSISTENT_PAGE,
};
use microbit_fs::{
    Error,
    FsCodec,
    FsFile,
};
use pretty_assertions::assert_eq;

const CHUNK: u32 = 128;

#[test]
fn empty_region_lists_no_files() {
    let codec = FsCodec::new();
    assert!(codec.list_files(&v1_image()).unwrap().is_empty());
    assert!(codec.list_files(&v2_image()).unwrap().is_empty());
}

#[test]
fn single_chunk_roundtrip() {
    common::init_logs();
    let codec = FsCodec::new();
    let mut map = v1_image();

    codec
        .write_file(&mut map, "five_bytes.txt", &[1, 2, 3, 4, 5])
        .unwrap();

    let files = codec.list_files(&map).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files["five_bytes.txt"], vec![1, 2, 3, 4, 5]);
}

#[test]
fn multi_chunk_roundtrip() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    let content: Vec<u8> = (0..300u16).map(|i| (i % 251) as u8).collect();

    codec.write_file(&mut map, "big.bin", &content).unwrap();

    let files = codec.list_files(&map).unwrap();
    assert_eq!(files["big.bin"], content);
}

#[test]
fn roundtrip_on_current_generation_image() {
    let codec = FsCodec::new();
    let mut map = v2_image();

    codec.write_file(&mut map, "main.py", b"print(1)\n").unwrap();
    codec.write_file(&mut map, "data.bin", &[0xAA; 200]).unwrap();

    let files = codec.list_files(&map).unwrap();
    assert_eq!(files["main.py"], b"print(1)\n".to_vec());
    assert_eq!(files["data.bin"], vec![0xAA; 200]);
}

#[test]
fn long_names_and_names_at_the_limit_roundtrip() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    let name = "n".repeat(120);

    codec.write_file(&mut map, &name, &[7]).unwrap();

    let files = codec.list_files(&map).unwrap();
    assert_eq!(files[&name], vec![7]);
}

#[test]
fn scenario_region_bounds_and_sizes() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    // Region 0x38C00..0x3FC00: 224 chunks, the last page is reserved.
    assert_eq!(codec.filesystem_capacity_bytes(&map).unwrap(), 28672);
    assert_eq!(codec.filesystem_free_bytes(&map).unwrap(), 28672);

    codec
        .write_file(&mut map, "five_bytes.txt", &[1, 2, 3, 4, 5])
        .unwrap();
    codec
        .write_file(&mut map, "more_bytes.txt", &[0x55; 128])
        .unwrap();

    assert_eq!(codec.file_size("five_bytes.txt", &[1, 2, 3, 4, 5]), 128);
    assert_eq!(codec.file_size("more_bytes.txt", &[0x55; 128]), 256);
    assert_eq!(
        codec.filesystem_free_bytes(&map).unwrap(),
        28672 - 128 - 256
    );

    // First file starts at the region start with a file-start marker, and
    // the persistent-page byte is set at the start of the reserved page.
    assert_eq!(map.get(V1_FS_START), Some(0xFE));
    assert_eq!(map.get(V1_PERSISTENT_PAGE), Some(0xFD));
}

#[test]
fn capacity_accounting_is_idempotent() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    let files: &[(&str, usize)] = &[("a.py", 10), ("b.py", 130), ("c.bin", 500)];

    let mut used = 0;
    for (name, len) in files {
        let content = vec![0x11; *len];
        codec.write_file(&mut map, name, &content).unwrap();
        used += codec.file_size(name, &content);
    }

    let capacity = codec.filesystem_capacity_bytes(&map).unwrap();
    assert_eq!(codec.filesystem_free_bytes(&map).unwrap(), capacity - used);
}

#[test]
fn exact_multiple_payload_gets_a_trailing_empty_chunk() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    // 2 + 9 + 241 = 252 = 2 * 126: three chunks, not two.
    let content = vec![0x42; 241];
    codec.write_file(&mut map, "quirk.txt", &content).unwrap();

    assert_eq!(codec.file_size("quirk.txt", &content), 3 * CHUNK);
    assert_eq!(codec.filesystem_free_bytes(&map).unwrap(), 28672 - 3 * CHUNK);

    // First chunk stores end offset 0 in its header.
    assert_eq!(map.get(V1_FS_START + 1), Some(0));
    // The third chunk is the terminal one: back-link to chunk 2, no tail.
    let chunk3 = V1_FS_START + 2 * CHUNK;
    assert_eq!(map.get(chunk3), Some(2));
    assert_eq!(map.get(chunk3 + 127), Some(0xFF));

    let files = codec.list_files(&map).unwrap();
    assert_eq!(files["quirk.txt"], content);
}

#[test]
fn broken_back_link_is_an_integrity_failure() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    codec
        .write_file(&mut map, "more_bytes.txt", &[0x55; 128])
        .unwrap();

    // Chunk 2's marker must name chunk 1; corrupt it.
    map.set(V1_FS_START + CHUNK, &[5]);

    match codec.list_files(&map).unwrap_err() {
        Error::FilesystemRead { files, failures } => {
            assert!(files.is_empty());
            assert_eq!(failures.len(), 1);
            assert!(failures[0].contains("link"), "unexpected: {}", failures[0]);
        }
        other => panic!("expected FilesystemRead, got {other:?}"),
    }
}

#[test]
fn intact_files_are_delivered_alongside_failures() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    codec.write_file(&mut map, "good.py", b"ok = True\n").unwrap();
    codec
        .write_file(&mut map, "bad.bin", &[0xEE; 200])
        .unwrap();

    // bad.bin spans chunks 2 and 3; break the back-link of chunk 3.
    map.set(V1_FS_START + 2 * CHUNK, &[9]);

    match codec.list_files(&map).unwrap_err() {
        Error::FilesystemRead { files, failures } => {
            assert_eq!(
                files,
                vec![FsFile {
                    name: "good.py".to_string(),
                    bytes: b"ok = True\n".to_vec(),
                }]
            );
            assert_eq!(failures.len(), 1);
        }
        other => panic!("expected FilesystemRead, got {other:?}"),
    }
}

#[test]
fn duplicate_names_fail_but_still_deliver_one_copy() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    codec.write_file(&mut map, "aaaa.txt", &[1; 10]).unwrap();
    codec.write_file(&mut map, "bbbb.txt", &[2; 10]).unwrap();

    // Overwrite the second file's name bytes (chunk 2, after the two-byte
    // header) so both chains decode to the same name.
    map.set(V1_FS_START + CHUNK + 3, b"aaaa.txt");

    match codec.list_files(&map).unwrap_err() {
        Error::FilesystemRead { files, failures } => {
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].name, "aaaa.txt");
            assert_eq!(failures, vec!["duplicate file name 'aaaa.txt'".to_string()]);
        }
        other => panic!("expected FilesystemRead, got {other:?}"),
    }
}

#[test]
fn name_and_content_validation() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    let empty_name = codec.write_file(&mut map, "", &[1]).unwrap_err();
    assert!(matches!(empty_name, Error::Validation(_)));

    let empty_content = codec.write_file(&mut map, "a.py", &[]).unwrap_err();
    assert!(matches!(empty_content, Error::Validation(_)));

    let long_name = codec
        .write_file(&mut map, &"n".repeat(121), &[1])
        .unwrap_err();
    assert!(matches!(long_name, Error::Validation(_)));

    // Nothing was committed by the failed writes.
    assert!(codec.list_files(&map).unwrap().is_empty());
}

#[test]
fn full_region_rejects_further_writes() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    // 2 + 8 + 28213 = 28223 bytes of payload fill all 224 chunks.
    codec
        .write_file(&mut map, "big.data", &vec![0x33; 28213])
        .unwrap();
    assert_eq!(codec.filesystem_free_bytes(&map).unwrap(), 0);

    let err = codec.write_file(&mut map, "extra.py", &[1]).unwrap_err();
    match err {
        Error::Capacity(msg) => assert!(msg.contains("no storage space"), "unexpected: {msg}"),
        other => panic!("expected Error::Capacity, got {other:?}"),
    }
}

#[test]
fn oversized_file_fails_without_touching_the_image() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    // Needs 225 chunks, one more than the region holds.
    let err = codec
        .write_file(&mut map, "big.data", &vec![0x33; 28300])
        .unwrap_err();
    match err {
        Error::Capacity(msg) => assert!(msg.contains("big.data"), "unexpected: {msg}"),
        other => panic!("expected Error::Capacity, got {other:?}"),
    }
    assert_eq!(codec.filesystem_free_bytes(&map).unwrap(), 28672);
    assert!(codec.list_files(&map).unwrap().is_empty());
}

#[test]
fn appended_script_shrinks_the_region() {
    let codec = FsCodec::new();
    let mut map = v1_image();

    codec
        .write_appended_script(&mut map, "from microbit import *\n")
        .unwrap();

    // Upper bound drops from 0x40000 to the 0x3E000 script block, minus
    // the reserved page: (0x3DC00 - 0x38C00) = 20480 bytes of chunks.
    assert_eq!(codec.filesystem_capacity_bytes(&map).unwrap(), 20480);

    codec.write_file(&mut map, "main.py", b"pass\n").unwrap();
    let files = codec.list_files(&map).unwrap();
    assert_eq!(files["main.py"], b"pass\n".to_vec());
}

#[test]
fn write_files_validates_everything_before_writing() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    let files = vec![
        FsFile {
            name: "ok.py".to_string(),
            bytes: b"x = 1\n".to_vec(),
        },
        FsFile {
            name: String::new(),
            bytes: vec![1],
        },
    ];

    let err = codec.write_files(&mut map, &files).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    // The valid first file must not have been committed either.
    assert!(codec.list_files(&map).unwrap().is_empty());
}

#[test]
fn write_files_commits_all_files() {
    let codec = FsCodec::new();
    let mut map = v1_image();
    let files = vec![
        FsFile {
            name: "one.py".to_string(),
            bytes: b"1\n".to_vec(),
        },
        FsFile {
            name: "two.py".to_string(),
            bytes: b"2\n".to_vec(),
        },
    ];

    codec.write_files(&mut map, &files).unwrap();

    let listed = codec.list_files(&map).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed["two.py"], b"2\n".to_vec());
}
