use hierfs::io::{FileDisk, FileDiskBuilder};
use hierfs::{Config, FileSystem, FsError, SECTOR_SIZE};
use tempfile::NamedTempFile;

fn format_fresh() -> FileSystem<FileDisk> {
    let config = Config::default();
    let dev = FileDiskBuilder::from(tempfile::tempfile().unwrap())
        .with_sector_count(config.num_sectors())
        .build()
        .unwrap();
    FileSystem::format(dev, config).unwrap()
}

#[test]
fn can_initialize_disk_and_mount_it_again() {
    let disk = NamedTempFile::new().unwrap();
    let config = Config::default();

    // Prepare the disk with the file system layout.
    let dev = FileDiskBuilder::from(disk.reopen().unwrap())
        .with_sector_count(config.num_sectors())
        .build()
        .unwrap();
    let fs = FileSystem::format(dev, config).unwrap();
    fs.create_directory("/docs").unwrap();
    fs.create("/docs/readme", 100).unwrap();
    let id = fs.open("/docs/readme").unwrap();
    assert_eq!(fs.write(id, b"hello").unwrap(), 5);
    drop(fs);

    let dev = FileDiskBuilder::from(disk.reopen().unwrap())
        .with_sector_count(config.num_sectors())
        // Don't reset initialized disk.
        .clear_medium(false)
        .build()
        .unwrap();
    let fs = FileSystem::mount(dev, config).unwrap();
    assert_eq!(fs.list_recursive("/").unwrap(), "docs [D]\n  readme [F]\n");
    let id = fs.open("/docs/readme").unwrap();
    assert_eq!(fs.read(id, 5).unwrap(), b"hello");
}

#[test]
fn unformatted_disk_does_not_mount() {
    let config = Config::default();
    let dev = FileDiskBuilder::from(tempfile::tempfile().unwrap())
        .with_sector_count(config.num_sectors())
        .build()
        .unwrap();
    assert!(matches!(
        FileSystem::mount(dev, config),
        Err(FsError::Corrupted(_))
    ));
}

#[test]
fn created_files_open_with_their_requested_size() {
    let fs = format_fresh();
    for (i, &size) in [0, 1, 100, SECTOR_SIZE, 3 * SECTOR_SIZE + 7].iter().enumerate() {
        let path = format!("/file{}", i);
        fs.create(&path, size).unwrap();
        let id = fs.open(&path).unwrap();
        assert_eq!(fs.length(id).unwrap(), size);
        fs.close(id).unwrap();
    }
}

#[test]
fn creating_an_existing_name_collides_and_changes_nothing() {
    let fs = format_fresh();
    fs.create_directory("/d").unwrap();
    fs.create("/d/x", 10).unwrap();
    let listing = fs.list("/d").unwrap();
    let free = fs.free_sectors().unwrap();

    assert!(matches!(fs.create("/d/x", 10), Err(FsError::NameCollision(_))));
    assert!(matches!(
        fs.create_directory("/d/x"),
        Err(FsError::NameCollision(_))
    ));
    assert_eq!(fs.list("/d").unwrap(), listing);
    assert_eq!(fs.free_sectors().unwrap(), free);
}

#[test]
fn removed_files_cannot_be_opened() {
    let fs = format_fresh();
    fs.create("/a", 50).unwrap();
    fs.remove("/a").unwrap();
    assert!(matches!(fs.open("/a"), Err(FsError::PathNotFound(_))));
    assert!(matches!(fs.remove("/a"), Err(FsError::PathNotFound(_))));
}

#[test]
fn missing_intermediate_directories_fail_resolution() {
    let fs = format_fresh();
    assert!(matches!(
        fs.create("/nope/file", 10),
        Err(FsError::PathNotFound(_))
    ));
    assert!(matches!(fs.list("/nope"), Err(FsError::PathNotFound(_))));
    assert!(matches!(
        fs.open("/nope/file"),
        Err(FsError::PathNotFound(_))
    ));
}

#[test]
fn recursive_remove_reclaims_the_whole_subtree() {
    let fs = format_fresh();
    let free = fs.free_sectors().unwrap();

    fs.create_directory("/d").unwrap();
    fs.create("/d/a", 300).unwrap();
    fs.create("/d/b", 20).unwrap();
    fs.create_directory("/d/c").unwrap();
    fs.create("/d/c/d1", 500).unwrap();
    fs.create("/keep", 10).unwrap();
    let keep_cost = 2;
    assert!(fs.free_sectors().unwrap() < free - keep_cost);

    fs.remove_recursive("/d").unwrap();

    assert_eq!(fs.list_recursive("/").unwrap(), "keep [F]\n");
    assert_eq!(fs.free_sectors().unwrap(), free - keep_cost);
    for path in ["/d", "/d/a", "/d/b", "/d/c", "/d/c/d1"] {
        assert!(fs.open(path).is_err(), "{} still resolves", path);
    }

    // The reclaimed sectors are allocatable again.
    fs.create("/big", hierfs::MAX_FILE_SIZE).unwrap();
}

#[test]
fn directory_table_fills_at_its_capacity() {
    let fs = format_fresh();
    let entries = fs.config().dir_entries();
    for i in 0..entries {
        fs.create(&format!("/f{}", i), 0).unwrap();
    }
    assert!(matches!(
        fs.create(&format!("/f{}", entries), 0),
        Err(FsError::DirectoryFull)
    ));
}

#[test]
fn readme_scenario() {
    let fs = format_fresh();
    fs.create_directory("/docs").unwrap();
    fs.create("/docs/readme", 100).unwrap();
    let id = fs.open("/docs/readme").unwrap();
    assert!(id > 0);
    assert_eq!(fs.list("/docs").unwrap(), "readme [F]\n");

    fs.remove("/docs/readme").unwrap();

    assert_eq!(fs.list("/docs").unwrap(), "");
    assert_eq!(fs.list_recursive("/docs").unwrap(), "Empty Folder\n");
    assert_eq!(
        fs.list_recursive("/").unwrap(),
        "docs [D]\n  Empty Folder\n"
    );
}

#[test]
fn handles_read_and_write_sequentially() {
    let fs = format_fresh();
    fs.create("/notes", 10).unwrap();
    let id = fs.open("/notes").unwrap();

    assert_eq!(fs.write(id, b"0123456789abc").unwrap(), 10);
    fs.seek(id, 4).unwrap();
    assert_eq!(fs.read(id, 3).unwrap(), b"456");
    assert_eq!(fs.read(id, 10).unwrap(), b"789");
    assert!(fs.read(id, 10).unwrap().is_empty());

    fs.close(id).unwrap();
    assert!(matches!(fs.close(id), Err(FsError::InvalidHandle(_))));
    assert!(matches!(fs.read(id, 1), Err(FsError::InvalidHandle(_))));
}

#[test]
fn nested_directories_list_recursively() {
    let fs = format_fresh();
    fs.create_directory("/a").unwrap();
    fs.create_directory("/a/b").unwrap();
    fs.create_directory("/a/b/c").unwrap();
    fs.create("/a/b/f", 1).unwrap();
    fs.create("/g", 1).unwrap();

    assert_eq!(fs.list("/").unwrap(), "a [D]\ng [F]\n");
    assert_eq!(fs.list("a/b").unwrap(), "c [D]\nf [F]\n");
    assert_eq!(
        fs.list_recursive("/").unwrap(),
        "a [D]\n  b [D]\n    c [D]\n      Empty Folder\n    f [F]\ng [F]\n"
    );
    assert_eq!(
        fs.list_recursive("/a/b").unwrap(),
        "c [D]\n  Empty Folder\nf [F]\n"
    );
}

#[test]
fn path_limits_are_reported() {
    let fs = format_fresh();
    assert!(matches!(
        fs.create("/waytoolongname", 1),
        Err(FsError::NameTooLong { .. })
    ));
    let deep = "/d".repeat(fs.config().max_path_depth() + 1);
    assert!(matches!(
        fs.create(&deep, 1),
        Err(FsError::PathTooDeep { .. })
    ));
}
