use hierfs::io::FileDiskBuilder;
use hierfs::{Config, FileSystem};

pub fn main() {
    let config = Config::default();
    let tmp = tempfile::tempfile().unwrap();
    let dev = FileDiskBuilder::from(tmp)
        .with_sector_count(config.num_sectors())
        .build()
        .expect("Could not initialize disk emulator.");

    // create a new file system on the device and say hello in it
    let fs = FileSystem::format(dev, config).expect("should format");
    fs.create_directory("/docs").unwrap();
    fs.create("/docs/hello", 12).unwrap();
    let id = fs.open("/docs/hello").unwrap();
    fs.write(id, b"hello, world").unwrap();
    fs.close(id).unwrap();

    print!("{}", fs.list_recursive("/").unwrap());
}
