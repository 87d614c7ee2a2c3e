mod cli;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use hierfs::io::{BlockStorage, FileDisk, FileDiskBuilder};
use hierfs::{Config, FileSystem, SECTOR_SIZE};

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:?}", e);
            eprintln!("hierfs: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn config(cli: &Cli) -> hierfs::Result<Config> {
    let mut builder = Config::builder();
    if let Some(sectors) = cli.sectors {
        builder = builder.with_num_sectors(sectors);
    }
    if let Some(entries) = cli.dir_entries {
        builder = builder.with_dir_entries(entries);
    }
    if let Some(depth) = cli.max_depth {
        builder = builder.with_max_path_depth(depth);
    }
    builder.build()
}

fn run(cli: Cli) -> hierfs::Result<()> {
    let config = config(&cli)?;
    let mount = || -> hierfs::Result<FileSystem<FileDisk>> {
        let dev = FileDisk::open_disk(&cli.disk, config.num_sectors())?;
        FileSystem::mount(dev, config)
    };

    match cli.command {
        Command::Format => format(&cli.disk, config)?,
        Command::Mkdir { ref path } => mount()?.create_directory(path)?,
        Command::Create { ref path, size } => mount()?.create(path, size)?,
        Command::Cp {
            ref source,
            ref path,
        } => {
            let fs = mount()?;
            let data = std::fs::read(source)?;
            fs.create(path, data.len())?;
            let id = fs.open(path)?;
            let written = fs.write(id, &data)?;
            fs.close(id)?;
            println!("copied {} bytes into {}", written, path);
        }
        Command::Cat { ref path } => {
            let fs = mount()?;
            let id = fs.open(path)?;
            let data = fs.read(id, fs.length(id)?)?;
            fs.close(id)?;
            std::io::stdout().write_all(&data)?;
        }
        Command::Ls { recursive, ref path } => {
            let fs = mount()?;
            let listing = if recursive {
                fs.list_recursive(path)?
            } else {
                fs.list(path)?
            };
            print!("{}", listing);
        }
        Command::Rm { recursive, ref path } => {
            let fs = mount()?;
            if recursive {
                fs.remove_recursive(path)?
            } else {
                fs.remove(path)?
            }
        }
        Command::Print => print!("{}", mount()?.print()?),
    }
    Ok(())
}

fn format(disk: &Path, config: Config) -> hierfs::Result<()> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(disk)?;
    fd.set_len((config.num_sectors() * SECTOR_SIZE) as u64)?;
    let dev = FileDiskBuilder::from(fd)
        .with_sector_count(config.num_sectors())
        .build()?;
    FileSystem::format(dev, config)?;
    println!("formatted {:?}", disk);
    Ok(())
}
