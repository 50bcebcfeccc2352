mod cli;

use std::io;
use std::process;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use tree_fs::{BlockDevice, FileSystem};
use tree_fs_fuse::{create_disk, open_disk};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let device: Arc<dyn BlockDevice> = if cli.format {
        Arc::new(create_disk(&cli.disk, cli.sectors)?)
    } else {
        Arc::new(open_disk(&cli.disk)?)
    };

    let fs = if cli.format {
        FileSystem::format(device, cli.sectors)
    } else {
        FileSystem::load(device, cli.sectors)
    };

    if let Some(args) = &cli.copy {
        let (host, path) = (&args[0], &args[1]);
        let data = std::fs::read(host)?;
        check(path, fs.create(path, data.len()));
        let file = check(path, fs.open(path));
        assert_eq!(file.write_at(&data, 0), data.len());
        tree_fs::sync_all();
        println!("{host} -> {path} ({} bytes)", data.len());
    }

    if let Some(path) = &cli.mkdir {
        check(path, fs.mkdir(path));
    }

    if let Some(path) = &cli.remove {
        check(path, fs.remove(path, cli.recursive));
    }

    if let Some(path) = &cli.list {
        for entry in check(path, fs.list(path, cli.recursive)) {
            println!(
                "{}{}{}",
                "  ".repeat(entry.depth),
                entry.name,
                if entry.is_dir { "/" } else { "" }
            );
        }
    }

    if cli.print {
        let mut out = String::new();
        fs.dump(&mut out).unwrap();
        print!("{out}");
    }

    Ok(())
}

fn check<T>(path: &str, result: Result<T, tree_fs::Error>) -> T {
    result.unwrap_or_else(|err| {
        eprintln!("{path}: {err:?}");
        process::exit(1);
    })
}
