use log::{error, info, LevelFilter};
use psramdisk::{PsramDisk, UniqueId};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(about = "Build a PSRAM disk image and locate files inside it")]
struct Opt {
    /// Chip unique id, 24 hex digits.
    #[structopt(parse(try_from_str = parse_unique_id))]
    unique_id: UniqueId,

    /// Write the formatted region to this file.
    #[structopt(short, long, parse(from_os_str))]
    image: Option<PathBuf>,

    /// Print the extents of a file on the volume; may be repeated.
    #[structopt(short, long)]
    map: Vec<String>,

    /// More logging (-v debug, -vv trace).
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

fn parse_unique_id(s: &str) -> Result<UniqueId, String> {
    if s.len() != 24 || !s.is_ascii() {
        return Err(format!("expected 24 hex digits, got {:?}", s));
    }
    let mut id = [0u8; 12];
    for (i, byte) in id.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(UniqueId(id))
}

fn write_image(disk: &PsramDisk, path: &PathBuf) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let mut out = BufWriter::new(file);
    for block in 0..disk.geometry().num_blocks as u32 {
        let range = disk.region().translate(block, 1).map_err(|e| e.to_string())?;
        out.write_all(disk.region().bytes(&range))
            .map_err(|e| format!("{}: {}", path.display(), e))?;
    }
    out.flush().map_err(|e| format!("{}: {}", path.display(), e))?;
    info!("image written to {}", path.display());
    Ok(())
}

fn run(opt: &Opt) -> Result<(), String> {
    let mut disk = PsramDisk::new(opt.unique_id);
    let record = disk.wipe_and_setup().map_err(|e| e.to_string())?;
    println!("ident {}", record);

    for name in &opt.map {
        let extents = disk.mmap(name).map_err(|e| format!("{}: {}", name, e))?;
        for extent in extents {
            println!(
                "{}: sector {} offset {:#x} length {}",
                name, extent.sector, extent.offset, extent.length
            );
        }
    }

    if let Some(path) = &opt.image {
        write_image(&disk, path)?;
    }
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder()
        .format_timestamp_nanos()
        .filter_level(level)
        .init();

    if let Err(e) = run(&opt) {
        error!("{}", e);
        process::exit(1);
    }
}
