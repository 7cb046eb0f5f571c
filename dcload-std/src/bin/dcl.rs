//! `dcl` - talk to a dcload-ip host tool from the command line
//!
//! Connects the way a target program would, runs one filesystem or console
//! operation against the host, then disconnects.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use dcload_core::{FileSystem, FsError, OpenFlags, Whence};
use dcload_std::{ConsoleTable, HostConfig, HostSession, MountTable, StaticLoader, UdpNet};

#[derive(Debug, Parser)]
#[command(name = "dcl", about = "dcload-ip client")]
struct Opts {
    /// Configuration file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Host tool address (ip:port), overrides the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Poll for replies instead of blocking on the socket
    #[arg(long)]
    poll: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List a host directory
    Ls { path: String },
    /// Print a host file
    Cat { path: String },
    /// Show status of a host path
    Stat { path: String },
    /// Copy a local file to the host
    Put { local: PathBuf, remote: String },
    /// Remove a host file
    Rm { path: String },
    /// Rename a host file
    Mv { from: String, to: String },
    /// Write text to the host console
    Echo { text: Vec<String> },
}

fn fs_err(op: &str, path: &str, e: FsError) -> anyhow::Error {
    anyhow!("{} {}: {:?} (errno {})", op, path, e, e.errno())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if let Some(host) = &opts.host {
        config.host = host
            .parse()
            .with_context(|| format!("invalid host address {}", host))?;
    }

    let mut net = UdpNet::new(config.bind);
    let mut loader = StaticLoader::new(config.host);
    let mut mounts = MountTable::new();
    let mut consoles = ConsoleTable::with_active(&config.client.console_name);
    let mut session = dcload_std::session(&config, opts.poll);

    session
        .attach_console(&net)
        .map_err(|e| anyhow!("attach console: {:?}", e))?;
    session
        .connect(&mut net, &mut loader, &mut mounts)
        .map_err(|e| anyhow!("connect to {}: {:?}", config.host, e))?;
    info!("session connected to {}", config.host);

    let result = run(&mut session, opts.command);
    session.shutdown(&mut consoles, &mut mounts);
    result
}

fn run(session: &mut HostSession, command: Command) -> Result<()> {
    match command {
        Command::Ls { path } => list(session, &path),
        Command::Cat { path } => cat(session, &path),
        Command::Stat { path } => {
            let stat = session.stat(&path).map_err(|e| fs_err("stat", &path, e))?;
            println!("{}", path);
            println!("  type:  {}", if stat.is_dir() { "directory" } else { "file" });
            println!("  mode:  {:o}", stat.mode);
            println!("  size:  {}", stat.size);
            println!("  mtime: {}", stat.mtime);
            println!("  inode: {}", stat.ino);
            Ok(())
        }
        Command::Put { local, remote } => put(session, &local, &remote),
        Command::Rm { path } => session.unlink(&path).map_err(|e| fs_err("rm", &path, e)),
        Command::Mv { from, to } => session.rename(&from, &to).map_err(|e| fs_err("mv", &from, e)),
        Command::Echo { text } => {
            let mut line = text.join(" ");
            line.push('\n');
            let written = dcload_core::ConsoleSink::write_buffer(session, line.as_bytes(), true)
                .map_err(|e| anyhow!("console write: {:?}", e))?;
            if written != line.len() {
                bail!("console write: {} of {} bytes", written, line.len());
            }
            Ok(())
        }
    }
}

fn list(session: &mut HostSession, path: &str) -> Result<()> {
    let dir = session
        .open(path, OpenFlags::DIR)
        .map_err(|e| fs_err("ls", path, e))?;

    let mut result = Ok(());
    loop {
        match session.readdir(dir) {
            Ok(Some(entry)) => {
                let kind = if entry.is_dir { 'd' } else { '-' };
                println!("{} {:>10} {:>10} {}", kind, entry.size, entry.time, entry.name);
            }
            Ok(None) => break,
            Err(e) => {
                result = Err(fs_err("ls", path, e));
                break;
            }
        }
    }
    let _ = session.close(dir);
    result
}

fn cat(session: &mut HostSession, path: &str) -> Result<()> {
    let file = session
        .open(path, OpenFlags::RDONLY)
        .map_err(|e| fs_err("cat", path, e))?;

    let mut buf = vec![0u8; 4096];
    let mut stdout = std::io::stdout().lock();
    let result = (|| -> Result<()> {
        loop {
            let n = session
                .read(file, &mut buf)
                .map_err(|e| fs_err("cat", path, e))?;
            if n == 0 {
                break;
            }
            stdout.write_all(&buf[..n]).context("write stdout")?;
        }
        stdout.flush().context("flush stdout")
    })();
    let _ = session.close(file);
    result
}

fn put(session: &mut HostSession, local: &Path, remote: &str) -> Result<()> {
    let data = std::fs::read(local).with_context(|| format!("read {}", local.display()))?;
    let file = session
        .open(remote, OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC)
        .map_err(|e| fs_err("put", remote, e))?;

    let result = (|| -> Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let n = session
                .write(file, &data[offset..])
                .map_err(|e| fs_err("put", remote, e))?;
            if n == 0 {
                bail!("put {}: host accepted no data", remote);
            }
            offset += n;
        }
        let size = session
            .seek(file, 0, Whence::End)
            .map_err(|e| fs_err("put", remote, e))?;
        info!("wrote {} bytes, host reports {}", data.len(), size);
        Ok(())
    })();
    let _ = session.close(file);
    result?;
    println!("{} -> {} ({} bytes)", local.display(), remote, data.len());
    Ok(())
}
