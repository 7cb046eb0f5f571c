//! Client against a scripted host tool on the loopback interface

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dcload_core::{ConsoleSink, FileSystem, FsError, OpenFlags, SessionState};
use dcload_protocol::{encode_addressed, Command, HostStat, Packet, BLOCK_SIZE, MAX_DATAGRAM};
use dcload_std::{ConsoleTable, HostConfig, HostSession, MountTable, StaticLoader, UdpNet};

/// What the host saw by the time the client said goodbye
#[derive(Debug, Default)]
struct HostLog {
    stdout: Vec<u8>,
    written: HashMap<u32, Vec<u8>>,
    unlinked: Vec<String>,
    exited: bool,
}

struct FakeHost {
    socket: UdpSocket,
    client: Option<SocketAddr>,
    files: HashMap<String, Vec<u8>>,
    open: HashMap<u32, (String, usize)>,
    next_fd: u32,
    log: HostLog,
}

fn cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl FakeHost {
    fn spawn(files: &[(&str, &[u8])]) -> (SocketAddr, JoinHandle<HostLog>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let host = FakeHost {
            socket,
            client: None,
            files: files
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
            open: HashMap::new(),
            next_fd: 3,
            log: HostLog::default(),
        };
        (addr, thread::spawn(move || host.run()))
    }

    fn send(&self, command: Command, address: u32, size: u32, data: &[u8]) {
        let mut buf = [0u8; MAX_DATAGRAM];
        let len = encode_addressed(&mut buf, command, address, size, data).unwrap();
        self.socket
            .send_to(&buf[..len], self.client.unwrap())
            .unwrap();
    }

    fn recv(&mut self) -> Vec<u8> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf).expect("client went quiet");
        self.client = Some(from);
        buf[..len].to_vec()
    }

    /// Skip datagrams until one with `command` arrives
    fn expect(&mut self, command: Command) -> Vec<u8> {
        loop {
            let datagram = self.recv();
            if Packet::parse(&datagram).unwrap().command == command {
                return datagram;
            }
        }
    }

    fn reply(&mut self, value: i32) {
        self.send(Command::ReturnValue, value as u32, 0, &[]);
        self.expect(Command::ReturnValue);
    }

    /// Push `data` into client memory at `addr` with LBIN/PBIN/DBIN
    fn download(&mut self, addr: u32, data: &[u8]) {
        self.send(Command::LoadBinary, addr, data.len() as u32, &[]);
        self.expect(Command::LoadBinary);
        for (i, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
            let at = addr + (i * BLOCK_SIZE) as u32;
            self.send(Command::PutBinary, at, chunk.len() as u32, chunk);
        }
        self.send(Command::DoneBinary, 0, 0, &[]);
        let done = self.expect(Command::DoneBinary);
        let done = Packet::parse(&done).unwrap();
        assert_eq!((done.address(), done.size()), (Ok(0), Ok(0)));
    }

    /// Pull `count` bytes from client memory at `addr` with SBIN
    fn upload(&mut self, addr: u32, count: u32) -> Vec<u8> {
        self.send(Command::SendBinary, addr, count, &[]);
        let mut data = Vec::new();
        loop {
            let datagram = self.recv();
            let packet = Packet::parse(&datagram).unwrap();
            match packet.command {
                Command::SendBinary => data.extend_from_slice(packet.data().unwrap()),
                Command::DoneBinary => return data,
                _ => {}
            }
        }
    }

    fn run(mut self) -> HostLog {
        loop {
            let datagram = self.recv();
            let packet = Packet::parse(&datagram).unwrap();
            let field = |i: usize| packet.value(i).unwrap();

            match packet.command {
                Command::Exit => {
                    self.log.exited = true;
                    return self.log;
                }
                Command::Open => {
                    let path = cstr(&datagram[12..]);
                    if self.files.contains_key(&path) || field(0) & 0x200 != 0 {
                        let fd = self.next_fd;
                        self.next_fd += 1;
                        self.open.insert(fd, (path, 0));
                        self.reply(fd as i32);
                    } else {
                        self.reply(-1);
                    }
                }
                Command::Close => {
                    let rv = if self.open.remove(&field(0)).is_some() { 0 } else { -1 };
                    self.reply(rv);
                }
                Command::Read => {
                    let (fd, addr, count) = (field(0), field(1), field(2) as usize);
                    let (path, pos) = self.open[&fd].clone();
                    let content = &self.files[&path];
                    let end = (pos + count).min(content.len());
                    let chunk = content[pos..end].to_vec();
                    if !chunk.is_empty() {
                        self.download(addr, &chunk);
                    }
                    self.open.insert(fd, (path, end));
                    self.reply(chunk.len() as i32);
                }
                Command::Write => {
                    let (fd, addr, count) = (field(0), field(1), field(2));
                    let data = self.upload(addr, count);
                    if fd == 1 {
                        self.log.stdout.extend_from_slice(&data);
                    } else {
                        self.log.written.entry(fd).or_default().extend_from_slice(&data);
                    }
                    self.reply(data.len() as i32);
                }
                Command::Stat => {
                    let addr = field(0);
                    let path = cstr(&datagram[12..]);
                    match self.files.get(&path) {
                        Some(content) => {
                            let record = HostStat {
                                mode: 0o100644,
                                size: content.len() as i32,
                                mtime: 1_700_000_000,
                                ..HostStat::default()
                            };
                            self.download(addr, &record.to_bytes());
                            self.reply(0);
                        }
                        None => self.reply(-1),
                    }
                }
                Command::Unlink => {
                    let path = cstr(&datagram[4..]);
                    let rv = if self.files.remove(&path).is_some() { 0 } else { -1 };
                    self.log.unlinked.push(path);
                    self.reply(rv);
                }
                _ => {}
            }
        }
    }
}

fn connect(host: SocketAddr, poll: bool) -> (HostSession, ConsoleTable, MountTable) {
    let host = match host {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => unreachable!(),
    };
    let mut config = HostConfig::default();
    config.host = host;
    config.bind = *host.ip();
    config.client.local_port = 0;

    let mut net = UdpNet::new(config.bind);
    let mut loader = StaticLoader::new(config.host);
    let mut mounts = MountTable::new();
    let consoles = ConsoleTable::with_active(&config.client.console_name);

    let mut session = dcload_std::session(&config, poll);
    session.attach_console(&net).unwrap();
    session.connect(&mut net, &mut loader, &mut mounts).unwrap();
    assert!(mounts.is_mounted("/pc"));
    (session, consoles, mounts)
}

fn read_all(session: &mut HostSession, path: &str) -> Vec<u8> {
    let file = session.open(path, OpenFlags::RDONLY).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 1500];
    loop {
        let n = FileSystem::read(session, file, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    session.close(file).unwrap();
    out
}

#[test]
fn test_file_session_end_to_end() {
    let content: Vec<u8> = (0..2600u32).map(|i| (i % 251) as u8).collect();
    let (addr, host) = FakeHost::spawn(&[("/data.bin", &content), ("/old.txt", b"x")]);
    let (mut session, mut consoles, mut mounts) = connect(addr, false);

    assert_eq!(read_all(&mut session, "/data.bin"), content);

    let stat = session.stat("/data.bin").unwrap();
    assert_eq!(stat.size, 2600);
    assert_eq!(stat.mtime, 1_700_000_000);
    assert!(!stat.is_dir());
    assert_eq!(session.stat("/missing"), Err(FsError::Host(-1)));

    assert_eq!(
        session.open("/missing", OpenFlags::RDONLY),
        Err(FsError::OpenFailed)
    );

    let file = session
        .open("/new.txt", OpenFlags::WRONLY | OpenFlags::CREAT)
        .unwrap();
    assert_eq!(FileSystem::write(&mut session, file, b"written"), Ok(7));
    session.close(file).unwrap();

    session.unlink("/old.txt").unwrap();
    assert_eq!(session.unlink("/old.txt"), Err(FsError::Host(-1)));

    session.shutdown(&mut consoles, &mut mounts);
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert!(!mounts.is_mounted("/pc"));
    assert_eq!(consoles.active(), None);

    let log = host.join().unwrap();
    assert!(log.exited);
    assert_eq!(log.written.values().next().map(Vec::as_slice), Some(&b"written"[..]));
    assert_eq!(log.unlinked, ["/old.txt", "/old.txt"]);
}

#[test]
fn test_console_output_in_poll_mode() {
    let (addr, host) = FakeHost::spawn(&[("/small.txt", b"tiny")]);
    let (mut session, mut consoles, mut mounts) = connect(addr, true);

    assert_eq!(session.write_buffer(b"hello from the target\n", true), Ok(22));
    assert_eq!(read_all(&mut session, "/small.txt"), b"tiny");

    session.shutdown(&mut consoles, &mut mounts);
    let log = host.join().unwrap();
    assert_eq!(log.stdout, b"hello from the target\n");
    assert!(log.exited);
}
