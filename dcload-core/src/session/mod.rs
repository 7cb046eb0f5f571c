//! dcload-ip client session
//!
//! A [`Session`] owns everything one connection to the host tool needs: the
//! configuration, the lock that serializes requests, the protocol link and
//! the remembered directory path used to stat listing entries.
//!
//! Setup happens in two steps. [`Session::attach_console`] runs early, as
//! soon as networking exists, so the console reports itself as present.
//! [`Session::connect`] runs once the network stack is fully up: it locates
//! the host through the debug loader, opens the socket and mounts the
//! filesystem. [`Session::shutdown`] undoes both.

mod lifecycle;

pub use lifecycle::{LifecycleEvent, SessionState};

use dcload_hal::{
    ArpError, ConsoleRegistry, ContextProbe, DatagramSocket, DebugLoader, ExecContext, Ipv4Addr,
    IrqSafeLock, LoaderKind, LockError, MacAddr, NetError, NetStack, RegistryError, SocketAddr,
    VfsRegistry,
};
use dcload_protocol::Request;
use heapless::String;
use portable_atomic::{AtomicU32, Ordering};

use crate::config::{ClientConfig, ConfigError};
use crate::fs::{FsError, PATH_MAX};
use crate::memory::Window;
use crate::rpc::{Link, RecvStrategy};
use crate::sync::{LockGuard, SpinLock};

/// Device ids handed to sessions, reported in `Stat::dev`
static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

/// Directory path remembered by the last successful directory open
pub(crate) type DirPath = String<PATH_MAX>;

/// Session setup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// Operation not valid in the current state
    InvalidState(SessionState),
    /// Networking has no default interface
    NoInterface,
    /// The debug loader is not the network variant
    WrongLoader(LoaderKind),
    /// The host's hardware address cannot be resolved
    ArpFailed,
    /// Configuration rejected
    Config(ConfigError),
    Net(NetError),
    Lock(LockError),
    Registry(RegistryError),
}

impl From<NetError> for SessionError {
    fn from(e: NetError) -> Self {
        SessionError::Net(e)
    }
}

impl From<LockError> for SessionError {
    fn from(e: LockError) -> Self {
        SessionError::Lock(e)
    }
}

impl From<RegistryError> for SessionError {
    fn from(e: RegistryError) -> Self {
        SessionError::Registry(e)
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Config(e)
    }
}

/// One connection to the host tool
pub struct Session<S, L = SpinLock, P = ExecContext> {
    config: ClientConfig,
    lock: L,
    probe: P,
    state: SessionState,
    link: Option<Link<S>>,
    dir_path: Option<DirPath>,
    device_id: u32,
}

/// Locked access to the link for the duration of one adapter operation
pub(crate) struct Exchange<'a, S> {
    link: &'a mut Link<S>,
    strategy: RecvStrategy,
    window_base: u32,
    pub(crate) dir_path: &'a mut Option<DirPath>,
}

impl<S: DatagramSocket> Exchange<'_, S> {
    /// Address at which request buffers are mapped
    pub(crate) fn window_base(&self) -> u32 {
        self.window_base
    }

    /// Send `request` and wait for its result, exposing `window` to the host
    pub(crate) fn call(
        &mut self,
        request: &Request<'_>,
        window: &mut Window<'_>,
    ) -> Result<i32, FsError> {
        Ok(self.link.request(request, window, self.strategy)?)
    }

    /// Send a request that moves no bulk data
    pub(crate) fn call_plain(&mut self, request: &Request<'_>) -> Result<i32, FsError> {
        self.call(request, &mut Window::Closed)
    }
}

impl<S, L, P> Session<S, L, P>
where
    S: DatagramSocket,
    L: IrqSafeLock,
    P: ContextProbe,
{
    /// Create an unconnected session
    pub fn new(config: ClientConfig, lock: L, probe: P) -> Self {
        Self {
            config,
            lock,
            probe,
            state: SessionState::Uninitialized,
            link: None,
            dir_path: None,
            device_id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Device id reported in file status
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Directory path of the most recent successful directory open
    pub fn dir_context(&self) -> Option<&str> {
        self.dir_path.as_deref()
    }

    /// Protocol link, while connected
    pub fn link(&self) -> Option<&Link<S>> {
        self.link.as_ref()
    }

    /// Mutable protocol link, while connected
    pub fn link_mut(&mut self) -> Option<&mut Link<S>> {
        self.link.as_mut()
    }

    /// Mark the console present
    ///
    /// Requires a configured default network interface.
    pub fn attach_console<N: NetStack>(&mut self, net: &N) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::InvalidState(self.state));
        }
        if !net.has_default_interface() {
            warn!("no default network interface");
            return Err(SessionError::NoInterface);
        }
        self.state = self.state.transition(LifecycleEvent::ConsoleAttached);
        debug!("console attached");
        Ok(())
    }

    /// Connect to the host tool and mount the filesystem
    ///
    /// Valid only after [`Session::attach_console`]. A failure once setup has
    /// started releases whatever was acquired and returns the session to
    /// [`SessionState::Uninitialized`].
    pub fn connect<N, D, V>(
        &mut self,
        net: &mut N,
        loader: &mut D,
        vfs: &mut V,
    ) -> Result<(), SessionError>
    where
        N: NetStack<Socket = S>,
        D: DebugLoader,
        V: VfsRegistry,
    {
        if self.state != SessionState::ConsoleReady {
            return Err(SessionError::InvalidState(self.state));
        }
        self.config.validate()?;

        let kind = loader.kind();
        if kind != LoaderKind::Ip {
            return Err(SessionError::WrongLoader(kind));
        }
        let host = loader.host_info();

        match self.establish(net, host.addr, vfs) {
            Ok(link) => {
                self.link = Some(link);
                self.dir_path = None;
                self.state = self.state.transition(LifecycleEvent::ConnectSucceeded);
                info!("connected, mounted at {}", self.config.mount.as_str());
                Ok(())
            }
            Err(e) => {
                warn!("connect failed: {:?}", e);
                self.state = self.state.transition(LifecycleEvent::ConnectFailed);
                Err(e)
            }
        }
    }

    fn establish<N, V>(
        &self,
        net: &mut N,
        host: SocketAddr,
        vfs: &mut V,
    ) -> Result<Link<S>, SessionError>
    where
        N: NetStack<Socket = S>,
        V: VfsRegistry,
    {
        let ip = *host.ip();
        let mac = resolve(net, ip)?;
        net.arp_insert_permanent(ip, mac);

        let mut socket = net.udp_socket()?;
        if let Err(e) = self.prepare(&mut socket, host, vfs) {
            socket.close();
            return Err(e);
        }
        Ok(Link::new(socket, &self.config.ident))
    }

    fn prepare<V: VfsRegistry>(
        &self,
        socket: &mut S,
        host: SocketAddr,
        vfs: &mut V,
    ) -> Result<(), SessionError> {
        socket.bind(self.config.local_port)?;
        socket.connect(host)?;
        self.lock.init()?;

        if let Err(e) = vfs.register(&self.config.mount, self.config.handler_version) {
            self.lock.destroy();
            return Err(e.into());
        }
        Ok(())
    }

    /// Disconnect from the host tool
    ///
    /// Does nothing unless connected. Disables the console if it is the
    /// active one, tells the host we are leaving and releases the link.
    pub fn shutdown<C, V>(&mut self, consoles: &mut C, vfs: &mut V)
    where
        C: ConsoleRegistry,
        V: VfsRegistry,
    {
        if !self.state.is_connected() {
            return;
        }

        if consoles.is_active(&self.config.console_name) {
            consoles.disable();
        }

        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.notify(&Request::Exit) {
                warn!("exit notification failed: {:?}", e);
            }
            self.lock.destroy();
            let mut socket = link.into_socket();
            socket.close();
        }

        self.dir_path = None;
        vfs.unregister(&self.config.mount);
        self.state = self.state.transition(LifecycleEvent::Shutdown);
        info!("disconnected");
    }

    #[cfg(test)]
    pub(crate) fn lock_for_test(&self) -> &L {
        &self.lock
    }

    /// Run `op` with the session locked
    pub(crate) fn exchange<R>(
        &mut self,
        op: impl FnOnce(&mut Exchange<'_, S>) -> Result<R, FsError>,
    ) -> Result<R, FsError> {
        let context = self.probe.current();
        let Self {
            config,
            lock,
            link,
            dir_path,
            ..
        } = self;

        let link = link.as_mut().ok_or(FsError::NotConnected)?;
        let _guard = LockGuard::acquire(&*lock, context)?;

        op(&mut Exchange {
            link,
            strategy: context.into(),
            window_base: config.window_base,
            dir_path,
        })
    }
}

/// Resolve the host's hardware address, waiting for ARP as long as it takes
fn resolve<N: NetStack>(net: &mut N, ip: Ipv4Addr) -> Result<MacAddr, SessionError> {
    let mut waited = false;
    loop {
        match net.arp_lookup(ip) {
            Ok(mac) => return Ok(mac),
            Err(ArpError::InProgress | ArpError::NotResolved) => {
                if !waited {
                    debug!("waiting for ARP");
                    waited = true;
                }
            }
            Err(ArpError::Failed) => return Err(SessionError::ArpFailed),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::mock::{MockNet, MockSocket, HOST_MAC};
    use dcload_hal::HostInfo;

    pub(crate) struct Loader(pub LoaderKind);

    pub(crate) const HOST: SocketAddr = SocketAddr::new(Ipv4Addr::new(192, 168, 1, 10), 31313);

    impl DebugLoader for Loader {
        fn kind(&self) -> LoaderKind {
            self.0
        }

        fn host_info(&mut self) -> HostInfo {
            HostInfo { addr: HOST }
        }
    }

    #[derive(Default)]
    pub(crate) struct Mounts {
        pub mounted: Vec<std::string::String>,
        pub refuse: bool,
    }

    impl VfsRegistry for Mounts {
        fn register(&mut self, name: &str, _version: u32) -> Result<(), RegistryError> {
            if self.refuse {
                return Err(RegistryError::Duplicate);
            }
            self.mounted.push(name.into());
            Ok(())
        }

        fn unregister(&mut self, name: &str) {
            self.mounted.retain(|m| m != name);
        }
    }

    #[derive(Default)]
    struct Consoles {
        active: bool,
        disabled: bool,
    }

    impl ConsoleRegistry for Consoles {
        fn is_active(&self, name: &str) -> bool {
            self.active && name == "fs_dclsocket"
        }

        fn disable(&mut self) {
            self.disabled = true;
        }
    }

    fn session() -> Session<MockSocket> {
        Session::new(ClientConfig::default(), SpinLock::new(), ExecContext::Thread)
    }

    #[test]
    fn test_connect_requires_console() {
        let mut session = session();
        let mut net = MockNet::with_socket(MockSocket::new());
        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut Mounts::default());
        assert_eq!(
            result,
            Err(SessionError::InvalidState(SessionState::Uninitialized))
        );
    }

    #[test]
    fn test_attach_requires_interface() {
        let mut session = session();
        let net = MockNet::default();
        assert_eq!(session.attach_console(&net), Err(SessionError::NoInterface));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_connect_and_shutdown() {
        let mut session = session();
        let mut net = MockNet::with_socket(MockSocket::new());
        net.arp_pending = 3;
        let mut mounts = Mounts::default();

        session.attach_console(&net).unwrap();
        assert_eq!(session.state(), SessionState::ConsoleReady);

        session
            .connect(&mut net, &mut Loader(LoaderKind::Ip), &mut mounts)
            .unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(net.arp_lookups, 4);
        assert_eq!(net.permanent, [(*HOST.ip(), HOST_MAC)]);
        assert_eq!(mounts.mounted, ["/pc"]);

        let socket = session.link().unwrap().socket();
        assert_eq!(socket.bound, Some(31313));
        assert_eq!(socket.remote, Some(HOST));

        let mut consoles = Consoles {
            active: true,
            ..Default::default()
        };
        session.shutdown(&mut consoles, &mut mounts);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(consoles.disabled);
        assert!(mounts.mounted.is_empty());
        assert!(session.link().is_none());
        assert!(session.lock.lock(ExecContext::Thread).is_err());
    }

    #[test]
    fn test_exit_notification_contents() {
        let mut link = Link::new(MockSocket::new(), "x");
        link.notify(&Request::Exit).unwrap();
        let mut socket = link.into_socket();
        socket.close();
        assert_eq!(socket.sent_tags(), [*b"DC00"]);
        assert!(socket.closed);
    }

    #[test]
    fn test_wrong_loader_keeps_console() {
        let mut session = session();
        let mut net = MockNet::with_socket(MockSocket::new());
        session.attach_console(&net).unwrap();
        let result = session.connect(
            &mut net,
            &mut Loader(LoaderKind::Serial),
            &mut Mounts::default(),
        );
        assert_eq!(result, Err(SessionError::WrongLoader(LoaderKind::Serial)));
        assert_eq!(session.state(), SessionState::ConsoleReady);
    }

    #[test]
    fn test_bind_failure_resets() {
        let mut session = session();
        let mut socket = MockSocket::new();
        socket.fail_bind = true;
        let mut net = MockNet::with_socket(socket);
        session.attach_console(&net).unwrap();

        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut Mounts::default());
        assert_eq!(result, Err(SessionError::Net(NetError::Bind)));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.link().is_none());
    }

    #[test]
    fn test_connect_failure_resets() {
        let mut session = session();
        let mut socket = MockSocket::new();
        socket.fail_connect = true;
        let released = socket.released.clone();
        let mut net = MockNet::with_socket(socket);
        session.attach_console(&net).unwrap();

        let mut mounts = Mounts::default();
        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut mounts);
        assert_eq!(result, Err(SessionError::Net(NetError::Connect)));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.link().is_none());
        assert!(released.get());
        assert!(mounts.mounted.is_empty());
        assert!(session.lock.lock(ExecContext::Thread).is_err());
    }

    #[test]
    fn test_socket_failure_resets() {
        let mut session = session();
        let mut net = MockNet::default();
        net.interface = true;
        session.attach_console(&net).unwrap();

        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut Mounts::default());
        assert_eq!(result, Err(SessionError::Net(NetError::Socket)));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_lock_init_failure_resets() {
        let mut session = session();
        session.lock.init().unwrap();
        let mut net = MockNet::with_socket(MockSocket::new());
        session.attach_console(&net).unwrap();

        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut Mounts::default());
        assert_eq!(result, Err(SessionError::Lock(LockError::Init)));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_mount_failure_resets() {
        let mut session = session();
        let mut net = MockNet::with_socket(MockSocket::new());
        let mut mounts = Mounts {
            refuse: true,
            ..Default::default()
        };
        session.attach_console(&net).unwrap();

        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut mounts);
        assert_eq!(
            result,
            Err(SessionError::Registry(RegistryError::Duplicate))
        );
        assert_eq!(session.state(), SessionState::Uninitialized);
        // The lock was released again
        assert_eq!(session.lock.init(), Ok(()));
    }

    #[test]
    fn test_arp_failure_resets() {
        let mut session = session();
        let mut net = MockNet::with_socket(MockSocket::new());
        net.arp_fails = true;
        session.attach_console(&net).unwrap();

        let result = session.connect(&mut net, &mut Loader(LoaderKind::Ip), &mut Mounts::default());
        assert_eq!(result, Err(SessionError::ArpFailed));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_shutdown_when_not_connected_is_noop() {
        let mut session = session();
        let mut mounts = Mounts::default();
        let mut consoles = Consoles {
            active: true,
            ..Default::default()
        };
        session.shutdown(&mut consoles, &mut mounts);
        assert!(!consoles.disabled);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_device_ids_are_unique() {
        let a = session();
        let b = session();
        assert_ne!(a.device_id(), b.device_id());
    }
}
