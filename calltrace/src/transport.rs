//! Non-blocking Unix-datagram relay transport
//!
//! Setup is all-or-nothing: allocate a unique local socket name, bind,
//! connect to the configured peer, switch the channel non-blocking and
//! optionally close its read direction. Any failed step releases
//! everything acquired before it, so an `Err` never leaves a socket or a
//! filesystem entry behind.

// Raw send(2) is needed for MSG_NOSIGNAL | MSG_DONTWAIT.
#![allow(unsafe_code)]

use std::env;
use std::fs;
use std::io;
use std::net::Shutdown;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::domain::{EntryEvent, ExitEvent, TransportError};
use crate::framing::{frame_entry, frame_exit, FramedEvent};
use crate::sink::Sink;

/// Prefix of the agent's local (client) socket name.
const LOCAL_SOCKET_PREFIX: &str = "trace_socket_";

/// The relay sink: a connected, non-blocking Unix-datagram channel to the
/// configured peer.
///
/// Invariant: a constructed `RelaySink` always holds a fully configured
/// socket; partial setups never escape [`RelaySink::connect`].
pub struct RelaySink {
    socket: UnixDatagram,
    local_path: PathBuf,
    peer_path: PathBuf,
    accept_remote_commands: bool,
}

impl RelaySink {
    /// Establish the relay channel to `peer`.
    ///
    /// The peer socket does not need a listening reader: connecting a
    /// datagram socket only records the destination address.
    ///
    /// # Errors
    /// Any failed setup step; the error implies full rollback.
    pub fn connect(peer: &Path, accept_remote_commands: bool) -> Result<Self, TransportError> {
        Self::connect_in(&env::temp_dir(), peer, accept_remote_commands)
    }

    pub(crate) fn connect_in(
        local_dir: &Path,
        peer: &Path,
        accept_remote_commands: bool,
    ) -> Result<Self, TransportError> {
        let local_path = allocate_local_path(local_dir)?;

        let socket = UnixDatagram::bind(&local_path).map_err(|source| {
            TransportError::Bind { path: local_path.clone(), source }
        })?;

        if let Err(source) = socket.connect(peer) {
            release_local_endpoint(&local_path);
            return Err(TransportError::Connect { path: peer.to_path_buf(), source });
        }

        // A saturated or disconnected peer must never stall the caller.
        if let Err(source) = socket.set_nonblocking(true) {
            release_local_endpoint(&local_path);
            return Err(TransportError::Nonblocking(source));
        }

        if !accept_remote_commands {
            // No reads happen in write-only mode; disable the receive
            // direction at the transport level.
            if let Err(source) = socket.shutdown(Shutdown::Read) {
                release_local_endpoint(&local_path);
                return Err(TransportError::ReadShutdown(source));
            }
        }

        info!(
            "relay connected to {} (local endpoint {})",
            peer.display(),
            local_path.display()
        );
        Ok(Self {
            socket,
            local_path,
            peer_path: peer.to_path_buf(),
            accept_remote_commands,
        })
    }

    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    #[must_use]
    pub fn peer_path(&self) -> &Path {
        &self.peer_path
    }

    /// Best-effort non-blocking send of one chunk. Logs and returns
    /// `false` on any failure or short send.
    fn send_chunk(&self, chunk: &str) -> bool {
        let bytes = chunk.as_bytes();
        // SAFETY: fd and buffer are valid for the duration of the call.
        let sent = unsafe {
            libc::send(
                self.socket.as_raw_fd(),
                bytes.as_ptr().cast::<libc::c_void>(),
                bytes.len(),
                libc::MSG_NOSIGNAL | libc::MSG_DONTWAIT,
            )
        };
        match usize::try_from(sent) {
            Ok(count) if count == bytes.len() => true,
            Ok(count) => {
                warn!("relay send incomplete: size {} sent {count}", bytes.len());
                false
            }
            Err(_) => {
                warn!("relay send failed: {}", io::Error::last_os_error());
                false
            }
        }
    }

    /// Emit chunks in order; the first one that fails to send in full
    /// drops the remainder of this event. The pipeline itself continues.
    fn send_framed(&self, framed: &FramedEvent) {
        for (index, chunk) in framed.chunks.iter().enumerate() {
            if !self.send_chunk(chunk) {
                let remaining = framed.chunks.len() - index - 1;
                if remaining > 0 {
                    debug!("dropping {remaining} remaining chunks of this event");
                }
                break;
            }
        }
    }

    /// Hook run before each send while remote commands are accepted.
    fn poll_remote_commands(&self) {
        // TODO: read and apply operator trace commands from the socket;
        // needs its own concurrency story before the read side is useful.
    }
}

impl Sink for RelaySink {
    fn notify_entry(&mut self, event: &EntryEvent) {
        if self.accept_remote_commands {
            self.poll_remote_commands();
        }
        self.send_framed(&frame_entry(event));
    }

    fn notify_exit(&mut self, event: &ExitEvent) {
        if self.accept_remote_commands {
            self.poll_remote_commands();
        }
        self.send_framed(&frame_exit(event));
    }
}

impl Drop for RelaySink {
    fn drop(&mut self) {
        // The socket closes with the field; the filesystem entry is ours
        // to remove unconditionally.
        release_local_endpoint(&self.local_path);
        debug!("relay to {} closed", self.peer_path.display());
    }
}

/// Reserve a unique filesystem name for the local endpoint. The temporary
/// file is removed right away so only the socket bind claims the name.
fn allocate_local_path(dir: &Path) -> Result<PathBuf, TransportError> {
    let file = tempfile::Builder::new()
        .prefix(LOCAL_SOCKET_PREFIX)
        .tempfile_in(dir)
        .map_err(TransportError::EndpointAllocation)?;
    let path = file.path().to_path_buf();
    file.close().map_err(TransportError::EndpointAllocation)?;
    Ok(path)
}

fn release_local_endpoint(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeAddr, FrameDescriptor};

    fn local_entries(dir: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_setup_rolls_back_when_peer_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing_peer = dir.path().join("no-such-peer.sock");

        let result = RelaySink::connect_in(dir.path(), &missing_peer, false);

        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert!(local_entries(dir.path()).is_empty(), "socket or name leaked");
    }

    #[test]
    fn test_setup_succeeds_against_bound_peer_and_cleans_up_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let peer_path = dir.path().join("peer.sock");
        let _peer = UnixDatagram::bind(&peer_path).expect("bind peer");

        let relay =
            RelaySink::connect_in(dir.path(), &peer_path, false).expect("relay setup");
        let local = relay.local_path().to_path_buf();
        assert!(local.exists(), "bound socket entry should exist");

        drop(relay);
        assert!(!local.exists(), "drop must remove the local socket entry");
    }

    #[test]
    fn test_entry_and_exit_reach_the_peer_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let peer_path = dir.path().join("peer.sock");
        let peer = UnixDatagram::bind(&peer_path).expect("bind peer");

        let mut relay =
            RelaySink::connect_in(dir.path(), &peer_path, false).expect("relay setup");

        relay.notify_entry(&EntryEvent {
            function: CodeAddr(0x1000),
            call_site: CodeAddr(0x2000),
            frames: vec![FrameDescriptor::new(CodeAddr(0xa), Some("f1".to_string()))],
        });
        relay.notify_exit(&ExitEvent { function: CodeAddr(0x1000), call_site: CodeAddr(0x2000) });

        let mut buf = [0u8; 2048];
        let mut datagrams = Vec::new();
        for _ in 0..3 {
            let len = peer.recv(&mut buf).expect("recv");
            datagrams.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }

        assert_eq!(
            datagrams[0],
            "Function ENTRY 0x1000 from 0x2000 [stack frames sampled 1]\n"
        );
        assert_eq!(datagrams[1], "  Stack frame 0: 0xa (f1)\n");
        assert_eq!(datagrams[2], "Function EXIT 0x1000 to 0x2000\n");
    }
}
