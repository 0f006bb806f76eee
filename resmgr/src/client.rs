//! Resource client
//!
//! Opens a path served by a resource manager and speaks the connect and io
//! headers to it. Error replies from the manager come back as
//! [`ResmgrError::Server`] carrying the error number.

use crate::ResmgrError;
use core_types::ConnectionId;
use ipc::{
    connect_subtype, msg_type, CloseHeader, ConnectHeader, ConnectMessage, DevctlHeader, IoHeader,
    LseekHeader, Payload, StatHeader, StatRecord, WireRecord,
};
use kernel_api::{KernelApi, KernelError};
use messaging::{Messenger, SendReply, TransportConfig, TransportError};
use std::sync::Arc;

/// An open session on a managed path
pub struct ResourceClient<K: KernelApi> {
    path: String,
    coid: ConnectionId,
    messenger: Messenger<K>,
}

impl<K: KernelApi> ResourceClient<K> {
    /// Resolves `path` and opens a session with `ioflag`
    ///
    /// The connection is dropped again when the request cannot be built or
    /// the manager refuses the open.
    pub fn open(kernel: Arc<K>, path: &str, ioflag: u32) -> Result<Self, ResmgrError> {
        let (coid, remainder) = kernel.path_open(path)?;
        let mut header = ConnectHeader::new(connect_subtype::OPEN);
        header.ioflag = ioflag;
        let message = match ConnectMessage::new(header, remainder, Vec::new()) {
            Ok(message) => message,
            Err(err) => {
                kernel.connect_detach(coid)?;
                return Err(err.into());
            }
        };

        let mut client = Self {
            path: path.to_string(),
            coid,
            messenger: Messenger::new(kernel, TransportConfig::raw()),
        };
        if let Err(err) = client.transact(message.encode(), 0) {
            client.messenger.kernel().connect_detach(coid)?;
            return Err(err);
        }
        log::debug!("opened {} on {}", path, coid);
        Ok(client)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn coid(&self) -> ConnectionId {
        self.coid
    }

    /// Reads up to `nbytes` at the session offset
    pub fn read(&mut self, nbytes: usize) -> Result<Vec<u8>, ResmgrError> {
        let header = IoHeader::new(msg_type::IO_READ, nbytes as u32);
        let reply = self.transact(header.to_bytes(), nbytes)?;
        Ok(reply.payload.as_bytes().map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Writes `data`; returns the count the manager accepted
    pub fn write(&mut self, data: &[u8]) -> Result<usize, ResmgrError> {
        let mut message = IoHeader::new(msg_type::IO_WRITE, data.len() as u32).to_bytes();
        message.extend_from_slice(data);
        let reply = self.transact(message, 0)?;
        Ok(reply.status as usize)
    }

    pub fn stat(&mut self) -> Result<StatRecord, ResmgrError> {
        let reply = self.transact(StatHeader::default().to_bytes(), StatRecord::SIZE)?;
        Ok(reply.payload.as_record()?)
    }

    /// Sends a device command; returns the status and the reply data
    pub fn devctl(&mut self, dcmd: i32, data: &[u8], reply_hint: usize) -> Result<(i32, Vec<u8>), ResmgrError> {
        let mut message = DevctlHeader::new(dcmd, data.len() as i32).to_bytes();
        message.extend_from_slice(data);
        let reply = self.transact(message, reply_hint)?;
        let bytes = reply.payload.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
        Ok((reply.status, bytes))
    }

    /// Moves the session offset; returns the new offset
    pub fn lseek(&mut self, offset: i64, whence: i16) -> Result<i64, ResmgrError> {
        let reply = self.transact(LseekHeader::new(offset, whence).to_bytes(), 8)?;
        let bytes = reply.payload.as_bytes().unwrap_or_default();
        let raw: [u8; 8] = bytes
            .get(..8)
            .and_then(|head| head.try_into().ok())
            .ok_or_else(|| ResmgrError::InvalidArgument(format!("{} byte seek reply", bytes.len())))?;
        Ok(i64::from_le_bytes(raw))
    }

    /// Takes the resource lock for this thread
    pub fn lock(&mut self) -> Result<(), ResmgrError> {
        self.transact(IoHeader::new(msg_type::IO_LOCK_OCB, 0).to_bytes(), 0)?;
        Ok(())
    }

    pub fn unlock(&mut self) -> Result<(), ResmgrError> {
        self.transact(IoHeader::new(msg_type::IO_UNLOCK_OCB, 0).to_bytes(), 0)?;
        Ok(())
    }

    /// Closes the session and the connection
    ///
    /// The connection is detached even when the close request fails.
    pub fn close(mut self) -> Result<(), ResmgrError> {
        let closed = self.transact(CloseHeader::default().to_bytes(), 0);
        self.messenger.kernel().connect_detach(self.coid)?;
        closed.map(|_| ())
    }

    fn transact(&mut self, message: Vec<u8>, reply_hint: usize) -> Result<SendReply, ResmgrError> {
        let reply = self
            .messenger
            .send_to(self.coid, &Payload::bytes(message), reply_hint, None)
            .map_err(server_error)?;
        if reply.status < 0 {
            return Err(ResmgrError::Server(reply.status));
        }
        Ok(reply)
    }
}

/// Surfaces an error reply as the number the manager sent
fn server_error(err: TransportError) -> ResmgrError {
    match err {
        TransportError::Kernel(KernelError::ServerError(errno)) => ResmgrError::Server(errno),
        other => other.into(),
    }
}
