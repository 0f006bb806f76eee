//! Channel and connection manager
//!
//! A [`Connector`] holds at most one channel and one connection. Servers
//! create or attach a channel, clients open or attach a connection, and
//! timer or interrupt users do both with [`Connector::create_and_attach`]
//! so their events arrive on their own channel.
//!
//! Releasing a handle that is not held is a no-op, reported as
//! [`Release::NothingToRelease`].

use crate::TransportError;
use core_types::{ChannelId, ConnectionId, NameScope, NodeDescriptor, ProcessId};
use kernel_api::{ChannelFlags, KernelApi, NameAttachment, PathId, SIDE_CHANNEL};
use std::sync::Arc;

/// Outcome of a release call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// A held handle was released
    Released,
    /// Nothing was held
    NothingToRelease,
}

/// How the held connection was obtained, which decides how it is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionOrigin {
    Attached,
    Named,
}

/// Owner of one channel and one connection
pub struct Connector<K: KernelApi> {
    kernel: Arc<K>,
    chid: Option<ChannelId>,
    attachment: Option<NameAttachment>,
    coid: Option<(ConnectionId, ConnectionOrigin)>,
}

impl<K: KernelApi> Connector<K> {
    /// Creates a connector holding nothing
    pub fn new(kernel: Arc<K>) -> Self {
        Self {
            kernel,
            chid: None,
            attachment: None,
            coid: None,
        }
    }

    pub fn kernel(&self) -> &Arc<K> {
        &self.kernel
    }

    /// True while a channel is held
    pub fn channel_ok(&self) -> bool {
        self.chid.is_some()
    }

    /// True while a usable connection is bound
    pub fn connection_ok(&self) -> bool {
        self.coid.map_or(false, |(coid, _)| coid.is_valid())
    }

    pub fn chid(&self) -> Option<ChannelId> {
        self.chid
    }

    pub fn coid(&self) -> Option<ConnectionId> {
        self.coid.map(|(coid, _)| coid)
    }

    /// Discovery handle of the name this channel is attached under
    pub fn dpp(&self) -> Option<PathId> {
        self.attachment.as_ref().map(|attachment| attachment.dpp)
    }

    pub fn attachment(&self) -> Option<&NameAttachment> {
        self.attachment.as_ref()
    }

    /// Creates a channel and stores its id
    ///
    /// A previously held channel is forgotten, not destroyed.
    pub fn create_channel(&mut self, flags: ChannelFlags) -> Result<ChannelId, TransportError> {
        let chid = self.kernel.channel_create(flags)?;
        if let Some(previous) = self.chid.replace(chid) {
            log::debug!("connector: {} replaces {}", chid, previous);
        }
        self.attachment = None;
        Ok(chid)
    }

    /// Releases the held channel, detaching its name first if it has one
    pub fn destroy_channel(&mut self) -> Result<Release, TransportError> {
        let Some(chid) = self.chid.take() else {
            return Ok(Release::NothingToRelease);
        };
        match self.attachment.take() {
            Some(attachment) => self.kernel.name_detach(&attachment)?,
            None => self.kernel.channel_destroy(chid)?,
        }
        log::debug!("connector: released {}", chid);
        Ok(Release::Released)
    }

    /// Creates a channel registered under `name`
    pub fn attach_name(&mut self, name: &str, scope: NameScope) -> Result<ChannelId, TransportError> {
        let attachment = self.kernel.name_attach(name, scope)?;
        let chid = attachment.chid;
        log::info!("connector: attached {} as {}", attachment.path(), chid);
        self.chid = Some(chid);
        self.attachment = Some(attachment);
        Ok(chid)
    }

    /// Opens a connection to the channel registered under `name`
    ///
    /// Fails at once when the name is not registered.
    pub fn open_name(&mut self, name: &str, scope: NameScope) -> Result<ConnectionId, TransportError> {
        let coid = self.kernel.name_open(name, scope)?;
        self.coid = Some((coid, ConnectionOrigin::Named));
        Ok(coid)
    }

    /// Attaches a connection to `chid` in process `pid` on node `nd`
    ///
    /// Without `chid` the held channel is used; with neither the call fails
    /// with [`TransportError::NoChannel`].
    pub fn connect(
        &mut self,
        nd: NodeDescriptor,
        pid: ProcessId,
        chid: Option<ChannelId>,
        index: i32,
        flags: i32,
    ) -> Result<ConnectionId, TransportError> {
        let chid = chid.or(self.chid).ok_or(TransportError::NoChannel)?;
        let coid = self.kernel.connect_attach(nd, pid, chid, index, flags)?;
        self.coid = Some((coid, ConnectionOrigin::Attached));
        Ok(coid)
    }

    /// Creates a channel and connects to it from this process
    ///
    /// The connection is allocated outside the file descriptor range, the
    /// way event sources deliver pulses to their own channel.
    pub fn create_and_attach(
        &mut self,
        flags: ChannelFlags,
    ) -> Result<(ChannelId, ConnectionId), TransportError> {
        let chid = self.create_channel(flags)?;
        let pid = self.kernel.pid();
        let coid = self.connect(NodeDescriptor::LOCAL, pid, Some(chid), SIDE_CHANNEL, 0)?;
        Ok((chid, coid))
    }

    /// Detaches the held connection
    pub fn detach(&mut self) -> Result<Release, TransportError> {
        let Some((coid, _)) = self.coid.take() else {
            return Ok(Release::NothingToRelease);
        };
        self.kernel.connect_detach(coid)?;
        Ok(Release::Released)
    }

    /// Closes the held connection the way it was opened
    pub fn close(&mut self) -> Result<Release, TransportError> {
        let Some((coid, origin)) = self.coid.take() else {
            return Ok(Release::NothingToRelease);
        };
        match origin {
            ConnectionOrigin::Named => self.kernel.name_close(coid)?,
            ConnectionOrigin::Attached => self.kernel.connect_detach(coid)?,
        }
        Ok(Release::Released)
    }
}
