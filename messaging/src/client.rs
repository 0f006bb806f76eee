//! Name client

use crate::{wait_for_attach, Messenger, SendReply, TransportConfig, TransportError};
use core_types::NameScope;
use ipc::{Payload, SigVal, DEFAULT_PULSE_PRIORITY};
use kernel_api::KernelApi;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A connection to a named server
pub struct Client<K: KernelApi> {
    name: String,
    messenger: Messenger<K>,
}

impl<K: KernelApi> Client<K> {
    /// Opens `name`, first waiting for it to be attached when `wait` is set
    pub fn connect(
        kernel: Arc<K>,
        name: &str,
        scope: NameScope,
        config: TransportConfig,
        wait: bool,
    ) -> Result<Self, TransportError> {
        if wait {
            wait_for_attach(&*kernel, name, scope);
        }
        let mut messenger = Messenger::new(kernel, config);
        messenger.connector_mut().open_name(name, scope)?;
        Ok(Self {
            name: name.to_string(),
            messenger,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn messenger(&self) -> &Messenger<K> {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut Messenger<K> {
        &mut self.messenger
    }

    /// Sends `payload` and waits for the reply
    pub fn send(&mut self, payload: &Payload, reply_hint: usize) -> Result<SendReply, TransportError> {
        self.messenger.send(payload, reply_hint, None)
    }

    /// Sends a serializable request and deserializes the reply
    pub fn request<T, R>(&mut self, request: &T) -> Result<(i32, R), TransportError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let reply = self.send(&Payload::structured(request)?, 0)?;
        Ok((reply.status, reply.payload.into_value()?))
    }

    /// Sends a pulse at the default priority
    pub fn send_pulse(&self, code: i8, value: SigVal) -> Result<(), TransportError> {
        self.messenger.send_pulse(DEFAULT_PULSE_PRIORITY, code, value)
    }

    /// Closes the connection
    pub fn close(mut self) -> Result<(), TransportError> {
        self.messenger.connector_mut().close()?;
        Ok(())
    }
}
