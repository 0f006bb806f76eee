//! Name-attached servers
//!
//! A [`Server`] attaches a name and runs a receive loop, handing each
//! message or pulse to a handler. Messages are always replied to; pulses
//! never are. [`ThreadedServer`] runs the same loop on a worker thread.

use crate::{Messenger, Received, TransportConfig, TransportError};
use core_types::NameScope;
use ipc::Payload;
use kernel_api::KernelApi;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What a handler asks the serve loop to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Reply with `status` and `payload`, then keep serving
    Reply(i32, Payload),
    /// Reply with an error number, then keep serving
    Fail(i32),
    /// Reply status `-1` and leave the loop
    Stop,
}

impl Flow {
    /// Successful empty reply
    pub fn ok() -> Self {
        Flow::Reply(0, Payload::empty())
    }
}

/// Totals of one serve loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub messages: u64,
    pub pulses: u64,
    /// Replies the kernel refused, usually because the sender went away
    pub failed_replies: u64,
    /// Messages dropped because their body could not be decoded
    pub rejected: u64,
}

/// A server attached under a name
pub struct Server<K: KernelApi> {
    name: String,
    messenger: Messenger<K>,
}

impl<K: KernelApi> Server<K> {
    /// Attaches `name` in `scope`
    pub fn attach(
        kernel: Arc<K>,
        name: &str,
        scope: NameScope,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let mut messenger = Messenger::new(kernel, config);
        messenger.connector_mut().attach_name(name, scope)?;
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

    /// Serves until the handler returns [`Flow::Stop`]
    ///
    /// A receive failure ends the loop with that error. A failed reply is
    /// logged and counted; the loop goes on.
    pub fn run<F>(&mut self, mut handler: F) -> Result<ServeSummary, TransportError>
    where
        F: FnMut(&Received) -> Flow,
    {
        let mut summary = ServeSummary::default();
        loop {
            let received = match self.messenger.receive(0, None) {
                Ok(received) => received,
                Err(TransportError::Payload(err)) => {
                    log::warn!("{}: rejected undecodable message: {}", self.name, err);
                    summary.rejected += 1;
                    continue;
                }
                Err(TransportError::Wire(err)) => {
                    log::warn!("{}: rejected malformed message: {}", self.name, err);
                    summary.rejected += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let flow = handler(&received);

            if received.is_pulse() {
                summary.pulses += 1;
                if flow == Flow::Stop {
                    break;
                }
                continue;
            }

            summary.messages += 1;
            let rcvid = received.rcvid();
            let result = match &flow {
                Flow::Reply(status, payload) => self.messenger.reply(rcvid, *status, Some(payload), None),
                Flow::Fail(errno) => self.messenger.error(rcvid, *errno),
                Flow::Stop => self.messenger.reply(rcvid, -1, None, None),
            };
            if let Err(err) = result {
                log::warn!("{}: reply to {} failed: {}", self.name, rcvid, err);
                summary.failed_replies += 1;
            }
            if flow == Flow::Stop {
                break;
            }
        }
        log::info!("{}: server exiting after {} messages", self.name, summary.messages);
        Ok(summary)
    }

    /// Detaches the name and destroys the channel
    pub fn shutdown(mut self) -> Result<(), TransportError> {
        self.messenger.connector_mut().destroy_channel()?;
        Ok(())
    }
}

/// A [`Server`] running on its own thread
pub struct ThreadedServer {
    name: String,
    handle: JoinHandle<Result<ServeSummary, TransportError>>,
}

impl ThreadedServer {
    /// Attaches `name` on the calling thread, then serves on a new one
    ///
    /// The name is registered when this returns. The worker detaches it
    /// when the loop ends.
    pub fn spawn<K, F>(
        kernel: Arc<K>,
        name: &str,
        scope: NameScope,
        config: TransportConfig,
        handler: F,
    ) -> Result<Self, TransportError>
    where
        K: KernelApi + 'static,
        F: FnMut(&Received) -> Flow + Send + 'static,
    {
        let mut server = Server::attach(kernel, name, scope, config)?;
        let handle = thread::Builder::new()
            .name(format!("server-{}", name))
            .spawn(move || {
                let result = server.run(handler);
                server.shutdown()?;
                result
            })
            .map_err(|err| TransportError::WorkerPanicked(err.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the serve loop to end
    pub fn join(self) -> Result<ServeSummary, TransportError> {
        self.handle
            .join()
            .map_err(|_| TransportError::WorkerPanicked(self.name))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Client;
    use ipc::{pulse_code, SigVal};
    use serde_json::json;
    use sim_kernel::SimulatedKernel;

    #[test]
    fn test_threaded_server_replies_and_stops() {
        let kernel = Arc::new(SimulatedKernel::new());
        let server = ThreadedServer::spawn(
            Arc::clone(&kernel),
            "adder",
            NameScope::Local,
            TransportConfig::structured(),
            |received| match received.payload().and_then(|p| p.value()) {
                Some(value) if value == &json!("stop") => Flow::Stop,
                Some(value) => match value.as_i64() {
                    Some(n) => Flow::Reply(0, Payload::from(json!(n + 1))),
                    None => Flow::Fail(core_types::errno::EINVAL),
                },
                None => Flow::ok(),
            },
        )
        .unwrap();

        let mut client =
            Client::connect(Arc::clone(&kernel), "adder", NameScope::Local, TransportConfig::structured(), false)
                .unwrap();
        let (status, value): (i32, i64) = client.request(&41).unwrap();
        assert_eq!((status, value), (0, 42));

        let err = client.send(&Payload::from(json!("x")), 0).unwrap_err();
        assert_eq!(err.errno(), core_types::errno::EINVAL);

        let reply = client.send(&Payload::from(json!("stop")), 0).unwrap();
        assert_eq!(reply.status, -1);

        let summary = server.join().unwrap();
        assert_eq!(summary.messages, 3);
        assert!(!kernel.path_exists("/dev/name/local/adder"));
    }

    #[test]
    fn test_undecodable_message_does_not_stop_server() {
        let kernel = Arc::new(SimulatedKernel::new());
        let server = ThreadedServer::spawn(
            Arc::clone(&kernel),
            "strict",
            NameScope::Local,
            TransportConfig::structured(),
            |received| match received.payload().and_then(|p| p.value()) {
                Some(value) if value == &json!("stop") => Flow::Stop,
                _ => Flow::Reply(0, Payload::from(json!("ok"))),
            },
        )
        .unwrap();

        let mut raw =
            Client::connect(Arc::clone(&kernel), "strict", NameScope::Local, TransportConfig::raw(), false)
                .unwrap();
        let err = raw.send(&Payload::bytes("not json"), 0).unwrap_err();
        assert_eq!(err.errno(), core_types::errno::EBADMSG);
        raw.close().unwrap();
        assert!(kernel.path_exists("/dev/name/local/strict"));

        let mut client =
            Client::connect(Arc::clone(&kernel), "strict", NameScope::Local, TransportConfig::structured(), false)
                .unwrap();
        let (status, value): (i32, String) = client.request(&"hello").unwrap();
        assert_eq!((status, value.as_str()), (0, "ok"));
        let reply = client.send(&Payload::from(json!("stop")), 0).unwrap();
        assert_eq!(reply.status, -1);

        let summary = server.join().unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.messages, 2);
    }

    #[test]
    fn test_pulses_are_never_replied() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server =
            Server::attach(Arc::clone(&kernel), "pulsed", NameScope::Local, TransportConfig::raw()).unwrap();
        let client =
            Client::connect(Arc::clone(&kernel), "pulsed", NameScope::Local, TransportConfig::raw(), false)
                .unwrap();
        client.send_pulse(3, SigVal::Int(1)).unwrap();
        client.send_pulse(4, SigVal::Int(2)).unwrap();

        let mut codes = Vec::new();
        let summary = server
            .run(|received| {
                let Received::Pulse { pulse, .. } = received else {
                    return Flow::ok();
                };
                codes.push(pulse.code);
                if pulse.code == 4 {
                    Flow::Stop
                } else {
                    Flow::ok()
                }
            })
            .unwrap();
        assert_eq!(codes, vec![3, 4]);
        assert_eq!(summary, ServeSummary { messages: 0, pulses: 2, failed_replies: 0, rejected: 0 });
        assert!(codes.iter().all(|code| *code != pulse_code::DISCONNECT));
        server.shutdown().unwrap();
    }
}
